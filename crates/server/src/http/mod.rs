pub mod agents;
pub mod chat;
pub mod context;
pub mod conversation;
pub mod costs;
pub mod health;
pub mod models;
