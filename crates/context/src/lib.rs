//! C7 — Context Assembler (spec §4.7).

pub mod assembler;
pub mod error;

pub use assembler::{assemble, AssembleInput, AssembledContext, UsageBreakdown};
pub use error::ContextError;
