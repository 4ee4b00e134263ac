//! Newtype identifiers shared across crates.
//!
//! Grounded on the teacher's habit of using `uuid::Uuid` directly everywhere
//! (`MemoryEntry.id`, `Association`); wrapped here in thin newtypes because
//! the spec's data model names several distinct id spaces (agent, session,
//! version, memory item) that must not be interchangeable at the type level.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(u: Uuid) -> Self {
                Self(u)
            }
        }
    };
}

uuid_newtype!(AgentId);
uuid_newtype!(SessionId);
uuid_newtype!(VersionId);
uuid_newtype!(MemoryItemId);
