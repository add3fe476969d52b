//! Opaque stable identifiers. Cheap to clone and safe to use as map keys,
//! wrapping an `Arc<str>` the way cloneable interned keys usually do.

use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct SessionId(Arc<str>);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct TurnId(Arc<str>);

macro_rules! id_newtype {
    ($ty:ident) => {
        impl $ty {
            pub fn new(value: impl Into<Arc<str>>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $ty {
            fn from(value: String) -> Self {
                Self(value.into())
            }
        }

        impl From<&str> for $ty {
            fn from(value: &str) -> Self {
                Self(value.into())
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(SessionId);
id_newtype!(TurnId);

/// Opaque correlation identifier for an in-flight approval request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ApprovalId(Arc<str>);
id_newtype!(ApprovalId);

/// Opaque identifier for one tool invocation within a turn.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ToolUseId(Arc<str>);
id_newtype!(ToolUseId);

impl ToolUseId {
    pub fn generate() -> Self {
        Self(format!("tu_{}", uuid::Uuid::new_v4()).into())
    }
}

impl ApprovalId {
    pub fn generate() -> Self {
        Self(format!("ap_{}", uuid::Uuid::new_v4()).into())
    }
}
