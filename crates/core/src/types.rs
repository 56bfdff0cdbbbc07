//! Identifier newtypes shared by every layer of the lock protocol.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Wall-clock timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identifier of one node (layer) in the shared document tree.
    NodeId
);

string_id!(
    /// Identifier of a user/session that can own locks.
    UserId
);

string_id!(
    /// Identifier of a document (page). One broadcast topic per document.
    DocumentId
);
