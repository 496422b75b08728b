//! Branded ID newtypes.
//!
//! Sessions and connections each carry a distinct ID type so a connection ID
//! can never be logged or compared where a session ID is expected. IDs are
//! UUID v7 (time-ordered), which keeps log output sortable by creation time.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new time-ordered ID.
            #[must_use]
            pub fn new() -> Self {
                Self(format!(concat!($prefix, "_{}"), Uuid::now_v7()))
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

branded_id!(
    /// Identifies one transport link. A fresh ID is minted on every
    /// (re)connect, so adapters can tell connections apart.
    ConnectionId,
    "conn"
);

branded_id!(
    /// Identifies one session manager instance in logs.
    SessionId,
    "sess"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_unique() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn ids_carry_prefix() {
        assert!(ConnectionId::new().as_str().starts_with("conn_"));
        assert!(SessionId::new().as_str().starts_with("sess_"));
    }

    #[test]
    fn serde_is_transparent() {
        let id = ConnectionId::from("conn_fixed");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"conn_fixed\"");
        let back: ConnectionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn display_matches_inner() {
        let id = SessionId::from("sess_42".to_string());
        assert_eq!(id.to_string(), "sess_42");
    }
}
