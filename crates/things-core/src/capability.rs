//! Named permissions for the JSON API

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named permission the caller must hold for an API operation.
///
/// `Edit` gates inserts, `Read` gates selects. The authorization
/// service checks membership against the capabilities carried in the
/// caller's token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Edit,
    Read,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Edit => "edit",
            Capability::Read => "read",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
