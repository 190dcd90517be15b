//! Explicit execution privilege passed to operations that may bypass checks.

use serde::{Deserialize, Serialize};

/// Privilege under which a state transition runs.
///
/// There is no ambient "current user": callers pass the privilege they hold, and
/// only the call that receives `System` may skip availability checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Privilege {
    /// Regular session privilege (stock availability is enforced).
    Standard,
    /// System privilege used for synchronous pick-up completion.
    System,
}

impl Privilege {
    pub fn is_system(self) -> bool {
        matches!(self, Privilege::System)
    }
}
