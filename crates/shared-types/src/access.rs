//! Access levels required by routes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered authorization tier.
///
/// Comparison is by rank: `Public < Authorized < Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Access {
    /// No authentication required.
    Public,
    /// Requires a verified token.
    Authorized,
    /// Requires a verified token carrying the admin role.
    Admin,
}

impl Access {
    /// True when a caller holding `self` may invoke a route requiring `required`.
    ///
    /// Public routes accept every caller.
    pub fn satisfies(self, required: Access) -> bool {
        required == Access::Public || self >= required
    }
}

impl Default for Access {
    fn default() -> Self {
        Access::Public
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Public => write!(f, "PUBLIC"),
            Access::Authorized => write!(f, "AUTHORIZED"),
            Access::Admin => write!(f, "ADMIN"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_order() {
        assert!(Access::Public < Access::Authorized);
        assert!(Access::Authorized < Access::Admin);
    }

    #[test]
    fn test_satisfies() {
        assert!(Access::Public.satisfies(Access::Public));
        assert!(!Access::Public.satisfies(Access::Authorized));
        assert!(Access::Admin.satisfies(Access::Authorized));
        assert!(!Access::Authorized.satisfies(Access::Admin));
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Access::Authorized).unwrap();
        assert_eq!(json, "\"AUTHORIZED\"");
    }
}
