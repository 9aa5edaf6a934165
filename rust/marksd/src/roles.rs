use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    Guest,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "user" => Some(Self::User),
            "guest" => Some(Self::Guest),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
            Self::Guest => "guest",
        }
    }

    /// Bulk import rewrites other owners' data.
    pub fn can_import(self) -> bool {
        self == Self::Admin
    }

    /// Guests may read but not record marks.
    pub fn can_write_own(self) -> bool {
        self != Self::Guest
    }
}

/// Role changes need an admin, except the very first assignment in a
/// workspace that has no admin yet.
pub fn can_assign(caller: Role, admins_present: bool) -> bool {
    !admins_present || caller == Role::Admin
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Role::parse(" Admin "), Some(Role::Admin));
        assert_eq!(Role::parse("USER"), Some(Role::User));
        assert_eq!(Role::parse("owner"), None);
    }

    #[test]
    fn bootstrap_then_admin_only() {
        assert!(can_assign(Role::Guest, false));
        assert!(!can_assign(Role::User, true));
        assert!(can_assign(Role::Admin, true));
        assert!(!Role::User.can_import());
        assert!(!Role::Guest.can_write_own());
    }
}
