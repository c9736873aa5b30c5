use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::ids::UserId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProfileError {
    #[error("username cannot be empty")]
    EmptyUsername,
}

/// Role stored on a profile row.
///
/// The backend keeps this as free text; only `authenticated` unlocks gated
/// videos. Unknown values are preserved so they survive a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum Role {
    #[default]
    Anonymous,
    Authenticated,
    Other(String),
}

impl Role {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Role::Anonymous => "anon",
            Role::Authenticated => "authenticated",
            Role::Other(raw) => raw,
        }
    }

    #[must_use]
    pub fn unlocks_member_content(&self) -> bool {
        matches!(self, Role::Authenticated)
    }
}

impl From<&str> for Role {
    fn from(raw: &str) -> Self {
        match raw {
            "" | "anon" => Role::Anonymous,
            "authenticated" => Role::Authenticated,
            other => Role::Other(other.to_owned()),
        }
    }
}

impl From<Option<String>> for Role {
    fn from(raw: Option<String>) -> Self {
        raw.as_deref().map_or(Role::Anonymous, Role::from)
    }
}

impl From<Role> for Option<String> {
    fn from(role: Role) -> Self {
        match role {
            Role::Anonymous => None,
            other => Some(other.as_str().to_owned()),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row of the `profiles` table, keyed by `user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: UserId,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub role: Role,
}

impl Profile {
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            username: None,
            role: Role::Anonymous,
        }
    }

    #[must_use]
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }
}

/// Trim a submitted username and reject blank input.
///
/// # Errors
///
/// Returns `ProfileError::EmptyUsername` when nothing remains after trimming.
pub fn normalize_username(raw: &str) -> Result<String, ProfileError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ProfileError::EmptyUsername);
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_known_and_unknown_values() {
        assert_eq!(Role::from("authenticated"), Role::Authenticated);
        assert_eq!(Role::from("anon"), Role::Anonymous);
        assert_eq!(Role::from("admin"), Role::Other("admin".into()));
        assert!(!Role::from("admin").unlocks_member_content());
    }

    #[test]
    fn null_role_deserializes_as_anonymous() {
        let json = r#"{"user_id":"6f1c1c1e-8a53-4f0e-9d1a-0d1d2b8f4a10","username":"kei","role":null}"#;
        let profile: Profile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.role, Role::Anonymous);
        assert_eq!(profile.username.as_deref(), Some("kei"));
    }

    #[test]
    fn normalize_username_trims() {
        assert_eq!(normalize_username("  kei ").unwrap(), "kei");
        assert_eq!(normalize_username("   "), Err(ProfileError::EmptyUsername));
    }
}
