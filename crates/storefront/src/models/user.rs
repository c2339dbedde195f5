//! Authenticated session types.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use vitrine_core::{Email, UserId, UserRole};

/// The signed-in user, as handed out by the auth backend.
///
/// Persisted by the CLI between invocations, so the access token is a plain
/// `String`; `Debug` redacts it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub email: Email,
    pub display_name: String,
    #[serde(default)]
    pub role: UserRole,
    pub access_token: String,
}

impl Session {
    /// Whether the user may open the admin dashboard.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .field("role", &self.role)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// Email and password submitted to sign in or sign up.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: Email,
    pub password: SecretString,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_session_debug_redacts_token() {
        let session = Session {
            user_id: UserId::generate(),
            email: Email::parse("ana@example.com").unwrap(),
            display_name: "Ana".to_string(),
            role: UserRole::Customer,
            access_token: "super-secret-jwt".to_string(),
        };
        let debug_output = format!("{session:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super-secret-jwt"));
    }
}
