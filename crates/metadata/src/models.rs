//! Persisted entity records.
//!
//! Each store blob is a JSON object keyed by entity identity: user name for
//! users and sessions, file name for files, client IP for CSRF token lists.

use serde::{Deserialize, Serialize};

/// User record, keyed by `name` in `users.json`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserModel {
    pub name: String,
    #[serde(default)]
    pub email: String,
    /// Argon2 PHC hash.
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub access: Vec<String>,
}

// Keep password hashes out of logs.
impl std::fmt::Debug for UserModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserModel")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("is_admin", &self.is_admin)
            .field("access", &self.access)
            .finish()
    }
}

/// Login session, keyed by user name in `sessions.json`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionModel {
    /// Opaque random token.
    pub hash: String,
    /// Unix timestamp after which the session is invalid.
    pub expires: i64,
}

impl SessionModel {
    /// Valid only while `now` is strictly before `expires`.
    pub fn is_live(&self, now: i64) -> bool {
        now < self.expires
    }
}

impl std::fmt::Debug for SessionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionModel")
            .field("hash", &"<redacted>")
            .field("expires", &self.expires)
            .finish()
    }
}

/// File access list, keyed by `name` in `files.json`. Content lives elsewhere.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileModel {
    pub name: String,
    #[serde(default)]
    pub access: Vec<String>,
}

/// One CSRF token. `csrf.json` maps client IP to a list of these.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsrfModel {
    pub token: String,
    pub expires: i64,
}

impl CsrfModel {
    pub fn is_live(&self, now: i64) -> bool {
        now < self.expires
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_wire_format() {
        let user = UserModel {
            name: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "$argon2id$v=19$...".to_string(),
            is_admin: true,
            access: vec!["foo".to_string()],
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["isAdmin"], true);
        assert_eq!(json["access"][0], "foo");
        assert!(!format!("{user:?}").contains("argon2"));
    }

    #[test]
    fn test_user_defaults_for_missing_fields() {
        let user: UserModel =
            serde_json::from_str(r#"{"name":"bob","password":"$argon2id$x"}"#).unwrap();
        assert!(!user.is_admin);
        assert!(user.access.is_empty());
        assert!(user.email.is_empty());
    }

    #[test]
    fn test_session_expiry_boundary() {
        let session = SessionModel {
            hash: "abc".to_string(),
            expires: 1000,
        };
        assert!(session.is_live(999));
        assert!(!session.is_live(1000));
        assert!(!session.is_live(1001));
    }
}
