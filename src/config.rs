use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Role attached to a registered identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

/// One entry of the user store.
///
/// `password` is either the plain secret or an Argon2 PHC hash
/// (`$argon2id$...`), see [`crate::login::hash_password`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub password: String,
    pub role: Role,
}

/// Application configuration, read from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Address the HTTP server listens on.
    pub bind: String,

    /// Directory holding every table file.
    pub upload_dir: PathBuf,

    /// File name of the merged master table inside `upload_dir`.
    pub master_file: String,

    /// Directory served under `/static`.
    pub static_dir: PathBuf,

    /// Page size used when the request does not give one.
    pub default_page_size: usize,

    /// Lifetime of a login session.
    pub session_ttl_secs: u64,

    /// Registered identities, keyed by email.
    pub users: HashMap<String, UserRecord>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            bind: "127.0.0.1:5000".to_string(),
            upload_dir: PathBuf::from("uploads"),
            master_file: "master_data.xlsx".to_string(),
            static_dir: PathBuf::from("static"),
            default_page_size: 10,
            session_ttl_secs: 24 * 60 * 60,
            users: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Read the configuration at `path`.
    ///
    /// A missing file gives the defaults (and an empty user store); a file
    /// that exists but does not parse is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        if !path.exists() {
            log::warn!(
                "config file {} not found, using defaults with no users",
                path.display()
            );
            return Ok(AppConfig::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
        Self::from_json(&contents).map_err(|e| format!("Failed to parse {}: {e}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_defaults() {
        let config = AppConfig::from_json(
            r#"{
                "upload_dir": "data",
                "users": {
                    "admin@example.com": {"password": "admin123", "role": "admin"},
                    "user@example.com": {"password": "user123", "role": "user"}
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.upload_dir, PathBuf::from("data"));
        assert_eq!(config.master_file, "master_data.xlsx");
        assert_eq!(config.default_page_size, 10);
        assert_eq!(config.users["admin@example.com"].role, Role::Admin);
        assert_eq!(config.users["user@example.com"].role, Role::User);
    }

    #[test]
    fn unknown_role_is_rejected() {
        let err = AppConfig::from_json(r#"{"users": {"a": {"password": "x", "role": "root"}}}"#);
        assert!(err.is_err());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(dir.path().join("none.json")).unwrap();
        assert!(config.users.is_empty());
        assert_eq!(config.bind, "127.0.0.1:5000");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(AppConfig::load(&path).is_err());
    }
}
