//! User registry with salted password hashes.
//!
//! Persisted as `users.json` in the data directory:
//!
//! ```text
//! {
//!   "alice": { "salt": "9f1c...", "password_hash": "4be2..." }
//! }
//! ```

use crate::file_io::{read_json_locked, write_json_atomic};
use crate::store::UserId;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct PasswordRecord {
    salt: String,
    password_hash: String,
}

impl PasswordRecord {
    fn new(password: &str) -> Self {
        let salt = hex::encode(rand::random::<[u8; 16]>());
        let password_hash = hash_password(&salt, password);
        Self {
            salt,
            password_hash,
        }
    }

    fn matches(&self, password: &str) -> bool {
        hash_password(&self.salt, password) == self.password_hash
    }
}

/// Registered accounts, optionally backed by a file
#[derive(Clone, Debug, Default)]
pub struct UserRegistry {
    path: Option<PathBuf>,
    users: BTreeMap<String, PasswordRecord>,
}

impl UserRegistry {
    /// Registry that lives only in memory
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the registry file. A missing file is an empty registry.
    pub fn load(path: &Path) -> Result<Self> {
        let users = read_json_locked(path)?.unwrap_or_default();
        Ok(Self {
            path: Some(path.to_path_buf()),
            users,
        })
    }

    fn save(&self) -> Result<()> {
        if let Some(path) = &self.path {
            write_json_atomic(path, &self.users)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn contains(&self, username: &str) -> bool {
        self.users.contains_key(username)
    }

    pub fn list_users(&self) -> Vec<String> {
        self.users.keys().cloned().collect()
    }

    pub fn add_user(&mut self, username: &str, password: &str) -> Result<UserId> {
        let username = validate_username(username)?;
        validate_password(password)?;
        if self.users.contains_key(username) {
            return Err(Error::Auth(format!("user '{}' already exists", username)));
        }

        self.users
            .insert(username.to_string(), PasswordRecord::new(password));
        self.save()?;
        tracing::info!("Registered user '{}'", username);
        Ok(UserId::new(username))
    }

    pub fn set_password(&mut self, username: &str, password: &str) -> Result<()> {
        validate_password(password)?;
        let record = self
            .users
            .get_mut(username)
            .ok_or_else(|| Error::NotFound(format!("user '{}'", username)))?;
        *record = PasswordRecord::new(password);
        self.save()?;
        tracing::info!("Updated password for '{}'", username);
        Ok(())
    }

    pub fn delete_user(&mut self, username: &str) -> Result<()> {
        if self.users.remove(username).is_none() {
            return Err(Error::NotFound(format!("user '{}'", username)));
        }
        self.save()?;
        tracing::info!("Deleted user '{}'", username);
        Ok(())
    }

    /// The user's id if the password matches
    pub fn verify(&self, username: &str, password: &str) -> Option<UserId> {
        let record = self.users.get(username)?;
        if record.matches(password) {
            Some(UserId::new(username))
        } else {
            tracing::warn!("Rejected login for '{}'", username);
            None
        }
    }
}

/// Usernames become directory names, so keep them to a safe alphabet
fn validate_username(username: &str) -> Result<&str> {
    let username = username.trim();
    if username.is_empty() {
        return Err(Error::Auth("username is empty".into()));
    }
    let safe = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !safe || username.starts_with('.') {
        return Err(Error::Auth(format!(
            "username '{}' may only contain letters, digits, '-', '_' and '.'",
            username
        )));
    }
    Ok(username)
}

fn validate_password(password: &str) -> Result<()> {
    if password.trim().is_empty() {
        return Err(Error::Auth("password is empty".into()));
    }
    Ok(())
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_verify() {
        let mut registry = UserRegistry::in_memory();
        registry.add_user("alice", "pw").unwrap();
        assert_eq!(registry.verify("alice", "pw"), Some(UserId::new("alice")));
        assert_eq!(registry.verify("alice", "PW"), None);
    }

    #[test]
    fn test_duplicate_user_rejected() {
        let mut registry = UserRegistry::in_memory();
        registry.add_user("alice", "pw").unwrap();
        assert!(matches!(
            registry.add_user("alice", "other"),
            Err(Error::Auth(_))
        ));
    }

    #[test]
    fn test_unsafe_usernames_rejected() {
        let mut registry = UserRegistry::in_memory();
        for bad in ["", "  ", "../etc", "a/b", ".hidden", "ana maría"] {
            assert!(registry.add_user(bad, "pw").is_err(), "{:?}", bad);
        }
        assert!(matches!(registry.add_user("bob", " "), Err(Error::Auth(_))));
    }

    #[test]
    fn test_salts_differ_per_user() {
        let mut registry = UserRegistry::in_memory();
        registry.add_user("a", "same").unwrap();
        registry.add_user("b", "same").unwrap();
        assert_ne!(
            registry.users["a"].password_hash,
            registry.users["b"].password_hash
        );
    }

    #[test]
    fn test_stored_digests_are_lowercase_hex() {
        let record = PasswordRecord::new("secret");
        assert_eq!(record.salt.len(), 32);
        assert_eq!(record.password_hash.len(), 64);
        assert_eq!(hex::decode(&record.password_hash).unwrap().len(), 32);
        assert!(record
            .password_hash
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_set_password_and_delete() {
        let mut registry = UserRegistry::in_memory();
        registry.add_user("alice", "old").unwrap();
        registry.set_password("alice", "new").unwrap();
        assert!(registry.verify("alice", "old").is_none());
        assert!(registry.verify("alice", "new").is_some());

        registry.delete_user("alice").unwrap();
        assert!(registry.is_empty());
        assert!(matches!(
            registry.delete_user("alice"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_registry_persists() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("users.json");

        let mut registry = UserRegistry::load(&path).unwrap();
        assert!(registry.is_empty());
        registry.add_user("alice", "pw").unwrap();

        let reloaded = UserRegistry::load(&path).unwrap();
        assert_eq!(reloaded.list_users(), vec!["alice".to_string()]);
        assert!(reloaded.verify("alice", "pw").is_some());
    }
}
