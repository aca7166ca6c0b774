//! User directory.
//!
//! Identity lives behind the [`UserDirectory`] trait so the rest of the
//! service never depends on where accounts come from. The bundled
//! implementation reads a JSON array of accounts once at startup.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::store::{JsonFile, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Sales,
    Manager,
    Common,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    /// Never serialized back out.
    #[serde(default, skip_serializing)]
    pub password: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: Role,
}

pub trait UserDirectory: Send + Sync {
    fn get(&self, id: &str) -> Option<User>;

    /// Check a username/password pair.
    fn authenticate(&self, username: &str, password: &str) -> Option<User>;

    fn list(&self) -> Vec<User>;

    fn with_role(&self, role: Role) -> Vec<User> {
        self.list().into_iter().filter(|u| u.role == role).collect()
    }
}

pub type SharedUserDirectory = Arc<dyn UserDirectory>;

fn constant_time_eq(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();
    if a_bytes.len() != b_bytes.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for i in 0..a_bytes.len() {
        diff |= a_bytes[i] ^ b_bytes[i];
    }
    diff == 0
}

/// Fixed set of accounts held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticUserDirectory {
    users: Vec<User>,
}

impl StaticUserDirectory {
    pub fn new(users: Vec<User>) -> Self {
        Self { users }
    }

    /// Load accounts from a JSON file; a missing file yields an empty directory.
    pub fn load(path: &Path) -> StoreResult<Self> {
        let users: Vec<User> = JsonFile::new(path).load()?;
        if users.is_empty() {
            tracing::warn!("No user accounts found at {}", path.display());
        } else {
            tracing::info!("Loaded {} user accounts from {}", users.len(), path.display());
        }
        Ok(Self::new(users))
    }
}

impl UserDirectory for StaticUserDirectory {
    fn get(&self, id: &str) -> Option<User> {
        self.users.iter().find(|u| u.id == id).cloned()
    }

    fn authenticate(&self, username: &str, password: &str) -> Option<User> {
        let username = username.trim();
        let account = self.users.iter().find(|u| u.username == username);
        match account {
            Some(acc) => {
                let valid = !acc.password.is_empty() && constant_time_eq(password, &acc.password);
                valid.then(|| acc.clone())
            }
            None => {
                // Same work as a real comparison so unknown names are not faster.
                let _ = constant_time_eq(password, "dummy_password_for_timing");
                None
            }
        }
    }

    fn list(&self) -> Vec<User> {
        self.users.clone()
    }
}
