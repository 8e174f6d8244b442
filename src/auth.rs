//! Credential store behind the login and registration forms
//!
//! The handler only needs two operations, so the store is a trait; the
//! in-memory implementation is what the binary wires up, optionally seeded
//! from a YAML `user: password` file.

use std::collections::HashMap;
use std::path::Path;

use parking_lot::RwLock;

use crate::error::Result;

pub trait CredentialStore: Send + Sync {
    /// True when `user` exists and `password` matches.
    fn verify(&self, user: &str, password: &str) -> bool;

    /// Adds a new user. Returns false if the name is taken.
    fn register(&self, user: &str, password: &str) -> bool;
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    users: RwLock<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: HashMap<String, String>) -> Self {
        Self {
            users: RwLock::new(users),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let users: HashMap<String, String> = serde_yaml::from_str(&raw)?;
        tracing::info!(path = %path.display(), users = users.len(), "Credential store loaded");
        Ok(Self::with_users(users))
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn verify(&self, user: &str, password: &str) -> bool {
        self.users
            .read()
            .get(user)
            .is_some_and(|stored| stored == password)
    }

    fn register(&self, user: &str, password: &str) -> bool {
        let mut users = self.users.write();
        if users.contains_key(user) {
            return false;
        }
        users.insert(user.to_string(), password.to_string());
        true
    }
}

/// Name and password submitted by the login/registration forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

/// Longest accepted user name or password, in bytes.
pub const MAX_FIELD_LEN: usize = 100;

/// Parses an `application/x-www-form-urlencoded` body of the form
/// `user=<name>&passwd=<password>`.
///
/// Returns `None` when a field is missing, empty, or longer than
/// [`MAX_FIELD_LEN`].
pub fn parse_form(body: &[u8]) -> Option<Credentials> {
    let mut user = None;
    let mut password = None;

    for (key, value) in url::form_urlencoded::parse(body) {
        match key.as_ref() {
            "user" => user = Some(value.into_owned()),
            "passwd" | "password" => password = Some(value.into_owned()),
            _ => {}
        }
    }

    let user = user.filter(|u| !u.is_empty() && u.len() <= MAX_FIELD_LEN)?;
    let password = password.filter(|p| !p.is_empty() && p.len() <= MAX_FIELD_LEN)?;
    Some(Credentials { user, password })
}
