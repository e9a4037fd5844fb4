use std::collections::HashMap;
use std::fmt;

use secrecy::{ExposeSecret, SecretString};

pub const USERNAME_KEY: &str = "username";
pub const PASSWORD_KEY: &str = "password";

/// Login for a PMC management endpoint.
///
/// A credential with a blank user is invalid. Stores must report it as absent
/// rather than hand it out.
#[derive(Clone)]
pub struct Credential {
    pub user: String,
    pub password: SecretString,
}

impl Credential {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: SecretString::from(password.into()),
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.user.trim().is_empty()
    }

    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Overwrite fields with the non-empty fields of `other`.
    pub fn patch(&mut self, other: &Credential) {
        if !other.user.is_empty() {
            self.user.clone_from(&other.user);
        }
        if !other.password().is_empty() {
            self.password = other.password.clone();
        }
    }

    /// Secret-store wire form.
    pub fn to_map(&self) -> HashMap<String, String> {
        HashMap::from([
            (USERNAME_KEY.to_string(), self.user.clone()),
            (PASSWORD_KEY.to_string(), self.password().to_string()),
        ])
    }

    /// Missing keys become empty fields, which makes the result invalid.
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        Self::new(
            map.get(USERNAME_KEY).cloned().unwrap_or_default(),
            map.get(PASSWORD_KEY).cloned().unwrap_or_default(),
        )
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.user == other.user && self.password() == other.password()
    }
}

impl Eq for Credential {}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("user", &self.user)
            .field("password", &"********")
            .finish()
    }
}
