//! Bearer credential shared by every gateway call.
//!
//! The context is created at bootstrap (from configuration or a sign-in flow),
//! passed explicitly to whoever needs it, and cleared on sign-out.

use secrecy::{ExposeSecret, SecretString};
use std::sync::RwLock;

#[derive(Default)]
pub struct AuthContext {
    token: RwLock<Option<SecretString>>,
}

impl AuthContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let context = Self::new();
        context.sign_in(token);
        context
    }

    /// Stores a new credential. Blank tokens are treated as a sign-out.
    pub fn sign_in(&self, token: impl Into<String>) {
        let token = token.into();
        let value = if token.trim().is_empty() {
            None
        } else {
            Some(SecretString::from(token))
        };
        match self.token.write() {
            Ok(mut guard) => *guard = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
    }

    pub fn sign_out(&self) {
        match self.token.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
        tracing::info!("Signed out; bearer credential cleared");
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// A copy of the current credential, if any.
    pub fn token(&self) -> Option<SecretString> {
        let guard = match self.token.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .as_ref()
            .map(|token| SecretString::from(token.expose_secret().to_string()))
    }
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}
