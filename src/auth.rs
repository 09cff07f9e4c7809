//! HTTP Basic authentication.
//!
//! Provides the credential verifier consulted by the gate in front of
//! `POST /food/`:
//! 1. Parse `Authorization: Basic <base64(user:password)>`
//! 2. Look up the user in the [`CredentialStore`]
//! 3. Compare SHA-256 digests of the passwords in constant time

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::config::AuthConfig;

/// Username of a request that passed the Basic auth gate. Inserted into
/// request extensions by the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

// ── Header parsing ──────────────────────────────────────────────────

/// Parse an `Authorization` header value of the form `Basic <credentials>`.
///
/// Returns `(username, password)`. The password may itself contain `:`;
/// only the first colon separates the two.
pub fn parse_basic_auth(header: &str) -> Option<(String, String)> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

// ── Credential store ────────────────────────────────────────────────

fn digest(password: &str) -> [u8; 32] {
    Sha256::digest(password.as_bytes()).into()
}

/// Known users and the SHA-256 digests of their passwords.
#[derive(Clone, Default)]
pub struct CredentialStore {
    users: HashMap<String, [u8; 32]>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("users", &self.users.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        let mut store = Self::new();
        for user in &config.users {
            store.insert(&user.username, &user.password);
        }
        store
    }

    /// Add or replace a user.
    pub fn insert(&mut self, username: &str, password: &str) {
        self.users.insert(username.to_string(), digest(password));
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Check a user/password pair.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        match self.users.get(username) {
            Some(expected) => expected[..].ct_eq(&digest(password)[..]).into(),
            None => false,
        }
    }

    /// Verify a raw `Authorization` header value, returning the username
    /// on success.
    pub fn verify_header(&self, header: &str) -> Option<String> {
        let (user, pass) = parse_basic_auth(header)?;
        self.verify(&user, &pass).then_some(user)
    }
}
