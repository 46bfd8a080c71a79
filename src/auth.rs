//! Accounts and credential checks
//!
//! Accounts are configured as `username:sha256hex:channel` entries. Login
//! uses HTTP Basic credentials; every other route takes the bearer token
//! handed out at login.

use axum::http::{header, HeaderMap};
use base64::Engine;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::types::ChannelName;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub username: String,
    /// Lowercase hex SHA-256 of the password
    pub password_digest: String,
    pub channel: ChannelName,
}

#[derive(Debug, Clone, Default)]
pub struct Accounts {
    by_name: HashMap<String, Account>,
}

impl Accounts {
    /// Parse a comma separated account list. Malformed entries are logged
    /// and skipped. The channel defaults to the username.
    pub fn parse(raw: &str) -> Self {
        let mut by_name = HashMap::new();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let mut parts = entry.splitn(3, ':');
            let username = parts.next().unwrap_or_default().trim();
            let digest = parts.next().unwrap_or_default().trim().to_lowercase();
            let channel = parts.next().map(str::trim).unwrap_or_default();

            if username.is_empty() || digest.len() != 64 || hex::decode(&digest).is_err() {
                tracing::warn!("Ignoring malformed account entry for '{}'", username);
                continue;
            }

            let channel = if channel.is_empty() { username } else { channel };
            by_name.insert(
                username.to_string(),
                Account {
                    username: username.to_string(),
                    password_digest: digest,
                    channel: channel.to_string(),
                },
            );
        }
        Self { by_name }
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// The account if the password matches
    pub fn verify(&self, username: &str, password: &str) -> Option<&Account> {
        let account = self.by_name.get(username)?;
        let digest = hash_password(password);
        constant_time_eq(digest.as_bytes(), account.password_digest.as_bytes()).then_some(account)
    }
}

pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Constant-time byte comparison to prevent timing attacks
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Username and password from an `Authorization: Basic` header
pub fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// Token from an `Authorization: Bearer` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
