//! Encrypted session cookie.
//!
//! The access token is stored in an `HttpOnly` cookie so the proxies can
//! attach it for browser requests that carry no `Authorization` header.
//!
//! Cookie value layout: `base64url(nonce || AES-256-GCM ciphertext)` without
//! padding. The key is the SHA-256 digest of the configured passphrase.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD as BASE64};
use cookie::Cookie;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::config::CookieConfig;

/// Nonce size for AES-256-GCM (96 bits)
const NONCE_SIZE: usize = 12;

/// Key size for AES-256 (256 bits)
const KEY_SIZE: usize = 32;

/// Errors raised while sealing a cookie value.
#[derive(Debug, thiserror::Error)]
pub enum CookieError {
    /// The cipher could not be created or encryption failed.
    #[error("Encryption failed: {0}")]
    Encryption(String),
}

/// Encrypts and decrypts session cookie values.
#[derive(Clone)]
pub struct SessionCookieCipher {
    key: [u8; KEY_SIZE],
}

impl std::fmt::Debug for SessionCookieCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCookieCipher").finish_non_exhaustive()
    }
}

impl SessionCookieCipher {
    /// Derives the cipher key from a passphrase.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        let digest = Sha256::digest(secret.as_bytes());
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&digest);
        Self { key }
    }

    /// Encrypts a token into a cookie-safe string.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CookieError> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| CookieError::Encryption(format!("Failed to create cipher: {e}")))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| CookieError::Encryption(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(sealed))
    }

    /// Decrypts a cookie value.
    ///
    /// Returns `None` for anything that does not authenticate under this key:
    /// wrong key, tampered or truncated values, bad encoding, or an empty
    /// plaintext.
    #[must_use]
    pub fn decrypt(&self, value: &str) -> Option<String> {
        let sealed = BASE64.decode(value.trim().as_bytes()).ok()?;
        if sealed.len() <= NONCE_SIZE {
            return None;
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
        let cipher = Aes256Gcm::new_from_slice(&self.key).ok()?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .ok()?;

        String::from_utf8(plaintext).ok().filter(|s| !s.is_empty())
    }

    /// Encrypts the token and wraps it in a session cookie.
    pub fn seal_cookie(
        &self,
        token: &str,
        config: &CookieConfig,
    ) -> Result<Cookie<'static>, CookieError> {
        let value = self.encrypt(token)?;
        Ok(session_cookie(config, value))
    }

    /// Reads and decrypts the session cookie from a `Cookie` request header.
    #[must_use]
    pub fn open_cookie_header(&self, header: &str, cookie_name: &str) -> Option<String> {
        let raw = find_cookie(header, cookie_name)?;
        let token = self.decrypt(&raw);
        if token.is_none() {
            tracing::warn!(cookie = %cookie_name, "Failed to decrypt session cookie");
        }
        token
    }
}

/// Builds the session cookie carrying an already-encrypted value.
#[must_use]
pub fn session_cookie(config: &CookieConfig, value: String) -> Cookie<'static> {
    let max_age = i64::try_from(config.max_age.as_secs()).unwrap_or(i64::MAX);

    Cookie::build((config.name.clone(), value))
        .http_only(config.http_only)
        .secure(config.secure)
        .path(config.path.clone())
        .max_age(time::Duration::seconds(max_age))
        .build()
}

/// Builds a cookie that makes the browser drop the session cookie.
#[must_use]
pub fn removal_cookie(config: &CookieConfig) -> Cookie<'static> {
    Cookie::build((config.name.clone(), ""))
        .http_only(config.http_only)
        .secure(config.secure)
        .path(config.path.clone())
        .max_age(time::Duration::ZERO)
        .build()
}

/// Finds a cookie value by name in a `Cookie` header.
#[must_use]
pub fn find_cookie(header: &str, name: &str) -> Option<String> {
    Cookie::split_parse_encoded(header)
        .filter_map(Result::ok)
        .find(|c| c.name() == name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}
