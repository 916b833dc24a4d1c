//! CSRF `state` values for the authorization-code flow.
//!
//! The state is handed to the browser together with the authorization URL.
//! The browser stores it and echoes it back as `stored_state` next to the
//! `state` returned by the provider; the token endpoint only exchanges the
//! code when both are equal. No copy is kept server-side, so the binding is
//! only as strong as the browser storage it lives in.

use rand::RngCore;

/// Length of generated state values.
pub const STATE_LENGTH: usize = 32;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generates a random alphanumeric string of `len` characters.
///
/// Each character takes one byte from the thread-local CSPRNG reduced modulo
/// the alphabet size. 256 is not a multiple of 62, so the first 8 characters
/// of the alphabet are slightly more likely. Acceptable for a CSRF token,
/// not for key material.
#[must_use]
pub fn generate_state(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);

    bytes
        .into_iter()
        .map(|b| ALPHABET[usize::from(b) % ALPHABET.len()] as char)
        .collect()
}

/// Returns `true` when the provider-returned state equals the browser-stored one.
///
/// Missing or empty values never match.
#[must_use]
pub fn states_match(state: Option<&str>, stored_state: Option<&str>) -> bool {
    match (state, stored_state) {
        (Some(state), Some(stored)) => !state.is_empty() && state == stored,
        _ => false,
    }
}
