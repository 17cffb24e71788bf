//! PKCE helpers
//!
//! Random verifier/state generation and the S256 code challenge used by the
//! GitHub OAuth login flow.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::rngs::{OsRng, StdRng};
use rand::distributions::{Distribution, Uniform};
use rand::{Rng, RngCore, SeedableRng};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::cache::{keys, KeyValueStore};
use crate::error::Result;

/// RFC 7636 unreserved characters
const UNRESERVED: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// Length of the PKCE code verifier
pub const VERIFIER_LENGTH: usize = 128;

/// Length of the anti-CSRF state token
pub const STATE_LENGTH: usize = 32;

/// Generate a random string over the unreserved alphabet
///
/// Uses the operating system CSPRNG. If that source is unavailable a
/// clock-seeded, non-cryptographic generator is used instead.
pub fn generate_random_string(length: usize) -> String {
    let mut first = [0u8; 1];
    match OsRng.try_fill_bytes(&mut first) {
        Ok(()) => sample_unreserved(&mut OsRng, length),
        Err(e) => {
            warn!("OS random source unavailable, using weak fallback: {}", e);
            sample_unreserved(&mut fallback_rng(), length)
        }
    }
}

/// Weak fallback: seeded from the wall clock, predictable
fn fallback_rng() -> StdRng {
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    StdRng::seed_from_u64(seed)
}

// Uniform index draws, so every character is equally likely.
fn sample_unreserved<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    let index = Uniform::from(0..UNRESERVED.len());
    (0..length)
        .map(|_| UNRESERVED[index.sample(rng)] as char)
        .collect()
}

/// Derive the S256 challenge: Base64URL(SHA-256(verifier)) without padding
pub fn generate_code_challenge(code_verifier: &str) -> String {
    let digest = Sha256::digest(code_verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Everything generated for one login attempt
#[derive(Debug, Clone)]
pub struct PkceSession {
    pub verifier: String,
    pub state: String,
    pub challenge: String,
}

impl PkceSession {
    pub fn generate() -> Self {
        let verifier = generate_random_string(VERIFIER_LENGTH);
        let challenge = generate_code_challenge(&verifier);
        Self {
            verifier,
            state: generate_random_string(STATE_LENGTH),
            challenge,
        }
    }
}

/// Saved OAuth handshake data, either half may be missing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OAuthData {
    pub code_verifier: Option<String>,
    pub state: Option<String>,
}

/// Persist verifier and state to the session store
pub fn save_oauth_data(session: &dyn KeyValueStore, code_verifier: &str, state: &str) -> Result<()> {
    session.set(keys::OAUTH_CODE_VERIFIER, code_verifier)?;
    session.set(keys::OAUTH_STATE, state)?;
    Ok(())
}

/// Read back verifier and state
pub fn get_oauth_data(session: &dyn KeyValueStore) -> OAuthData {
    OAuthData {
        code_verifier: session.get(keys::OAUTH_CODE_VERIFIER).ok().flatten(),
        state: session.get(keys::OAUTH_STATE).ok().flatten(),
    }
}

/// Forget verifier and state
pub fn clear_oauth_data(session: &dyn KeyValueStore) -> Result<()> {
    session.remove(keys::OAUTH_CODE_VERIFIER)?;
    session.remove(keys::OAUTH_STATE)?;
    Ok(())
}
