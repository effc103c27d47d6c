use argon2::Argon2;
use argon2::PasswordHash;
use argon2::PasswordHasher;
use argon2::PasswordVerifier;
use argon2::password_hash::SaltString;

use crate::AuthError;

fn salt() -> SaltString {
    use rand::Rng;
    let ref mut bytes = [0u8; 16];
    rand::rng().fill(bytes);
    SaltString::encode_b64(bytes).expect("salt")
}

/// One-way Argon2 hash of a password into PHC string format.
pub fn hash(password: &str) -> Result<String, argon2::password_hash::Error> {
    Argon2::default()
        .hash_password(password.as_bytes(), &salt())
        .map(|h| h.to_string())
}

/// Verify a password against a stored PHC string. Comparison happens
/// inside Argon2 and is constant-time with respect to the hash.
pub fn verify(password: &str, hashword: &str) -> bool {
    PasswordHash::new(hashword)
        .ok()
        .as_ref()
        .map(|hash| {
            Argon2::default()
                .verify_password(password.as_bytes(), hash)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Write-only password credential. Holds only the Argon2 hash; the
/// plaintext is consumed at construction and never retained.
#[derive(Clone, PartialEq, Eq)]
pub struct Password {
    hash: String,
}

impl Password {
    /// Hash a plaintext into a stored credential.
    pub fn new(plaintext: &str) -> Result<Self, AuthError> {
        hash(plaintext)
            .map(|hash| Self { hash })
            .map_err(|e| AuthError::Store(e.to_string()))
    }
    /// Rehydrate from a persisted PHC string.
    pub fn from_hash(hash: String) -> Self {
        Self { hash }
    }
    /// Check a presented plaintext against the stored hash.
    pub fn verify(&self, plaintext: &str) -> bool {
        verify(plaintext, &self.hash)
    }
    /// The opaque PHC string, for persistence only.
    pub fn hash(&self) -> &str {
        &self.hash
    }
    /// Reading the plaintext back is never permitted.
    pub fn plaintext(&self) -> Result<&str, AuthError> {
        Err(AuthError::InvalidOperation)
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(<redacted>)")
    }
}
