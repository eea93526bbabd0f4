use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use tracing::error;

pub const MIN_PASSWORD_LEN: usize = 6;
const VERIFICATION_TOKEN_LEN: usize = 48;

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

lazy_static! {
    static ref DECOY_HASH: String =
        hash_password("decoy-password-never-issued").unwrap_or_default();
}

/// A real argon2 hash that belongs to no account. Checking a password
/// against it costs the same as checking a real one.
pub fn decoy_hash() -> &'static str {
    DECOY_HASH.as_str()
}

/// One-time token mailed to the user to prove control of the address.
pub fn generate_verification_token() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(VERIFICATION_TOKEN_LEN)
        .map(char::from)
        .collect()
}
