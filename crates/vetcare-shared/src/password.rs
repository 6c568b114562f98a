//! Password hashing.
//!
//! Hashes are a single salted BLAKE3 `derive_key` pass. BLAKE3 is built
//! to be fast, so this offers far less resistance to offline guessing
//! than a memory-hard KDF such as Argon2 or scrypt: anyone holding the
//! `users` table can test candidate passwords at hashing speed. The
//! per-user salt only rules out precomputed tables. Swapping in a slow
//! KDF needs a new hash prefix so `verify_password` can tell the formats
//! apart while old hashes are migrated on next login.

use rand::RngCore;
use subtle::ConstantTimeEq;

use crate::constants::{KDF_CONTEXT_PASSWORD, PASSWORD_SALT_SIZE};
use crate::error::PasswordError;

// BLAKE3 KDF with domain separation, salt mixed in before the password
fn derive(salt: &[u8], password: &str) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(KDF_CONTEXT_PASSWORD);
    hasher.update(salt);
    hasher.update(password.as_bytes());
    *hasher.finalize().as_bytes()
}

/// Hash a password for storage. Output format: `salt_hex$hash_hex`.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; PASSWORD_SALT_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    let hash = derive(&salt, password);
    format!("{}${}", hex::encode(salt), hex::encode(hash))
}

/// Check a password against a stored hash in constant time.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, PasswordError> {
    let (salt_hex, hash_hex) = stored.split_once('$').ok_or(PasswordError::MalformedHash)?;
    let salt = hex::decode(salt_hex).map_err(|_| PasswordError::MalformedHash)?;
    let expected = hex::decode(hash_hex).map_err(|_| PasswordError::MalformedHash)?;
    if salt.len() != PASSWORD_SALT_SIZE || expected.len() != 32 {
        return Err(PasswordError::MalformedHash);
    }

    let actual = derive(&salt, password);
    Ok(actual.as_slice().ct_eq(expected.as_slice()).unwrap_u8() == 1)
}
