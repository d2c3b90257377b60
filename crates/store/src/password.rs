//! PBKDF2-HMAC-SHA256 password hashing.
//!
//! 100,000 iterations over a fixed application salt, hex-encoded output.
//! The salt value is carried over from existing deployments so stored
//! hashes keep verifying across upgrades.

use {
    hmac::{Hmac, Mac},
    sha2::Sha256,
};

const ITERATIONS: u32 = 100_000;
const APP_SALT: &str = "0dbdf63b1f2c0a465b7638e0fec73c66e6a51f62f170545ac6a6d7e177d91945";

/// Derive the stored form of `password`.
#[must_use]
pub fn hash_password(password: &str) -> String {
    hex::encode(pbkdf2_sha256(
        password.as_bytes(),
        APP_SALT.as_bytes(),
        ITERATIONS,
    ))
}

/// Check `password` against a stored hash.
#[must_use]
pub fn verify_password(password: &str, stored: &str) -> bool {
    hash_password(password) == stored
}

fn prf(key: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    // HMAC keys may be any length, so construction cannot fail.
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(key) else {
        return [0; 32];
    };
    for part in parts {
        mac.update(part);
    }
    mac.finalize().into_bytes().into()
}

/// One-block PBKDF2 (the derived key is exactly the SHA-256 output size).
fn pbkdf2_sha256(password: &[u8], salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut u = prf(password, &[salt, &1u32.to_be_bytes()]);
    let mut derived = u;
    for _ in 1..iterations {
        u = prf(password, &[&u]);
        for (d, u_byte) in derived.iter_mut().zip(u.iter()) {
            *d ^= u_byte;
        }
    }
    derived
}
