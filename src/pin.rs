use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Failed to hash pin: {0}")]
pub struct PinError(String);

/// One-way PIN hashing. Plaintext PINs are never stored or compared.
pub trait PinHasher: Send + Sync {
    fn hash(&self, pin: &str) -> Result<String, PinError>;

    fn verify(&self, pin: &str, secret_hash: &str) -> bool;
}

/// Argon2id hashes stored as PHC strings (`$argon2id$v=19$m=..,t=..,p=..$salt$hash`).
///
/// Verification reads the cost parameters from the stored string, so hashes made
/// with older parameters keep verifying after the configuration changes.
#[derive(Debug, Clone, Default)]
pub struct Argon2PinHasher {
    argon2: Argon2<'static>,
}

impl Argon2PinHasher {
    pub fn new(params: Params) -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }
}

impl PinHasher for Argon2PinHasher {
    fn hash(&self, pin: &str) -> Result<String, PinError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(pin.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| PinError(err.to_string()))
    }

    fn verify(&self, pin: &str, secret_hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(secret_hash) else {
            return false;
        };
        self.argon2.verify_password(pin.as_bytes(), &parsed).is_ok()
    }
}
