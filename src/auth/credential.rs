use std::fmt;

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHashString, PasswordHasher, PasswordVerifier, SaltString},
};
use rand_core::OsRng;
use tokio::task;

use crate::{Error, config::Auth as AuthConfig};

/// Stored one-way password hash in PHC string form.
///
/// Carries its own salt and cost parameters, so a credential produced under
/// older cost settings still verifies after the configuration changes.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wraps a value read back from storage. No validation happens here;
    /// a malformed value simply never verifies.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(..)")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("failed to hash password: {0}")]
    Hash(argon2::password_hash::Error),
    #[error("invalid password hashing cost: {0}")]
    Params(argon2::Error),
}

#[derive(Clone)]
pub struct CredentialManager {
    hasher: Argon2<'static>,
    decoy: PasswordHashString,
}

impl CredentialManager {
    pub fn new(params: Params) -> Result<Self, CredentialError> {
        let hasher = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let salt = SaltString::generate(&mut OsRng);
        let decoy = hasher
            .hash_password(b"decoy password", &salt)
            .map_err(CredentialError::Hash)?
            .serialize();
        Ok(Self { hasher, decoy })
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, CredentialError> {
        let params = config.hash_params().map_err(CredentialError::Params)?;
        Self::new(params)
    }

    pub fn hash(&self, password: &str) -> Result<Credential, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .hasher
            .hash_password(password.as_bytes(), &salt)
            .map_err(CredentialError::Hash)?;
        Ok(Credential(hash.to_string()))
    }

    pub fn verify(&self, password: &str, credential: &Credential) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(credential.as_str()) else {
            warn!("stored credential is not a valid PHC string");
            return false;
        };
        self.hasher
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// Burns one verification against a throwaway hash. Used when no stored
    /// credential exists, so lookups of unknown users cost the same as a
    /// wrong password.
    pub fn verify_dummy(&self, password: &str) -> bool {
        let _ = self
            .hasher
            .verify_password(password.as_bytes(), &self.decoy.password_hash());
        false
    }

    pub async fn hash_blocking(&self, password: String) -> Result<Credential, Error> {
        let manager = self.clone();
        let credential = task::spawn_blocking(move || manager.hash(&password)).await??;
        Ok(credential)
    }

    pub async fn verify_blocking(
        &self,
        password: String,
        credential: Option<Credential>,
    ) -> Result<bool, Error> {
        let manager = self.clone();
        let verified = task::spawn_blocking(move || match credential {
            Some(credential) => manager.verify(&password, &credential),
            None => manager.verify_dummy(&password),
        })
        .await?;
        Ok(verified)
    }
}

#[cfg(test)]
pub(crate) fn test_manager() -> CredentialManager {
    // Minimum argon2 cost keeps the suite fast.
    let params = Params::new(Params::MIN_M_COST.max(64), 1, 1, None).unwrap();
    CredentialManager::new(params).unwrap()
}
