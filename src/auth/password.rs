/// Password Hashing and Verification
///
/// bcrypt with a work factor fixed when the verifier is built. Password
/// policy (length, complexity) belongs to the registration flow, not here,
/// but input past bcrypt's 72-byte limit is refused rather than truncated.

use std::fmt;

use crate::configuration::PasswordSettings;
use crate::error::{AuthError, ConfigError};

const MIN_COST: u32 = 4;
const MAX_COST: u32 = 31;

/// bcrypt ignores every byte after the 72nd
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Stored password hash (bcrypt modular crypt format, salt embedded)
#[derive(Clone, PartialEq, Eq)]
pub struct HashedCredential(String);

impl HashedCredential {
    /// Wrap a hash loaded from storage; no format check happens here
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for HashedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HashedCredential(..)")
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CredentialVerifier {
    cost: u32,
}

impl CredentialVerifier {
    /// # Errors
    /// Returns a configuration error if `cost` is outside bcrypt's 4..=31 range
    pub fn new(cost: u32) -> Result<Self, ConfigError> {
        if !(MIN_COST..=MAX_COST).contains(&cost) {
            return Err(ConfigError::InvalidValue(format!(
                "password.bcrypt_cost must be between {} and {}",
                MIN_COST,
                MAX_COST
            )));
        }
        Ok(Self { cost })
    }

    pub fn from_settings(settings: &PasswordSettings) -> Result<Self, ConfigError> {
        Self::new(settings.bcrypt_cost)
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a plaintext password with a fresh random salt
    ///
    /// # Errors
    /// Returns `PasswordTooLong` above [`MAX_PASSWORD_BYTES`] and
    /// `HashingFailed` if bcrypt itself fails
    pub fn hash(&self, password: &str) -> Result<HashedCredential, AuthError> {
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(AuthError::PasswordTooLong);
        }
        bcrypt::hash(password, self.cost)
            .map(HashedCredential)
            .map_err(|_| AuthError::HashingFailed)
    }

    /// Check a candidate password against a stored hash
    ///
    /// # Errors
    /// Returns `CredentialMismatch` for a wrong password and for a stored
    /// hash that cannot be parsed alike. A candidate above
    /// [`MAX_PASSWORD_BYTES`] never matches, since no stored hash was made
    /// from one.
    pub fn verify(&self, hash: &HashedCredential, candidate: &str) -> Result<(), AuthError> {
        if candidate.len() > MAX_PASSWORD_BYTES {
            return Err(AuthError::CredentialMismatch);
        }
        match bcrypt::verify(candidate, hash.as_str()) {
            Ok(true) => Ok(()),
            Ok(false) | Err(_) => Err(AuthError::CredentialMismatch),
        }
    }

    /// Login path for an account that does not exist
    ///
    /// Spends one bcrypt round at the configured cost so the response takes
    /// as long as a wrong password, then returns `CredentialMismatch`.
    pub fn reject_unknown(&self, candidate: &str) -> AuthError {
        let end = candidate.len().min(MAX_PASSWORD_BYTES);
        let _ = bcrypt::hash(&candidate.as_bytes()[..end], self.cost);
        AuthError::CredentialMismatch
    }
}
