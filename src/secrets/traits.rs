//! secrets::traits
//!
//! The backend key/value contract.
//!
//! Keys are dotted, namespaced strings such as `docs.user.prod.github`.
//! Implementations store them as-is, must be `Send + Sync`, and must never
//! log a value or include one in an error message.

use thiserror::Error;

/// Errors from secret storage operations. Messages never carry values.
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("failed to read secret: {0}")]
    ReadError(String),

    #[error("failed to write secret: {0}")]
    WriteError(String),

    #[error("failed to delete secret: {0}")]
    DeleteError(String),

    /// The platform refused access (e.g. a locked keychain).
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("secret provider not available: {0}")]
    ProviderNotAvailable(String),
}

/// Synchronous key/value secret storage.
pub trait SecretStore: Send + Sync {
    /// `Ok(None)` when the key is absent; `Err` only for backend failures.
    fn get(&self, key: &str) -> Result<Option<String>, SecretError>;

    /// Store `value`, replacing any earlier one.
    fn set(&self, key: &str, value: &str) -> Result<(), SecretError>;

    /// Remove `key`. Succeeds when it was never there.
    fn delete(&self, key: &str) -> Result<(), SecretError>;

    fn exists(&self, key: &str) -> Result<bool, SecretError> {
        Ok(self.get(key)?.is_some())
    }
}
