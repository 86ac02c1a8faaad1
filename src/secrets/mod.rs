//! secrets
//!
//! Backend key/value storage for sensitive values.
//!
//! # Architecture
//!
//! The [`SecretStore`] trait is a small synchronous key/value interface.
//! [`KeyChain`](crate::auth::KeyChain) builds the signed-in user record on
//! top of it. Two backends exist:
//!
//! - [`FileSecretStore`]: `~/.docsauth/secrets.toml` (default)
//! - [`KeychainSecretStore`]: the OS keychain (feature `keychain`)
//!
//! # Security
//!
//! - Values are never logged or included in error messages
//! - The file backend writes 0600 files atomically under a file lock

mod file_store;
mod keychain_store;
mod traits;

pub use file_store::FileSecretStore;
pub use keychain_store::{KeychainSecretStore, KEYCHAIN_SERVICE};
pub use traits::{SecretError, SecretStore};

/// The default secret store provider name.
pub const DEFAULT_PROVIDER: &str = "file";

/// Names accepted by [`create_store`].
pub const PROVIDERS: &[&str] = &["file", "keychain"];

/// Create the secret store named by configuration.
///
/// # Errors
///
/// - Unknown provider name
/// - `"keychain"` without the `keychain` feature
/// - Initialization errors from the store
pub fn create_store(provider: &str) -> Result<Box<dyn SecretStore>, SecretError> {
    match provider {
        "file" => Ok(Box::new(FileSecretStore::new()?)),
        "keychain" => Ok(Box::new(KeychainSecretStore::new()?)),
        other => Err(SecretError::ProviderNotAvailable(format!(
            "unknown secret provider: '{}' (valid: {})",
            other,
            PROVIDERS.join(", ")
        ))),
    }
}
