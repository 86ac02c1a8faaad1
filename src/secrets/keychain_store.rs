//! secrets::keychain_store
//!
//! OS keychain backend (macOS Keychain, Windows Credential Manager, Linux
//! Secret Service) through the `keyring` crate.
//!
//! Only functional with the `keychain` feature. Without it the type still
//! exists so that configuration can name it, but construction fails.

#[cfg(feature = "keychain")]
use keyring::Entry;

use super::traits::{SecretError, SecretStore};

/// Service name all docsauth entries are filed under.
pub const KEYCHAIN_SERVICE: &str = "docsauth";

/// Secret storage in the OS keychain, one entry per key.
#[derive(Debug)]
pub struct KeychainSecretStore {
    service: String,
}

impl KeychainSecretStore {
    /// Store under the [`KEYCHAIN_SERVICE`] service.
    ///
    /// # Errors
    ///
    /// [`SecretError::ProviderNotAvailable`] when built without the
    /// `keychain` feature.
    pub fn new() -> Result<Self, SecretError> {
        Self::with_service(KEYCHAIN_SERVICE)
    }

    pub fn with_service(service: impl Into<String>) -> Result<Self, SecretError> {
        if cfg!(feature = "keychain") {
            Ok(Self {
                service: service.into(),
            })
        } else {
            Err(SecretError::ProviderNotAvailable(
                "keychain support not enabled (compile with --features keychain)".into(),
            ))
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }
}

#[cfg(feature = "keychain")]
impl KeychainSecretStore {
    fn entry(&self, key: &str) -> Result<Entry, SecretError> {
        Entry::new(&self.service, key)
            .map_err(|e| SecretError::ReadError(format!("cannot open keychain entry: {}", e)))
    }
}

#[cfg(feature = "keychain")]
impl SecretStore for KeychainSecretStore {
    fn get(&self, key: &str) -> Result<Option<String>, SecretError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(keyring::Error::NoStorageAccess(e)) => Err(SecretError::PermissionDenied(
                format!("keychain is locked or inaccessible: {}", e),
            )),
            Err(e) => Err(SecretError::ReadError(format!(
                "cannot read from keychain: {}",
                e
            ))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SecretError> {
        tracing::debug!(key, service = %self.service, "storing keychain entry");
        self.entry(key)?
            .set_password(value)
            .map_err(|e| SecretError::WriteError(format!("cannot write to keychain: {}", e)))
    }

    fn delete(&self, key: &str) -> Result<(), SecretError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(SecretError::DeleteError(format!(
                "cannot delete from keychain: {}",
                e
            ))),
        }
    }
}

#[cfg(not(feature = "keychain"))]
impl SecretStore for KeychainSecretStore {
    fn get(&self, _key: &str) -> Result<Option<String>, SecretError> {
        Err(SecretError::ProviderNotAvailable("keychain".into()))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), SecretError> {
        Err(SecretError::ProviderNotAvailable("keychain".into()))
    }

    fn delete(&self, _key: &str) -> Result<(), SecretError> {
        Err(SecretError::ProviderNotAvailable("keychain".into()))
    }
}


#[cfg(all(test, not(feature = "keychain")))]
mod tests {
    use super::*;

    #[test]
    fn unavailable_without_feature() {
        let err = KeychainSecretStore::new().unwrap_err().to_string();
        assert!(err.contains("keychain"));
        assert!(err.contains("not enabled"));
    }
}
