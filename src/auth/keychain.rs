//! auth::keychain
//!
//! Persistence of the signed-in user.
//!
//! # Design
//!
//! The lifecycle talks to the narrow async [`UserInfoStore`] seam. The
//! production implementation, [`KeyChain`], keeps one JSON [`StoredUser`]
//! record per environment and repository host in a backend
//! [`SecretStore`](crate::secrets::SecretStore):
//!
//! ```text
//! docs.user.prod.github        -> {"kind":"docsauth.user-info","schema_version":1,...}
//! docs.user.ppe.azure-devops   -> ...
//! ```
//!
//! Backend calls are blocking (file locks, OS keychain), so they run on the
//! blocking pool.
//!
//! # Security
//!
//! The record contains the bearer token. It is never logged; [`StoredUser`]
//! reuses the redacting `Debug` of [`UserInfo`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::AuthError;
use super::user_info::{SignType, UserInfo};
use crate::environment::{Environment, EnvironmentContext};
use crate::secrets::SecretStore;

/// Kind identifier for stored user records.
pub const STORED_USER_KIND: &str = "docsauth.user-info";

/// Current schema version for stored user records.
pub const STORED_USER_VERSION: u32 = 1;

/// Async store for the signed-in [`UserInfo`].
#[async_trait::async_trait]
pub trait UserInfoStore: Send + Sync {
    /// Stored user for the current context, if any.
    async fn load(&self) -> Result<Option<UserInfo>, AuthError>;

    /// Persist `user`, replacing any earlier value.
    async fn save(&self, user: UserInfo) -> Result<(), AuthError>;

    /// Remove the stored user. Succeeds when nothing is stored.
    async fn clear(&self) -> Result<(), AuthError>;
}

/// Record persisted in the secret store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredUser {
    pub kind: String,
    pub schema_version: u32,
    pub environment: Environment,
    pub user: UserInfo,
    pub saved_at: DateTime<Utc>,
}

impl StoredUser {
    pub fn new(environment: Environment, user: UserInfo) -> Self {
        Self {
            kind: STORED_USER_KIND.to_string(),
            schema_version: STORED_USER_VERSION,
            environment,
            user,
            saved_at: Utc::now(),
        }
    }

    /// Secret-store key for a user of `sign_type` in `env`.
    ///
    /// ```
    /// use docsauth::auth::{SignType, StoredUser};
    /// use docsauth::environment::Environment;
    ///
    /// assert_eq!(
    ///     StoredUser::secret_key(Environment::Prod, SignType::GitHub),
    ///     "docs.user.prod.github"
    /// );
    /// ```
    pub fn secret_key(env: Environment, sign_type: SignType) -> String {
        format!("docs.user.{}.{}", env.key(), sign_type.key())
    }

    /// Parse and validate a stored record.
    ///
    /// # Errors
    ///
    /// [`AuthError::StoreUnavailable`] for malformed JSON or a record of an
    /// unexpected kind or schema version.
    pub fn parse(json: &str) -> Result<Self, AuthError> {
        let record: Self = serde_json::from_str(json)?;

        if record.kind != STORED_USER_KIND {
            return Err(AuthError::StoreUnavailable(format!(
                "unexpected record kind '{}', expected '{}'",
                record.kind, STORED_USER_KIND
            )));
        }
        if record.schema_version != STORED_USER_VERSION {
            return Err(AuthError::StoreUnavailable(format!(
                "unsupported schema version {}, expected {}",
                record.schema_version, STORED_USER_VERSION
            )));
        }
        Ok(record)
    }

    pub fn to_json(&self) -> Result<String, AuthError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// [`UserInfoStore`] backed by a [`SecretStore`], keyed by the current
/// environment and repository host.
pub struct KeyChain {
    secrets: Arc<dyn SecretStore>,
    context: Arc<dyn EnvironmentContext>,
}

impl KeyChain {
    pub fn new(secrets: Arc<dyn SecretStore>, context: Arc<dyn EnvironmentContext>) -> Self {
        Self { secrets, context }
    }

    fn current_key(&self) -> String {
        StoredUser::secret_key(
            self.context.env(),
            SignType::from(self.context.repo_host_type()),
        )
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, AuthError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn SecretStore) -> Result<T, AuthError> + Send + 'static,
    {
        let secrets = Arc::clone(&self.secrets);
        tokio::task::spawn_blocking(move || op(secrets.as_ref()))
            .await
            .map_err(|e| AuthError::StoreUnavailable(format!("secret store task failed: {}", e)))?
    }
}

#[async_trait::async_trait]
impl UserInfoStore for KeyChain {
    async fn load(&self) -> Result<Option<UserInfo>, AuthError> {
        let key = self.current_key();
        tracing::debug!(key = %key, "loading stored user");

        let raw = self
            .blocking(move |secrets| Ok(secrets.get(&key)?))
            .await?;

        match raw {
            Some(json) => Ok(Some(StoredUser::parse(&json)?.user)),
            None => Ok(None),
        }
    }

    async fn save(&self, user: UserInfo) -> Result<(), AuthError> {
        let env = self.context.env();
        let key = StoredUser::secret_key(env, user.sign_type);
        let json = StoredUser::new(env, user).to_json()?;
        tracing::debug!(key = %key, "saving user");

        self.blocking(move |secrets| Ok(secrets.set(&key, &json)?))
            .await
    }

    async fn clear(&self) -> Result<(), AuthError> {
        let env = self.context.env();
        let keys: Vec<String> = [SignType::GitHub, SignType::AzureDevOps]
            .into_iter()
            .map(|sign_type| StoredUser::secret_key(env, sign_type))
            .collect();
        tracing::debug!(env = %env, "clearing stored users");

        self.blocking(move |secrets| {
            for key in &keys {
                secrets.delete(key)?;
            }
            Ok(())
        })
        .await
    }
}

impl std::fmt::Debug for KeyChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyChain")
            .field("key", &self.current_key())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ErrorKind;
    use crate::environment::{ContributorClass, EnvironmentSnapshot, RepoHostType};
    use crate::secrets::SecretError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockSecretStore {
        data: Mutex<HashMap<String, String>>,
        fail: bool,
    }

    impl SecretStore for MockSecretStore {
        fn get(&self, key: &str) -> Result<Option<String>, SecretError> {
            if self.fail {
                return Err(SecretError::ReadError("keychain locked".into()));
            }
            Ok(self.data.lock().unwrap().get(key).cloned())
        }

        fn set(&self, key: &str, value: &str) -> Result<(), SecretError> {
            if self.fail {
                return Err(SecretError::WriteError("keychain locked".into()));
            }
            self.data
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn delete(&self, key: &str) -> Result<(), SecretError> {
            if self.fail {
                return Err(SecretError::DeleteError("keychain locked".into()));
            }
            self.data.lock().unwrap().remove(key);
            Ok(())
        }
    }

    fn context(env: Environment, host: RepoHostType) -> Arc<EnvironmentSnapshot> {
        Arc::new(EnvironmentSnapshot {
            env,
            contributor_class: ContributorClass::Internal,
            repo_host_type: host,
        })
    }

    fn user(sign_type: SignType) -> UserInfo {
        UserInfo {
            sign_type,
            user_id: "faked-id".into(),
            user_name: "Fake-User".into(),
            user_email: "fake@example.com".into(),
            user_token: "fake-token".into(),
        }
    }

    #[tokio::test]
    async fn save_then_load() {
        let secrets = Arc::new(MockSecretStore::default());
        let chain = KeyChain::new(
            secrets.clone(),
            context(Environment::Prod, RepoHostType::GitHub),
        );

        assert_eq!(chain.load().await.expect("load"), None);
        chain.save(user(SignType::GitHub)).await.expect("save");

        assert!(secrets
            .data
            .lock()
            .unwrap()
            .contains_key("docs.user.prod.github"));
        assert_eq!(
            chain.load().await.expect("load"),
            Some(user(SignType::GitHub))
        );
    }

    #[tokio::test]
    async fn records_are_scoped_by_environment_and_host() {
        let secrets = Arc::new(MockSecretStore::default());
        let prod = KeyChain::new(
            secrets.clone(),
            context(Environment::Prod, RepoHostType::GitHub),
        );
        prod.save(user(SignType::GitHub)).await.expect("save");

        let ppe = KeyChain::new(
            secrets.clone(),
            context(Environment::Ppe, RepoHostType::GitHub),
        );
        assert_eq!(ppe.load().await.expect("load"), None);

        let ado = KeyChain::new(
            secrets.clone(),
            context(Environment::Prod, RepoHostType::AzureDevOps),
        );
        assert_eq!(ado.load().await.expect("load"), None);
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let secrets = Arc::new(MockSecretStore::default());
        let chain = KeyChain::new(
            secrets.clone(),
            context(Environment::Prod, RepoHostType::GitHub),
        );
        chain.save(user(SignType::GitHub)).await.expect("save");

        chain.clear().await.expect("clear");
        chain.clear().await.expect("clear again");
        assert!(secrets.data.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn backend_failure_is_store_unavailable() {
        let secrets = Arc::new(MockSecretStore {
            fail: true,
            ..Default::default()
        });
        let chain = KeyChain::new(secrets, context(Environment::Prod, RepoHostType::GitHub));

        let err = chain.load().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
        assert!(!err.to_string().contains("fake-token"));
    }

    #[tokio::test]
    async fn foreign_record_fails_to_load() {
        let secrets = Arc::new(MockSecretStore::default());
        let mut record = StoredUser::new(Environment::Prod, user(SignType::GitHub));
        record.kind = "docsauth.token-cache".into();
        secrets.data.lock().unwrap().insert(
            "docs.user.prod.github".into(),
            record.to_json().expect("json"),
        );

        let chain = KeyChain::new(secrets, context(Environment::Prod, RepoHostType::GitHub));
        let err = chain.load().await.unwrap_err();
        assert!(err.to_string().contains("unexpected record kind"));
    }

    #[test]
    fn stored_user_rejects_future_schema() {
        let mut record = StoredUser::new(Environment::Ppe, user(SignType::AzureDevOps));
        record.schema_version = 2;
        let json = record.to_json().expect("json");
        assert!(StoredUser::parse(&json).is_err());
    }

    #[test]
    fn stored_user_debug_redacts_token() {
        let record = StoredUser::new(Environment::Prod, user(SignType::GitHub));
        assert!(!format!("{:?}", record).contains("fake-token"));
    }
}
