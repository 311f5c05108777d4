use crate::{
    config::{Config, IdentityBackend},
    constants::{
        API_ERROR_BAD_CREDENTIALS, API_ERROR_EMAIL_TAKEN, API_ERROR_PASSWORD_SHORT,
        KEY_PREFIX_AUTH_TOKEN, KEY_PREFIX_AUTH_USER,
    },
    error::ApiError,
    identity_http::HttpIdentityProvider,
    index::UniqueIndex,
    kv::KvStore,
};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use axum::http::StatusCode;
use chrono::{DateTime, Duration, Utc};
use password_hash::{SaltString, rand_core::OsRng};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

const EMAIL_INDEX: UniqueIndex = UniqueIndex::new("auth", "email", API_ERROR_EMAIL_TAKEN);

/// Server-side account authority: owns passwords and access tokens.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns the new user id.
    async fn create_user(
        &self,
        email: &str,
        password: &str,
        profile: Value,
    ) -> Result<String, ApiError>;

    /// Returns an access token.
    async fn sign_in(&self, email: &str, password: &str) -> Result<String, ApiError>;

    async fn verify_token(&self, token: &str) -> Result<Option<String>, ApiError>;
}

pub fn from_config(
    config: &Config,
    kv: Arc<KvStore>,
) -> Result<Arc<dyn IdentityProvider>, ApiError> {
    match config.identity.backend {
        IdentityBackend::Local => Ok(Arc::new(LocalIdentityProvider::new(
            kv,
            config.password_min_length,
            config.token_ttl_seconds,
        ))),
        IdentityBackend::Http => {
            let http = config.identity.http.as_ref().ok_or_else(|| {
                ApiError::http(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "identity backend http requires auth.identity.http config",
                )
            })?;
            Ok(Arc::new(HttpIdentityProvider::new(
                http,
                config.password_min_length,
            )?))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserRecord {
    id: String,
    email: String,
    password_hash: String,
    #[serde(default)]
    profile: Value,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenRecord {
    user_id: String,
    expires_at: DateTime<Utc>,
}

/// Accounts kept in the same key-value store as the records they guard.
pub struct LocalIdentityProvider {
    kv: Arc<KvStore>,
    password_min_length: usize,
    token_ttl_seconds: i64,
}

impl LocalIdentityProvider {
    pub fn new(kv: Arc<KvStore>, password_min_length: usize, token_ttl_seconds: i64) -> Self {
        Self {
            kv,
            password_min_length,
            token_ttl_seconds,
        }
    }

    fn user_key(id: &str) -> String {
        format!("{KEY_PREFIX_AUTH_USER}:{id}")
    }

    fn token_key(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        format!("{KEY_PREFIX_AUTH_TOKEN}:{}", hex::encode(hasher.finalize()))
    }

    fn random_token_hex(bytes: usize) -> String {
        let mut buf = vec![0_u8; bytes];
        rand::thread_rng().fill_bytes(&mut buf);
        hex::encode(buf)
    }

    async fn load_user(&self, id: &str) -> Result<Option<UserRecord>, ApiError> {
        match self.kv.get(&Self::user_key(id)).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    #[instrument(skip(self, password, profile))]
    async fn create_user(
        &self,
        email: &str,
        password: &str,
        profile: Value,
    ) -> Result<String, ApiError> {
        if password.chars().count() < self.password_min_length {
            return Err(ApiError::http(
                StatusCode::BAD_REQUEST,
                API_ERROR_PASSWORD_SHORT,
            ));
        }
        let email = normalize_email(email);
        EMAIL_INDEX.ensure_free(&self.kv, &email).await?;

        let record = UserRecord {
            id: Uuid::new_v4().to_string(),
            email: email.clone(),
            password_hash: hash_password(password)?,
            profile,
            created_at: Utc::now(),
        };
        EMAIL_INDEX.claim(&self.kv, &email, &record.id).await?;
        self.kv
            .set(&Self::user_key(&record.id), serde_json::to_value(&record)?)
            .await?;
        debug!(user_id = record.id, "local identity created");
        Ok(record.id)
    }

    #[instrument(skip(self, password))]
    async fn sign_in(&self, email: &str, password: &str) -> Result<String, ApiError> {
        let email = normalize_email(email);
        let rejected = || ApiError::http(StatusCode::UNAUTHORIZED, API_ERROR_BAD_CREDENTIALS);
        let Some(user_id) = EMAIL_INDEX.lookup(&self.kv, &email).await? else {
            debug!("sign-in for unknown email");
            return Err(rejected());
        };
        let Some(user) = self.load_user(&user_id).await? else {
            warn!(user_id, "email index points at a missing identity");
            return Err(rejected());
        };
        verify_password(&user.password_hash, password)?;

        let token = Self::random_token_hex(32);
        let record = TokenRecord {
            user_id: user.id.clone(),
            expires_at: Utc::now() + Duration::seconds(self.token_ttl_seconds),
        };
        self.kv
            .set(&Self::token_key(&token), serde_json::to_value(&record)?)
            .await?;
        debug!(user_id = user.id, "access token issued");
        Ok(token)
    }

    async fn verify_token(&self, token: &str) -> Result<Option<String>, ApiError> {
        let key = Self::token_key(token);
        let Some(value) = self.kv.get(&key).await? else {
            return Ok(None);
        };
        let record: TokenRecord = match serde_json::from_value(value) {
            Ok(record) => record,
            Err(err) => {
                warn!(error = %err, "dropping malformed access token record");
                self.kv.delete(&key).await?;
                return Ok(None);
            }
        };
        if record.expires_at <= Utc::now() {
            debug!(user_id = record.user_id, "access token expired");
            self.kv.delete(&key).await?;
            return Ok(None);
        }
        Ok(Some(record.user_id))
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| ApiError::Internal)
}

fn verify_password(hash: &str, password: &str) -> Result<(), ApiError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| ApiError::Internal)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::http(StatusCode::UNAUTHORIZED, API_ERROR_BAD_CREDENTIALS))
}

#[cfg(test)]
mod tests {
    use super::{IdentityProvider, LocalIdentityProvider};
    use crate::kv::KvStore;
    use axum::http::StatusCode;
    use serde_json::json;
    use std::sync::Arc;

    fn provider(ttl: i64) -> LocalIdentityProvider {
        LocalIdentityProvider::new(Arc::new(KvStore::memory()), 4, ttl)
    }

    #[tokio::test]
    async fn sign_in_issues_verifiable_token() {
        let identity = provider(3600);
        let user_id = identity
            .create_user("Ana@PN.ao", "segredo", json!({"matricula": "PN000001"}))
            .await
            .expect("create");
        let token = identity
            .sign_in("ana@pn.ao", "segredo")
            .await
            .expect("sign in");
        assert_eq!(
            identity.verify_token(&token).await.expect("verify"),
            Some(user_id)
        );
        assert_eq!(identity.verify_token("forged").await.expect("verify"), None);
    }

    #[tokio::test]
    async fn wrong_password_and_duplicate_email_are_rejected() {
        let identity = provider(3600);
        identity
            .create_user("rui@pn.ao", "segredo", json!({}))
            .await
            .expect("create");

        let err = identity
            .sign_in("rui@pn.ao", "errada")
            .await
            .expect_err("bad password");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let err = identity
            .create_user("RUI@pn.ao", "outra-senha", json!({}))
            .await
            .expect_err("duplicate");
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn short_password_is_rejected() {
        let err = provider(3600)
            .create_user("a@pn.ao", "abc", json!({}))
            .await
            .expect_err("short");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn expired_tokens_do_not_verify() {
        let identity = provider(-1);
        identity
            .create_user("b@pn.ao", "segredo", json!({}))
            .await
            .expect("create");
        let token = identity.sign_in("b@pn.ao", "segredo").await.expect("sign in");
        assert_eq!(identity.verify_token(&token).await.expect("verify"), None);
    }
}
