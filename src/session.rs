use crate::{
    constants::{STORAGE_KEY_TOKEN, STORAGE_KEY_USER},
    error::ApiError,
    kv::KvStore,
    models::Officer,
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// String-valued client storage surviving restarts (the browser's
/// `localStorage` contract).
#[async_trait]
pub trait DurableStorage: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>, ApiError>;
    async fn set_item(&self, key: &str, value: String) -> Result<(), ApiError>;
    async fn remove_item(&self, key: &str) -> Result<(), ApiError>;
}

#[async_trait]
impl DurableStorage for KvStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, ApiError> {
        Ok(match self.get(key).await? {
            Some(Value::String(text)) => Some(text),
            Some(other) => Some(other.to_string()),
            None => None,
        })
    }

    async fn set_item(&self, key: &str, value: String) -> Result<(), ApiError> {
        self.set(key, Value::String(value)).await
    }

    async fn remove_item(&self, key: &str) -> Result<(), ApiError> {
        self.delete(key).await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub officer: Officer,
    pub token: String,
}

/// The signed-in officer, mirrored to durable storage.
pub struct SessionContext {
    storage: Arc<dyn DurableStorage>,
    current: Option<Session>,
}

impl SessionContext {
    /// Rehydrates a saved session; unreadable data is cleared and the
    /// context starts signed out.
    pub async fn restore(storage: Arc<dyn DurableStorage>) -> Result<Self, ApiError> {
        let saved_user = storage.get_item(STORAGE_KEY_USER).await?;
        let saved_token = storage.get_item(STORAGE_KEY_TOKEN).await?;

        let current = match (saved_user, saved_token) {
            (Some(user), Some(token)) => match serde_json::from_str::<Officer>(&user) {
                Ok(officer) => {
                    debug!(badge = officer.badge, "restored saved session");
                    Some(Session { officer, token })
                }
                Err(err) => {
                    warn!(error = %err, "discarding unreadable saved session");
                    storage.remove_item(STORAGE_KEY_USER).await?;
                    storage.remove_item(STORAGE_KEY_TOKEN).await?;
                    None
                }
            },
            _ => None,
        };
        Ok(Self { storage, current })
    }

    pub fn is_authenticated(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|session| !session.token.is_empty())
    }

    pub fn officer(&self) -> Option<&Officer> {
        self.current.as_ref().map(|session| &session.officer)
    }

    pub fn token(&self) -> Option<&str> {
        self.current.as_ref().map(|session| session.token.as_str())
    }

    pub async fn establish(&mut self, session: Session) -> Result<(), ApiError> {
        self.storage
            .set_item(STORAGE_KEY_USER, serde_json::to_string(&session.officer)?)
            .await?;
        self.storage
            .set_item(STORAGE_KEY_TOKEN, session.token.clone())
            .await?;
        self.current = Some(session);
        Ok(())
    }

    /// Signs out; storage is cleared even when nothing was signed in.
    pub async fn invalidate(&mut self) -> Result<(), ApiError> {
        self.current = None;
        self.storage.remove_item(STORAGE_KEY_USER).await?;
        self.storage.remove_item(STORAGE_KEY_TOKEN).await
    }
}

#[cfg(test)]
mod tests {
    use super::{DurableStorage, Session, SessionContext};
    use crate::{
        kv::KvStore,
        models::{Officer, Rank},
    };
    use std::sync::Arc;

    fn officer() -> Officer {
        Officer {
            id: "4".to_string(),
            name: "Agente Ana Paula Francisco".to_string(),
            rank: Rank::Agent,
            badge: "PN004567".to_string(),
            district: None,
            station: None,
            email: None,
            created_at: None,
        }
    }

    #[tokio::test]
    async fn established_session_survives_restore() {
        let storage: Arc<dyn DurableStorage> = Arc::new(KvStore::memory());
        let mut ctx = SessionContext::restore(storage.clone()).await.expect("restore");
        assert!(!ctx.is_authenticated());

        ctx.establish(Session {
            officer: officer(),
            token: "pn-session-1-abc".to_string(),
        })
        .await
        .expect("establish");

        let restored = SessionContext::restore(storage).await.expect("restore");
        assert!(restored.is_authenticated());
        assert_eq!(restored.token(), Some("pn-session-1-abc"));
        assert_eq!(restored.officer().map(|o| o.badge.as_str()), Some("PN004567"));
    }

    #[tokio::test]
    async fn corrupt_saved_user_is_cleared() {
        let storage: Arc<dyn DurableStorage> = Arc::new(KvStore::memory());
        storage
            .set_item("bo_user", "{not json".to_string())
            .await
            .expect("set");
        storage
            .set_item("bo_token", "t".to_string())
            .await
            .expect("set");

        let ctx = SessionContext::restore(storage.clone()).await.expect("restore");
        assert!(!ctx.is_authenticated());
        assert_eq!(storage.get_item("bo_user").await.expect("get"), None);
        assert_eq!(storage.get_item("bo_token").await.expect("get"), None);
    }

    #[tokio::test]
    async fn invalidate_clears_memory_and_storage() {
        let storage: Arc<dyn DurableStorage> = Arc::new(KvStore::memory());
        let mut ctx = SessionContext::restore(storage.clone()).await.expect("restore");
        ctx.invalidate().await.expect("invalidate when signed out");
        ctx.establish(Session {
            officer: officer(),
            token: "t".to_string(),
        })
        .await
        .expect("establish");
        ctx.invalidate().await.expect("invalidate");
        assert!(!ctx.is_authenticated());
        assert!(ctx.officer().is_none());
        assert_eq!(storage.get_item("bo_token").await.expect("get"), None);
    }
}
