use crate::{error::ApiError, kv::KvStore};
use axum::http::StatusCode;
use serde_json::Value;
use tracing::debug;

/// Secondary `<entity>:<field>:<value> -> id` mapping enforcing uniqueness
/// of one field across an entity's records.
#[derive(Debug, Clone, Copy)]
pub struct UniqueIndex {
    entity: &'static str,
    field: &'static str,
    conflict_message: &'static str,
}

impl UniqueIndex {
    pub const fn new(
        entity: &'static str,
        field: &'static str,
        conflict_message: &'static str,
    ) -> Self {
        Self {
            entity,
            field,
            conflict_message,
        }
    }

    pub fn key(&self, value: &str) -> String {
        format!("{}:{}:{}", self.entity, self.field, value)
    }

    pub async fn lookup(&self, kv: &KvStore, value: &str) -> Result<Option<String>, ApiError> {
        Ok(kv
            .get(&self.key(value))
            .await?
            .as_ref()
            .and_then(Value::as_str)
            .map(ToOwned::to_owned))
    }

    /// Points `value` at `id`, failing with a conflict when another id holds it.
    pub async fn claim(&self, kv: &KvStore, value: &str, id: &str) -> Result<(), ApiError> {
        if let Some(owner) = self.lookup(kv, value).await?
            && owner != id
        {
            debug!(
                entity = self.entity,
                field = self.field,
                value,
                "unique index already claimed"
            );
            return Err(ApiError::http(StatusCode::CONFLICT, self.conflict_message));
        }
        kv.set(&self.key(value), Value::String(id.to_string()))
            .await
    }

    pub async fn ensure_free(&self, kv: &KvStore, value: &str) -> Result<(), ApiError> {
        if self.lookup(kv, value).await?.is_some() {
            return Err(ApiError::http(StatusCode::CONFLICT, self.conflict_message));
        }
        Ok(())
    }

    pub async fn release(&self, kv: &KvStore, value: &str) -> Result<(), ApiError> {
        kv.delete(&self.key(value)).await
    }
}
