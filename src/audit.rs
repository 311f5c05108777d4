use crate::{
    constants::{AUDIT_LOG_LIMIT, KEY_PREFIX_LOG},
    error::ApiError,
    kv::KvStore,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditAction {
    #[serde(rename = "POLICIAL_CRIADO")]
    OfficerCreated,
    #[serde(rename = "LOGIN")]
    Login,
    #[serde(rename = "CONSULTA_BOLETINS")]
    ReportsListed,
    #[serde(rename = "BOLETIM_CRIADO")]
    ReportCreated,
    #[serde(rename = "CONSULTA_BOLETIM")]
    ReportViewed,
    #[serde(rename = "BOLETIM_ATUALIZADO")]
    ReportUpdated,
    #[serde(rename = "BUSCA_AVANCADA")]
    ReportsSearched,
    #[serde(rename = "CONSULTA_PESSOAS")]
    PersonsListed,
    #[serde(rename = "PESSOA_CRIADA")]
    PersonCreated,
    #[serde(rename = "PESSOA_ATUALIZADA")]
    PersonUpdated,
    #[serde(rename = "PESSOA_DELETADA")]
    PersonDeleted,
    #[serde(rename = "CONSULTA_POLICIAIS")]
    OfficersListed,
    #[serde(rename = "CONSULTA_ESTATISTICAS")]
    StatisticsViewed,
    #[serde(rename = "CONSULTA_LOGS")]
    LogsViewed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: String,
    #[serde(rename = "policialId")]
    pub officer_id: String,
    #[serde(rename = "acao")]
    pub action: AuditAction,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "detalhes", default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Append-only action trail stored under `log:<id>`.
#[derive(Debug, Clone, Copy)]
pub struct AuditLog {
    limit: usize,
}

impl AuditLog {
    /// Configured limits are held to `1..=100`.
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.clamp(1, AUDIT_LOG_LIMIT),
        }
    }

    #[instrument(skip(self, kv, detail))]
    pub async fn append(
        &self,
        kv: &KvStore,
        officer_id: &str,
        action: AuditAction,
        detail: Option<String>,
    ) -> Result<AuditLogEntry, ApiError> {
        let entry = AuditLogEntry {
            id: Uuid::new_v4().to_string(),
            officer_id: officer_id.to_string(),
            action,
            timestamp: Utc::now(),
            detail,
        };
        kv.set(
            &format!("{KEY_PREFIX_LOG}:{}", entry.id),
            serde_json::to_value(&entry)?,
        )
        .await?;
        debug!(entry_id = entry.id, "action logged");
        Ok(entry)
    }

    /// Newest first, at most `limit` entries.
    pub async fn recent(&self, kv: &KvStore) -> Result<Vec<AuditLogEntry>, ApiError> {
        let mut entries = kv
            .get_by_prefix(&format!("{KEY_PREFIX_LOG}:"))
            .await?
            .into_iter()
            .filter_map(|value: Value| match serde_json::from_value(value) {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(error = %err, "skipping malformed audit entry");
                    None
                }
            })
            .collect::<Vec<AuditLogEntry>>();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        entries.truncate(self.limit);
        Ok(entries)
    }
}
