use crate::{
    audit::{AuditAction, AuditLog, AuditLogEntry},
    config::Config,
    constants::{
        API_ERROR_BADGE_TAKEN, API_ERROR_REPORT_NUMBER_TAKEN, KEY_PREFIX_OFFICER,
        KEY_PREFIX_PERSON, KEY_PREFIX_REPORT,
    },
    error::ApiError,
    identity::{self, IdentityProvider},
    index::UniqueIndex,
    kv::KvStore,
    models::{IncidentReport, Officer, Person},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

pub(crate) const OFFICER_BADGE: UniqueIndex =
    UniqueIndex::new(KEY_PREFIX_OFFICER, "matricula", API_ERROR_BADGE_TAKEN);
pub(crate) const REPORT_NUMBER: UniqueIndex =
    UniqueIndex::new(KEY_PREFIX_REPORT, "numero", API_ERROR_REPORT_NUMBER_TAKEN);

/// A document stored under `<PREFIX>:<id>`.
pub trait Record: Serialize + DeserializeOwned {
    const PREFIX: &'static str;
    /// Field that, with `id`, distinguishes a record from index values
    /// sharing the prefix.
    const DEFINING_FIELD: &'static str;

    fn id(&self) -> &str;
}

impl Record for Officer {
    const PREFIX: &'static str = KEY_PREFIX_OFFICER;
    const DEFINING_FIELD: &'static str = "nome";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Person {
    const PREFIX: &'static str = KEY_PREFIX_PERSON;
    const DEFINING_FIELD: &'static str = "nome";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for IncidentReport {
    const PREFIX: &'static str = KEY_PREFIX_REPORT;
    const DEFINING_FIELD: &'static str = "numeroBoletim";

    fn id(&self) -> &str {
        &self.id
    }
}

fn record_key<R: Record>(id: &str) -> String {
    format!("{}:{}", R::PREFIX, id)
}

fn is_record_shaped<R: Record>(value: &Value) -> bool {
    let Some(object) = value.as_object() else {
        return false;
    };
    let present = |field: &str| {
        object
            .get(field)
            .is_some_and(|value| !value.is_null() && value.as_str() != Some(""))
    };
    present("id") && present(R::DEFINING_FIELD)
}

#[derive(Default)]
pub struct StoreOptions {
    pub identity: Option<Arc<dyn IdentityProvider>>,
}

pub struct Store {
    kv: Arc<KvStore>,
    identity: Arc<dyn IdentityProvider>,
    audit: AuditLog,
}

impl Store {
    #[instrument(skip(config), fields(data_dir = %config.data_dir.display(), identity_backend = ?config.identity.backend))]
    pub async fn open(config: &Config) -> Result<Self, ApiError> {
        Self::open_with_options(config, StoreOptions::default()).await
    }

    #[instrument(skip(config, options), fields(data_dir = %config.data_dir.display(), embedded_identity = options.identity.is_some()))]
    pub async fn open_with_options(
        config: &Config,
        options: StoreOptions,
    ) -> Result<Self, ApiError> {
        let kv = Arc::new(KvStore::from_config(config).await?);
        let identity = match options.identity {
            Some(identity) => identity,
            None => identity::from_config(config, kv.clone())?,
        };
        debug!("store initialized");
        Ok(Self {
            kv,
            identity,
            audit: AuditLog::new(config.audit_log_limit),
        })
    }

    pub fn kv(&self) -> &KvStore {
        &self.kv
    }

    pub(crate) fn identity(&self) -> &dyn IdentityProvider {
        self.identity.as_ref()
    }

    /// Resolves a bearer token to the acting officer id.
    pub async fn authenticate_request(&self, token: &str) -> Result<Option<String>, ApiError> {
        self.identity.verify_token(token).await
    }

    pub(crate) async fn list_records<R: Record>(&self) -> Result<Vec<R>, ApiError> {
        let values = self.kv.get_by_prefix(&format!("{}:", R::PREFIX)).await?;
        Ok(values
            .into_iter()
            .filter(is_record_shaped::<R>)
            .filter_map(|value| match serde_json::from_value::<R>(value) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(prefix = R::PREFIX, error = %err, "skipping malformed record");
                    None
                }
            })
            .collect())
    }

    pub(crate) async fn load_record<R: Record>(&self, id: &str) -> Result<Option<R>, ApiError> {
        match self.kv.get(&record_key::<R>(id)).await? {
            Some(value) if is_record_shaped::<R>(&value) => Ok(Some(serde_json::from_value(value)?)),
            Some(_) => {
                warn!(prefix = R::PREFIX, id, "key holds a non-record value");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    pub(crate) async fn save_record<R: Record>(&self, record: &R) -> Result<(), ApiError> {
        self.kv
            .set(&record_key::<R>(record.id()), serde_json::to_value(record)?)
            .await
    }

    pub(crate) async fn delete_record<R: Record>(&self, id: &str) -> Result<(), ApiError> {
        self.kv.delete(&record_key::<R>(id)).await
    }

    pub(crate) async fn audit(
        &self,
        officer_id: &str,
        action: AuditAction,
        detail: impl Into<String>,
    ) -> Result<(), ApiError> {
        self.audit
            .append(&self.kv, officer_id, action, Some(detail.into()))
            .await
            .map(|_| ())
    }

    /// Newest audit entries; the consultation itself is logged afterwards.
    pub async fn recent_logs(&self, actor: &str) -> Result<Vec<AuditLogEntry>, ApiError> {
        let entries = self.audit.recent(&self.kv).await?;
        self.audit(actor, AuditAction::LogsViewed, "Consulta de logs de auditoria")
            .await?;
        Ok(entries)
    }
}
