use crate::{
    constants::{DEFAULT_OFFICER_PASSWORD, LEGACY_OFFICER_PASSWORD, STORAGE_KEY_ROSTER},
    error::ApiError,
    models::{Officer, Rank, is_valid_badge},
    session::DurableStorage,
};
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// An officer as held by the client, password included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficerCredential {
    #[serde(flatten)]
    pub officer: Officer,
    #[serde(rename = "senha")]
    pub password: String,
}

impl OfficerCredential {
    fn badge_matches(&self, badge: &str) -> bool {
        self.officer.badge.to_uppercase() == badge.trim().to_uppercase()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub name: String,
    pub rank: String,
    pub badge: String,
    pub password: String,
    pub password_confirmation: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("Nome completo é obrigatório")]
    NameRequired,
    #[error("Posto/Patente é obrigatório")]
    RankRequired,
    #[error("Matrícula é obrigatória")]
    BadgeRequired,
    #[error("Matrícula deve ter o formato PN000000")]
    BadgeFormat,
    #[error("Palavra-passe é obrigatória")]
    PasswordRequired,
    #[error("Palavra-passe deve ter pelo menos {0} caracteres")]
    PasswordTooShort(usize),
    #[error("As palavras-passe não coincidem")]
    PasswordMismatch,
    #[error("Matrícula já cadastrada")]
    BadgeTaken,
    #[error("Erro interno do sistema. Tente novamente.")]
    Storage(#[from] ApiError),
}

fn seed_entry(id: &str, name: &str, rank: Rank, badge: &str) -> OfficerCredential {
    OfficerCredential {
        officer: Officer {
            id: id.to_string(),
            name: name.to_string(),
            rank,
            badge: badge.to_string(),
            district: None,
            station: None,
            email: None,
            created_at: None,
        },
        password: DEFAULT_OFFICER_PASSWORD.to_string(),
    }
}

pub fn seed_roster() -> Vec<OfficerCredential> {
    vec![
        seed_entry("1", "Comandante João Silva Muana", Rank::Commander, "PN001234"),
        seed_entry(
            "2",
            "Subcomissário Maria Santos Capita",
            Rank::SubCommissioner,
            "PN002345",
        ),
        seed_entry("3", "Aspirante Carlos Eduardo Miguel", Rank::Aspirant, "PN003456"),
        seed_entry("4", "Agente Ana Paula Francisco", Rank::Agent, "PN004567"),
        seed_entry(
            "5",
            "Agente Principal António Sebastião",
            Rank::PrincipalAgent,
            "PN005678",
        ),
    ]
}

/// `PN` plus six random digits, never starting with zero.
pub fn generate_badge() -> String {
    format!("PN{}", rand::thread_rng().gen_range(100_000..1_000_000))
}

/// Officers allowed to sign in while the server is unreachable.
pub struct CredentialRoster {
    storage: Arc<dyn DurableStorage>,
    entries: Vec<OfficerCredential>,
    password_min_length: usize,
}

impl CredentialRoster {
    /// Seeded roster, replaced by the persisted one when it parses.
    pub async fn load(
        storage: Arc<dyn DurableStorage>,
        password_min_length: usize,
    ) -> Result<Self, ApiError> {
        let mut entries = seed_roster();
        if let Some(saved) = storage.get_item(STORAGE_KEY_ROSTER).await? {
            match serde_json::from_str::<Vec<OfficerCredential>>(&saved) {
                Ok(parsed) => {
                    debug!(officers = parsed.len(), "loaded saved roster");
                    entries = parsed;
                }
                Err(err) => {
                    warn!(error = %err, "discarding unreadable saved roster");
                    storage.remove_item(STORAGE_KEY_ROSTER).await?;
                }
            }
        }
        Ok(Self {
            storage,
            entries,
            password_min_length,
        })
    }

    pub fn entries(&self) -> &[OfficerCredential] {
        &self.entries
    }

    pub fn find_exact(&self, badge: &str, password: &str) -> Option<&OfficerCredential> {
        self.entries
            .iter()
            .find(|entry| entry.badge_matches(badge) && entry.password == password)
    }

    /// Compatibility passwords: the default, the lower-cased badge, or the
    /// legacy numeric one.
    pub fn find_alternate(&self, badge: &str, password: &str) -> Option<&OfficerCredential> {
        self.entries.iter().find(|entry| {
            entry.badge_matches(badge)
                && (password == DEFAULT_OFFICER_PASSWORD
                    || password == entry.officer.badge.to_lowercase()
                    || password == LEGACY_OFFICER_PASSWORD)
        })
    }

    fn validate(&self, registration: &Registration) -> Result<Rank, RegistrationError> {
        if registration.name.trim().is_empty() {
            return Err(RegistrationError::NameRequired);
        }
        let rank = Rank::parse(&registration.rank).ok_or(RegistrationError::RankRequired)?;
        let badge = registration.badge.trim();
        if badge.is_empty() {
            return Err(RegistrationError::BadgeRequired);
        }
        if !is_valid_badge(badge) {
            return Err(RegistrationError::BadgeFormat);
        }
        if registration.password.trim().is_empty() {
            return Err(RegistrationError::PasswordRequired);
        }
        if registration.password.chars().count() < self.password_min_length {
            return Err(RegistrationError::PasswordTooShort(self.password_min_length));
        }
        if registration.password != registration.password_confirmation {
            return Err(RegistrationError::PasswordMismatch);
        }
        if self.entries.iter().any(|entry| entry.badge_matches(badge)) {
            return Err(RegistrationError::BadgeTaken);
        }
        Ok(rank)
    }

    /// Appends the officer and persists the whole roster.
    pub async fn register(
        &mut self,
        registration: Registration,
    ) -> Result<&OfficerCredential, RegistrationError> {
        let rank = self.validate(&registration)?;
        let credential = OfficerCredential {
            officer: Officer {
                id: Utc::now().timestamp_millis().to_string(),
                name: registration.name,
                rank,
                badge: registration.badge.trim().to_string(),
                district: None,
                station: None,
                email: None,
                created_at: None,
            },
            password: registration.password,
        };

        let mut updated = self.entries.clone();
        updated.push(credential);
        let serialized = serde_json::to_string(&updated).map_err(ApiError::from)?;
        self.storage
            .set_item(STORAGE_KEY_ROSTER, serialized)
            .await?;
        self.entries = updated;
        debug!(officers = self.entries.len(), "roster extended");
        Ok(self.entries.last().ok_or(ApiError::Internal)?)
    }
}
