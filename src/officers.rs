use crate::{
    audit::AuditAction,
    constants::{
        API_ERROR_BADGE_FORMAT, API_ERROR_BADGE_UNKNOWN, API_ERROR_LOGIN_FIELDS,
        API_ERROR_OFFICER_MISSING, API_ERROR_RANK_UNKNOWN, API_ERROR_SIGNUP_FIELDS,
    },
    error::ApiError,
    models::{Officer, Rank, is_valid_badge},
    storage::{OFFICER_BADGE, Store},
};
use axum::http::StatusCode;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SignupRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(rename = "nome")]
    pub name: Option<String>,
    #[serde(rename = "posto")]
    pub rank: Option<String>,
    #[serde(rename = "matricula")]
    pub badge: Option<String>,
    #[serde(rename = "distrito")]
    pub district: Option<String>,
    #[serde(rename = "esquadra")]
    pub station: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    #[serde(rename = "matricula")]
    pub badge: Option<String>,
    pub password: Option<String>,
}

pub struct LoginOutcome {
    pub access_token: String,
    pub officer: Officer,
}

fn required(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

impl Store {
    #[instrument(skip(self, request), fields(badge = request.badge.as_deref().unwrap_or("<none>")))]
    pub async fn signup(&self, request: SignupRequest) -> Result<Officer, ApiError> {
        let (Some(email), Some(password), Some(name), Some(rank), Some(badge)) = (
            required(&request.email),
            request.password.as_deref().filter(|value| !value.is_empty()),
            required(&request.name),
            required(&request.rank),
            required(&request.badge),
        ) else {
            return Err(ApiError::http(
                StatusCode::BAD_REQUEST,
                API_ERROR_SIGNUP_FIELDS,
            ));
        };
        if !is_valid_badge(badge) {
            return Err(ApiError::http(StatusCode::BAD_REQUEST, API_ERROR_BADGE_FORMAT));
        }
        let Some(rank) = Rank::parse(rank) else {
            return Err(ApiError::http(StatusCode::BAD_REQUEST, API_ERROR_RANK_UNKNOWN));
        };
        OFFICER_BADGE.ensure_free(self.kv(), badge).await?;

        let user_id = self
            .identity()
            .create_user(
                email,
                password,
                json!({ "nome": name, "posto": rank, "matricula": badge }),
            )
            .await
            .map_err(|err| match err {
                ApiError::Http { message, .. } => {
                    warn!(badge, message = message.as_str(), "identity provider refused signup");
                    ApiError::http(StatusCode::BAD_REQUEST, message)
                }
                other => other,
            })?;

        let officer = Officer {
            id: user_id,
            name: name.to_string(),
            rank,
            badge: badge.to_string(),
            district: request.district.filter(|value| !value.trim().is_empty()),
            station: request.station.filter(|value| !value.trim().is_empty()),
            email: Some(email.to_string()),
            created_at: Some(Utc::now()),
        };
        OFFICER_BADGE
            .claim(self.kv(), &officer.badge, &officer.id)
            .await?;
        self.save_record(&officer).await?;
        self.audit(
            &officer.id,
            AuditAction::OfficerCreated,
            format!(
                "Novo policial: {} - {} - {}",
                officer.name,
                officer.rank.as_str(),
                officer.badge
            ),
        )
        .await?;
        debug!(officer_id = officer.id, "officer registered");
        Ok(officer.summary())
    }

    #[instrument(skip(self, request), fields(badge = request.badge.as_deref().unwrap_or("<none>")))]
    pub async fn login(&self, request: LoginRequest) -> Result<LoginOutcome, ApiError> {
        let (Some(badge), Some(password)) = (
            required(&request.badge),
            request.password.as_deref().filter(|value| !value.is_empty()),
        ) else {
            return Err(ApiError::http(
                StatusCode::BAD_REQUEST,
                API_ERROR_LOGIN_FIELDS,
            ));
        };

        let Some(officer_id) = OFFICER_BADGE.lookup(self.kv(), badge).await? else {
            return Err(ApiError::http(StatusCode::NOT_FOUND, API_ERROR_BADGE_UNKNOWN));
        };
        let officer = self.load_record::<Officer>(&officer_id).await?;
        let Some(officer) = officer else {
            warn!(officer_id, "badge index points at a missing officer");
            return Err(ApiError::http(
                StatusCode::NOT_FOUND,
                API_ERROR_OFFICER_MISSING,
            ));
        };
        let Some(email) = officer.email.as_deref() else {
            warn!(officer_id, "officer record has no sign-in email");
            return Err(ApiError::http(
                StatusCode::NOT_FOUND,
                API_ERROR_OFFICER_MISSING,
            ));
        };

        let access_token = self.identity().sign_in(email, password).await?;
        self.audit(
            &officer.id,
            AuditAction::Login,
            format!("Login realizado: {}", officer.name),
        )
        .await?;
        Ok(LoginOutcome {
            access_token,
            officer: officer.summary(),
        })
    }

    pub async fn list_officers(&self, actor: &str) -> Result<Vec<Officer>, ApiError> {
        let mut officers = self.list_records::<Officer>().await?;
        officers.sort_by(|a, b| a.badge.cmp(&b.badge));
        self.audit(actor, AuditAction::OfficersListed, "Listagem de policiais")
            .await?;
        Ok(officers)
    }
}
