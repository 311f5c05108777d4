use crate::{
    constants::{ANONYMOUS_API_KEY, CLIENT_ERROR_INVALID_CREDENTIALS},
    error::ApiError,
    models::Officer,
    roster::{CredentialRoster, OfficerCredential},
    session::{Session, SessionContext},
};
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

pub enum StrategyOutcome {
    Authenticated(Session),
    /// Stop the chain: the credentials are definitely wrong.
    Rejected,
    Continue,
}

#[async_trait]
pub trait AuthStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn attempt(
        &self,
        roster: &CredentialRoster,
        badge: &str,
        password: &str,
    ) -> StrategyOutcome;
}

#[derive(Debug, thiserror::Error)]
#[error("{}", CLIENT_ERROR_INVALID_CREDENTIALS)]
pub struct InvalidCredentials;

/// `pn-session-<epoch ms>-<9 base-36 chars>`.
pub fn mint_session_token() -> String {
    let mut rng = rand::thread_rng();
    let suffix = (0..9)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect::<String>();
    format!("pn-session-{}-{suffix}", Utc::now().timestamp_millis())
}

fn local_session(credential: &OfficerCredential) -> Session {
    Session {
        officer: credential.officer.clone(),
        token: mint_session_token(),
    }
}

#[derive(Deserialize)]
struct RemoteLoginResponse {
    access_token: Option<String>,
    policial: Option<Officer>,
}

/// Signs in against the server's `/auth/login`.
pub struct RemoteLogin {
    login_url: String,
    client: Client,
}

impl RemoteLogin {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(timeout.min(Duration::from_secs(3)))
            .timeout(timeout)
            .build()
            .map_err(|_| ApiError::Internal)?;
        Ok(Self {
            login_url: format!("{}/auth/login", base_url.trim_end_matches('/')),
            client,
        })
    }
}

#[async_trait]
impl AuthStrategy for RemoteLogin {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn attempt(
        &self,
        _roster: &CredentialRoster,
        badge: &str,
        password: &str,
    ) -> StrategyOutcome {
        let response = match self
            .client
            .post(&self.login_url)
            .bearer_auth(ANONYMOUS_API_KEY)
            .json(&json!({ "matricula": badge, "password": password }))
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                info!(error = %err, "login service unreachable, trying local roster");
                return StrategyOutcome::Continue;
            }
        };
        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "login service declined");
            return StrategyOutcome::Continue;
        }
        match response.json::<RemoteLoginResponse>().await {
            Ok(RemoteLoginResponse {
                access_token: Some(token),
                policial: Some(officer),
            }) if !token.is_empty() => StrategyOutcome::Authenticated(Session {
                officer: officer.summary(),
                token,
            }),
            Ok(_) => {
                warn!("login service response lacked a token or officer");
                StrategyOutcome::Continue
            }
            Err(err) => {
                warn!(error = %err, "login service returned an unreadable body");
                StrategyOutcome::Continue
            }
        }
    }
}

pub struct LocalExactMatch;

#[async_trait]
impl AuthStrategy for LocalExactMatch {
    fn name(&self) -> &'static str {
        "local-exact"
    }

    async fn attempt(
        &self,
        roster: &CredentialRoster,
        badge: &str,
        password: &str,
    ) -> StrategyOutcome {
        match roster.find_exact(badge, password) {
            Some(credential) => StrategyOutcome::Authenticated(local_session(credential)),
            None => StrategyOutcome::Continue,
        }
    }
}

/// Last resort; rejects when no compatibility password matches.
pub struct LocalAlternateMatch;

#[async_trait]
impl AuthStrategy for LocalAlternateMatch {
    fn name(&self) -> &'static str {
        "local-alternate"
    }

    async fn attempt(
        &self,
        roster: &CredentialRoster,
        badge: &str,
        password: &str,
    ) -> StrategyOutcome {
        match roster.find_alternate(badge, password) {
            Some(credential) => StrategyOutcome::Authenticated(local_session(credential)),
            None => StrategyOutcome::Rejected,
        }
    }
}

pub struct AuthResolver {
    strategies: Vec<Box<dyn AuthStrategy>>,
}

impl AuthResolver {
    /// Remote first when configured, then the two roster checks.
    pub fn new(remote: Option<RemoteLogin>) -> Self {
        let mut strategies: Vec<Box<dyn AuthStrategy>> = Vec::new();
        if let Some(remote) = remote {
            strategies.push(Box::new(remote));
        }
        strategies.push(Box::new(LocalExactMatch));
        strategies.push(Box::new(LocalAlternateMatch));
        Self { strategies }
    }

    pub fn with_strategies(strategies: Vec<Box<dyn AuthStrategy>>) -> Self {
        Self { strategies }
    }

    #[instrument(skip(self, roster, session, password))]
    pub async fn login(
        &self,
        roster: &CredentialRoster,
        session: &mut SessionContext,
        badge: &str,
        password: &str,
    ) -> Result<(), InvalidCredentials> {
        for strategy in &self.strategies {
            match strategy.attempt(roster, badge, password).await {
                StrategyOutcome::Authenticated(resolved) => {
                    if let Err(err) = session.establish(resolved).await {
                        warn!(strategy = strategy.name(), error = %err, "could not save session");
                        return Err(InvalidCredentials);
                    }
                    debug!(strategy = strategy.name(), "officer signed in");
                    return Ok(());
                }
                StrategyOutcome::Rejected => {
                    debug!(strategy = strategy.name(), "credentials rejected");
                    break;
                }
                StrategyOutcome::Continue => {}
            }
        }
        Err(InvalidCredentials)
    }

    pub async fn logout(&self, session: &mut SessionContext) -> Result<(), ApiError> {
        session.invalidate().await
    }
}
