use crate::{
    config::HttpIdentityConfig,
    constants::{API_ERROR_BAD_CREDENTIALS, API_ERROR_PASSWORD_SHORT},
    error::ApiError,
    identity::IdentityProvider,
};
use async_trait::async_trait;
use axum::http::StatusCode;
use reqwest::{Client, redirect::Policy};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// Delegates accounts to a remote identity service speaking JSON over HTTP.
#[derive(Debug, Clone)]
pub struct HttpIdentityProvider {
    base_url: String,
    signup_endpoint: String,
    login_endpoint: String,
    verify_endpoint: String,
    password_min_length: usize,
    client: Client,
}

impl HttpIdentityProvider {
    pub fn new(cfg: &HttpIdentityConfig, password_min_length: usize) -> Result<Self, ApiError> {
        let base_url = cfg.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ApiError::http(
                StatusCode::INTERNAL_SERVER_ERROR,
                "identity service base_url is required",
            ));
        }

        let timeout = Duration::from_millis(cfg.timeout_ms.max(250));
        let connect_timeout = timeout.min(Duration::from_secs(3));
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(15))
            .pool_max_idle_per_host(2)
            .redirect(Policy::limited(3))
            .build()
            .map_err(|_| ApiError::Internal)?;

        let provider = Self {
            base_url,
            signup_endpoint: normalize_endpoint(&cfg.signup_endpoint),
            login_endpoint: normalize_endpoint(&cfg.login_endpoint),
            verify_endpoint: normalize_endpoint(&cfg.verify_endpoint),
            password_min_length,
            client,
        };
        debug!(base_url = provider.base_url, "initialized remote identity service");
        Ok(provider)
    }

    #[instrument(skip(self, payload), fields(endpoint))]
    async fn post_json(&self, endpoint: &str, payload: &Value) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|err| {
                error!(endpoint, error = ?err, "identity service call failed");
                ApiError::Internal
            })?;

        let status = response.status();
        if status.is_server_error() {
            let detail = extract_error_message(response).await.unwrap_or_default();
            error!(
                endpoint,
                status = status.as_u16(),
                detail = detail.as_str(),
                "identity service failed"
            );
            return Err(ApiError::Internal);
        }
        if !status.is_success() {
            warn!(
                endpoint,
                status = status.as_u16(),
                "identity service request refused"
            );
            let message = extract_error_message(response)
                .await
                .unwrap_or_else(|| API_ERROR_BAD_CREDENTIALS.to_string());
            return Err(ApiError::http(status, message));
        }

        response.json::<Value>().await.map_err(|err| {
            error!(endpoint, error = ?err, "identity service returned invalid JSON payload");
            ApiError::Internal
        })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
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
        let payload = self
            .post_json(
                &self.signup_endpoint,
                &json!({
                    "email": email,
                    "password": password,
                    "user_metadata": profile,
                }),
            )
            .await?;
        user_id_from(&payload).ok_or_else(|| {
            error!("identity service signup response carried no user id");
            ApiError::Internal
        })
    }

    #[instrument(skip(self, password))]
    async fn sign_in(&self, email: &str, password: &str) -> Result<String, ApiError> {
        let payload = self
            .post_json(
                &self.login_endpoint,
                &json!({
                    "email": email,
                    "password": password,
                }),
            )
            .await
            .map_err(|err| match err {
                ApiError::Http {
                    status:
                        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN,
                    ..
                } => ApiError::http(StatusCode::UNAUTHORIZED, API_ERROR_BAD_CREDENTIALS),
                ApiError::Http { status, message } => {
                    error!(
                        status = status.as_u16(),
                        detail = message.as_str(),
                        "identity service refused login unexpectedly"
                    );
                    ApiError::Internal
                }
                other => other,
            })?;
        payload
            .get("access_token")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .ok_or_else(|| {
                error!("identity service login response carried no access_token");
                ApiError::Internal
            })
    }

    #[instrument(skip(self, token))]
    async fn verify_token(&self, token: &str) -> Result<Option<String>, ApiError> {
        let endpoint = &self.verify_endpoint;
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&json!({ "token": token }))
            .send()
            .await
            .map_err(|err| {
                error!(endpoint, error = ?err, "identity service verify call failed");
                ApiError::http(StatusCode::BAD_GATEWAY, "identity service unavailable")
            })?;

        if response.status() == StatusCode::UNAUTHORIZED
            || response.status() == StatusCode::FORBIDDEN
        {
            debug!(
                status = response.status().as_u16(),
                "token rejected by identity service"
            );
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let message = extract_error_message(response)
                .await
                .unwrap_or_else(|| "token verification failed".to_string());
            error!(
                endpoint,
                status = status.as_u16(),
                message = message.as_str(),
                "identity service verify returned non-success"
            );
            return Err(ApiError::http(StatusCode::BAD_GATEWAY, message));
        }

        let payload = response.json::<Value>().await.map_err(|err| {
            error!(endpoint, error = ?err, "identity service verify returned invalid JSON");
            ApiError::http(StatusCode::BAD_GATEWAY, "identity service bad payload")
        })?;
        Ok(user_id_from(&payload))
    }
}

fn user_id_from(payload: &Value) -> Option<String> {
    payload
        .get("user")
        .and_then(|user| user.get("id"))
        .or_else(|| payload.get("id"))
        .or_else(|| payload.get("user_id"))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(ToOwned::to_owned)
}

fn normalize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim();
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

async fn extract_error_message(response: reqwest::Response) -> Option<String> {
    let parsed = response.json::<Value>().await.ok()?;
    parsed
        .get("error")
        .and_then(Value::as_str)
        .or_else(|| parsed.get("message").and_then(Value::as_str))
        .map(ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
    use super::{normalize_endpoint, user_id_from};
    use serde_json::json;

    #[test]
    fn user_id_accepts_nested_and_flat_shapes() {
        assert_eq!(
            user_id_from(&json!({"user": {"id": "u-1"}})),
            Some("u-1".to_string())
        );
        assert_eq!(user_id_from(&json!({"user_id": "u-2"})), Some("u-2".to_string()));
        assert_eq!(user_id_from(&json!({"id": ""})), None);
    }

    #[test]
    fn endpoints_gain_leading_slash() {
        assert_eq!(normalize_endpoint("verify"), "/verify");
        assert_eq!(normalize_endpoint(" /login "), "/login");
    }
}
