use crate::{
    constants::{ANONYMOUS_API_KEY, CLIENT_ERROR_DEMO_MODE},
    error::ApiError,
};
use reqwest::{Client, Method};
use serde_json::{Value, json};
use std::{collections::HashMap, time::Duration};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub data: Option<Value>,
    pub error: Option<String>,
}

impl ApiResponse {
    fn ok(data: Value) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Canned payloads served when the server cannot be reached.
pub fn default_demo_responses() -> HashMap<String, Value> {
    HashMap::from([
        ("/boletins".to_string(), json!({ "boletins": [] })),
        (
            "/pessoas".to_string(),
            json!({
                "pessoas": [
                    {
                        "id": "1",
                        "nome": "Roberto da Silva",
                        "tipo": "declarante",
                        "bilheteIdentidade": "004512378LA041",
                        "telefone": "+244 923 111 111"
                    },
                    {
                        "id": "2",
                        "nome": "Maria das Dores",
                        "tipo": "vitima",
                        "bilheteIdentidade": "007845123BE022",
                        "telefone": "+244 923 222 222"
                    }
                ]
            }),
        ),
        (
            "/policiais".to_string(),
            json!({
                "policiais": [
                    {
                        "id": "1",
                        "nome": "Comandante João Silva Muana",
                        "posto": "Comandante",
                        "matricula": "PN001234"
                    }
                ]
            }),
        ),
        (
            "/relatorios/estatisticas".to_string(),
            json!({
                "estatisticas": {
                    "totalBoletins": 0,
                    "porTipo": {},
                    "porStatus": {},
                    "ultimosDias": {}
                }
            }),
        ),
    ])
}

/// Thin JSON wrapper over the server routes; never returns `Err` for
/// transport problems, reporting them through [`ApiResponse::error`].
pub struct ApiClient {
    base_url: String,
    token: Option<String>,
    demo_responses: HashMap<String, Value>,
    client: Client,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(timeout.min(Duration::from_secs(3)))
            .timeout(timeout)
            .build()
            .map_err(|_| ApiError::Internal)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            demo_responses: default_demo_responses(),
            client,
        })
    }

    pub fn with_demo_responses(mut self, responses: HashMap<String, Value>) -> Self {
        self.demo_responses = responses;
        self
    }

    /// Session token to send; the anonymous key is used without one.
    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub async fn get(&self, endpoint: &str) -> ApiResponse {
        self.request(Method::GET, endpoint, None).await
    }

    pub async fn post(&self, endpoint: &str, body: Value) -> ApiResponse {
        self.request(Method::POST, endpoint, Some(body)).await
    }

    pub async fn put(&self, endpoint: &str, body: Value) -> ApiResponse {
        self.request(Method::PUT, endpoint, Some(body)).await
    }

    pub async fn delete(&self, endpoint: &str) -> ApiResponse {
        self.request(Method::DELETE, endpoint, None).await
    }

    async fn request(&self, method: Method, endpoint: &str, body: Option<Value>) -> ApiResponse {
        let url = format!("{}{}", self.base_url, endpoint);
        let bearer = self.token.as_deref().unwrap_or(ANONYMOUS_API_KEY);
        let mut request = self.client.request(method.clone(), url).bearer_auth(bearer);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(%method, endpoint, error = %err, "request failed, falling back to demo data");
                return self.demo_fallback(endpoint);
            }
        };
        let status = response.status();
        let payload = match response.json::<Value>().await {
            Ok(payload) => Some(payload),
            Err(err) => {
                debug!(%method, endpoint, error = %err, "response body is not JSON");
                None
            }
        };

        if !status.is_success() {
            warn!(%method, endpoint, status = status.as_u16(), "request rejected");
            let message = payload
                .as_ref()
                .and_then(|payload| payload.get("error"))
                .and_then(Value::as_str)
                .map(ToOwned::to_owned)
                .unwrap_or_else(|| format!("Erro {}", status.as_u16()));
            return ApiResponse::failed(message);
        }
        match payload {
            Some(payload) => ApiResponse::ok(payload),
            None => self.demo_fallback(endpoint),
        }
    }

    fn demo_fallback(&self, endpoint: &str) -> ApiResponse {
        match self.demo_responses.get(endpoint) {
            Some(data) => ApiResponse::ok(data.clone()),
            None => ApiResponse::failed(CLIENT_ERROR_DEMO_MODE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiClient, default_demo_responses};
    use crate::constants::CLIENT_ERROR_DEMO_MODE;
    use std::time::Duration;

    fn unreachable_client() -> ApiClient {
        // Port 9 (discard) is closed on test hosts.
        ApiClient::new("http://127.0.0.1:9/api", Duration::from_millis(500)).expect("client")
    }

    #[tokio::test]
    async fn network_failure_serves_demo_payload() {
        let response = unreachable_client().get("/boletins").await;
        assert_eq!(response.error, None);
        assert_eq!(
            response.data,
            default_demo_responses().get("/boletins").cloned()
        );
    }

    #[tokio::test]
    async fn network_failure_without_demo_payload_reports_demo_mode() {
        let response = unreachable_client().delete("/pessoas/1").await;
        assert_eq!(response.data, None);
        assert_eq!(response.error.as_deref(), Some(CLIENT_ERROR_DEMO_MODE));
    }
}
