use axum::{
    Json,
    body::Body,
    http::StatusCode,
    http::header,
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    Http { status: StatusCode, message: String },
    #[error("internal server error")]
    Internal,
}

impl ApiError {
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Http { status, .. } => *status,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Replaces a bare internal failure with a route-specific message.
    pub fn or_message(self, message: &str) -> Self {
        match self {
            Self::Internal => Self::http(StatusCode::INTERNAL_SERVER_ERROR, message),
            other => other,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    let body = serde_json::to_vec(&ErrorBody { error: message })
        .unwrap_or_else(|_| b"{\"error\":\"Erro interno do servidor\"}".to_vec());
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, crate::constants::HEADER_JSON)
        .body(Body::from(body))
        .unwrap_or_else(|_| {
            let fallback = Json(ErrorBody {
                error: crate::constants::API_ERROR_INTERNAL,
            });
            (StatusCode::INTERNAL_SERVER_ERROR, fallback).into_response()
        })
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Http { status, message } => error_response(status, &message),
            ApiError::Internal => error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                crate::constants::API_ERROR_INTERNAL,
            ),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        tracing::error!(error = %err, "storage i/o failure");
        ApiError::Internal
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!(error = %err, "json encoding failure");
        ApiError::Internal
    }
}

#[cfg(test)]
mod tests {
    use super::ApiError;
    use axum::{http::StatusCode, response::IntoResponse};

    #[test]
    fn or_message_only_rewrites_internal_errors() {
        let rewritten = ApiError::Internal.or_message("Erro ao buscar boletins");
        assert_eq!(rewritten.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(rewritten.to_string(), "Erro ao buscar boletins");

        let kept = ApiError::http(StatusCode::NOT_FOUND, "Boletim não encontrado")
            .or_message("Erro ao buscar boletim");
        assert_eq!(kept.status(), StatusCode::NOT_FOUND);
        assert_eq!(kept.to_string(), "Boletim não encontrado");
    }

    #[test]
    fn internal_error_renders_generic_json() {
        let response = ApiError::Internal.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response
                .headers()
                .get(axum::http::header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
            Some(crate::constants::HEADER_JSON)
        );
    }
}
