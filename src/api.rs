use crate::{
    app::AppState,
    constants::{
        API_ERROR_BODY_TOO_LARGE, API_ERROR_INVALID_BODY, API_ERROR_NOT_FOUND,
        API_ERROR_TOKEN_INVALID, API_ERROR_TOKEN_MISSING, API_FAILURE_CREATE_PERSON,
        API_FAILURE_CREATE_REPORT, API_FAILURE_DELETE_PERSON, API_FAILURE_GET_REPORT,
        API_FAILURE_LIST_OFFICERS, API_FAILURE_LIST_PERSONS, API_FAILURE_LIST_REPORTS,
        API_FAILURE_LOGS, API_FAILURE_SEARCH_REPORTS, API_FAILURE_STATISTICS,
        API_FAILURE_UPDATE_PERSON, API_FAILURE_UPDATE_REPORT, API_MESSAGE_LOGGED_IN,
        API_MESSAGE_OFFICER_CREATED, API_MESSAGE_PERSON_CREATED, API_MESSAGE_PERSON_DELETED,
        API_MESSAGE_PERSON_UPDATED, API_MESSAGE_REPORT_CREATED, API_MESSAGE_REPORT_UPDATED,
        HEADER_JSON,
    },
    error::ApiError,
};
use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    http::{HeaderMap, Method, Response, StatusCode, header},
};
use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

pub async fn dispatch(
    State(state): State<AppState>,
    req: Request<Body>,
) -> Result<Response<Body>, ApiError> {
    let method = req.method().clone();
    let raw_path = req.uri().path().to_string();
    let Some(path) = normalize_incoming_path(&raw_path, &state.url_prefix) else {
        debug!(
            raw_path,
            url_prefix = state.url_prefix.as_str(),
            "request path did not match configured url_prefix"
        );
        return Err(not_found());
    };
    debug!(method = %method, path, "dispatching request");
    let segments = path
        .trim_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>();

    match (&method, segments.as_slice()) {
        (&Method::GET, ["health"]) => Ok(json_response(
            StatusCode::OK,
            json!({
                "status": "OK",
                "timestamp": now_iso(),
                "version": env!("CARGO_PKG_VERSION"),
            }),
        )),
        (&Method::POST, ["auth", "signup"]) => {
            let request = parse_json_body(read_body(req, state.max_body_size).await?)?;
            let officer = state.store.signup(request).await?;
            Ok(json_response(
                StatusCode::OK,
                json!({ "message": API_MESSAGE_OFFICER_CREATED, "policial": officer }),
            ))
        }
        (&Method::POST, ["auth", "login"]) => {
            let request = parse_json_body(read_body(req, state.max_body_size).await?)?;
            let outcome = state.store.login(request).await?;
            Ok(json_response(
                StatusCode::OK,
                json!({
                    "message": API_MESSAGE_LOGGED_IN,
                    "access_token": outcome.access_token,
                    "policial": outcome.officer,
                }),
            ))
        }
        _ if is_protected_route(&method, &segments) => {
            let actor = require_officer(&state, req.headers()).await?;
            handle_protected(&state, &method, &segments, &actor, req).await
        }
        _ => Err(not_found()),
    }
}

fn is_protected_route(method: &Method, segments: &[&str]) -> bool {
    matches!(
        (method, segments),
        (&Method::GET | &Method::POST, ["boletins"])
            | (&Method::POST, ["boletins", "buscar"])
            | (&Method::GET | &Method::PUT, ["boletins", _])
            | (&Method::GET | &Method::POST, ["pessoas"])
            | (&Method::PUT | &Method::DELETE, ["pessoas", _])
            | (&Method::GET, ["policiais"])
            | (&Method::GET, ["relatorios", "estatisticas"])
            | (&Method::GET, ["logs"])
    )
}

async fn handle_protected(
    state: &AppState,
    method: &Method,
    segments: &[&str],
    actor: &str,
    req: Request<Body>,
) -> Result<Response<Body>, ApiError> {
    let store = &state.store;
    match (method, segments) {
        (&Method::GET, ["boletins"]) => {
            let reports = store
                .list_reports(actor)
                .await
                .map_err(|err| err.or_message(API_FAILURE_LIST_REPORTS))?;
            Ok(json_response(StatusCode::OK, json!({ "boletins": reports })))
        }
        (&Method::POST, ["boletins"]) => {
            let fields = parse_json_body(read_body(req, state.max_body_size).await?)?;
            let report = store
                .create_report(actor, fields)
                .await
                .map_err(|err| err.or_message(API_FAILURE_CREATE_REPORT))?;
            Ok(json_response(
                StatusCode::OK,
                json!({ "message": API_MESSAGE_REPORT_CREATED, "boletim": report }),
            ))
        }
        (&Method::POST, ["boletins", "buscar"]) => {
            let filter = parse_json_body(read_body(req, state.max_body_size).await?)?;
            let reports = store
                .search_reports(actor, filter)
                .await
                .map_err(|err| err.or_message(API_FAILURE_SEARCH_REPORTS))?;
            let total = reports.len();
            Ok(json_response(
                StatusCode::OK,
                json!({ "boletins": reports, "total": total }),
            ))
        }
        (&Method::GET, ["boletins", id]) => {
            let report = store
                .get_report(actor, id)
                .await
                .map_err(|err| err.or_message(API_FAILURE_GET_REPORT))?;
            Ok(json_response(StatusCode::OK, json!({ "boletim": report })))
        }
        (&Method::PUT, ["boletins", id]) => {
            let id = (*id).to_string();
            let fields = parse_json_body(read_body(req, state.max_body_size).await?)?;
            let report = store
                .update_report(actor, &id, fields)
                .await
                .map_err(|err| err.or_message(API_FAILURE_UPDATE_REPORT))?;
            Ok(json_response(
                StatusCode::OK,
                json!({ "message": API_MESSAGE_REPORT_UPDATED, "boletim": report }),
            ))
        }
        (&Method::GET, ["pessoas"]) => {
            let persons = store
                .list_persons(actor)
                .await
                .map_err(|err| err.or_message(API_FAILURE_LIST_PERSONS))?;
            Ok(json_response(StatusCode::OK, json!({ "pessoas": persons })))
        }
        (&Method::POST, ["pessoas"]) => {
            let fields = parse_json_body(read_body(req, state.max_body_size).await?)?;
            let person = store
                .create_person(actor, fields)
                .await
                .map_err(|err| err.or_message(API_FAILURE_CREATE_PERSON))?;
            Ok(json_response(
                StatusCode::OK,
                json!({ "message": API_MESSAGE_PERSON_CREATED, "pessoa": person }),
            ))
        }
        (&Method::PUT, ["pessoas", id]) => {
            let id = (*id).to_string();
            let fields = parse_json_body(read_body(req, state.max_body_size).await?)?;
            let person = store
                .update_person(actor, &id, fields)
                .await
                .map_err(|err| err.or_message(API_FAILURE_UPDATE_PERSON))?;
            Ok(json_response(
                StatusCode::OK,
                json!({ "message": API_MESSAGE_PERSON_UPDATED, "pessoa": person }),
            ))
        }
        (&Method::DELETE, ["pessoas", id]) => {
            store
                .delete_person(actor, id)
                .await
                .map_err(|err| err.or_message(API_FAILURE_DELETE_PERSON))?;
            Ok(json_response(
                StatusCode::OK,
                json!({ "message": API_MESSAGE_PERSON_DELETED }),
            ))
        }
        (&Method::GET, ["policiais"]) => {
            let officers = store
                .list_officers(actor)
                .await
                .map_err(|err| err.or_message(API_FAILURE_LIST_OFFICERS))?;
            Ok(json_response(
                StatusCode::OK,
                json!({ "policiais": officers }),
            ))
        }
        (&Method::GET, ["relatorios", "estatisticas"]) => {
            let stats = store
                .report_statistics(actor)
                .await
                .map_err(|err| err.or_message(API_FAILURE_STATISTICS))?;
            Ok(json_response(
                StatusCode::OK,
                json!({ "estatisticas": stats }),
            ))
        }
        (&Method::GET, ["logs"]) => {
            let logs = store
                .recent_logs(actor)
                .await
                .map_err(|err| err.or_message(API_FAILURE_LOGS))?;
            Ok(json_response(StatusCode::OK, json!({ "logs": logs })))
        }
        _ => Err(not_found()),
    }
}

async fn require_officer(state: &AppState, headers: &HeaderMap) -> Result<String, ApiError> {
    let raw = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let Some(token) = parse_authorization(raw) else {
        debug!(
            authorization_header = raw.is_some(),
            "protected route without bearer token"
        );
        return Err(ApiError::http(
            StatusCode::UNAUTHORIZED,
            API_ERROR_TOKEN_MISSING,
        ));
    };
    match state.store.authenticate_request(&token).await {
        Ok(Some(officer_id)) => Ok(officer_id),
        Ok(None) => {
            warn!("authorization token rejected");
            Err(ApiError::http(
                StatusCode::UNAUTHORIZED,
                API_ERROR_TOKEN_INVALID,
            ))
        }
        Err(err) => {
            warn!(error = %err, "token verification failed");
            Err(ApiError::http(
                StatusCode::UNAUTHORIZED,
                API_ERROR_TOKEN_INVALID,
            ))
        }
    }
}

fn parse_authorization(header: Option<&str>) -> Option<String> {
    let mut parts = header?.split_whitespace();
    let scheme = parts.next()?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    parts.next().map(ToOwned::to_owned)
}

fn parse_json_body<T: DeserializeOwned>(bytes: Vec<u8>) -> Result<T, ApiError> {
    serde_json::from_slice(&bytes).map_err(|err| {
        debug!(error = %err, "rejecting malformed request body");
        ApiError::http(StatusCode::BAD_REQUEST, API_ERROR_INVALID_BODY)
    })
}

fn not_found() -> ApiError {
    ApiError::http(StatusCode::NOT_FOUND, API_ERROR_NOT_FOUND)
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn normalize_incoming_path(path: &str, url_prefix: &str) -> Option<String> {
    if url_prefix == "/" {
        return Some(path.to_string());
    }

    if path == url_prefix {
        return Some("/".to_string());
    }

    let prefix_with_slash = format!("{url_prefix}/");
    if let Some(stripped) = path.strip_prefix(&prefix_with_slash) {
        return Some(format!("/{stripped}"));
    }

    None
}

fn json_response(status: StatusCode, body: Value) -> Response<Body> {
    let payload = serde_json::to_vec(&body).unwrap_or_else(|_| b"{}".to_vec());
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, HEADER_JSON)
        .body(Body::from(payload))
        .unwrap_or_else(|_| Response::new(Body::from("{}")))
}

async fn read_body(req: Request<Body>, max_body_size: usize) -> Result<Vec<u8>, ApiError> {
    to_bytes(req.into_body(), max_body_size)
        .await
        .map(|bytes| bytes.to_vec())
        .map_err(|_| ApiError::http(StatusCode::PAYLOAD_TOO_LARGE, API_ERROR_BODY_TOO_LARGE))
}
