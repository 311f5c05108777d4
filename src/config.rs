use crate::constants::{AUDIT_LOG_LIMIT, DEFAULT_URL_PREFIX};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use config::{Config as SettingsLoader, Environment};
use serde::Deserialize;
use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    File,
}

impl StorageBackend {
    fn from_str(value: &str) -> Self {
        if value.eq_ignore_ascii_case("memory") {
            Self::Memory
        } else {
            Self::File
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityBackend {
    Local,
    Http,
}

impl IdentityBackend {
    fn from_str(value: &str) -> Self {
        if value.eq_ignore_ascii_case("http") {
            Self::Http
        } else {
            Self::Local
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpIdentityConfig {
    pub base_url: String,
    pub signup_endpoint: String,
    pub login_endpoint: String,
    pub verify_endpoint: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityConfig {
    pub backend: IdentityBackend,
    pub http: Option<HttpIdentityConfig>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            backend: IdentityBackend::Local,
            http: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    pub data_dir: PathBuf,
    pub url_prefix: String,
    pub max_body_size: usize,
    pub log_level: String,
    pub storage_backend: StorageBackend,
    pub identity: IdentityConfig,
    pub password_min_length: usize,
    pub token_ttl_seconds: i64,
    pub audit_log_limit: usize,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawEnvConfig {
    config: Option<String>,
    config_base64: Option<String>,
    bind: Option<String>,
    data_dir: Option<String>,
    url_prefix: Option<String>,
    max_body_size: Option<String>,
    log_level: Option<String>,
    storage_backend: Option<String>,
    password_min: Option<String>,
    token_ttl_seconds: Option<String>,
    audit_log_limit: Option<String>,
    identity_backend: Option<String>,
    identity_http_base_url: Option<String>,
    identity_http_signup_endpoint: Option<String>,
    identity_http_login_endpoint: Option<String>,
    identity_http_verify_endpoint: Option<String>,
    identity_http_timeout_ms: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::layered(None)
    }

    /// Like [`Config::from_env`], with `config_path` replacing any file named
    /// by `BODIGITAL_CONFIG`.
    pub fn from_env_with_config_file(config_path: PathBuf) -> Result<Self, String> {
        Self::layered(Some(config_path))
    }

    fn layered(config_path: Option<PathBuf>) -> Result<Self, String> {
        let env_cfg = load_bodigital_env()?;
        let mut cfg = match config_path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::from_env_config_source(&env_cfg)?,
        };
        cfg.apply_env_overrides(&env_cfg);
        if let Some(port) = parse_env_value::<u16>(load_process_env_value("port")?.as_deref()) {
            cfg.bind = SocketAddr::from(([0, 0, 0, 0], port));
        }
        Ok(cfg)
    }

    fn defaults() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8787)),
            data_dir: PathBuf::from(".bodigital-data"),
            url_prefix: DEFAULT_URL_PREFIX.to_string(),
            max_body_size: 10 * 1024 * 1024,
            log_level: "info".to_string(),
            storage_backend: StorageBackend::File,
            identity: IdentityConfig::default(),
            password_min_length: 4,
            token_ttl_seconds: 12 * 60 * 60,
            audit_log_limit: AUDIT_LOG_LIMIT,
        }
    }

    /// Defaults with an in-memory store, for tests and embedding.
    pub fn in_memory() -> Self {
        Self {
            storage_backend: StorageBackend::Memory,
            ..Self::defaults()
        }
    }

    /// YAML named by `BODIGITAL_CONFIG` or inlined as base64 in
    /// `BODIGITAL_CONFIG_BASE64`; defaults when neither is set.
    fn from_env_config_source(env_cfg: &RawEnvConfig) -> Result<Self, String> {
        let non_blank = |raw: &Option<String>| {
            raw.as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(ToOwned::to_owned)
        };

        match (non_blank(&env_cfg.config), non_blank(&env_cfg.config_base64)) {
            (None, None) => Ok(Self::defaults()),
            (Some(_), Some(_)) => Err(
                "BODIGITAL_CONFIG and BODIGITAL_CONFIG_BASE64 are both set; use only one"
                    .to_string(),
            ),
            (Some(path), None) => Self::from_yaml_file(PathBuf::from(&path))
                .map_err(|err| format!("failed to load BODIGITAL_CONFIG={path}: {err}")),
            (None, Some(encoded)) => {
                let yaml = decode_base64_yaml(&encoded)
                    .map_err(|err| format!("failed to decode BODIGITAL_CONFIG_BASE64: {err}"))?;
                Self::from_yaml_str("BODIGITAL_CONFIG_BASE64", &yaml)
                    .map_err(|err| format!("failed to load BODIGITAL_CONFIG_BASE64: {err}"))
            }
        }
    }

    fn apply_env_overrides(&mut self, env_cfg: &RawEnvConfig) {
        if let Some(bind) = parse_env_value::<SocketAddr>(env_cfg.bind.as_deref()) {
            self.bind = bind;
        }
        if let Some(raw_data_dir) = env_cfg.data_dir.as_deref() {
            self.data_dir = PathBuf::from(raw_data_dir);
        }
        if let Some(value) = env_cfg.url_prefix.as_deref() {
            self.url_prefix = normalize_url_prefix(value);
        }
        if let Some(value) = env_cfg.max_body_size.as_deref()
            && let Some(parsed) = parse_body_size(value)
        {
            self.max_body_size = parsed;
        }
        if let Some(value) = env_cfg.log_level.as_deref()
            && !value.trim().is_empty()
        {
            self.log_level = value.to_string();
        }
        if let Some(value) = env_cfg.storage_backend.as_deref() {
            self.storage_backend = StorageBackend::from_str(value);
        }
        if let Some(parsed) = parse_env_value::<usize>(env_cfg.password_min.as_deref()) {
            self.password_min_length = parsed;
        }
        if let Some(parsed) = parse_env_value::<i64>(env_cfg.token_ttl_seconds.as_deref()) {
            self.token_ttl_seconds = parsed;
        }
        if let Some(parsed) = parse_env_value::<usize>(env_cfg.audit_log_limit.as_deref()) {
            self.audit_log_limit = parsed;
        }

        self.apply_identity_env_overrides(env_cfg);
    }

    fn apply_identity_env_overrides(&mut self, env_cfg: &RawEnvConfig) {
        if let Some(value) = env_cfg.identity_backend.as_deref() {
            self.identity.backend = IdentityBackend::from_str(value);
        }

        if self.identity.backend == IdentityBackend::Local {
            self.identity.http = None;
            return;
        }

        let mut http = self
            .identity
            .http
            .clone()
            .unwrap_or_else(default_http_identity_config);

        if let Some(value) = env_cfg.identity_http_base_url.as_deref() {
            http.base_url = value.to_string();
        }
        if let Some(value) = env_cfg.identity_http_signup_endpoint.as_deref() {
            http.signup_endpoint = value.to_string();
        }
        if let Some(value) = env_cfg.identity_http_login_endpoint.as_deref() {
            http.login_endpoint = value.to_string();
        }
        if let Some(value) = env_cfg.identity_http_verify_endpoint.as_deref() {
            http.verify_endpoint = value.to_string();
        }
        if let Some(parsed) = parse_env_value::<u64>(env_cfg.identity_http_timeout_ms.as_deref())
        {
            http.timeout_ms = parsed;
        }
        self.identity.http = Some(http);
    }

    pub fn from_yaml_file(path: PathBuf) -> Result<Self, String> {
        let parsed = load_yaml_config(&path)?;
        Self::from_yaml_config(parsed)
    }

    fn from_yaml_str(source: &str, text: &str) -> Result<Self, String> {
        let parsed = serde_yaml::from_str::<YamlConfig>(text)
            .map_err(|err| format!("failed to parse {source}: {err}"))?;
        Self::from_yaml_config(parsed)
    }

    fn from_yaml_config(parsed: YamlConfig) -> Result<Self, String> {
        let defaults = Self::defaults();
        let bind = match parsed.listen.as_deref() {
            Some(raw) => raw
                .parse()
                .map_err(|err| format!("invalid listen address '{raw}': {err}"))?,
            None => defaults.bind,
        };
        let storage = parsed.storage.unwrap_or_default();
        let auth = parsed.auth.unwrap_or_default();

        Ok(Self {
            bind,
            data_dir: storage
                .data_dir
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            url_prefix: parsed
                .url_prefix
                .as_deref()
                .map(normalize_url_prefix)
                .unwrap_or(defaults.url_prefix),
            max_body_size: parsed
                .max_body_size
                .as_deref()
                .and_then(parse_body_size)
                .unwrap_or(defaults.max_body_size),
            log_level: parsed
                .log
                .and_then(|log| log.level)
                .unwrap_or(defaults.log_level),
            storage_backend: storage
                .backend
                .as_deref()
                .map(StorageBackend::from_str)
                .unwrap_or(defaults.storage_backend),
            identity: parse_identity_from_yaml(auth.identity)?,
            password_min_length: auth.password_min.unwrap_or(defaults.password_min_length),
            token_ttl_seconds: auth
                .token_ttl_seconds
                .unwrap_or(defaults.token_ttl_seconds),
            audit_log_limit: parsed
                .audit
                .and_then(|audit| audit.limit)
                .unwrap_or(defaults.audit_log_limit),
        })
    }
}

fn decode_base64_yaml(encoded: &str) -> Result<String, String> {
    let compact = encoded
        .chars()
        .filter(|ch| !ch.is_ascii_whitespace())
        .collect::<String>();
    let bytes = B64.decode(compact).map_err(|err| err.to_string())?;
    String::from_utf8(bytes).map_err(|err| format!("decoded bytes are not UTF-8 ({err})"))
}

fn load_yaml_config(path: &Path) -> Result<YamlConfig, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    serde_yaml::from_str::<YamlConfig>(&text)
        .map_err(|err| format!("failed to parse {}: {err}", path.display()))
}

fn load_bodigital_env() -> Result<RawEnvConfig, String> {
    let settings = SettingsLoader::builder()
        .add_source(Environment::with_prefix("BODIGITAL").try_parsing(false))
        .build()
        .map_err(|err| format!("failed to load BODIGITAL_* environment: {err}"))?;

    Ok(RawEnvConfig {
        config: env_value_for_var(&settings, "BODIGITAL_CONFIG"),
        config_base64: env_value_for_var(&settings, "BODIGITAL_CONFIG_BASE64"),
        bind: env_value_for_var(&settings, "BODIGITAL_BIND"),
        data_dir: env_value_for_var(&settings, "BODIGITAL_DATA_DIR"),
        url_prefix: env_value_for_var(&settings, "BODIGITAL_URL_PREFIX"),
        max_body_size: env_value_for_var(&settings, "BODIGITAL_MAX_BODY_SIZE"),
        log_level: env_value_for_var(&settings, "BODIGITAL_LOG_LEVEL"),
        storage_backend: env_value_for_var(&settings, "BODIGITAL_STORAGE_BACKEND"),
        password_min: env_value_for_var(&settings, "BODIGITAL_PASSWORD_MIN"),
        token_ttl_seconds: env_value_for_var(&settings, "BODIGITAL_TOKEN_TTL_SECONDS"),
        audit_log_limit: env_value_for_var(&settings, "BODIGITAL_AUDIT_LOG_LIMIT"),
        identity_backend: env_value_for_var(&settings, "BODIGITAL_IDENTITY_BACKEND"),
        identity_http_base_url: env_value_for_var(&settings, "BODIGITAL_IDENTITY_HTTP_BASE_URL"),
        identity_http_signup_endpoint: env_value_for_var(
            &settings,
            "BODIGITAL_IDENTITY_HTTP_SIGNUP_ENDPOINT",
        ),
        identity_http_login_endpoint: env_value_for_var(
            &settings,
            "BODIGITAL_IDENTITY_HTTP_LOGIN_ENDPOINT",
        ),
        identity_http_verify_endpoint: env_value_for_var(
            &settings,
            "BODIGITAL_IDENTITY_HTTP_VERIFY_ENDPOINT",
        ),
        identity_http_timeout_ms: env_value_for_var(
            &settings,
            "BODIGITAL_IDENTITY_HTTP_TIMEOUT_MS",
        ),
    })
}

fn load_process_env_value(key: &str) -> Result<Option<String>, String> {
    let settings = SettingsLoader::builder()
        .add_source(Environment::default().try_parsing(false))
        .build()
        .map_err(|err| format!("failed to load process environment: {err}"))?;
    Ok(env_value(&settings, key))
}

fn env_value(settings: &SettingsLoader, key: &str) -> Option<String> {
    settings
        .get_string(key)
        .ok()
        .or_else(|| settings.get_string(&key.to_ascii_uppercase()).ok())
}

fn env_value_for_var(settings: &SettingsLoader, env_var: &str) -> Option<String> {
    let key = env_var
        .strip_prefix("BODIGITAL_")
        .unwrap_or(env_var)
        .to_ascii_lowercase();
    env_value(settings, &key)
}

fn parse_env_value<T>(raw: Option<&str>) -> Option<T>
where
    T: std::str::FromStr,
{
    raw.and_then(|value| value.trim().parse::<T>().ok())
}

pub fn default_http_identity_config() -> HttpIdentityConfig {
    HttpIdentityConfig {
        base_url: String::new(),
        signup_endpoint: "/signup".to_string(),
        login_endpoint: "/login".to_string(),
        verify_endpoint: "/verify".to_string(),
        timeout_ms: 5_000,
    }
}

fn parse_identity_from_yaml(identity: Option<YamlIdentity>) -> Result<IdentityConfig, String> {
    let Some(identity) = identity else {
        return Ok(IdentityConfig::default());
    };

    let backend = identity
        .backend
        .as_deref()
        .map(IdentityBackend::from_str)
        .unwrap_or(IdentityBackend::Local);

    match backend {
        IdentityBackend::Local => Ok(IdentityConfig::default()),
        IdentityBackend::Http => {
            let http = identity.http.ok_or_else(|| {
                "auth.identity.http section is required when auth.identity.backend=http"
                    .to_string()
            })?;
            let defaults = default_http_identity_config();
            Ok(IdentityConfig {
                backend,
                http: Some(HttpIdentityConfig {
                    base_url: http.base_url,
                    signup_endpoint: http.signup_endpoint.unwrap_or(defaults.signup_endpoint),
                    login_endpoint: http.login_endpoint.unwrap_or(defaults.login_endpoint),
                    verify_endpoint: http.verify_endpoint.unwrap_or(defaults.verify_endpoint),
                    timeout_ms: http.timeout_ms.unwrap_or(defaults.timeout_ms),
                }),
            })
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YamlConfig {
    listen: Option<String>,
    storage: Option<YamlStorage>,
    url_prefix: Option<String>,
    max_body_size: Option<String>,
    log: Option<YamlLog>,
    auth: Option<YamlAuth>,
    audit: Option<YamlAudit>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct YamlStorage {
    backend: Option<String>,
    data_dir: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YamlLog {
    level: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct YamlAuth {
    password_min: Option<usize>,
    token_ttl_seconds: Option<i64>,
    identity: Option<YamlIdentity>,
}

#[derive(Debug, Deserialize)]
struct YamlIdentity {
    backend: Option<String>,
    http: Option<YamlIdentityHttp>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YamlIdentityHttp {
    base_url: String,
    signup_endpoint: Option<String>,
    login_endpoint: Option<String>,
    verify_endpoint: Option<String>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct YamlAudit {
    limit: Option<usize>,
}

/// `"512"`, `"64kb"`, `"10mb"`, `"1gb"`; case-insensitive.
fn parse_body_size(raw: &str) -> Option<usize> {
    let value = raw.trim().to_ascii_lowercase();
    let digits_end = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    if digits_end == 0 {
        return None;
    }
    let (digits, unit) = value.split_at(digits_end);
    let shift = match unit.trim() {
        "" | "b" => 0,
        "kb" => 10,
        "mb" => 20,
        "gb" => 30,
        _ => return None,
    };
    digits.parse::<usize>().ok()?.checked_mul(1usize << shift)
}

fn normalize_url_prefix(value: &str) -> String {
    let inner = value.trim().trim_matches('/');
    if inner.is_empty() {
        "/".to_string()
    } else {
        format!("/{inner}")
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, IdentityBackend, StorageBackend, normalize_url_prefix, parse_body_size};
    use std::io::Write;

    #[test]
    fn parses_identity_and_storage_sections() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            r#"
listen: 0.0.0.0:9090
urlPrefix: api/
maxBodySize: 2mb
storage:
  backend: memory
  dataDir: /var/lib/bodigital
auth:
  passwordMin: 6
  tokenTtlSeconds: 600
  identity:
    backend: http
    http:
      baseUrl: http://identity.local:9000
      loginEndpoint: /token
      timeoutMs: 2500
audit:
  limit: 50
"#
        )
        .expect("write");

        let cfg = Config::from_yaml_file(file.path().to_path_buf()).expect("parse");
        assert_eq!(cfg.bind.to_string(), "0.0.0.0:9090");
        assert_eq!(cfg.url_prefix, "/api");
        assert_eq!(cfg.max_body_size, 2 * 1024 * 1024);
        assert_eq!(cfg.storage_backend, StorageBackend::Memory);
        assert_eq!(cfg.data_dir.to_str(), Some("/var/lib/bodigital"));
        assert_eq!(cfg.password_min_length, 6);
        assert_eq!(cfg.token_ttl_seconds, 600);
        assert_eq!(cfg.audit_log_limit, 50);
        assert_eq!(cfg.identity.backend, IdentityBackend::Http);
        let http = cfg.identity.http.expect("http identity");
        assert_eq!(http.base_url, "http://identity.local:9000");
        assert_eq!(http.login_endpoint, "/token");
        assert_eq!(http.signup_endpoint, "/signup");
        assert_eq!(http.timeout_ms, 2500);
    }

    #[test]
    fn http_identity_requires_http_section() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "auth:\n  identity:\n    backend: http\n").expect("write");
        let err = Config::from_yaml_file(file.path().to_path_buf()).expect_err("missing http");
        assert!(err.contains("auth.identity.http"));
    }

    #[test]
    fn body_sizes_and_prefixes_normalize() {
        assert_eq!(parse_body_size("512kb"), Some(512 * 1024));
        assert_eq!(parse_body_size("10"), Some(10));
        assert_eq!(parse_body_size("tb"), None);
        assert_eq!(normalize_url_prefix(""), "/");
        assert_eq!(normalize_url_prefix("/make-server/"), "/make-server");
    }
}
