use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://../../Northwind.db?mode=rwc";
pub const DEFAULT_CORS_ORIGIN: &str = "https://localhost:5002";

const KNOWN_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];
const SWAGGER_SUBMIT_METHODS: &[&str] =
    &["get", "put", "post", "delete", "options", "head", "patch", "trace"];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub docs: DocsConfig,
    pub formatters: FormatterConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub http_port: u16,
    pub https_port: u16,
    pub tls: Option<TlsConfig>,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct DocsConfig {
    pub title: String,
    pub version: String,
    pub submit_methods: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct FormatterConfig {
    pub preferred_xml: XmlFlavor,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

/// Which XML serializer answers `application/xml` when the client does not pick one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XmlFlavor {
    /// Data-contract style: namespaced, alphabetical members, explicit nils.
    Contract,
    /// Reflection style: declaration order, absent members omitted.
    Reflection,
}

impl XmlFlavor {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Contract => "contract",
            Self::Reflection => "reflection",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub environment: Option<Environment>,
    pub database_url: Option<String>,
    pub bind_address: Option<String>,
    pub http_port: Option<u16>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                http_port: 5000,
                https_port: 5001,
                tls: None,
                graceful_shutdown_secs: 15,
            },
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ORIGIN.to_string()],
                allowed_methods: ["Get", "Post", "Put", "Delete"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
                allowed_headers: vec!["content-type".to_string(), "accept".to_string()],
            },
            docs: DocsConfig {
                title: "Northwind Service API".to_string(),
                version: "v1".to_string(),
                submit_methods: ["get", "post", "put", "delete"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
            },
            formatters: FormatterConfig { preferred_xml: XmlFlavor::Contract },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ConfigError::Validation(format!(
                "unsupported environment `{other}` (expected development|staging|production)"
            ))),
        }
    }
}

impl std::str::FromStr for XmlFlavor {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "contract" => Ok(Self::Contract),
            "reflection" => Ok(Self::Reflection),
            other => Err(ConfigError::Validation(format!(
                "unsupported xml flavor `{other}` (expected contract|reflection)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("northwind.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Path of the swagger document, derived from the docs version.
    pub fn swagger_json_path(&self) -> String {
        format!("/swagger/{}/swagger.json", self.docs.version)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(environment) = patch.environment {
            self.environment = environment;
        }

        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(http_port) = server.http_port {
                self.server.http_port = http_port;
            }
            if let Some(https_port) = server.https_port {
                self.server.https_port = https_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
            if let Some(tls) = server.tls {
                self.server.tls = Some(TlsConfig {
                    cert_path: tls.cert_path.unwrap_or_default(),
                    key_path: tls.key_path.unwrap_or_default(),
                });
            }
        }

        if let Some(cors) = patch.cors {
            if let Some(allowed_origins) = cors.allowed_origins {
                self.cors.allowed_origins = allowed_origins;
            }
            if let Some(allowed_methods) = cors.allowed_methods {
                self.cors.allowed_methods = allowed_methods;
            }
            if let Some(allowed_headers) = cors.allowed_headers {
                self.cors.allowed_headers = allowed_headers;
            }
        }

        if let Some(docs) = patch.docs {
            if let Some(title) = docs.title {
                self.docs.title = title;
            }
            if let Some(version) = docs.version {
                self.docs.version = version;
            }
            if let Some(submit_methods) = docs.submit_methods {
                self.docs.submit_methods = submit_methods;
            }
        }

        if let Some(formatters) = patch.formatters {
            if let Some(preferred_xml) = formatters.preferred_xml {
                self.formatters.preferred_xml = preferred_xml;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("NORTHWIND_ENVIRONMENT") {
            self.environment = value.parse()?;
        }

        if let Some(value) = read_env("NORTHWIND_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("NORTHWIND_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("NORTHWIND_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("NORTHWIND_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("NORTHWIND_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("NORTHWIND_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("NORTHWIND_SERVER_HTTP_PORT") {
            self.server.http_port = parse_u16("NORTHWIND_SERVER_HTTP_PORT", &value)?;
        }
        if let Some(value) = read_env("NORTHWIND_SERVER_HTTPS_PORT") {
            self.server.https_port = parse_u16("NORTHWIND_SERVER_HTTPS_PORT", &value)?;
        }
        let cert_path = read_env("NORTHWIND_SERVER_TLS_CERT_PATH");
        let key_path = read_env("NORTHWIND_SERVER_TLS_KEY_PATH");
        if cert_path.is_some() || key_path.is_some() {
            let current = self.server.tls.take();
            self.server.tls = Some(TlsConfig {
                cert_path: cert_path
                    .map(PathBuf::from)
                    .or_else(|| current.as_ref().map(|tls| tls.cert_path.clone()))
                    .unwrap_or_default(),
                key_path: key_path
                    .map(PathBuf::from)
                    .or_else(|| current.as_ref().map(|tls| tls.key_path.clone()))
                    .unwrap_or_default(),
            });
        }

        if let Some(value) = read_env("NORTHWIND_CORS_ALLOWED_ORIGINS") {
            self.cors.allowed_origins = split_list(&value);
        }
        if let Some(value) = read_env("NORTHWIND_FORMATTERS_PREFERRED_XML") {
            self.formatters.preferred_xml = value.parse()?;
        }

        let log_level =
            read_env("NORTHWIND_LOGGING_LEVEL").or_else(|| read_env("NORTHWIND_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("NORTHWIND_LOGGING_FORMAT").or_else(|| read_env("NORTHWIND_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(environment) = overrides.environment {
            self.environment = environment;
        }
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(http_port) = overrides.http_port {
            self.server.http_port = http_port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_cors(&self.cors)?;
        validate_docs(&self.docs)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("northwind.toml"), PathBuf::from("config/northwind.toml")]
        .into_iter()
        .find(|path| path.exists())
}

/// Path of the config file `load` would read, if any.
pub fn detect_config_path() -> Option<PathBuf> {
    resolve_config_path(None)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.http_port == 0 {
        return Err(ConfigError::Validation(
            "server.http_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    if let Some(tls) = &server.tls {
        if tls.cert_path.as_os_str().is_empty() || tls.key_path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "server.tls requires both cert_path and key_path".to_string(),
            ));
        }
        if server.https_port == 0 {
            return Err(ConfigError::Validation(
                "server.https_port must be greater than zero when tls is configured".to_string(),
            ));
        }
        if server.https_port == server.http_port {
            return Err(ConfigError::Validation(
                "server.https_port must differ from server.http_port".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_cors(cors: &CorsConfig) -> Result<(), ConfigError> {
    if cors.allowed_origins.is_empty() {
        return Err(ConfigError::Validation(
            "cors.allowed_origins must list at least one origin".to_string(),
        ));
    }
    for origin in &cors.allowed_origins {
        let origin = origin.trim().trim_end_matches('/');
        let rest = origin
            .strip_prefix("https://")
            .or_else(|| origin.strip_prefix("http://"))
            .ok_or_else(|| {
                ConfigError::Validation(format!(
                    "cors.allowed_origins entry `{origin}` must start with http:// or https://"
                ))
            })?;
        if rest.is_empty() || rest.contains('/') {
            return Err(ConfigError::Validation(format!(
                "cors.allowed_origins entry `{origin}` must be a scheme and host without a path"
            )));
        }
    }

    if cors.allowed_methods.is_empty() {
        return Err(ConfigError::Validation(
            "cors.allowed_methods must list at least one method".to_string(),
        ));
    }
    for method in &cors.allowed_methods {
        let normalized = method.trim().to_ascii_uppercase();
        if !KNOWN_METHODS.contains(&normalized.as_str()) {
            return Err(ConfigError::Validation(format!(
                "cors.allowed_methods entry `{method}` is not a supported HTTP method"
            )));
        }
    }

    Ok(())
}

fn validate_docs(docs: &DocsConfig) -> Result<(), ConfigError> {
    if docs.title.trim().is_empty() {
        return Err(ConfigError::Validation("docs.title must not be empty".to_string()));
    }

    let version = docs.version.trim();
    if version.is_empty() || version.contains('/') {
        return Err(ConfigError::Validation(
            "docs.version must be a non-empty path segment".to_string(),
        ));
    }

    for method in &docs.submit_methods {
        let normalized = method.trim().to_ascii_lowercase();
        if !SWAGGER_SUBMIT_METHODS.contains(&normalized.as_str()) {
            return Err(ConfigError::Validation(format!(
                "docs.submit_methods entry `{method}` is not a swagger submit method"
            )));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    environment: Option<Environment>,
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    cors: Option<CorsPatch>,
    docs: Option<DocsPatch>,
    formatters: Option<FormattersPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    http_port: Option<u16>,
    https_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
    tls: Option<TlsPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct TlsPatch {
    cert_path: Option<PathBuf>,
    key_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct CorsPatch {
    allowed_origins: Option<Vec<String>>,
    allowed_methods: Option<Vec<String>>,
    allowed_headers: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct DocsPatch {
    title: Option<String>,
    version: Option<String>,
    submit_methods: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct FormattersPatch {
    preferred_xml: Option<XmlFlavor>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
