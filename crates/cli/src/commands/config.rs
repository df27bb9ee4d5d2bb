use std::env;
use std::fs;
use std::path::Path;

use northwind_core::config::{detect_config_path, AppConfig, LoadOptions};
use toml::Value;

/// One effective setting: dotted TOML path, env variable and rendered value.
struct Field {
    key_path: &'static str,
    env_key: Option<&'static str>,
    value: String,
}

impl Field {
    fn new(
        key_path: &'static str,
        env_key: Option<&'static str>,
        value: impl Into<String>,
    ) -> Self {
        Self { key_path, env_key, value: value.into() }
    }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key_path,
            field.env_key,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key_path, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let (cert_path, key_path) = match &config.server.tls {
        Some(tls) => (tls.cert_path.display().to_string(), tls.key_path.display().to_string()),
        None => ("<unset>".to_string(), "<unset>".to_string()),
    };

    vec![
        Field::new("environment", Some("NORTHWIND_ENVIRONMENT"), config.environment.as_str()),
        Field::new("database.url", Some("NORTHWIND_DATABASE_URL"), config.database.url.as_str()),
        Field::new(
            "database.max_connections",
            Some("NORTHWIND_DATABASE_MAX_CONNECTIONS"),
            config.database.max_connections.to_string(),
        ),
        Field::new(
            "database.timeout_secs",
            Some("NORTHWIND_DATABASE_TIMEOUT_SECS"),
            config.database.timeout_secs.to_string(),
        ),
        Field::new(
            "server.bind_address",
            Some("NORTHWIND_SERVER_BIND_ADDRESS"),
            config.server.bind_address.as_str(),
        ),
        Field::new(
            "server.http_port",
            Some("NORTHWIND_SERVER_HTTP_PORT"),
            config.server.http_port.to_string(),
        ),
        Field::new(
            "server.https_port",
            Some("NORTHWIND_SERVER_HTTPS_PORT"),
            config.server.https_port.to_string(),
        ),
        Field::new("server.tls.cert_path", Some("NORTHWIND_SERVER_TLS_CERT_PATH"), cert_path),
        Field::new("server.tls.key_path", Some("NORTHWIND_SERVER_TLS_KEY_PATH"), key_path),
        Field::new(
            "server.graceful_shutdown_secs",
            None,
            config.server.graceful_shutdown_secs.to_string(),
        ),
        Field::new(
            "cors.allowed_origins",
            Some("NORTHWIND_CORS_ALLOWED_ORIGINS"),
            config.cors.allowed_origins.join(", "),
        ),
        Field::new("cors.allowed_methods", None, config.cors.allowed_methods.join(", ")),
        Field::new("cors.allowed_headers", None, config.cors.allowed_headers.join(", ")),
        Field::new("docs.title", None, config.docs.title.as_str()),
        Field::new("docs.version", None, config.docs.version.as_str()),
        Field::new("docs.submit_methods", None, config.docs.submit_methods.join(", ")),
        Field::new(
            "formatters.preferred_xml",
            Some("NORTHWIND_FORMATTERS_PREFERRED_XML"),
            config.formatters.preferred_xml.as_str(),
        ),
        Field::new("logging.level", Some("NORTHWIND_LOGGING_LEVEL"), config.logging.level.as_str()),
        Field::new(
            "logging.format",
            Some("NORTHWIND_LOGGING_FORMAT"),
            format!("{:?}", config.logging.format),
        ),
    ]
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
