use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use careon_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };
    render(&config, detect_config_path().as_deref())
}

/// One line per setting with its value and where it came from. Secrets are
/// redacted.
pub fn render(config: &AppConfig, config_file_path: Option<&Path>) -> String {
    let config_file_doc = load_config_file_doc(config_file_path);
    let unset = || "<unset>".to_string();

    let entries: Vec<(&str, String)> = vec![
        ("database.url", config.database.url.clone()),
        ("database.max_connections", config.database.max_connections.to_string()),
        ("database.timeout_secs", config.database.timeout_secs.to_string()),
        ("server.bind_address", config.server.bind_address.clone()),
        ("server.port", config.server.port.to_string()),
        ("server.graceful_shutdown_secs", config.server.graceful_shutdown_secs.to_string()),
        ("pages.alias_route", config.pages.alias_route.clone()),
        ("pages.alias_slug", config.pages.alias_slug.clone()),
        ("pages.default_title", config.pages.default_title.clone()),
        ("pages.image_proxy", config.pages.image_proxy.clone().unwrap_or_else(unset)),
        ("cache.purge_url", config.cache.purge_url.clone().unwrap_or_else(unset)),
        (
            "cache.purge_token",
            config
                .cache
                .purge_token
                .as_ref()
                .map(|token| redact_token(token.expose_secret()))
                .unwrap_or_else(unset),
        ),
        ("cache.timeout_secs", config.cache.timeout_secs.to_string()),
        ("storage.upload_dir", config.storage.upload_dir.display().to_string()),
        ("storage.public_base_url", config.storage.public_base_url.clone()),
        ("storage.max_upload_bytes", config.storage.max_upload_bytes.to_string()),
        ("quote.unit_price", config.quote.unit_price.to_string()),
        ("logging.level", config.logging.level.clone()),
        ("logging.format", format!("{:?}", config.logging.format)),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key_path, value) in entries {
        let env_key = env_key_for(key_path);
        let source =
            field_source(key_path, Some(&env_key), config_file_doc.as_ref(), config_file_path);
        lines.push(render_line(key_path, &value, source));
    }
    lines.join("\n")
}

fn env_key_for(key_path: &str) -> String {
    format!("CAREON_{}", key_path.replace('.', "_").to_ascii_uppercase())
}

fn detect_config_path() -> Option<PathBuf> {
    ["careon.toml", "config/careon.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
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

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    match trimmed.chars().count() {
        0 => "<empty>".to_string(),
        1..=8 => "<redacted>".to_string(),
        _ => format!("{}***", trimmed.chars().take(4).collect::<String>()),
    }
}
