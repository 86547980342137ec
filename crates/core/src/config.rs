use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::page::validate_slug;
use crate::wizard::engine::{WizardSettings, DEFAULT_UNIT_PRICE};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub pages: PagesConfig,
    pub cache: CacheConfig,
    pub storage: StorageConfig,
    pub quote: QuoteConfig,
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
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

/// Public page routing. Every save also invalidates `alias_route`, which
/// serves `alias_slug`.
#[derive(Clone, Debug)]
pub struct PagesConfig {
    pub alias_route: String,
    pub alias_slug: String,
    pub default_title: String,
    pub image_proxy: Option<String>,
}

#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub purge_url: Option<String>,
    pub purge_token: Option<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    pub public_base_url: String,
    pub max_upload_bytes: usize,
}

#[derive(Clone, Debug)]
pub struct QuoteConfig {
    pub unit_price: i64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
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
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub upload_dir: Option<PathBuf>,
    pub unit_price: Option<i64>,
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
            database: DatabaseConfig {
                url: "sqlite://careon.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            pages: PagesConfig {
                alias_route: "/landing".to_string(),
                alias_slug: "landing".to_string(),
                default_title: "CareOn landing page".to_string(),
                image_proxy: None,
            },
            cache: CacheConfig { purge_url: None, purge_token: None, timeout_secs: 5 },
            storage: StorageConfig {
                upload_dir: PathBuf::from("uploads"),
                public_base_url: "/uploads".to_string(),
                max_upload_bytes: 10 * 1024 * 1024,
            },
            quote: QuoteConfig { unit_price: DEFAULT_UNIT_PRICE },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
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

impl QuoteConfig {
    pub fn wizard_settings(&self) -> WizardSettings {
        WizardSettings { unit_price: self.unit_price }
    }
}

impl ServerConfig {
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("careon.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
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
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(pages) = patch.pages {
            if let Some(alias_route) = pages.alias_route {
                self.pages.alias_route = alias_route;
            }
            if let Some(alias_slug) = pages.alias_slug {
                self.pages.alias_slug = alias_slug;
            }
            if let Some(default_title) = pages.default_title {
                self.pages.default_title = default_title;
            }
            if let Some(image_proxy) = pages.image_proxy {
                self.pages.image_proxy = Some(image_proxy);
            }
        }

        if let Some(cache) = patch.cache {
            if let Some(purge_url) = cache.purge_url {
                self.cache.purge_url = Some(purge_url);
            }
            if let Some(purge_token) = cache.purge_token {
                self.cache.purge_token = Some(purge_token.into());
            }
            if let Some(timeout_secs) = cache.timeout_secs {
                self.cache.timeout_secs = timeout_secs;
            }
        }

        if let Some(storage) = patch.storage {
            if let Some(upload_dir) = storage.upload_dir {
                self.storage.upload_dir = upload_dir;
            }
            if let Some(public_base_url) = storage.public_base_url {
                self.storage.public_base_url = public_base_url;
            }
            if let Some(max_upload_bytes) = storage.max_upload_bytes {
                self.storage.max_upload_bytes = max_upload_bytes;
            }
        }

        if let Some(quote) = patch.quote {
            if let Some(unit_price) = quote.unit_price {
                self.quote.unit_price = unit_price;
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
        if let Some(value) = read_env("CAREON_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("CAREON_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("CAREON_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("CAREON_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("CAREON_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CAREON_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("CAREON_SERVER_PORT") {
            self.server.port = parse_u16("CAREON_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("CAREON_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("CAREON_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("CAREON_PAGES_ALIAS_ROUTE") {
            self.pages.alias_route = value;
        }
        if let Some(value) = read_env("CAREON_PAGES_ALIAS_SLUG") {
            self.pages.alias_slug = value;
        }
        if let Some(value) = read_env("CAREON_PAGES_DEFAULT_TITLE") {
            self.pages.default_title = value;
        }
        if let Some(value) = read_env("CAREON_PAGES_IMAGE_PROXY") {
            self.pages.image_proxy = Some(value);
        }

        if let Some(value) = read_env("CAREON_CACHE_PURGE_URL") {
            self.cache.purge_url = Some(value);
        }
        if let Some(value) = read_env("CAREON_CACHE_PURGE_TOKEN") {
            self.cache.purge_token = Some(value.into());
        }
        if let Some(value) = read_env("CAREON_CACHE_TIMEOUT_SECS") {
            self.cache.timeout_secs = parse_u64("CAREON_CACHE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CAREON_STORAGE_UPLOAD_DIR") {
            self.storage.upload_dir = PathBuf::from(value);
        }
        if let Some(value) = read_env("CAREON_STORAGE_PUBLIC_BASE_URL") {
            self.storage.public_base_url = value;
        }
        if let Some(value) = read_env("CAREON_STORAGE_MAX_UPLOAD_BYTES") {
            self.storage.max_upload_bytes =
                parse_usize("CAREON_STORAGE_MAX_UPLOAD_BYTES", &value)?;
        }

        if let Some(value) = read_env("CAREON_QUOTE_UNIT_PRICE") {
            self.quote.unit_price = parse_i64("CAREON_QUOTE_UNIT_PRICE", &value)?;
        }

        let log_level = read_env("CAREON_LOGGING_LEVEL").or_else(|| read_env("CAREON_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CAREON_LOGGING_FORMAT").or_else(|| read_env("CAREON_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(upload_dir) = overrides.upload_dir {
            self.storage.upload_dir = upload_dir;
        }
        if let Some(unit_price) = overrides.unit_price {
            self.quote.unit_price = unit_price;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_pages(&self.pages)?;
        validate_cache(&self.cache)?;
        validate_storage(&self.storage)?;
        validate_quote(&self.quote)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("careon.toml"), PathBuf::from("config/careon.toml")]
        .into_iter()
        .find(|path| path.exists())
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
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_pages(pages: &PagesConfig) -> Result<(), ConfigError> {
    if !pages.alias_route.starts_with('/') {
        return Err(ConfigError::Validation(
            "pages.alias_route must be an absolute path such as `/landing`".to_string(),
        ));
    }

    validate_slug(&pages.alias_slug).map_err(|error| {
        ConfigError::Validation(format!("pages.alias_slug is not a valid slug: {error}"))
    })?;

    if pages.default_title.trim().is_empty() {
        return Err(ConfigError::Validation("pages.default_title must not be empty".to_string()));
    }

    if let Some(proxy) = &pages.image_proxy {
        if !is_http_url(proxy) && !proxy.starts_with('/') {
            return Err(ConfigError::Validation(
                "pages.image_proxy must be an http(s) URL or an absolute path".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_cache(cache: &CacheConfig) -> Result<(), ConfigError> {
    if let Some(purge_url) = &cache.purge_url {
        if !is_http_url(purge_url) {
            return Err(ConfigError::Validation(
                "cache.purge_url must start with http:// or https://".to_string(),
            ));
        }
    }

    let blank_token = cache
        .purge_token
        .as_ref()
        .map(|token| token.expose_secret().trim().is_empty())
        .unwrap_or(false);
    if blank_token {
        return Err(ConfigError::Validation("cache.purge_token must not be blank".to_string()));
    }

    if cache.timeout_secs == 0 || cache.timeout_secs > 60 {
        return Err(ConfigError::Validation("cache.timeout_secs must be in range 1..=60".to_string()));
    }

    Ok(())
}

fn validate_storage(storage: &StorageConfig) -> Result<(), ConfigError> {
    if storage.upload_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation("storage.upload_dir must not be empty".to_string()));
    }

    if storage.public_base_url.trim().is_empty() {
        return Err(ConfigError::Validation(
            "storage.public_base_url must not be empty".to_string(),
        ));
    }

    if storage.max_upload_bytes == 0 {
        return Err(ConfigError::Validation(
            "storage.max_upload_bytes must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_quote(quote: &QuoteConfig) -> Result<(), ConfigError> {
    if quote.unit_price <= 0 {
        return Err(ConfigError::Validation(
            "quote.unit_price must be a positive amount in won".to_string(),
        ));
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

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| invalid_override(key, value))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_i64(key: &str, value: &str) -> Result<i64, ConfigError> {
    value.parse::<i64>().map_err(|_| invalid_override(key, value))
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    pages: Option<PagesPatch>,
    cache: Option<CachePatch>,
    storage: Option<StoragePatch>,
    quote: Option<QuotePatch>,
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
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PagesPatch {
    alias_route: Option<String>,
    alias_slug: Option<String>,
    default_title: Option<String>,
    image_proxy: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CachePatch {
    purge_url: Option<String>,
    purge_token: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct StoragePatch {
    upload_dir: Option<PathBuf>,
    public_base_url: Option<String>,
    max_upload_bytes: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct QuotePatch {
    unit_price: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_are_valid_and_route_the_landing_alias() -> Result<(), String> {
        let config = AppConfig::default();
        config.validate().map_err(|err| err.to_string())?;

        ensure(config.pages.alias_route == "/landing", "alias route should default to /landing")?;
        ensure(config.pages.alias_slug == "landing", "alias slug should default to landing")?;
        ensure(config.quote.unit_price == 8_500, "unit price should default to 8,500 won")?;
        ensure(config.server.listen_address() == "127.0.0.1:8080", "listen address mismatch")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_CAREON_PURGE_TOKEN", "purge-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("careon.toml");
            fs::write(
                &path,
                r#"
[cache]
purge_url = "https://edge.example.com/purge"
purge_token = "${TEST_CAREON_PURGE_TOKEN}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.cache.purge_token.as_ref().map(|token| token.expose_secret())
                    == Some("purge-from-env"),
                "purge token should be loaded from environment",
            )?;
            ensure(
                config.cache.purge_url.as_deref() == Some("https://edge.example.com/purge"),
                "purge url should come from the file",
            )
        })();

        clear_vars(&["TEST_CAREON_PURGE_TOKEN"]);
        result
    }

    #[test]
    fn missing_interpolation_variable_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("careon.toml");
        fs::write(&path, "[database]\nurl = \"${CAREON_TEST_UNSET_VARIABLE}\"\n")
            .map_err(|err| err.to_string())?;

        match AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() }) {
            Err(ConfigError::MissingEnvInterpolation { var }) => {
                ensure(var == "CAREON_TEST_UNSET_VARIABLE", "error should name the variable")
            }
            other => Err(format!("expected interpolation failure, got {other:?}")),
        }
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CAREON_LOG_LEVEL", "warn");
        env::set_var("CAREON_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )
        })();

        clear_vars(&["CAREON_LOG_LEVEL", "CAREON_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CAREON_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("CAREON_QUOTE_UNIT_PRICE", "9000");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("careon.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[quote]
unit_price = 7000

[storage]
upload_dir = "/srv/careon/uploads"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.quote.unit_price == 9_000, "env unit price should win over the file")?;
            ensure(
                config.storage.upload_dir == PathBuf::from("/srv/careon/uploads"),
                "file upload dir should win over defaults",
            )
        })();

        clear_vars(&["CAREON_DATABASE_URL", "CAREON_QUOTE_UNIT_PRICE"]);
        result
    }

    #[test]
    fn invalid_numeric_env_override_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CAREON_SERVER_PORT", "eighty");

        let result = match AppConfig::load(LoadOptions::default()) {
            Err(ConfigError::InvalidEnvOverride { key, .. }) => {
                ensure(key == "CAREON_SERVER_PORT", "error should name the env key")
            }
            other => Err(format!("expected invalid override, got {other:?}")),
        };

        clear_vars(&["CAREON_SERVER_PORT"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CAREON_PAGES_ALIAS_ROUTE", "landing");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("pages.alias_route")
            );
            ensure(has_message, "validation failure should mention pages.alias_route")
        })();

        clear_vars(&["CAREON_PAGES_ALIAS_ROUTE"]);
        result
    }

    #[test]
    fn non_positive_unit_price_is_rejected() {
        let mut config = AppConfig::default();
        config.quote.unit_price = 0;

        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(message)) if message.contains("quote.unit_price")
        ));
    }

    #[test]
    fn purge_token_is_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("CAREON_CACHE_PURGE_TOKEN", "purge-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("purge-secret-value"), "debug output should not contain token")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )
        })();

        clear_vars(&["CAREON_CACHE_PURGE_TOKEN"]);
        result
    }

    #[test]
    fn required_file_must_exist() {
        let dir = match TempDir::new() {
            Ok(dir) => dir,
            Err(error) => panic!("tempdir: {error}"),
        };
        let missing = dir.path().join("absent.toml");

        let result = AppConfig::load(LoadOptions {
            config_path: Some(missing.clone()),
            require_file: true,
            ..LoadOptions::default()
        });

        assert!(matches!(result, Err(ConfigError::MissingConfigFile(path)) if path == missing));
    }
}
