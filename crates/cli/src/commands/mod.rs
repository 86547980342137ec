pub mod config;
pub mod migrate;
pub mod page;
pub mod quote;
pub mod quotes;

use std::sync::Arc;

use careon_core::config::{AppConfig, LoadOptions};
use careon_db::repositories::{SqlCctvQuoteRepository, SqlPageRepository};
use careon_db::{connect_with_settings, migrations, DbPool};
use careon_server::{PageGateway, QuoteIntake};
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Runtime;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data(command, message, None)
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Exit codes shared by every command.
pub(crate) mod exit {
    pub const CONFIG: u8 = 2;
    pub const RUNTIME: u8 = 3;
    pub const DATABASE: u8 = 4;
    pub const MIGRATION: u8 = 5;
    pub const INPUT: u8 = 6;
    pub const REMOTE: u8 = 7;
}

pub(crate) fn load_config(command: &str) -> Result<AppConfig, CommandResult> {
    AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            exit::CONFIG,
        )
    })
}

pub(crate) fn runtime(command: &str) -> Result<Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            exit::RUNTIME,
        )
    })
}

/// Database-backed services for commands that work without a running server.
pub(crate) struct LocalServices {
    pub pool: DbPool,
    pub gateway: Arc<PageGateway>,
    pub intake: Arc<QuoteIntake>,
}

impl LocalServices {
    pub async fn open(command: &str, config: &AppConfig) -> Result<Self, CommandResult> {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| {
            CommandResult::failure(command, "db_connectivity", error.to_string(), exit::DATABASE)
        })?;
        migrations::run_pending(&pool).await.map_err(|error| {
            CommandResult::failure(command, "migration", error.to_string(), exit::MIGRATION)
        })?;

        let gateway =
            PageGateway::new(Arc::new(SqlPageRepository::new(pool.clone())), &config.pages);
        let intake = QuoteIntake::new(Arc::new(SqlCctvQuoteRepository::new(pool.clone())));
        Ok(Self { pool, gateway: Arc::new(gateway), intake: Arc::new(intake) })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
