//! `careon quotes list|show`.

use careon_core::domain::cctv_quote::{QuoteListFilter, QuoteRequestId, QuoteRequestStatus};
use careon_core::errors::ApplicationError;
use serde_json::json;

use crate::commands::{exit, load_config, runtime, CommandResult, LocalServices};

pub fn list(status: Option<&str>, limit: u32, offset: u32) -> CommandResult {
    const COMMAND: &str = "quotes list";
    let status = match QuoteRequestStatus::parse_filter(status) {
        Ok(status) => status,
        Err(error) => {
            return CommandResult::failure(COMMAND, "invalid_filter", error.to_string(), exit::INPUT);
        }
    };
    let filter = QuoteListFilter { status, limit: limit.clamp(1, 200), offset };

    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        let services = match LocalServices::open(COMMAND, &config).await {
            Ok(services) => services,
            Err(failure) => return failure,
        };
        let listed = services.intake.list(&filter).await;
        services.close().await;

        match listed {
            Ok((records, total)) => CommandResult::success_with_data(
                COMMAND,
                format!("{} of {total} quote request(s)", records.len()),
                Some(json!({ "total": total, "data": records })),
            ),
            Err(error) => {
                CommandResult::failure(COMMAND, "persistence", error.to_string(), exit::DATABASE)
            }
        }
    })
}

pub fn show(id: &str) -> CommandResult {
    const COMMAND: &str = "quotes show";
    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        let services = match LocalServices::open(COMMAND, &config).await {
            Ok(services) => services,
            Err(failure) => return failure,
        };
        let found = services.intake.find(&QuoteRequestId(id.to_owned())).await;
        services.close().await;

        match found {
            Ok(record) => CommandResult::success_with_data(
                COMMAND,
                format!("quote request `{id}` is {}", record.status.as_str()),
                Some(json!(record)),
            ),
            Err(ApplicationError::NotFound(message)) => {
                CommandResult::failure(COMMAND, "not_found", message, exit::INPUT)
            }
            Err(error) => {
                CommandResult::failure(COMMAND, "persistence", error.to_string(), exit::DATABASE)
            }
        }
    })
}
