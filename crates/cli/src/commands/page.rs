//! `careon page list|export|import|render`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use careon_core::blocks::render::RenderOptions;
use careon_core::blocks::Block;
use careon_core::builder::{BlockSink, BlockSinkError, EditorMode, PageBuilder};
use careon_core::domain::page::PageUpdate;
use careon_core::errors::ApplicationError;
use careon_server::PageGateway;
use chrono::Utc;
use serde_json::json;

use crate::commands::{exit, load_config, runtime, CommandResult, LocalServices};
use crate::remote::HttpBlockSink;

fn correlation_id(command: &str) -> String {
    format!("cli-{command}-{}", Utc::now().timestamp_millis())
}

/// Saves through the gateway, so a missing page is created first.
pub struct GatewayBlockSink {
    gateway: Arc<PageGateway>,
    slug: String,
}

impl GatewayBlockSink {
    pub fn new(gateway: Arc<PageGateway>, slug: impl Into<String>) -> Self {
        Self { gateway, slug: slug.into() }
    }
}

#[async_trait]
impl BlockSink for GatewayBlockSink {
    async fn save_blocks(&self, blocks: &[Block]) -> Result<(), BlockSinkError> {
        let update = PageUpdate { blocks: Some(blocks.to_vec()), ..PageUpdate::default() };
        self.gateway
            .save_page(&self.slug, update, &correlation_id("page-import"))
            .await
            .map(|_| ())
            .map_err(|error| BlockSinkError(error.to_string()))
    }
}

pub fn list() -> CommandResult {
    const COMMAND: &str = "page list";
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
        let listed = services.gateway.list_slugs().await;
        services.close().await;

        match listed {
            Ok(slugs) => CommandResult::success_with_data(
                COMMAND,
                format!("{} page(s)", slugs.len()),
                Some(json!({ "slugs": slugs })),
            ),
            Err(error) => {
                CommandResult::failure(COMMAND, "persistence", error.to_string(), exit::DATABASE)
            }
        }
    })
}

/// Exports the stored blocks of `slug`, published or not.
pub fn export(slug: &str, out_dir: &Path) -> CommandResult {
    const COMMAND: &str = "page export";
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
        let fetched = services.gateway.get_page_for_editing(slug).await;
        services.close().await;

        let page = match fetched {
            Ok(page) => page,
            Err(ApplicationError::NotFound(_)) => {
                return CommandResult::failure(
                    COMMAND,
                    "not_found",
                    format!("no page at `{slug}`"),
                    exit::INPUT,
                );
            }
            Err(error) => {
                return CommandResult::failure(COMMAND, "persistence", error.to_string(), exit::DATABASE);
            }
        };

        let builder = match PageBuilder::with_blocks(page.blocks) {
            Ok(builder) => builder,
            Err(error) => {
                return CommandResult::failure(COMMAND, "invalid_blocks", error.to_string(), exit::INPUT);
            }
        };
        match write_export(&builder, out_dir) {
            Ok(path) => CommandResult::success_with_data(
                COMMAND,
                format!("exported {} block(s) from `{slug}`", builder.blocks().len()),
                Some(json!({ "path": path.display().to_string(), "blocks": builder.blocks().len() })),
            ),
            Err(message) => CommandResult::failure(COMMAND, "export_write", message, exit::INPUT),
        }
    })
}

fn write_export(builder: &PageBuilder, out_dir: &Path) -> Result<PathBuf, String> {
    let body = builder.export_json().map_err(|error| error.to_string())?;
    fs::create_dir_all(out_dir).map_err(|error| error.to_string())?;
    let path = out_dir.join(PageBuilder::export_file_name(Utc::now()));
    fs::write(&path, body).map_err(|error| error.to_string())?;
    Ok(path)
}

/// Loads an exported block file and saves it to `slug`, either through a
/// running server (`endpoint`) or directly against the configured database.
pub fn import(slug: &str, file: &Path, endpoint: Option<&str>) -> CommandResult {
    const COMMAND: &str = "page import";
    let mut builder = PageBuilder::new();
    let imported = match read_into(&mut builder, file) {
        Ok(count) => count,
        Err(message) => return CommandResult::failure(COMMAND, "invalid_import", message, exit::INPUT),
    };
    let runtime = match runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        let (saved, target) = match endpoint {
            Some(endpoint) => {
                let sink = match HttpBlockSink::new(endpoint, slug) {
                    Ok(sink) => sink,
                    Err(message) => {
                        return CommandResult::failure(COMMAND, "invalid_endpoint", message, exit::INPUT);
                    }
                };
                (builder.save(&sink).await, sink.url().to_string())
            }
            None => {
                let config = match load_config(COMMAND) {
                    Ok(config) => config,
                    Err(failure) => return failure,
                };
                let services = match LocalServices::open(COMMAND, &config).await {
                    Ok(services) => services,
                    Err(failure) => return failure,
                };
                let sink = GatewayBlockSink::new(services.gateway.clone(), slug);
                let saved = builder.save(&sink).await;
                services.close().await;
                (saved, config.database.url)
            }
        };

        match saved {
            Ok(()) => CommandResult::success_with_data(
                COMMAND,
                format!("imported {imported} block(s) into `{slug}`"),
                Some(json!({ "slug": slug, "blocks": imported, "target": target })),
            ),
            Err(error) => CommandResult::failure(COMMAND, "save_failed", error.to_string(), exit::REMOTE),
        }
    })
}

/// Renders an exported block file to HTML without touching the database.
pub fn render(file: &Path, editing: bool, image_proxy: Option<String>) -> Result<String, CommandResult> {
    const COMMAND: &str = "page render";
    let mut builder = PageBuilder::new();
    read_into(&mut builder, file)
        .map_err(|message| CommandResult::failure(COMMAND, "invalid_import", message, exit::INPUT))?;
    builder.set_mode(if editing { EditorMode::Edit } else { EditorMode::Preview });
    Ok(builder.render(&RenderOptions { image_proxy }))
}

fn read_into(builder: &mut PageBuilder, file: &Path) -> Result<usize, String> {
    let text = fs::read_to_string(file)
        .map_err(|error| format!("could not read `{}`: {error}", file.display()))?;
    builder.import_json(&text).map_err(|error| error.to_string())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use careon_core::blocks::{Block, BlockKind};
    use careon_core::builder::PageBuilder;

    use super::{read_into, render, write_export};

    #[test]
    fn export_then_read_back_keeps_every_block() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut builder = PageBuilder::new();
        builder.add_block(BlockKind::Hero);
        builder.add_block(BlockKind::Button);

        let path = write_export(&builder, &dir.path().join("exports")).expect("export");
        let name = path.file_name().and_then(|name| name.to_str()).expect("name");
        assert!(name.starts_with("page-") && name.ends_with(".json"));

        let mut restored = PageBuilder::new();
        assert_eq!(read_into(&mut restored, &path).expect("import"), 2);
        assert_eq!(restored.blocks(), builder.blocks());
    }

    #[test]
    fn bad_import_reports_the_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.json");
        fs::write(&path, "{not json").expect("write");

        let mut builder = PageBuilder::new();
        let message = read_into(&mut builder, &path).expect_err("rejected");
        assert!(message.contains("invalid page JSON"), "{message}");
        assert!(builder.blocks().is_empty());
    }

    #[test]
    fn render_switches_edit_controls() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("page.json");
        let blocks = vec![Block::with_defaults(BlockKind::Heading)];
        fs::write(&path, serde_json::to_string(&blocks).expect("json")).expect("write");

        let preview = render(&path, false, None).expect("preview");
        let editing = render(&path, true, None).expect("editing");

        assert!(preview.contains("New heading"));
        assert!(!preview.contains("block-controls"));
        assert!(editing.contains("block-controls"));
    }
}
