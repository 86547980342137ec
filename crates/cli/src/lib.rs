pub mod commands;
pub mod remote;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "careon",
    about = "CareOn operator CLI",
    long_about = "Manage CareOn landing pages and CCTV quote requests: migrations, config inspection, page export/import, and the quote wizard.",
    after_help = "Examples:\n  careon migrate\n  careon page export --slug landing\n  careon page import --slug landing --file page-1700000000000.json\n  careon quote --endpoint http://127.0.0.1:8080\n  careon page list\n  careon quotes list --status PENDING\n  careon quotes show --id <id>"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(subcommand, about = "List, export, import, or render page block lists")]
    Page(PageCommand),
    #[command(about = "Run the CCTV quote wizard in the terminal")]
    Quote {
        #[arg(long, help = "Submit to a running server instead of the configured database")]
        endpoint: Option<String>,
        #[arg(long, help = "Skip the timed calculating messages")]
        instant: bool,
    },
    #[command(subcommand, about = "Inspect stored quote requests")]
    Quotes(QuotesCommand),
}

#[derive(Debug, Subcommand)]
enum PageCommand {
    #[command(about = "List every stored page slug")]
    List,
    #[command(about = "Write a page's blocks to page-{millis}.json, drafts included")]
    Export {
        #[arg(long)]
        slug: String,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    #[command(about = "Replace a page's blocks with an exported file, creating the page if needed")]
    Import {
        #[arg(long)]
        slug: String,
        #[arg(long)]
        file: PathBuf,
        #[arg(long, help = "Save through a running server instead of the configured database")]
        endpoint: Option<String>,
    },
    #[command(about = "Render an exported file to HTML on stdout")]
    Render {
        #[arg(long)]
        file: PathBuf,
        #[arg(long, help = "Include the editor controls")]
        editing: bool,
        #[arg(long, help = "Prefix for image URLs")]
        image_proxy: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum QuotesCommand {
    #[command(about = "List quote requests, newest first")]
    List {
        #[arg(long, help = "PENDING, CONTACTED, COMPLETED, CANCELLED, or ALL")]
        status: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    #[command(about = "Show one stored quote request")]
    Show {
        #[arg(long)]
        id: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Page(PageCommand::List) => commands::page::list(),
        Command::Page(PageCommand::Export { slug, out_dir }) => {
            commands::page::export(&slug, &out_dir)
        }
        Command::Page(PageCommand::Import { slug, file, endpoint }) => {
            commands::page::import(&slug, &file, endpoint.as_deref())
        }
        Command::Page(PageCommand::Render { file, editing, image_proxy }) => {
            match commands::page::render(&file, editing, image_proxy) {
                Ok(html) => commands::CommandResult { exit_code: 0, output: html },
                Err(failure) => failure,
            }
        }
        Command::Quote { endpoint, instant } => commands::quote::run(endpoint.as_deref(), instant),
        Command::Quotes(QuotesCommand::List { status, limit, offset }) => {
            commands::quotes::list(status.as_deref(), limit, offset)
        }
        Command::Quotes(QuotesCommand::Show { id }) => commands::quotes::show(&id),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
