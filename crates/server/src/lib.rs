//! HTTP surface for CareOn pages and quote intake.

pub mod bootstrap;
pub mod cctv_quotes;
pub mod gateway;
pub mod health;
pub mod pages;
pub mod public;
pub mod revalidation;
pub mod uploads;

pub use bootstrap::{bootstrap, bootstrap_with_config, Application, BootstrapError};
pub use cctv_quotes::QuoteIntake;
pub use gateway::PageGateway;
pub use revalidation::{CacheInvalidator, EdgePurgeClient, RenderedPageCache};
pub use uploads::FsObjectStore;
