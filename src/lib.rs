pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use config::DiscoveryConfig;
pub use core::orchestrator::DirectoryOrchestrator;
pub use domain::model::{Contact, ContactEmail, ContactPhone};
pub use tokio_util::sync::CancellationToken;
pub use utils::error::{DiscoveryError, Result};
