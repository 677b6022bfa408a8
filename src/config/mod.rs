#[cfg(feature = "cli")]
pub mod cli;

use crate::utils::error::{DiscoveryError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_object_path, validate_positive_duration, Validate,
};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

#[cfg(feature = "cli")]
pub use cli::CliConfig;

static ENV_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([^}]+)\}").expect("environment placeholder pattern is valid")
});

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub bus: BusConfig,
    pub catalog: CatalogConfig,
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Substring of the activatable name that owns the source registry.
    pub sources_service: String,
    /// Substring of the activatable name that serves address books.
    pub address_book_service: String,
    pub source_manager_path: String,
    pub source_interface: String,
    pub address_book_factory_path: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            sources_service: "org.gnome.evolution.dataserver.Sources".to_string(),
            address_book_service: "org.gnome.evolution.dataserver.AddressBook".to_string(),
            source_manager_path: "/org/gnome/evolution/dataserver/SourceManager".to_string(),
            source_interface: "org.gnome.evolution.dataserver.Source".to_string(),
            address_book_factory_path: "/org/gnome/evolution/dataserver/AddressBookFactory"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub address_book_marker: String,
    pub fallback_source: String,
    pub deadline_ms: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            address_book_marker: "[Address Book]".to_string(),
            fallback_source: "system-address-book".to_string(),
            deadline_ms: 5_000,
        }
    }
}

impl CatalogConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub open_timeout_ms: u64,
    pub list_timeout_ms: u64,
    pub backoff_ms: u64,
    /// Book query passed to the list call; empty selects every contact.
    pub query: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            open_timeout_ms: 1_000,
            list_timeout_ms: 2_000,
            backoff_ms: 1_000,
            query: String::new(),
        }
    }
}

impl FetchConfig {
    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }

    pub fn list_timeout(&self) -> Duration {
        Duration::from_millis(self.list_timeout_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl DiscoveryConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content);
        toml::from_str(&processed).map_err(|e| DiscoveryError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${NAME}` with the environment value; unknown names are left as written.
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR
            .replace_all(content, |caps: &Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }
}

impl Validate for DiscoveryConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("bus.sources_service", &self.bus.sources_service)?;
        validate_non_empty_string("bus.address_book_service", &self.bus.address_book_service)?;
        validate_non_empty_string("bus.source_interface", &self.bus.source_interface)?;
        validate_object_path("bus.source_manager_path", &self.bus.source_manager_path)?;
        validate_object_path(
            "bus.address_book_factory_path",
            &self.bus.address_book_factory_path,
        )?;

        validate_non_empty_string("catalog.address_book_marker", &self.catalog.address_book_marker)?;
        validate_non_empty_string("catalog.fallback_source", &self.catalog.fallback_source)?;
        validate_positive_duration("catalog.deadline_ms", self.catalog.deadline())?;

        validate_positive_duration("fetch.open_timeout_ms", self.fetch.open_timeout())?;
        validate_positive_duration("fetch.list_timeout_ms", self.fetch.list_timeout())?;
        validate_positive_duration("fetch.backoff_ms", self.fetch.backoff())?;

        Ok(())
    }
}
