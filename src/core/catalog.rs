use crate::config::{BusConfig, CatalogConfig};
use crate::domain::model::{ServiceName, Source, SourceSet};
use crate::domain::ports::BusSession;
use crate::utils::error::{DiscoveryError, Result};
use regex::Regex;
use std::sync::LazyLock;
use tokio::time::{timeout_at, Instant};

static DISPLAY_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"DisplayName=([^\n\r]+)").expect("display name pattern is valid")
});

/// Value of the first `DisplayName=` line in a source configuration blob, trimmed.
pub fn display_name(data: &str) -> Option<String> {
    DISPLAY_NAME
        .captures(data)
        .map(|caps| caps[1].trim().to_string())
}

/// Outcome of a catalog build: the accepted sources plus per-source bookkeeping.
#[derive(Debug, Default)]
pub struct CatalogReport {
    pub sources: SourceSet,
    pub skipped_kinds: usize,
    pub failed: usize,
    pub timed_out: usize,
}

enum Inspection {
    Accepted(Source),
    OtherKind,
}

pub struct SourceCatalog<'a> {
    session: &'a dyn BusSession,
    bus: &'a BusConfig,
    catalog: &'a CatalogConfig,
}

impl<'a> SourceCatalog<'a> {
    pub fn new(session: &'a dyn BusSession, bus: &'a BusConfig, catalog: &'a CatalogConfig) -> Self {
        Self {
            session,
            bus,
            catalog,
        }
    }

    pub async fn build(&self, service: &ServiceName) -> Result<SourceSet> {
        let deadline = Instant::now() + self.catalog.deadline();
        Ok(self.build_until(service, deadline).await?.sources)
    }

    /// Enumerates address-book sources. Only the object-manager call itself is fatal;
    /// a source whose properties cannot be read before `deadline` is skipped.
    pub async fn build_until(&self, service: &ServiceName, deadline: Instant) -> Result<CatalogReport> {
        let objects = self
            .session
            .managed_objects(service, &self.bus.source_manager_path)
            .await?;
        tracing::debug!("{} managed objects under {}", objects.len(), self.bus.source_manager_path);

        let mut report = CatalogReport::default();
        for object in objects
            .iter()
            .filter(|o| o.implements(&self.bus.source_interface))
        {
            match timeout_at(deadline, self.inspect(service, &object.path)).await {
                Ok(Ok(Inspection::Accepted(source))) => {
                    tracing::debug!("Address book '{}' ({})", source.label, source.id);
                    if let Some(previous) = report.sources.insert(source) {
                        tracing::debug!(
                            "Source {} shares label '{}' with a later source and is hidden",
                            previous.id,
                            previous.label
                        );
                    }
                }
                Ok(Ok(Inspection::OtherKind)) => report.skipped_kinds += 1,
                Ok(Err(e)) => {
                    tracing::warn!("Skipping source {}: {}", object.path, e);
                    report.failed += 1;
                }
                Err(_) => {
                    tracing::warn!("Skipping source {}: catalog deadline reached", object.path);
                    report.timed_out += 1;
                }
            }
        }

        tracing::info!(
            "Catalog: {} address books, {} other sources, {} failed, {} timed out",
            report.sources.len(),
            report.skipped_kinds,
            report.failed,
            report.timed_out
        );
        Ok(report)
    }

    async fn inspect(&self, service: &ServiceName, path: &str) -> Result<Inspection> {
        let interface = self.bus.source_interface.as_str();
        let id = self
            .session
            .string_property(service, path, interface, "UID")
            .await?;
        let data = self
            .session
            .string_property(service, path, interface, "Data")
            .await?;

        if !data.contains(&self.catalog.address_book_marker) {
            return Ok(Inspection::OtherKind);
        }
        if id.is_empty() {
            return Err(DiscoveryError::remote_fault("Get", "source has an empty UID"));
        }

        let label = display_name(&data).unwrap_or_default();
        Ok(Inspection::Accepted(Source { id, label }))
    }
}
