use crate::domain::model::ServiceName;
use crate::domain::ports::BusSession;
use crate::utils::error::{DiscoveryError, Result};

/// Finds the activatable instance of a service by name fragment.
pub struct ServiceLocator<'a> {
    session: &'a dyn BusSession,
}

impl<'a> ServiceLocator<'a> {
    pub fn new(session: &'a dyn BusSession) -> Self {
        Self { session }
    }

    /// First activatable name containing `pattern`. Bus errors are returned as-is, never retried.
    pub async fn locate(&self, pattern: &str) -> Result<ServiceName> {
        let names = self.session.list_activatable_names().await?;
        tracing::debug!("{} activatable names on the session bus", names.len());

        names
            .into_iter()
            .find(|name| name.contains(pattern))
            .map(ServiceName::new)
            .ok_or_else(|| DiscoveryError::ServiceNotFound {
                pattern: pattern.to_string(),
            })
    }

    /// Resolves several patterns against a single listing, failing on the first miss.
    pub async fn locate_all(&self, patterns: &[&str]) -> Result<Vec<ServiceName>> {
        let names = self.session.list_activatable_names().await?;

        patterns
            .iter()
            .map(|pattern| {
                names
                    .iter()
                    .find(|name| name.contains(pattern))
                    .map(|name| ServiceName::new(name.as_str()))
                    .ok_or_else(|| DiscoveryError::ServiceNotFound {
                        pattern: pattern.to_string(),
                    })
            })
            .collect()
    }
}
