use crate::config::DiscoveryConfig;
use crate::core::catalog::SourceCatalog;
use crate::core::fetcher::DirectoryFetcher;
use crate::core::gateway::DisambiguationGateway;
use crate::core::locator::ServiceLocator;
use crate::domain::model::{Contact, DiscoverySession};
use crate::domain::ports::{AccountPicker, BusConnector, RecordDecoder};
use crate::utils::error::{DiscoveryError, Result};
use tokio_util::sync::CancellationToken;

/// Top-level contact discovery. Every call starts from a fresh connection and a fresh
/// catalog; nothing is cached between calls.
pub struct DirectoryOrchestrator<C: BusConnector, P: AccountPicker, D: RecordDecoder> {
    connector: C,
    picker: P,
    decoder: D,
    config: DiscoveryConfig,
}

impl<C: BusConnector, P: AccountPicker, D: RecordDecoder> DirectoryOrchestrator<C, P, D> {
    pub fn new(connector: C, picker: P, decoder: D, config: DiscoveryConfig) -> Self {
        Self {
            connector,
            picker,
            decoder,
            config,
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Never fails: every error degrades to an empty list and a log entry.
    pub async fn discover(&self, cancel: &CancellationToken) -> Vec<Contact> {
        let mut session = DiscoverySession::new(cancel.clone());

        match self.run(&mut session).await {
            Ok(contacts) => contacts,
            Err(DiscoveryError::Cancelled) => {
                tracing::info!("Contact discovery cancelled");
                Vec::new()
            }
            Err(e @ DiscoveryError::ServiceNotFound { .. }) => {
                tracing::info!("Contact discovery unavailable on this desktop: {}", e);
                Vec::new()
            }
            Err(e) => {
                tracing::error!(
                    "Contact discovery failed: {} (Category: {:?}); {}",
                    e,
                    e.category(),
                    e.recovery_suggestion()
                );
                Vec::new()
            }
        }
    }

    /// Discovers contacts, then lets the picker choose one of them.
    pub async fn pick_contact(&self, cancel: &CancellationToken) -> Option<Contact> {
        let contacts = self.discover(cancel).await;
        if contacts.is_empty() {
            return None;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Contact selection cancelled");
                None
            }
            contact = self.picker.pick_contact(&contacts) => contact,
        }
    }

    async fn run(&self, session: &mut DiscoverySession) -> Result<Vec<Contact>> {
        if session.is_cancelled() {
            return Err(DiscoveryError::Cancelled);
        }

        // Released when this function returns, whichever way it returns.
        let bus = self.connector.connect().await?;

        let services = ServiceLocator::new(bus.as_ref())
            .locate_all(&[
                self.config.bus.sources_service.as_str(),
                self.config.bus.address_book_service.as_str(),
            ])
            .await?;
        let [sources_service, book_service]: [_; 2] = services
            .try_into()
            .map_err(|_| DiscoveryError::Communication {
                message: "service lookup returned an unexpected number of names".to_string(),
            })?;
        tracing::info!("Using {} and {}", sources_service, book_service);

        let sources = SourceCatalog::new(bus.as_ref(), &self.config.bus, &self.config.catalog)
            .build(&sources_service)
            .await?;
        session.sources_service = Some(sources_service);
        let sources = session.sources.insert(sources);

        let gateway = DisambiguationGateway::new(&self.picker, &self.config.catalog.fallback_source);
        let Some(source_id) = gateway.resolve(sources, &session.cancel).await? else {
            return Ok(Vec::new());
        };

        let fetcher = DirectoryFetcher::new(
            bus.as_ref(),
            &self.decoder,
            &self.config.bus.address_book_factory_path,
            &self.config.fetch,
        );
        let contacts = fetcher.fetch(&book_service, &source_id, &session.cancel).await;
        session.address_book_service = Some(book_service);
        Ok(contacts)
    }
}
