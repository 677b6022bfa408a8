use crate::config::FetchConfig;
use crate::domain::model::{BookHandle, Contact, RawRecord, ServiceName};
use crate::domain::ports::{BusSession, RecordDecoder};
use crate::utils::error::{DiscoveryError, Result};
use tokio_util::sync::CancellationToken;

/// Contacts decoded from one listing, and how many records were dropped.
#[derive(Debug, Default)]
pub struct DecodeOutcome {
    pub contacts: Vec<Contact>,
    pub failures: usize,
}

/// Decodes every record independently; a malformed record is counted and dropped.
pub fn decode_records(decoder: &dyn RecordDecoder, records: &[RawRecord]) -> DecodeOutcome {
    records
        .iter()
        .enumerate()
        .fold(DecodeOutcome::default(), |mut outcome, (index, record)| {
            match decoder.decode(record) {
                Ok(decoded) => outcome.contacts.push(Contact::from(decoded)),
                Err(e) => {
                    tracing::warn!("Dropping record #{}: {}", index, e);
                    outcome.failures += 1;
                }
            }
            outcome
        })
}

enum FetchState {
    Open,
    List(BookHandle),
    Decode(Vec<RawRecord>),
    Done(Vec<Contact>),
}

/// Opens one address book and lists its contacts, retrying from `Open` until cancelled.
pub struct DirectoryFetcher<'a> {
    session: &'a dyn BusSession,
    decoder: &'a dyn RecordDecoder,
    factory_path: &'a str,
    config: &'a FetchConfig,
}

impl<'a> DirectoryFetcher<'a> {
    pub fn new(
        session: &'a dyn BusSession,
        decoder: &'a dyn RecordDecoder,
        factory_path: &'a str,
        config: &'a FetchConfig,
    ) -> Self {
        Self {
            session,
            decoder,
            factory_path,
            config,
        }
    }

    /// Returns an empty list once `cancel` fires. Cancellation is observed before each
    /// attempt and during backoff, never while a remote call is in flight.
    pub async fn fetch(
        &self,
        service: &ServiceName,
        source_id: &str,
        cancel: &CancellationToken,
    ) -> Vec<Contact> {
        let mut attempt = 0u32;
        let mut state = FetchState::Open;

        loop {
            state = match state {
                FetchState::Open => {
                    if cancel.is_cancelled() {
                        tracing::info!(
                            "Fetch of '{}' cancelled after {} attempt(s)",
                            source_id,
                            attempt
                        );
                        return Vec::new();
                    }
                    attempt += 1;
                    match self.open(service, source_id).await {
                        Ok(book) => FetchState::List(book),
                        Err(e) => {
                            self.back_off(attempt, &e, cancel).await;
                            FetchState::Open
                        }
                    }
                }
                FetchState::List(book) => match self.list(&book).await {
                    Ok(records) => FetchState::Decode(records),
                    Err(e) => {
                        self.back_off(attempt, &e, cancel).await;
                        FetchState::Open
                    }
                },
                FetchState::Decode(records) => {
                    let outcome = decode_records(self.decoder, &records);
                    tracing::info!(
                        "Fetched {} contacts from '{}' on attempt {} ({} undecodable)",
                        outcome.contacts.len(),
                        source_id,
                        attempt,
                        outcome.failures
                    );
                    FetchState::Done(outcome.contacts)
                }
                FetchState::Done(contacts) => return contacts,
            };
        }
    }

    async fn open(&self, service: &ServiceName, source_id: &str) -> Result<BookHandle> {
        let limit = self.config.open_timeout();
        let call = self
            .session
            .open_address_book(service, self.factory_path, source_id);
        let book = tokio::time::timeout(limit, call)
            .await
            .map_err(|_| DiscoveryError::timeout("OpenAddressBook", limit))??;
        tracing::debug!("Opened '{}' at {} on {}", source_id, book.object_path, book.service);
        Ok(book)
    }

    async fn list(&self, book: &BookHandle) -> Result<Vec<RawRecord>> {
        let limit = self.config.list_timeout();
        let call = self.session.contact_list(book, &self.config.query);
        let records = tokio::time::timeout(limit, call)
            .await
            .map_err(|_| DiscoveryError::timeout("GetContactList", limit))??;
        tracing::debug!("{} records in {}", records.len(), book.object_path);
        Ok(records)
    }

    async fn back_off(&self, attempt: u32, error: &DiscoveryError, cancel: &CancellationToken) {
        let delay = self.config.backoff();
        tracing::warn!(
            "Address book attempt {} failed: {}; retrying in {:?}",
            attempt,
            error,
            delay
        );
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => {}
        }
    }
}
