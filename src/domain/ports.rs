use crate::domain::model::{
    BookHandle, Contact, DecodedRecord, ManagedObjects, RawRecord, ServiceName,
};
use crate::utils::error::Result;
use async_trait::async_trait;

/// One connection to the session bus.
///
/// Dropping the session releases the connection.
#[async_trait]
pub trait BusSession: Send + Sync {
    async fn list_activatable_names(&self) -> Result<Vec<String>>;

    async fn managed_objects(&self, service: &ServiceName, path: &str) -> Result<ManagedObjects>;

    async fn string_property(
        &self,
        service: &ServiceName,
        path: &str,
        interface: &str,
        property: &str,
    ) -> Result<String>;

    async fn open_address_book(
        &self,
        service: &ServiceName,
        factory_path: &str,
        source_id: &str,
    ) -> Result<BookHandle>;

    async fn contact_list(&self, book: &BookHandle, query: &str) -> Result<Vec<RawRecord>>;
}

#[async_trait]
pub trait BusConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn BusSession>>;
}

/// Interactive chooser for accounts and contacts. `None` means the user made no selection.
#[async_trait]
pub trait AccountPicker: Send + Sync {
    async fn pick_account(&self, labels: &[String]) -> Option<String>;
    async fn pick_contact(&self, contacts: &[Contact]) -> Option<Contact>;
}

pub trait RecordDecoder: Send + Sync {
    fn decode(&self, record: &RawRecord) -> Result<DecodedRecord>;
}
