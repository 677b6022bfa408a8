pub mod catalog;
pub mod fetcher;
pub mod gateway;
pub mod locator;
pub mod orchestrator;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::domain::model::{Contact, ServiceName, Source, SourceSet};
pub use crate::domain::ports::{AccountPicker, BusConnector, BusSession, RecordDecoder};
pub use crate::utils::error::Result;
