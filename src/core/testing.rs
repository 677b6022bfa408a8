//! Scriptable in-memory bus shared by the engine's unit tests.

use crate::domain::model::{
    BookHandle, Contact, DecodedRecord, ManagedObject, ManagedObjects, PropertyValue, RawRecord,
    ServiceName,
};
use crate::domain::ports::{AccountPicker, BusConnector, BusSession, RecordDecoder};
use crate::utils::error::{DiscoveryError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const SOURCE_INTERFACE: &str = "org.gnome.evolution.dataserver.Source";
pub const SOURCES_SERVICE: &str = "org.gnome.evolution.dataserver.Sources5";
pub const ADDRESS_BOOK_SERVICE: &str = "org.gnome.evolution.dataserver.AddressBook10";

#[derive(Debug, Clone, Copy)]
pub enum Step {
    Ok,
    Timeout,
    RemoteFault,
    /// Never replies; only a caller-side timeout ends the call.
    Hang,
}

#[derive(Clone)]
enum SourceProps {
    Present { uid: String, data: String },
    Broken,
    Slow { uid: String, data: String },
}

#[derive(Default)]
pub struct MockBus {
    names: Vec<String>,
    fail_listing: bool,
    fail_managed_objects: bool,
    objects: ManagedObjects,
    properties: HashMap<String, SourceProps>,
    records: HashMap<String, Vec<RawRecord>>,
    open_script: Mutex<VecDeque<Step>>,
    list_script: Mutex<VecDeque<Step>>,
    cancel_on_open: Option<(usize, CancellationToken)>,
    books: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<String>>,
    opened: Mutex<Vec<String>>,
    released: AtomicUsize,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bus exposing both evolution services.
    pub fn evolution() -> Self {
        Self::new().with_names(&[
            "org.freedesktop.DBus",
            SOURCES_SERVICE,
            ADDRESS_BOOK_SERVICE,
        ])
    }

    pub fn with_names(mut self, names: &[&str]) -> Self {
        self.names = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn failing_name_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn failing_managed_objects(mut self) -> Self {
        self.fail_managed_objects = true;
        self
    }

    pub fn with_object(mut self, path: &str, interfaces: &[&str]) -> Self {
        let interfaces = interfaces
            .iter()
            .map(|i| (i.to_string(), BTreeMap::new()))
            .collect();
        self.objects.push(ManagedObject {
            path: path.to_string(),
            interfaces,
        });
        self
    }

    pub fn with_source(self, path: &str, uid: &str, data: &str) -> Self {
        self.with_source_props(
            path,
            SourceProps::Present {
                uid: uid.to_string(),
                data: data.to_string(),
            },
        )
    }

    pub fn with_address_book(self, path: &str, uid: &str, label: &str) -> Self {
        let data = format!("[Data Source]\nDisplayName={}\nEnabled=true\n\n[Address Book]\nBackendName=local\n", label);
        self.with_source(path, uid, &data)
    }

    pub fn with_broken_source(self, path: &str) -> Self {
        self.with_source_props(path, SourceProps::Broken)
    }

    pub fn with_slow_source(self, path: &str, uid: &str, data: &str) -> Self {
        self.with_source_props(
            path,
            SourceProps::Slow {
                uid: uid.to_string(),
                data: data.to_string(),
            },
        )
    }

    fn with_source_props(mut self, path: &str, props: SourceProps) -> Self {
        self.properties.insert(path.to_string(), props);
        let mut interface_props = BTreeMap::new();
        interface_props.insert(
            "Enabled".to_string(),
            PropertyValue::Flag(true),
        );
        let mut interfaces = BTreeMap::new();
        interfaces.insert(SOURCE_INTERFACE.to_string(), interface_props);
        self.objects.push(ManagedObject {
            path: path.to_string(),
            interfaces,
        });
        self
    }

    pub fn with_records(mut self, source_id: &str, vcards: &[&str]) -> Self {
        self.records.insert(
            source_id.to_string(),
            vcards.iter().map(|v| RawRecord(v.to_string())).collect(),
        );
        self
    }

    pub fn with_open_script(self, steps: &[Step]) -> Self {
        *self.open_script.lock().unwrap() = steps.iter().copied().collect();
        self
    }

    pub fn with_list_script(self, steps: &[Step]) -> Self {
        *self.list_script.lock().unwrap() = steps.iter().copied().collect();
        self
    }

    /// Cancels `token` while serving the `nth` open call (1-based).
    pub fn cancel_on_open(mut self, nth: usize, token: CancellationToken) -> Self {
        self.cancel_on_open = Some((nth, token));
        self
    }

    pub fn call_count(&self, member: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.as_str() == member)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn opened_sources(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    fn record_call(&self, member: &str) {
        self.calls.lock().unwrap().push(member.to_string());
    }

    async fn play(script: &Mutex<VecDeque<Step>>, member: &str) -> Result<()> {
        let step = script.lock().unwrap().pop_front().unwrap_or(Step::Ok);
        match step {
            Step::Ok => Ok(()),
            Step::Timeout => Err(DiscoveryError::timeout(member, Duration::from_secs(1))),
            Step::RemoteFault => Err(DiscoveryError::remote_fault(member, "scripted fault")),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl BusSession for MockBus {
    async fn list_activatable_names(&self) -> Result<Vec<String>> {
        self.record_call("ListActivatableNames");
        if self.fail_listing {
            return Err(DiscoveryError::Communication {
                message: "bus went away".to_string(),
            });
        }
        Ok(self.names.clone())
    }

    async fn managed_objects(&self, _service: &ServiceName, _path: &str) -> Result<ManagedObjects> {
        self.record_call("GetManagedObjects");
        if self.fail_managed_objects {
            return Err(DiscoveryError::Communication {
                message: "object manager unavailable".to_string(),
            });
        }
        Ok(self.objects.clone())
    }

    async fn string_property(
        &self,
        _service: &ServiceName,
        path: &str,
        _interface: &str,
        property: &str,
    ) -> Result<String> {
        self.record_call("Get");
        let props = self
            .properties
            .get(path)
            .cloned()
            .unwrap_or(SourceProps::Broken);
        let (uid, data) = match props {
            SourceProps::Present { uid, data } => (uid, data),
            SourceProps::Slow { uid, data } => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                (uid, data)
            }
            SourceProps::Broken => {
                return Err(DiscoveryError::remote_fault("Get", "no such object"))
            }
        };
        match property {
            "UID" => Ok(uid),
            "Data" => Ok(data),
            other => Err(DiscoveryError::remote_fault("Get", format!("no property {}", other))),
        }
    }

    async fn open_address_book(
        &self,
        service: &ServiceName,
        _factory_path: &str,
        source_id: &str,
    ) -> Result<BookHandle> {
        self.record_call("OpenAddressBook");
        let attempt = self.call_count("OpenAddressBook");
        if let Some((nth, token)) = &self.cancel_on_open {
            if attempt == *nth {
                token.cancel();
            }
        }
        Self::play(&self.open_script, "OpenAddressBook").await?;

        self.opened.lock().unwrap().push(source_id.to_string());
        let object_path = format!("/org/gnome/evolution/dataserver/AddressBook/{}", attempt);
        self.books
            .lock()
            .unwrap()
            .insert(object_path.clone(), source_id.to_string());
        Ok(BookHandle {
            object_path,
            service: service.clone(),
        })
    }

    async fn contact_list(&self, book: &BookHandle, _query: &str) -> Result<Vec<RawRecord>> {
        self.record_call("GetContactList");
        Self::play(&self.list_script, "GetContactList").await?;

        let source_id = self
            .books
            .lock()
            .unwrap()
            .get(&book.object_path)
            .cloned()
            .ok_or_else(|| DiscoveryError::remote_fault("GetContactList", "unknown book"))?;
        Ok(self.records.get(&source_id).cloned().unwrap_or_default())
    }
}

/// A session handed out by `MockConnector`; counts its own release.
pub struct MockSession(pub Arc<MockBus>);

impl Drop for MockSession {
    fn drop(&mut self) {
        self.0.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl BusSession for MockSession {
    async fn list_activatable_names(&self) -> Result<Vec<String>> {
        self.0.list_activatable_names().await
    }

    async fn managed_objects(&self, service: &ServiceName, path: &str) -> Result<ManagedObjects> {
        self.0.managed_objects(service, path).await
    }

    async fn string_property(
        &self,
        service: &ServiceName,
        path: &str,
        interface: &str,
        property: &str,
    ) -> Result<String> {
        self.0.string_property(service, path, interface, property).await
    }

    async fn open_address_book(
        &self,
        service: &ServiceName,
        factory_path: &str,
        source_id: &str,
    ) -> Result<BookHandle> {
        self.0.open_address_book(service, factory_path, source_id).await
    }

    async fn contact_list(&self, book: &BookHandle, query: &str) -> Result<Vec<RawRecord>> {
        self.0.contact_list(book, query).await
    }
}

pub struct MockConnector {
    pub bus: Arc<MockBus>,
    pub refuse: bool,
    pub connects: AtomicUsize,
}

impl MockConnector {
    pub fn new(bus: MockBus) -> Self {
        Self {
            bus: Arc::new(bus),
            refuse: false,
            connects: AtomicUsize::new(0),
        }
    }

    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::new(MockBus::new())
        }
    }
}

#[async_trait]
impl BusConnector for MockConnector {
    async fn connect(&self) -> Result<Box<dyn BusSession>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse {
            return Err(DiscoveryError::Connection {
                message: "no session bus address".to_string(),
            });
        }
        Ok(Box::new(MockSession(self.bus.clone())))
    }
}

/// Records every prompt and answers from a fixed script.
#[derive(Default)]
pub struct MockPicker {
    pub account_answer: Option<String>,
    pub contact_index: Option<usize>,
    /// Never answers; only cancellation ends the prompt.
    pub hang: bool,
    pub account_prompts: Mutex<Vec<Vec<String>>>,
    pub contact_prompts: AtomicUsize,
}

impl MockPicker {
    pub fn answering(label: &str) -> Self {
        Self {
            account_answer: Some(label.to_string()),
            ..Self::default()
        }
    }

    pub fn account_prompt_count(&self) -> usize {
        self.account_prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl AccountPicker for MockPicker {
    async fn pick_account(&self, labels: &[String]) -> Option<String> {
        self.account_prompts.lock().unwrap().push(labels.to_vec());
        if self.hang {
            std::future::pending::<()>().await;
        }
        self.account_answer.clone()
    }

    async fn pick_contact(&self, contacts: &[Contact]) -> Option<Contact> {
        self.contact_prompts.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        self.contact_index.and_then(|i| contacts.get(i).cloned())
    }
}

/// Decodes `name|phone|email`; payloads starting with `!` are rejected.
pub struct PipeDecoder;

impl RecordDecoder for PipeDecoder {
    fn decode(&self, record: &RawRecord) -> Result<DecodedRecord> {
        if record.0.starts_with('!') {
            return Err(DiscoveryError::decode(format!("malformed record {}", record.0)));
        }
        let mut parts = record.0.split('|');
        let formatted_name = parts.next().unwrap_or_default().to_string();
        let phones = parts.next().map(|p| vec![p.to_string()]).unwrap_or_default();
        let emails = parts.next().map(|e| vec![e.to_string()]).unwrap_or_default();
        Ok(DecodedRecord {
            last_name: formatted_name
                .rsplit(' ')
                .next()
                .unwrap_or_default()
                .to_string(),
            formatted_name,
            phones,
            emails,
            ..DecodedRecord::default()
        })
    }
}
