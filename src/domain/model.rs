use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tokio_util::sync::CancellationToken;

/// Bus name of one running (or activatable) instance of a service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceName(String);

impl ServiceName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One property value from the object-manager tree.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Text(String),
    Flag(bool),
    Number(i64),
    Path(String),
    /// Containers and other types the engine never inspects.
    Opaque,
}

impl PropertyValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) | PropertyValue::Path(s) => Some(s),
            _ => None,
        }
    }
}

pub type PropertyMap = BTreeMap<String, PropertyValue>;

#[derive(Debug, Clone, PartialEq)]
pub struct ManagedObject {
    pub path: String,
    pub interfaces: BTreeMap<String, PropertyMap>,
}

impl ManagedObject {
    pub fn implements(&self, interface: &str) -> bool {
        self.interfaces.contains_key(interface)
    }
}

/// Object-manager response, in the order the transport delivered it.
pub type ManagedObjects = Vec<ManagedObject>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub id: String,
    /// Empty when the configuration blob carries no display name.
    pub label: String,
}

/// Sources keyed by label, in insertion order.
///
/// Labels are unique: inserting a source whose label is already present replaces the
/// earlier entry in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSet {
    sources: Vec<Source>,
}

impl SourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the source that was displaced, if any.
    pub fn insert(&mut self, source: Source) -> Option<Source> {
        match self.sources.iter_mut().find(|s| s.label == source.label) {
            Some(existing) => Some(std::mem::replace(existing, source)),
            None => {
                self.sources.push(source);
                None
            }
        }
    }

    pub fn get(&self, label: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.label == label)
    }

    pub fn labels(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.label.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl FromIterator<Source> for SourceSet {
    fn from_iter<I: IntoIterator<Item = Source>>(iter: I) -> Self {
        let mut set = SourceSet::new();
        for source in iter {
            set.insert(source);
        }
        set
    }
}

/// An address book opened by the factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookHandle {
    pub object_path: String,
    /// Bus name serving the book object.
    pub service: ServiceName,
}

/// Directory-native contact payload (vCard text) as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord(pub String);

/// Field-level view of one raw record, produced by a `RecordDecoder`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedRecord {
    pub title: String,
    pub formatted_name: String,
    pub last_name: String,
    pub phones: Vec<String>,
    pub emails: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactPhone {
    pub number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactEmail {
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contact {
    title: String,
    given_name: String,
    family_name: String,
    phones: Vec<ContactPhone>,
    emails: Vec<ContactEmail>,
    display_name: String,
}

impl Contact {
    /// Duplicate phone numbers and email addresses are collapsed, keeping first occurrence.
    pub fn new(
        title: impl Into<String>,
        given_name: impl Into<String>,
        family_name: impl Into<String>,
        phones: impl IntoIterator<Item = String>,
        emails: impl IntoIterator<Item = String>,
        display_name: impl Into<String>,
    ) -> Self {
        let mut phone_list: Vec<ContactPhone> = Vec::new();
        for number in phones {
            if !phone_list.iter().any(|p| p.number == number) {
                phone_list.push(ContactPhone { number });
            }
        }
        let mut email_list: Vec<ContactEmail> = Vec::new();
        for address in emails {
            if !email_list.iter().any(|e| e.address == address) {
                email_list.push(ContactEmail { address });
            }
        }

        Self {
            title: title.into(),
            given_name: given_name.into(),
            family_name: family_name.into(),
            phones: phone_list,
            emails: email_list,
            display_name: display_name.into(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn given_name(&self) -> &str {
        &self.given_name
    }

    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    pub fn phones(&self) -> &[ContactPhone] {
        &self.phones
    }

    pub fn emails(&self) -> &[ContactEmail] {
        &self.emails
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

impl From<DecodedRecord> for Contact {
    fn from(record: DecodedRecord) -> Self {
        let display_name = record.formatted_name.clone();
        Contact::new(
            record.title,
            record.formatted_name,
            record.last_name,
            record.phones,
            record.emails,
            display_name,
        )
    }
}

impl fmt::Display for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name)
    }
}

/// State of one discovery invocation. Created by the orchestrator per call and never shared.
#[derive(Debug)]
pub struct DiscoverySession {
    pub cancel: CancellationToken,
    pub sources_service: Option<ServiceName>,
    pub address_book_service: Option<ServiceName>,
    pub sources: Option<SourceSet>,
}

impl DiscoverySession {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            sources_service: None,
            address_book_service: None,
            sources: None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
