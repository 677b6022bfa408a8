//! Session-bus transport backed by `zbus`.

use crate::domain::model::{
    BookHandle, ManagedObject, ManagedObjects, PropertyValue, RawRecord, ServiceName,
};
use crate::domain::ports::{BusConnector, BusSession};
use crate::utils::error::{DiscoveryError, Result};
use async_trait::async_trait;
use zbus::fdo::{DBusProxy, ObjectManagerProxy, PropertiesProxy};
use zbus::message::Body;
use zbus::names::InterfaceName;
use zbus::proxy::CacheProperties;
use zbus::zvariant::Value;
use zbus::Connection;

const ADDRESS_BOOK_FACTORY_INTERFACE: &str = "org.gnome.evolution.dataserver.AddressBookFactory";
const ADDRESS_BOOK_INTERFACE: &str = "org.gnome.evolution.dataserver.AddressBook";

/// Opens a fresh connection to the user's session bus per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionBusConnector;

#[async_trait]
impl BusConnector for SessionBusConnector {
    async fn connect(&self) -> Result<Box<dyn BusSession>> {
        let conn = Connection::session()
            .await
            .map_err(|e| DiscoveryError::Connection {
                message: e.to_string(),
            })?;
        tracing::debug!("Connected to D-Bus session bus");
        Ok(Box::new(ZbusSession { conn }))
    }
}

pub struct ZbusSession {
    conn: Connection,
}

impl Drop for ZbusSession {
    fn drop(&mut self) {
        tracing::debug!("Releasing D-Bus session connection");
    }
}

/// Method errors are faults raised by the remote side; everything else is transport trouble.
fn from_zbus(member: &str, err: zbus::Error) -> DiscoveryError {
    match err {
        zbus::Error::MethodError(name, detail, _) => DiscoveryError::remote_fault(
            member,
            format!("{}: {}", name, detail.unwrap_or_default()),
        ),
        zbus::Error::FDO(fdo) => from_fdo(member, *fdo),
        other => DiscoveryError::Communication {
            message: format!("{} failed: {}", member, other),
        },
    }
}

fn from_fdo(member: &str, err: zbus::fdo::Error) -> DiscoveryError {
    match err {
        zbus::fdo::Error::ZBus(inner) => from_zbus(member, inner),
        other => DiscoveryError::remote_fault(member, other.to_string()),
    }
}

fn property_value(value: &Value<'_>) -> PropertyValue {
    match value {
        Value::Str(s) => PropertyValue::Text(s.to_string()),
        Value::Bool(b) => PropertyValue::Flag(*b),
        Value::U8(n) => PropertyValue::Number(i64::from(*n)),
        Value::I16(n) => PropertyValue::Number(i64::from(*n)),
        Value::U16(n) => PropertyValue::Number(i64::from(*n)),
        Value::I32(n) => PropertyValue::Number(i64::from(*n)),
        Value::U32(n) => PropertyValue::Number(i64::from(*n)),
        Value::I64(n) => PropertyValue::Number(*n),
        Value::U64(n) => i64::try_from(*n)
            .map(PropertyValue::Number)
            .unwrap_or(PropertyValue::Opaque),
        Value::ObjectPath(p) => PropertyValue::Path(p.to_string()),
        Value::Value(inner) => property_value(inner),
        _ => PropertyValue::Opaque,
    }
}

/// Maps an `OpenAddressBook` reply to the book it opened. Older factories reply with the
/// object path alone; an empty or missing bus name means the book lives on `located`.
fn book_from_reply(body: &Body, located: &ServiceName) -> zbus::Result<BookHandle> {
    let (object_path, bus_name) = body
        .deserialize::<(String, String)>()
        .or_else(|_| body.deserialize::<String>().map(|p| (p, String::new())))?;

    let service = if bus_name.is_empty() {
        located.clone()
    } else {
        ServiceName::new(bus_name)
    };
    Ok(BookHandle {
        object_path,
        service,
    })
}

#[async_trait]
impl BusSession for ZbusSession {
    async fn list_activatable_names(&self) -> Result<Vec<String>> {
        let member = "ListActivatableNames";
        let proxy = DBusProxy::new(&self.conn)
            .await
            .map_err(|e| from_zbus(member, e))?;
        let names = proxy
            .list_activatable_names()
            .await
            .map_err(|e| from_fdo(member, e))?;
        Ok(names.into_iter().map(|n| n.to_string()).collect())
    }

    async fn managed_objects(&self, service: &ServiceName, path: &str) -> Result<ManagedObjects> {
        let member = "GetManagedObjects";
        let proxy = ObjectManagerProxy::builder(&self.conn)
            .destination(service.as_str())
            .and_then(|b| b.path(path))
            .map_err(|e| from_zbus(member, e))?
            .cache_properties(CacheProperties::No)
            .build()
            .await
            .map_err(|e| from_zbus(member, e))?;
        let tree = proxy
            .get_managed_objects()
            .await
            .map_err(|e| from_fdo(member, e))?;

        Ok(tree
            .into_iter()
            .map(|(object_path, interfaces)| ManagedObject {
                path: object_path.to_string(),
                interfaces: interfaces
                    .into_iter()
                    .map(|(interface, props)| {
                        let props = props
                            .iter()
                            .map(|(name, value)| (name.clone(), property_value(value)))
                            .collect();
                        (interface.to_string(), props)
                    })
                    .collect(),
            })
            .collect())
    }

    async fn string_property(
        &self,
        service: &ServiceName,
        path: &str,
        interface: &str,
        property: &str,
    ) -> Result<String> {
        let member = "Get";
        let interface_name =
            InterfaceName::try_from(interface).map_err(|e| from_zbus(member, e.into()))?;
        let proxy = PropertiesProxy::builder(&self.conn)
            .destination(service.as_str())
            .and_then(|b| b.path(path))
            .map_err(|e| from_zbus(member, e))?
            .cache_properties(CacheProperties::No)
            .build()
            .await
            .map_err(|e| from_zbus(member, e))?;
        let value = proxy
            .get(interface_name, property)
            .await
            .map_err(|e| from_fdo(member, e))?;

        match property_value(&value) {
            PropertyValue::Text(text) => Ok(text),
            other => Err(DiscoveryError::remote_fault(
                member,
                format!("{}.{} is not a string: {:?}", interface, property, other),
            )),
        }
    }

    async fn open_address_book(
        &self,
        service: &ServiceName,
        factory_path: &str,
        source_id: &str,
    ) -> Result<BookHandle> {
        let member = "OpenAddressBook";
        let reply = self
            .conn
            .call_method(
                Some(service.as_str()),
                factory_path,
                Some(ADDRESS_BOOK_FACTORY_INTERFACE),
                member,
                &source_id,
            )
            .await
            .map_err(|e| from_zbus(member, e))?;

        book_from_reply(&reply.body(), service).map_err(|e| from_zbus(member, e))
    }

    async fn contact_list(&self, book: &BookHandle, query: &str) -> Result<Vec<RawRecord>> {
        let member = "GetContactList";
        let reply = self
            .conn
            .call_method(
                Some(book.service.as_str()),
                book.object_path.as_str(),
                Some(ADDRESS_BOOK_INTERFACE),
                member,
                &query,
            )
            .await
            .map_err(|e| from_zbus(member, e))?;

        let vcards: Vec<String> = reply
            .body()
            .deserialize()
            .map_err(|e| from_zbus(member, e))?;
        Ok(vcards.into_iter().map(RawRecord).collect())
    }
}
