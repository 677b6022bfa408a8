// Adapters layer: concrete collaborators for the bus, the record format and the account prompt.

pub mod dbus;
pub mod picker;
pub mod vcard;

pub use dbus::SessionBusConnector;
pub use picker::PromptPicker;
pub use vcard::VCardDecoder;
