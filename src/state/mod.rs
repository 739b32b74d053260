pub mod object;
pub mod raw_event;
pub mod store;

pub use object::{AliasView, StateObject};
pub use raw_event::{BleEvent, MqttEvent, RawEvent, SourceKind};
pub use store::StateStore;
