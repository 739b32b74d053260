pub mod ble;
pub mod mqtt;

pub use ble::{BleSource, SyntheticBleSource};
pub use mqtt::{MqttClient, RumqttcClient};
