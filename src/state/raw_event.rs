//! Source-specific raw events.
//!
//! A `RawEvent` is whatever a source delivered: a stable entity key plus a
//! flat attribute map. BLE and MQTT sources produce these; everything
//! downstream (the store, the condition evaluator, the formatter) only
//! ever sees the flat map, never the source-specific record.

use std::collections::HashMap;

use crate::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Ble,
    Mqtt,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Ble => "ble-event",
            SourceKind::Mqtt => "mqtt-event",
        }
    }

    pub fn parse(raw: &str) -> Option<SourceKind> {
        match raw {
            "ble-event" => Some(SourceKind::Ble),
            "mqtt-event" => Some(SourceKind::Mqtt),
            _ => None,
        }
    }
}

/// One observed advertisement from the BLE scanner.
#[derive(Clone, Debug)]
pub struct BleEvent {
    pub address: String,
    pub model_name: String,
    pub rssi: i64,
    pub battery: Option<i64>,
    pub attributes: HashMap<String, Value>,
}

impl BleEvent {
    pub fn key(&self) -> String {
        self.address.to_lowercase()
    }

    pub fn into_raw(self) -> RawEvent {
        let key = self.key();
        let mut attributes = self.attributes;
        attributes.insert("address".to_string(), Value::Str(key.clone()));
        attributes.insert("model_name".to_string(), Value::Str(self.model_name));
        attributes.insert("rssi".to_string(), Value::Int(self.rssi));
        attributes.insert(
            "battery".to_string(),
            self.battery.map(Value::Int).unwrap_or(Value::Null),
        );
        RawEvent {
            kind: SourceKind::Ble,
            key,
            attributes,
        }
    }
}

/// One MQTT message delivered by the broker client.
#[derive(Clone, Debug)]
pub struct MqttEvent {
    pub topic: String,
    pub payload: String,
}

impl MqttEvent {
    pub fn key(&self) -> String {
        self.topic.clone()
    }

    pub fn into_raw(self) -> RawEvent {
        let mut attributes = HashMap::new();
        attributes.insert("topic".to_string(), Value::Str(self.topic.clone()));
        attributes.insert("payload".to_string(), Value::Str(self.payload.clone()));
        if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(&self.payload) {
            for (k, v) in map {
                attributes.insert(k, Value::from_json(&v));
            }
        }
        RawEvent {
            kind: SourceKind::Mqtt,
            key: self.topic,
            attributes,
        }
    }
}

/// The unified, source-erased record stored per entity key.
#[derive(Clone, Debug)]
pub struct RawEvent {
    pub kind: SourceKind,
    pub key: String,
    pub attributes: HashMap<String, Value>,
}
