//! Device alias table: name -> entity key plus device-control metadata.
//!
//! Mirrors the teacher crate's `ZonePolicy` shape — a validated, normalized
//! config struct built once at load/reload time and consulted read-only
//! afterwards.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use serde::Deserialize;

/// Attribute names common enough across BLE/MQTT models that an alias
/// sharing one of them is worth a load-time warning (§9 placeholder
/// precedence note).
const COMMON_ATTRIBUTE_NAMES: &[&str] = &[
    "address",
    "model_name",
    "rssi",
    "battery",
    "temperature",
    "humidity",
    "is_on",
    "contact_open",
    "motion_detected",
    "button_count",
    "position",
    "in_motion",
    "is_light",
    "topic",
    "payload",
];

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub address: String,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub params: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    devices: HashMap<String, DeviceConfig>,
}

impl AliasTable {
    pub fn new(devices: HashMap<String, DeviceConfig>) -> Result<Self> {
        for alias in devices.keys() {
            if COMMON_ATTRIBUTE_NAMES.contains(&alias.as_str()) {
                log::warn!(
                    "device alias '{alias}' collides with a common attribute name; \
                     bare placeholder/condition references to '{alias}' always resolve \
                     to the triggering attribute, never to this alias"
                );
            }
        }
        Ok(Self { devices })
    }

    pub fn resolve(&self, alias: &str) -> Option<&str> {
        self.devices.get(alias).map(|d| d.address.as_str())
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.devices.contains_key(alias)
    }

    pub fn get(&self, alias: &str) -> Option<&DeviceConfig> {
        self.devices.get(alias)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DeviceConfig)> {
        self.devices.iter()
    }

    /// Validate that a rule-referenced alias exists (§7 config errors).
    pub fn require(&self, alias: &str) -> Result<&DeviceConfig> {
        self.devices
            .get(alias)
            .ok_or_else(|| anyhow!("unknown device alias '{alias}' referenced by a rule"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> AliasTable {
        let mut devices = HashMap::new();
        devices.insert(
            "meter".to_string(),
            DeviceConfig {
                address: "aa:bb:cc:dd:ee:ff".to_string(),
                device_type: Some("WoSensorTH".to_string()),
                params: HashMap::new(),
            },
        );
        AliasTable::new(devices).unwrap()
    }

    #[test]
    fn resolve_returns_address_for_known_alias() {
        assert_eq!(table().resolve("meter"), Some("aa:bb:cc:dd:ee:ff"));
    }

    #[test]
    fn resolve_returns_none_for_unknown_alias() {
        assert_eq!(table().resolve("nope"), None);
    }

    #[test]
    fn require_errors_for_unknown_alias() {
        assert!(table().require("nope").is_err());
    }
}
