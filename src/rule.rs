//! Rule configuration: the raw deserialized shape plus a validated runtime
//! shape built from it (§3 Rule, §7 configuration errors), following the
//! teacher's two-stage `RawConfig` -> validated `Config` pattern.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::action::webhook::{HttpMethod, Payload};
use crate::action::{device_command, log_action, mqtt_publish, Action};
use crate::alias::AliasTable;
use crate::state::raw_event::SourceKind;

#[derive(Debug, Deserialize, Default)]
pub struct RawActionConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub argv: Option<Vec<String>>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub qos: Option<u8>,
    #[serde(default)]
    pub retain: Option<bool>,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub params: Option<HashMap<String, String>>,
}

fn parse_payload(value: &Option<serde_json::Value>) -> Option<Payload> {
    match value {
        Some(serde_json::Value::Object(map)) => Some(Payload::Mapping(map.clone())),
        Some(serde_json::Value::String(s)) => Some(Payload::Text(s.clone())),
        Some(other) => Some(Payload::Text(other.to_string())),
        None => None,
    }
}

pub fn build_action(raw: &RawActionConfig) -> Result<Action> {
    match raw.kind.as_str() {
        "log" => Ok(Action::Log(crate::action::LogAction {
            level: raw
                .level
                .as_deref()
                .map(|l| {
                    log_action::LogLevel::parse(l)
                        .ok_or_else(|| anyhow!("unknown log level '{l}'"))
                })
                .transpose()?
                .unwrap_or_default(),
            message: raw
                .message
                .clone()
                .ok_or_else(|| anyhow!("log action requires 'message'"))?,
        })),
        "shell" => Ok(Action::Shell(crate::action::ShellAction {
            argv: raw
                .argv
                .clone()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| anyhow!("shell action requires a non-empty 'argv'"))?,
        })),
        "webhook" => Ok(Action::Webhook(crate::action::WebhookAction {
            url: raw
                .url
                .clone()
                .ok_or_else(|| anyhow!("webhook action requires 'url'"))?,
            method: raw
                .method
                .as_deref()
                .map(|m| HttpMethod::parse(m).ok_or_else(|| anyhow!("unknown HTTP method '{m}'")))
                .transpose()?
                .unwrap_or_default(),
            headers: raw.headers.clone().unwrap_or_default(),
            payload: parse_payload(&raw.payload),
        })),
        "mqtt-publish" => {
            let qos = raw.qos.unwrap_or(0);
            mqtt_publish::validate_qos(qos)?;
            Ok(Action::MqttPublish(crate::action::MqttPublishAction {
                topic: raw
                    .topic
                    .clone()
                    .ok_or_else(|| anyhow!("mqtt-publish action requires 'topic'"))?,
                payload: parse_payload(&raw.payload),
                qos,
                retain: raw.retain.unwrap_or(false),
            }))
        }
        "device-command" => {
            let target = device_command::validate_target(&raw.alias, &raw.address)?;
            Ok(Action::DeviceCommand(crate::action::DeviceCommandAction {
                target,
                method: raw
                    .method
                    .clone()
                    .ok_or_else(|| anyhow!("device-command action requires 'method'"))?,
                params: raw.params.clone().unwrap_or_default(),
            }))
        }
        other => Err(anyhow!("unknown action type '{other}'")),
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct RawTriggerConfig {
    pub source: String,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub conditions: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct RawRuleConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub cooldown: Option<f64>,
    #[serde(rename = "if")]
    pub trigger: RawTriggerConfig,
    #[serde(rename = "then")]
    pub actions: Vec<RawActionConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMode {
    Edge,
    Duration(std::time::Duration),
}

/// Validated, load-ready rule: `if`/`then` resolved into a trigger mode,
/// condition map (with any `device` alias injected), and built `Action`s.
pub struct Rule {
    pub name: String,
    pub source: SourceKind,
    pub topic: Option<String>,
    pub mode: TriggerMode,
    pub conditions: HashMap<String, String>,
    pub cooldown: Duration,
    pub actions: Vec<Action>,
}

impl Rule {
    pub fn from_raw(raw: RawRuleConfig, aliases: &AliasTable, index: usize) -> Result<Rule> {
        let name = raw
            .name
            .clone()
            .unwrap_or_else(|| format!("rule#{index}"));
        let source = SourceKind::parse(&raw.trigger.source)
            .ok_or_else(|| anyhow!("rule '{name}': unknown source '{}'", raw.trigger.source))?;

        match (source, &raw.trigger.topic) {
            (SourceKind::Mqtt, None) => {
                return Err(anyhow!("rule '{name}': mqtt-event rules require 'topic'"))
            }
            (SourceKind::Ble, Some(_)) => {
                return Err(anyhow!("rule '{name}': 'topic' is only valid for mqtt-event rules"))
            }
            _ => {}
        }

        let mut conditions = raw.trigger.conditions.clone();
        if let Some(alias) = &raw.trigger.device {
            let device = aliases
                .require(alias)
                .with_context(|| format!("rule '{name}' references device"))?;
            conditions.insert("address".to_string(), format!("=={}", device.address));
        }

        let mode = match raw.trigger.duration {
            Some(secs) if secs > 0.0 => TriggerMode::Duration(Duration::from_secs_f64(secs)),
            Some(_) => return Err(anyhow!("rule '{name}': 'duration' must be positive")),
            None => TriggerMode::Edge,
        };

        let actions = raw
            .actions
            .iter()
            .map(build_action)
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("rule '{name}' has an invalid action"))?;
        if actions.is_empty() {
            return Err(anyhow!("rule '{name}' has no actions"));
        }

        Ok(Rule {
            name,
            source,
            topic: raw.trigger.topic,
            mode,
            conditions,
            cooldown: raw.cooldown.map(Duration::from_secs_f64).unwrap_or_default(),
            actions,
        })
    }
}

/// Standard MQTT `+`/`#` wildcard topic matching (§4.7).
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let pattern_levels: Vec<&str> = pattern.split('/').collect();
    let topic_levels: Vec<&str> = topic.split('/').collect();
    for (i, p) in pattern_levels.iter().enumerate() {
        if *p == "#" {
            return true;
        }
        match topic_levels.get(i) {
            Some(t) if *p == "+" || p == t => continue,
            _ => return false,
        }
    }
    pattern_levels.len() == topic_levels.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_matches_plus_wildcard_one_level() {
        assert!(topic_matches("home/+/temperature", "home/kitchen/temperature"));
        assert!(!topic_matches("home/+/temperature", "home/kitchen/sub/temperature"));
    }

    #[test]
    fn topic_matches_hash_wildcard_remaining_levels() {
        assert!(topic_matches("home/#", "home/kitchen/temperature"));
        assert!(topic_matches("home/#", "home"));
    }

    #[test]
    fn topic_matches_exact() {
        assert!(topic_matches("home/kitchen/temperature", "home/kitchen/temperature"));
        assert!(!topic_matches("home/kitchen/temperature", "home/kitchen/humidity"));
    }

    #[test]
    fn ble_rule_rejects_topic() {
        let raw = RawRuleConfig {
            trigger: RawTriggerConfig {
                source: "ble-event".to_string(),
                topic: Some("x".to_string()),
                ..Default::default()
            },
            actions: vec![RawActionConfig {
                kind: "log".to_string(),
                message: Some("hi".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let aliases = AliasTable::new(HashMap::new()).unwrap();
        assert!(Rule::from_raw(raw, &aliases, 0).is_err());
    }

    #[test]
    fn mqtt_rule_requires_topic() {
        let raw = RawRuleConfig {
            trigger: RawTriggerConfig {
                source: "mqtt-event".to_string(),
                ..Default::default()
            },
            actions: vec![RawActionConfig {
                kind: "log".to_string(),
                message: Some("hi".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let aliases = AliasTable::new(HashMap::new()).unwrap();
        assert!(Rule::from_raw(raw, &aliases, 0).is_err());
    }
}
