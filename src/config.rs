//! Configuration loading (§6): a hierarchical document (`scanner`, `mqtt`,
//! `prometheus`, `logging`, `devices`, `automations`) read from YAML, TOML,
//! or JSON, then layered with environment and CLI overrides. Follows the
//! teacher's `read_config_file` extension-sniffing pattern, augmented with
//! a YAML branch.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::alias::{AliasTable, DeviceConfig};
use crate::cli::Cli;
use crate::rule::{Rule, RawRuleConfig};

const DEFAULT_SCANNER_CYCLE_SECS: u64 = 30;
const DEFAULT_SCANNER_DURATION_SECS: u64 = 5;
const DEFAULT_MQTT_PORT: u16 = 1883;
const DEFAULT_MQTT_RECONNECT_SECS: u64 = 5;
const DEFAULT_PROMETHEUS_PORT: u16 = 9381;
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Deserialize, Default)]
struct ScannerConfigFile {
    cycle: Option<u64>,
    duration: Option<u64>,
    interface: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct MqttConfigFile {
    enabled: Option<bool>,
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    reconnect_interval: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct PrometheusConfigFile {
    enabled: Option<bool>,
    port: Option<u16>,
    #[serde(default)]
    target_addresses: Option<Vec<String>>,
    #[serde(default)]
    target_metrics: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct LoggingConfigFile {
    level: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct RawConfig {
    #[serde(default)]
    scanner: ScannerConfigFile,
    #[serde(default)]
    mqtt: MqttConfigFile,
    #[serde(default)]
    prometheus: PrometheusConfigFile,
    #[serde(default)]
    logging: LoggingConfigFile,
    #[serde(default)]
    devices: HashMap<String, DeviceConfig>,
    #[serde(default)]
    automations: Vec<RawRuleConfig>,
}

#[derive(Debug, Clone)]
pub struct ScannerSettings {
    pub cycle: Duration,
    pub duration: Duration,
    pub interface: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub reconnect_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct PrometheusSettings {
    pub enabled: bool,
    pub port: u16,
    pub target_addresses: Option<Vec<String>>,
    pub target_metrics: Option<Vec<String>>,
}

pub struct Config {
    pub scanner: ScannerSettings,
    pub mqtt: MqttSettings,
    pub prometheus: PrometheusSettings,
    pub log_level: String,
    pub aliases: AliasTable,
    pub rules: Vec<Rule>,
}

impl Config {
    pub fn load(cli: &Cli) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => read_config_file(path)?,
            None => RawConfig::default(),
        };
        let mut cfg = Self::from_file(file)?;
        cfg.apply_cli(cli)?;
        Ok(cfg)
    }

    fn from_file(file: RawConfig) -> Result<Self> {
        let scanner = ScannerSettings {
            cycle: Duration::from_secs(file.scanner.cycle.unwrap_or(DEFAULT_SCANNER_CYCLE_SECS)),
            duration: Duration::from_secs(
                file.scanner.duration.unwrap_or(DEFAULT_SCANNER_DURATION_SECS),
            ),
            interface: file.scanner.interface,
        };
        if scanner.duration > scanner.cycle {
            return Err(anyhow!("scanner.duration must not exceed scanner.cycle"));
        }

        let mqtt = MqttSettings {
            enabled: file.mqtt.enabled.unwrap_or(false),
            host: file.mqtt.host.unwrap_or_else(|| "127.0.0.1".to_string()),
            port: file.mqtt.port.unwrap_or(DEFAULT_MQTT_PORT),
            username: file.mqtt.username,
            password: file.mqtt.password,
            reconnect_interval: Duration::from_secs(
                file.mqtt.reconnect_interval.unwrap_or(DEFAULT_MQTT_RECONNECT_SECS),
            ),
        };

        let prometheus = PrometheusSettings {
            enabled: file.prometheus.enabled.unwrap_or(true),
            port: file.prometheus.port.unwrap_or(DEFAULT_PROMETHEUS_PORT),
            target_addresses: file.prometheus.target_addresses,
            target_metrics: file.prometheus.target_metrics,
        };

        let log_level = file
            .logging
            .level
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        let aliases = AliasTable::new(file.devices)?;

        let rules = file
            .automations
            .into_iter()
            .enumerate()
            .map(|(i, raw)| Rule::from_raw(raw, &aliases, i))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            scanner,
            mqtt,
            prometheus,
            log_level,
            aliases,
            rules,
        })
    }

    fn apply_cli(&mut self, cli: &Cli) -> Result<()> {
        if let Some(cycle) = cli.scanner_cycle {
            self.scanner.cycle = Duration::from_secs(cycle);
        }
        if let Some(duration) = cli.scanner_duration {
            self.scanner.duration = Duration::from_secs(duration);
        }
        if let Some(interface) = &cli.scanner_interface {
            self.scanner.interface = Some(interface.clone());
        }
        if let Some(enabled) = cli.mqtt_enabled() {
            self.mqtt.enabled = enabled;
        }
        if let Some(host) = &cli.mqtt_host {
            self.mqtt.host = host.clone();
        }
        if let Some(port) = cli.mqtt_port {
            self.mqtt.port = port;
        }
        if cli.mqtt_username.is_some() {
            self.mqtt.username = cli.mqtt_username.clone();
        }
        if cli.mqtt_password.is_some() {
            self.mqtt.password = cli.mqtt_password.clone();
        }
        if let Some(secs) = cli.mqtt_reconnect_interval {
            self.mqtt.reconnect_interval = Duration::from_secs(secs);
        }
        if let Some(enabled) = cli.prometheus_enabled() {
            self.prometheus.enabled = enabled;
        }
        if let Some(port) = cli.prometheus_exporter_port {
            self.prometheus.port = port;
        }
        if cli.debug {
            self.log_level = "debug".to_string();
        } else if let Some(level) = &cli.log_level {
            self.log_level = level.clone();
        }
        if self.scanner.duration > self.scanner.cycle {
            return Err(anyhow!("scanner.duration must not exceed scanner.cycle"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<RawConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let cfg = match ext {
        "toml" => toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid TOML config file {}: {}", path.display(), e))?,
        "json" => serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid JSON config file {}: {}", path.display(), e))?,
        "yaml" | "yml" => serde_yaml::from_str(&raw)
            .map_err(|e| anyhow!("invalid YAML config file {}: {}", path.display(), e))?,
        _ => match serde_yaml::from_str(&raw) {
            Ok(cfg) => cfg,
            Err(yaml_err) => match toml::from_str(&raw) {
                Ok(cfg) => cfg,
                Err(toml_err) => match serde_json::from_str(&raw) {
                    Ok(cfg) => cfg,
                    Err(json_err) => {
                        return Err(anyhow!(
                            "invalid config file {} (tried YAML, TOML, JSON): yaml error: {}; toml error: {}; json error: {}",
                            path.display(),
                            yaml_err,
                            toml_err,
                            json_err
                        ));
                    }
                },
            },
        },
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn scanner_duration_exceeding_cycle_is_rejected() {
        let mut file = RawConfig::default();
        file.scanner.cycle = Some(5);
        file.scanner.duration = Some(10);
        assert!(Config::from_file(file).is_err());
    }

    #[test]
    fn defaults_produce_a_valid_config() {
        let cfg = Config::from_file(RawConfig::default()).unwrap();
        assert_eq!(cfg.mqtt.port, DEFAULT_MQTT_PORT);
        assert!(!cfg.mqtt.enabled);
        assert!(cfg.prometheus.enabled);
        assert!(cfg.rules.is_empty());
    }

    #[test]
    fn reads_yaml_config_by_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "mqtt:\n  enabled: true\n  host: broker.local\n").unwrap();
        let cfg = read_config_file(&path).unwrap();
        assert_eq!(cfg.mqtt.host.as_deref(), Some("broker.local"));
        assert_eq!(cfg.mqtt.enabled, Some(true));
    }

    #[test]
    fn reads_toml_config_by_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[mqtt]\nhost = \"broker.local\"\n").unwrap();
        let cfg = read_config_file(&path).unwrap();
        assert_eq!(cfg.mqtt.host.as_deref(), Some("broker.local"));
    }
}
