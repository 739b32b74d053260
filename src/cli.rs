//! Command-line surface (§6), one `env` fallback per flag per the
//! teacher's `event_mqtt_bridge::Args` convention.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about = "Configuration-driven automation engine for BLE and MQTT home sensors")]
pub struct Cli {
    /// Path to the configuration file (YAML, TOML, or JSON).
    #[arg(short, long, env = "AUTOMATOND_CONFIG")]
    pub config: Option<PathBuf>,

    /// Force debug-level logging regardless of the configured level.
    #[arg(short, long, env = "AUTOMATOND_DEBUG")]
    pub debug: bool,

    /// Scanner duty-cycle period in seconds.
    #[arg(long, env = "AUTOMATOND_SCANNER_CYCLE")]
    pub scanner_cycle: Option<u64>,

    /// Scanner active duration per cycle, in seconds.
    #[arg(long, env = "AUTOMATOND_SCANNER_DURATION")]
    pub scanner_duration: Option<u64>,

    /// BLE adapter interface name.
    #[arg(long, env = "AUTOMATOND_SCANNER_INTERFACE")]
    pub scanner_interface: Option<String>,

    /// Enable the MQTT client.
    #[arg(long, env = "AUTOMATOND_MQTT")]
    pub mqtt: bool,

    /// Disable the MQTT client.
    #[arg(long, conflicts_with = "mqtt")]
    pub no_mqtt: bool,

    /// MQTT broker host.
    #[arg(long, env = "AUTOMATOND_MQTT_HOST")]
    pub mqtt_host: Option<String>,

    /// MQTT broker port.
    #[arg(long, env = "AUTOMATOND_MQTT_PORT")]
    pub mqtt_port: Option<u16>,

    /// MQTT username.
    #[arg(long, env = "AUTOMATOND_MQTT_USERNAME")]
    pub mqtt_username: Option<String>,

    /// MQTT password.
    #[arg(long, env = "AUTOMATOND_MQTT_PASSWORD")]
    pub mqtt_password: Option<String>,

    /// MQTT reconnect backoff interval in seconds.
    #[arg(long, env = "AUTOMATOND_MQTT_RECONNECT_INTERVAL")]
    pub mqtt_reconnect_interval: Option<u64>,

    /// Enable the Prometheus scrape endpoint.
    #[arg(long, env = "AUTOMATOND_PROMETHEUS_EXPORTER_ENABLED")]
    pub prometheus_exporter_enabled: bool,

    /// Disable the Prometheus scrape endpoint.
    #[arg(long, conflicts_with = "prometheus_exporter_enabled")]
    pub no_prometheus_exporter_enabled: bool,

    /// Prometheus scrape endpoint port.
    #[arg(long, env = "AUTOMATOND_PROMETHEUS_EXPORTER_PORT")]
    pub prometheus_exporter_port: Option<u16>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "AUTOMATOND_LOG_LEVEL")]
    pub log_level: Option<String>,
}

impl Cli {
    pub fn mqtt_enabled(&self) -> Option<bool> {
        if self.mqtt {
            Some(true)
        } else if self.no_mqtt {
            Some(false)
        } else {
            None
        }
    }

    pub fn prometheus_enabled(&self) -> Option<bool> {
        if self.prometheus_exporter_enabled {
            Some(true)
        } else if self.no_prometheus_exporter_enabled {
            Some(false)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mqtt_enabled_reflects_whichever_flag_was_passed() {
        let mut cli = Cli::parse_from(["automationd"]);
        assert_eq!(cli.mqtt_enabled(), None);
        cli.mqtt = true;
        assert_eq!(cli.mqtt_enabled(), Some(true));
        cli.mqtt = false;
        cli.no_mqtt = true;
        assert_eq!(cli.mqtt_enabled(), Some(false));
    }
}
