//! Lifecycle controller (§4.8): starts/stops the pluggable components in
//! dependency order, fails fast on startup, and reloads configuration on
//! SIGHUP with rollback to the last-known-good graph. Signal wiring
//! follows the teacher's `ctrlc`-over-`mpsc` shutdown pattern, extended
//! with `signal-hook` for SIGHUP since `ctrlc` only covers SIGINT/SIGTERM.

use std::sync::mpsc;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::action::device_command::LoggingDeviceController;
use crate::action::{ActionContext, DeviceController};
use crate::cli::Cli;
use crate::config::Config;
use crate::handler::{AutomationHandler, RunnerEntry};
use crate::metrics::{MetricsConfig, MetricsHandle, MetricsServer};
use crate::rule::TriggerMode;
use crate::runner::ActionRunner;
use crate::sources::ble::{BleSource, SyntheticBleSource};
use crate::sources::mqtt::{MqttClient, RumqttcClient};
use crate::state::raw_event::SourceKind;
use crate::state::store::StateStore;
use crate::worker_pool::WorkerPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
    Reload,
}

/// Blocking action executors (shell, webhook, device-command) run on a
/// small fixed pool rather than on the thread that delivered the
/// triggering event (§5).
const ACTION_WORKER_POOL_SIZE: usize = 4;

/// One running configuration generation: the handler and the source/sink
/// components feeding it. Torn down and rebuilt wholesale on reload.
struct Graph {
    handler: Arc<AutomationHandler>,
    store: Arc<StateStore>,
    ble: SyntheticBleSource,
    mqtt: Option<RumqttcClient>,
    metrics: Option<MetricsHandle>,
    pool: Arc<WorkerPool>,
}

impl Graph {
    fn build(config: &Config) -> Result<Self> {
        let aliases = Arc::new(config.aliases.clone());
        let store = Arc::new(StateStore::new());

        let mqtt_client = RumqttcClient::new(
            config.mqtt.host.clone(),
            config.mqtt.port,
            config.mqtt.username.clone(),
            config.mqtt.password.clone(),
        );
        let mqtt_publisher = config.mqtt.enabled.then(|| mqtt_client.publish_sender());
        let device_controller: Option<Arc<dyn DeviceController>> =
            Some(Arc::new(LoggingDeviceController));
        let pool = WorkerPool::new(ACTION_WORKER_POOL_SIZE);

        let mut runners = Vec::new();
        for rule in &config.rules {
            let ctx = ActionContext {
                aliases: Arc::clone(&aliases),
                mqtt_publisher: mqtt_publisher.clone(),
                device_controller: device_controller.clone(),
            };
            let runner = match rule.mode {
                TriggerMode::Edge => ActionRunner::new_edge(
                    rule.conditions.clone(),
                    rule.actions.clone(),
                    rule.cooldown,
                    ctx,
                    Arc::clone(&pool),
                ),
                TriggerMode::Duration(d) => ActionRunner::new_duration(
                    rule.conditions.clone(),
                    d,
                    rule.actions.clone(),
                    rule.cooldown,
                    ctx,
                    Arc::clone(&pool),
                ),
            };
            runners.push(RunnerEntry {
                source: rule.source,
                topic_pattern: rule.topic.clone(),
                runner,
            });
        }

        let handler = Arc::new(AutomationHandler::with_store(
            Arc::clone(&store),
            Arc::clone(&aliases),
            runners,
        ));

        let ble = SyntheticBleSource::new(config.scanner.cycle, config.scanner.duration)?;

        Ok(Self {
            handler,
            store,
            ble,
            mqtt: config.mqtt.enabled.then_some(mqtt_client),
            metrics: None,
            pool,
        })
    }
}

pub struct LifecycleController {
    cli: Cli,
    config: Config,
    graph: Option<Graph>,
}

impl LifecycleController {
    pub fn new(cli: Cli, config: Config) -> Self {
        Self {
            cli,
            config,
            graph: None,
        }
    }

    /// Bring all enabled components up in dependency order: the handler
    /// first (it has no external dependencies), then MQTT, then the BLE
    /// scanner, then the metrics endpoint. On any failure, tear down
    /// whatever already started and return the error (§4.8 fail-fast).
    pub fn start(&mut self) -> Result<()> {
        let mut graph = Graph::build(&self.config)?;

        if let Some(mqtt) = &mut graph.mqtt {
            let handler = Arc::clone(&graph.handler);
            let topics = mqtt_topics(&self.config);
            if let Err(e) = mqtt.start(&topics, Arc::new(move |event| handler.handle(event.into_raw()))) {
                return Err(e).context("failed to start MQTT client");
            }
        }

        let handler = Arc::clone(&graph.handler);
        if let Err(e) = graph.ble.start(Arc::new(move |event| handler.handle(event.into_raw()))) {
            if let Some(mqtt) = &mut graph.mqtt {
                let _ = mqtt.stop();
            }
            return Err(e).context("failed to start BLE scanner");
        }

        if self.config.prometheus.enabled {
            let addr = format!("127.0.0.1:{}", self.config.prometheus.port)
                .parse()
                .context("invalid prometheus bind address")?;
            let server = MetricsServer::new(
                MetricsConfig {
                    addr,
                    target_addresses: self.config.prometheus.target_addresses.clone(),
                    target_metrics: self.config.prometheus.target_metrics.clone(),
                },
                Arc::clone(&graph.store),
                Arc::new(self.config.aliases.clone()),
            );
            match server.spawn() {
                Ok(handle) => graph.metrics = Some(handle),
                Err(e) => {
                    let _ = graph.ble.stop();
                    if let Some(mqtt) = &mut graph.mqtt {
                        let _ = mqtt.stop();
                    }
                    return Err(e).context("failed to start metrics server");
                }
            }
        }

        self.graph = Some(graph);
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        if let Some(mut graph) = self.graph.take() {
            teardown(&mut graph)?;
        }
        Ok(())
    }

    /// The bound address of the running metrics endpoint, if any (§4.8,
    /// used to confirm a rejected reload left the prior endpoint in place).
    pub fn metrics_addr(&self) -> Option<std::net::SocketAddr> {
        self.graph.as_ref()?.metrics.as_ref().map(|m| m.addr())
    }

    /// Number of rules currently wired into the running graph.
    pub fn rule_count(&self) -> usize {
        self.config.rules.len()
    }

    /// Reload configuration, rebuilding the whole graph. Rolls back to the
    /// previous configuration if the new one fails to start (§4.8).
    pub fn reload(&mut self) -> Result<()> {
        let new_config = match Config::load(&self.cli) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("reload aborted, config invalid: {e}");
                return Ok(());
            }
        };
        let old_config = std::mem::replace(&mut self.config, new_config);
        if let Some(mut old_graph) = self.graph.take() {
            teardown(&mut old_graph)?;
        }

        match self.start() {
            Ok(()) => {
                log::info!("reload succeeded");
                Ok(())
            }
            Err(e) => {
                log::error!("reload failed, rolling back: {e}");
                self.config = old_config;
                self.start().context("rollback to last-known-good config also failed")
            }
        }
    }

    /// Run until a shutdown signal arrives, handling reload signals in
    /// between. Returns the process exit code per §6.
    pub fn run(mut self) -> i32 {
        if let Err(e) = self.start() {
            log::error!("startup failed: {e}");
            return 1;
        }

        let (tx, rx) = mpsc::channel();
        let shutdown_tx = tx.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            let _ = shutdown_tx.send(Signal::Shutdown);
        }) {
            log::warn!("failed to install SIGINT/SIGTERM handler: {e}");
        }
        spawn_sighup_listener(tx);

        for signal in rx {
            match signal {
                Signal::Shutdown => break,
                Signal::Reload => {
                    if let Err(e) = self.reload() {
                        log::error!("reload rollback failed: {e}");
                        return 2;
                    }
                }
            }
        }

        if let Err(e) = self.stop() {
            log::error!("shutdown error: {e}");
        }
        0
    }
}

fn teardown(graph: &mut Graph) -> Result<()> {
    graph.ble.stop()?;
    if let Some(mqtt) = &mut graph.mqtt {
        mqtt.stop()?;
    }
    if let Some(metrics) = graph.metrics.take() {
        metrics.stop()?;
    }
    graph.pool.shutdown();
    Ok(())
}

fn mqtt_topics(config: &Config) -> Vec<String> {
    config
        .rules
        .iter()
        .filter(|r| r.source == SourceKind::Mqtt)
        .filter_map(|r| r.topic.clone())
        .collect()
}

fn spawn_sighup_listener(tx: mpsc::Sender<Signal>) {
    let Ok(mut signals) = signal_hook::iterator::Signals::new([signal_hook::consts::SIGHUP]) else {
        log::warn!("failed to install SIGHUP handler; reload-by-signal is unavailable");
        return;
    };
    std::thread::spawn(move || {
        for _ in signals.forever() {
            if tx.send(Signal::Reload).is_err() {
                break;
            }
        }
    });
}
