//! BLE scanner source (§6 source contract). The radio driver itself is an
//! external collaborator outside this repo's scope; the only
//! implementation carried here is a synthetic scanner that replays a fixed
//! advertisement fixture at the configured duty cycle, mirroring the
//! teacher's treatment of its own camera source as "synthetic for MVP".

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::state::raw_event::BleEvent;
use crate::value::Value;

pub trait BleSource: Send {
    fn start(&mut self, on_event: Arc<dyn Fn(BleEvent) + Send + Sync>) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
    fn is_running(&self) -> bool;
}

pub struct SyntheticBleSource {
    cycle: Duration,
    duration: Duration,
    fixture: Vec<BleEvent>,
    shutdown: Option<Arc<AtomicBool>>,
    join: Option<JoinHandle<()>>,
}

impl SyntheticBleSource {
    pub fn new(cycle: Duration, duration: Duration) -> Result<Self> {
        if duration > cycle {
            return Err(anyhow!("scanner duration must not exceed cycle"));
        }
        Ok(Self {
            cycle,
            duration,
            fixture: default_fixture(),
            shutdown: None,
            join: None,
        })
    }
}

fn default_fixture() -> Vec<BleEvent> {
    vec![BleEvent {
        address: "aa:bb:cc:dd:ee:ff".to_string(),
        model_name: "WoSensorTH".to_string(),
        rssi: -60,
        battery: Some(90),
        attributes: HashMap::from([
            ("temperature".to_string(), Value::Float(21.5)),
            ("humidity".to_string(), Value::Int(45)),
        ]),
    }]
}

impl BleSource for SyntheticBleSource {
    fn start(&mut self, on_event: Arc<dyn Fn(BleEvent) + Send + Sync>) -> Result<()> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = Arc::clone(&shutdown);
        let cycle = self.cycle;
        let duration = self.duration;
        let fixture = self.fixture.clone();

        let join = std::thread::spawn(move || {
            loop {
                if shutdown_thread.load(Ordering::SeqCst) {
                    break;
                }
                std::thread::sleep(duration);
                if shutdown_thread.load(Ordering::SeqCst) {
                    break;
                }
                for event in &fixture {
                    on_event(event.clone());
                }
                let remaining = cycle.saturating_sub(duration);
                std::thread::sleep(remaining);
            }
        });

        self.shutdown = Some(shutdown);
        self.join = Some(join);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(shutdown) = self.shutdown.take() {
            shutdown.store(true, Ordering::SeqCst);
        }
        if let Some(join) = self.join.take() {
            join.join().map_err(|_| anyhow!("ble scanner thread panicked"))?;
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.join.is_some()
    }
}
