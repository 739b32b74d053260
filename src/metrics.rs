//! Prometheus-format scrape endpoint (§6 sink contract). A minimal,
//! hand-rolled HTTP server in the teacher's `ApiServer` style: a
//! non-blocking accept loop behind an `Arc<AtomicBool>` shutdown flag,
//! manual request parsing, one blocking worker per connection.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::alias::AliasTable;
use crate::state::raw_event::RawEvent;
use crate::state::store::StateStore;
use crate::value::Value;

pub struct MetricsConfig {
    pub addr: SocketAddr,
    pub target_addresses: Option<Vec<String>>,
    pub target_metrics: Option<Vec<String>>,
}

pub struct MetricsHandle {
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl MetricsHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join().map_err(|_| anyhow!("metrics server thread panicked"))?;
        }
        Ok(())
    }
}

pub struct MetricsServer {
    cfg: MetricsConfig,
    store: Arc<StateStore>,
    aliases: Arc<AliasTable>,
}

impl MetricsServer {
    pub fn new(cfg: MetricsConfig, store: Arc<StateStore>, aliases: Arc<AliasTable>) -> Self {
        Self { cfg, store, aliases }
    }

    pub fn spawn(self) -> Result<MetricsHandle> {
        let listener = TcpListener::bind(self.cfg.addr)?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = Arc::clone(&shutdown);
        let target_addresses = self.cfg.target_addresses.clone();
        let target_metrics = self.cfg.target_metrics.clone();
        let store = self.store;
        let aliases = self.aliases;

        let join = std::thread::spawn(move || {
            if let Err(e) = run_server(listener, store, aliases, target_addresses, target_metrics, shutdown_thread) {
                log::error!("metrics server stopped: {e}");
            }
        });

        Ok(MetricsHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_server(
    listener: TcpListener,
    store: Arc<StateStore>,
    aliases: Arc<AliasTable>,
    target_addresses: Option<Vec<String>>,
    target_metrics: Option<Vec<String>>,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, _)) => {
                if let Err(e) = handle_connection(stream, &store, &aliases, &target_addresses, &target_metrics) {
                    log::warn!("metrics request failed: {e}");
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn handle_connection(
    mut stream: TcpStream,
    store: &StateStore,
    aliases: &AliasTable,
    target_addresses: &Option<Vec<String>>,
    target_metrics: &Option<Vec<String>>,
) -> Result<()> {
    let mut buf = [0u8; 1024];
    let n = stream.read(&mut buf)?;
    let request = String::from_utf8_lossy(&buf[..n]);
    let path = request.split_whitespace().nth(1).unwrap_or("/");

    if path != "/metrics" {
        write_response(&mut stream, 404, "not found")?;
        return Ok(());
    }

    let snap = store.snapshot();
    let body = render(&snap, aliases, target_addresses, target_metrics);
    write_response(&mut stream, 200, &body)
}

fn write_response(stream: &mut TcpStream, status: u16, body: &str) -> Result<()> {
    let reason = if status == 200 { "OK" } else { "Not Found" };
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes())?;
    Ok(())
}

fn render(
    snap: &std::collections::HashMap<String, RawEvent>,
    aliases: &AliasTable,
    target_addresses: &Option<Vec<String>>,
    target_metrics: &Option<Vec<String>>,
) -> String {
    let address_to_name: std::collections::HashMap<&str, &str> = aliases
        .iter()
        .map(|(name, device)| (device.address.as_str(), name.as_str()))
        .collect();

    let mut out = String::new();
    for (key, event) in snap.iter() {
        if let Some(allow) = target_addresses {
            if !allow.iter().any(|a| a == key) {
                continue;
            }
        }
        let name = address_to_name.get(key.as_str()).copied();
        if let Some(name) = name {
            let model = event
                .attributes
                .get("model_name")
                .map(|v| v.render())
                .unwrap_or_default();
            out.push_str(&format!(
                "automaton_device_info{{address=\"{key}\",name=\"{name}\",model=\"{model}\"}} 1\n"
            ));
        }
        let name = name.unwrap_or(key.as_str());

        for (attr, value) in &event.attributes {
            if let Some(allow) = target_metrics {
                if !allow.iter().any(|m| m == attr) {
                    continue;
                }
            }
            if let Some(n) = numeric(value) {
                out.push_str(&format!(
                    "automaton_{attr}{{address=\"{key}\",name=\"{name}\"}} {n}\n"
                ));
            }
        }
    }
    out
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}
