//! MQTT client source/sink (§6), a thin wrapper around `rumqttc` in the
//! teacher's `MqttRuntime` shape: a background thread drains the
//! `Connection` iterator while the handle stays on the owning thread.

use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Result};
use rumqttc::v5::mqttbytes::v5::Packet;
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{Client, Connection, Event, MqttOptions};

use crate::action::mqtt_publish::MqttPublishRequest;
use crate::state::raw_event::MqttEvent;

pub trait MqttClient: Send {
    fn start(&mut self, topics: &[String], on_event: Arc<dyn Fn(MqttEvent) + Send + Sync>) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
}

fn to_qos(qos: u8) -> QoS {
    match qos {
        1 => QoS::AtLeastOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtMostOnce,
    }
}

pub struct RumqttcClient {
    host: String,
    port: u16,
    username: Option<String>,
    password: Option<String>,
    client: Option<Client>,
    event_thread: Option<JoinHandle<()>>,
    publish_thread: Option<JoinHandle<()>>,
    publish_tx: Sender<MqttPublishRequest>,
    publish_rx: Option<Receiver<MqttPublishRequest>>,
}

impl RumqttcClient {
    pub fn new(host: String, port: u16, username: Option<String>, password: Option<String>) -> Self {
        let (tx, rx) = std::sync::mpsc::channel();
        Self {
            host,
            port,
            username,
            password,
            client: None,
            event_thread: None,
            publish_thread: None,
            publish_tx: tx,
            publish_rx: Some(rx),
        }
    }

    pub fn publish_sender(&self) -> Sender<MqttPublishRequest> {
        self.publish_tx.clone()
    }

    fn connect(&self) -> (Client, Connection) {
        let mut options = MqttOptions::new("automationd", &self.host, self.port);
        options.set_keep_alive(Duration::from_secs(30));
        options.set_clean_start(true);
        if let Some(user) = &self.username {
            options.set_credentials(user, self.password.clone().unwrap_or_default());
        }
        Client::new(options, 50)
    }
}

impl MqttClient for RumqttcClient {
    fn start(&mut self, topics: &[String], on_event: Arc<dyn Fn(MqttEvent) + Send + Sync>) -> Result<()> {
        let (client, mut connection) = self.connect();
        for topic in topics {
            client.subscribe(topic, QoS::AtMostOnce)?;
        }

        let event_thread = std::thread::spawn(move || {
            for event in connection.iter() {
                match event {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let topic = String::from_utf8_lossy(&publish.topic).to_string();
                        let payload = String::from_utf8_lossy(&publish.payload).to_string();
                        on_event(MqttEvent { topic, payload });
                    }
                    Ok(_) => {}
                    Err(e) => {
                        log::warn!("MQTT connection error: {e}");
                        break;
                    }
                }
            }
        });

        let publish_client = client.clone();
        let publish_rx = self
            .publish_rx
            .take()
            .ok_or_else(|| anyhow!("mqtt client already started"))?;
        let publish_thread = std::thread::spawn(move || {
            for request in publish_rx {
                let result = publish_client.publish(
                    &request.topic,
                    to_qos(request.qos),
                    request.retain,
                    request.payload,
                );
                if let Err(e) = result {
                    log::warn!("mqtt publish to '{}' failed: {e}", request.topic);
                }
            }
        });

        self.client = Some(client);
        self.event_thread = Some(event_thread);
        self.publish_thread = Some(publish_thread);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(client) = self.client.take() {
            client.disconnect()?;
        }
        drop(self.publish_tx.clone());
        if let Some(join) = self.event_thread.take() {
            let _ = join.join();
        }
        if let Some(join) = self.publish_thread.take() {
            let _ = join.join();
        }
        Ok(())
    }
}
