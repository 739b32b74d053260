use anyhow::{anyhow, Result};

use crate::action::{ActionContext, ActionExecutor};
use crate::placeholder;
use crate::state::object::StateObject;
use crate::action::webhook::Payload;

/// Message sent to the MQTT runtime's publish loop (§6 sink contract).
#[derive(Debug, Clone)]
pub struct MqttPublishRequest {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: u8,
    pub retain: bool,
}

#[derive(Clone)]
pub struct MqttPublishAction {
    pub topic: String,
    pub payload: Option<Payload>,
    pub qos: u8,
    pub retain: bool,
}

impl ActionExecutor for MqttPublishAction {
    fn execute(&self, state: &StateObject, ctx: &ActionContext) -> Result<()> {
        let topic = placeholder::format(state, &self.topic);
        let payload = match &self.payload {
            Some(Payload::Mapping(map)) => {
                let formatted =
                    placeholder::format_json(state, &serde_json::Value::Object(map.clone()));
                serde_json::to_vec(&formatted)?
            }
            Some(Payload::Text(text)) => placeholder::format(state, text).into_bytes(),
            None => Vec::new(),
        };
        let request = MqttPublishRequest {
            topic: topic.clone(),
            payload,
            qos: self.qos,
            retain: self.retain,
        };
        let Some(publisher) = &ctx.mqtt_publisher else {
            log::warn!("mqtt-publish action targets '{topic}' but the MQTT client is disabled");
            return Ok(());
        };
        if let Err(e) = publisher.send(request) {
            log::warn!("mqtt-publish action to '{topic}' was rejected: {e}");
        }
        Ok(())
    }
}

/// Validate the configured QoS is one of the three legal values.
pub fn validate_qos(qos: u8) -> Result<()> {
    if qos > 2 {
        return Err(anyhow!("mqtt-publish qos must be 0, 1, or 2, got {qos}"));
    }
    Ok(())
}
