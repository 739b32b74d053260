//! Action executors (§4.5): one subtype per configured action `type`.
//! Each executor formats its configuration against the firing `StateObject`
//! and then performs its effect; failures are logged, never propagated to
//! the pipeline (§7 per-action errors).

pub mod device_command;
pub mod log_action;
pub mod mqtt_publish;
pub mod shell;
pub mod webhook;

use std::sync::Arc;

use anyhow::Result;

use crate::alias::AliasTable;
use crate::state::object::StateObject;

pub use device_command::{DeviceCommandAction, DeviceController};
pub use log_action::LogAction;
pub use mqtt_publish::{MqttPublishAction, MqttPublishRequest};
pub use shell::ShellAction;
pub use webhook::WebhookAction;

/// Collaborators an executor may need beyond the firing state itself.
#[derive(Clone)]
pub struct ActionContext {
    pub aliases: Arc<AliasTable>,
    pub mqtt_publisher: Option<std::sync::mpsc::Sender<MqttPublishRequest>>,
    pub device_controller: Option<Arc<dyn DeviceController>>,
}

pub trait ActionExecutor: Send + Sync {
    fn execute(&self, state: &StateObject, ctx: &ActionContext) -> Result<()>;
}

#[derive(Clone)]
pub enum Action {
    Log(LogAction),
    Shell(ShellAction),
    Webhook(WebhookAction),
    MqttPublish(MqttPublishAction),
    DeviceCommand(DeviceCommandAction),
}

impl ActionExecutor for Action {
    fn execute(&self, state: &StateObject, ctx: &ActionContext) -> Result<()> {
        match self {
            Action::Log(a) => a.execute(state, ctx),
            Action::Shell(a) => a.execute(state, ctx),
            Action::Webhook(a) => a.execute(state, ctx),
            Action::MqttPublish(a) => a.execute(state, ctx),
            Action::DeviceCommand(a) => a.execute(state, ctx),
        }
    }
}
