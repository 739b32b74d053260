use std::collections::HashMap;

use anyhow::{anyhow, Result};

use crate::action::{ActionContext, ActionExecutor};
use crate::placeholder;
use crate::state::object::StateObject;

/// External device-control collaborator (§6 sink contract). Real
/// implementations would speak to BLE peripherals or a vendor gateway; the
/// only implementation carried here is a logging stub, matching the
/// teacher's approach to sources it treats as synthetic for now.
pub trait DeviceController: Send + Sync {
    fn invoke(
        &self,
        address: &str,
        device_type: Option<&str>,
        method: &str,
        params: &HashMap<String, String>,
    ) -> Result<()>;
}

pub struct LoggingDeviceController;

impl DeviceController for LoggingDeviceController {
    fn invoke(
        &self,
        address: &str,
        device_type: Option<&str>,
        method: &str,
        params: &HashMap<String, String>,
    ) -> Result<()> {
        log::info!(
            "device-command: {address} ({}) . {method}({params:?})",
            device_type.unwrap_or("unknown")
        );
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum DeviceTarget {
    Alias(String),
    Address(String),
}

#[derive(Clone)]
pub struct DeviceCommandAction {
    pub target: DeviceTarget,
    pub method: String,
    pub params: HashMap<String, String>,
}

impl ActionExecutor for DeviceCommandAction {
    fn execute(&self, state: &StateObject, ctx: &ActionContext) -> Result<()> {
        let (address, device_type) = match &self.target {
            DeviceTarget::Address(addr) => (addr.clone(), None),
            DeviceTarget::Alias(alias) => {
                let device = ctx.aliases.require(alias)?;
                (device.address.clone(), device.device_type.clone())
            }
        };
        let method = placeholder::format(state, &self.method);
        let params: HashMap<String, String> = self
            .params
            .iter()
            .map(|(k, v)| (k.clone(), placeholder::format(state, v)))
            .collect();

        let Some(controller) = &ctx.device_controller else {
            log::warn!("device-command action targets '{address}' but no device controller is configured");
            return Ok(());
        };
        if let Err(e) = controller.invoke(&address, device_type.as_deref(), &method, &params) {
            log::warn!("device-command '{method}' on '{address}' failed: {e}");
        }
        Ok(())
    }
}

/// Target identification is alias XOR address, validated at load time
/// (§4.5, §7 configuration errors).
pub fn validate_target(alias: &Option<String>, address: &Option<String>) -> Result<DeviceTarget> {
    match (alias, address) {
        (Some(a), None) => Ok(DeviceTarget::Alias(a.clone())),
        (None, Some(addr)) => Ok(DeviceTarget::Address(addr.clone())),
        (Some(_), Some(_)) => Err(anyhow!(
            "device-command action must set exactly one of 'alias' or 'address', not both"
        )),
        (None, None) => Err(anyhow!(
            "device-command action must set one of 'alias' or 'address'"
        )),
    }
}
