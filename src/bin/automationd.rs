//! automationd - configuration-driven automation engine for BLE and MQTT
//! home sensors. Loads a rule file, wires up the BLE scanner and MQTT
//! client, and dispatches matching rules' actions as events arrive.

use anyhow::Result;
use automatond::cli::Cli;
use automatond::config::Config;
use automatond::lifecycle::LifecycleController;
use clap::Parser;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli)?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level)).init();

    let controller = LifecycleController::new(cli, config);
    std::process::exit(controller.run());
}
