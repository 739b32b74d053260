use anyhow::Result;

use crate::action::{ActionContext, ActionExecutor};
use crate::placeholder;
use crate::state::object::StateObject;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn parse(raw: &str) -> Option<LogLevel> {
        match raw.to_ascii_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct LogAction {
    pub level: LogLevel,
    pub message: String,
}

impl ActionExecutor for LogAction {
    fn execute(&self, state: &StateObject, _ctx: &ActionContext) -> Result<()> {
        let message = placeholder::format(state, &self.message);
        match self.level {
            LogLevel::Error => log::error!("{message}"),
            LogLevel::Warn => log::warn!("{message}"),
            LogLevel::Info => log::info!("{message}"),
            LogLevel::Debug => log::debug!("{message}"),
            LogLevel::Trace => log::trace!("{message}"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_levels_case_insensitively() {
        assert_eq!(LogLevel::parse("INFO"), Some(LogLevel::Info));
        assert_eq!(LogLevel::parse("Warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("nonsense"), None);
    }

    #[test]
    fn default_level_is_info() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }
}
