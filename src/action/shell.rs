use anyhow::{Context, Result};

use crate::action::{ActionContext, ActionExecutor};
use crate::placeholder;
use crate::state::object::StateObject;

#[derive(Clone)]
pub struct ShellAction {
    pub argv: Vec<String>,
}

impl ActionExecutor for ShellAction {
    fn execute(&self, state: &StateObject, _ctx: &ActionContext) -> Result<()> {
        let argv: Vec<String> = self.argv.iter().map(|a| placeholder::format(state, a)).collect();
        let (program, args) = argv.split_first().context("shell action has an empty argv")?;
        let output = std::process::Command::new(program)
            .args(args)
            .output()
            .with_context(|| format!("failed to spawn shell action '{program}'"))?;
        if !output.status.success() {
            log::warn!(
                "shell action '{program}' exited with {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr)
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::AliasTable;
    use crate::state::object::AliasView;
    use crate::state::raw_event::SourceKind;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn ctx() -> ActionContext {
        ActionContext {
            aliases: Arc::new(AliasTable::new(HashMap::new()).unwrap()),
            mqtt_publisher: None,
            device_controller: None,
        }
    }

    fn state() -> StateObject {
        StateObject::new(
            SourceKind::Ble,
            "aa:bb".to_string(),
            HashMap::new(),
            None,
            Arc::new(AliasView::default()),
        )
    }

    #[test]
    fn runs_argv_without_shell_interpolation() {
        let action = ShellAction {
            argv: vec!["true".to_string()],
        };
        assert!(action.execute(&state(), &ctx()).is_ok());
    }

    #[test]
    fn non_zero_exit_is_not_an_error() {
        let action = ShellAction {
            argv: vec!["false".to_string()],
        };
        assert!(action.execute(&state(), &ctx()).is_ok());
    }
}
