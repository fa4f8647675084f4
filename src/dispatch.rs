//! Allowlisted local action dispatch.
//!
//! Maps an untrusted action identifier to a script under a fixed
//! directory and runs it with the caller's arguments passed verbatim
//! (argv, never a shell). Both gate checks run before anything is
//! spawned: identifier validation and, for symlinked scripts, link
//! containment.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::gate::{validate_local_link, ActionPolicy};

/// Runs allowlisted actions as child processes.
pub struct Dispatcher {
    policy: ActionPolicy,
    interpreter: Option<String>,
}

impl Dispatcher {
    /// Dispatcher that executes resolved scripts directly.
    pub fn new(policy: ActionPolicy) -> Self {
        Self {
            policy,
            interpreter: None,
        }
    }

    /// Run scripts through an interpreter (e.g. `python3`) instead of
    /// executing them directly.
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = Some(interpreter.into());
        self
    }

    /// Validate an action identifier and resolve it to a script path
    /// without running anything.
    pub fn resolve(&self, action: &str) -> Result<PathBuf> {
        self.policy.validate_action(action).into_result()?;
        let script = self.policy.resolve(&self.policy.normalize(action));

        if !script.exists() {
            return Err(Error::Dispatch(format!(
                "allowlisted script {} is missing",
                script.display()
            )));
        }
        validate_local_link(&script, self.policy.base_dir()).into_result()?;
        Ok(script)
    }

    /// Run an action with arguments and return the child's exit code.
    ///
    /// Arguments are forwarded verbatim as argv entries; quoting and shell
    /// metacharacters have no meaning here. A gate rejection returns
    /// before any process is spawned.
    pub async fn run(&self, action: &str, args: &[String]) -> Result<i32> {
        let script = self.resolve(action)?;

        tracing::info!(action, script = %script.display(), "dispatching");
        let mut command = match &self.interpreter {
            Some(interpreter) => {
                let mut c = tokio::process::Command::new(interpreter);
                c.arg(&script);
                c
            }
            None => tokio::process::Command::new(&script),
        };
        command.args(args);
        if let Some(dir) = self.policy.base_dir().parent() {
            command.current_dir(dir);
        }

        let status = command
            .status()
            .await
            .map_err(|e| Error::Dispatch(format!("failed to spawn {}: {e}", script.display())))?;

        let code = status.code().unwrap_or_else(|| {
            tracing::warn!(action, "child terminated by signal");
            1
        });
        tracing::debug!(action, code, "action finished");
        Ok(code)
    }
}
