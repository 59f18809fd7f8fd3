use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, trace};

use super::{Action, ActionBindings, ActionError};

/// Runs an external program once per record.
///
/// The bindings are written to the program's stdin as one JSON document; its stdout is parsed
/// as JSON and used as the result (empty output is `null`, i.e. a failure). A non-zero exit
/// status is an action error.
#[derive(Debug, Clone)]
pub struct CommandAction {
    name: String,
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandAction {
    pub fn new(name: impl Into<String>, program: impl Into<String>) -> Self {
        Self { name: name.into(), program: program.into(), args: Vec::new(), timeout: None }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, payload: Vec<u8>) -> Result<std::process::Output, ActionError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ActionError::Spawn { program: self.program.clone(), source })?;

        if let Some(mut stdin) = child.stdin.take() {
            // Programs that ignore their input may exit before reading it
            if let Err(e) = stdin.write_all(&payload).await {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
            }
            // Dropping stdin closes the pipe so the program sees EOF
        }

        Ok(child.wait_with_output().await?)
    }
}

#[async_trait]
impl Action for CommandAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, bindings: ActionBindings) -> Result<Value, ActionError> {
        let payload = serde_json::to_vec(&bindings)?;
        trace!(action = %self.name, object_id = %bindings.object_id, "Spawning action command");

        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.run(payload))
                .await
                .map_err(|_| ActionError::Timeout { program: self.program.clone(), timeout_ms: timeout.as_millis() })??,
            None => self.run(payload).await?,
        };

        if !output.status.success() {
            return Err(ActionError::NonZeroExit {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();
        debug!(action = %self.name, object_id = %bindings.object_id, output = %stdout, "Action command finished");
        if stdout.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(stdout)?)
    }
}
