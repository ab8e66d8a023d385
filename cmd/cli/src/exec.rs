use async_trait::async_trait;
use sqs_worker::{BoxError, CancellationToken, Handler};
use std::io;
use std::process::ExitStatus;
use tokio::process::Command;
use tracing::debug;

/// Argument replaced with the message text.
pub const BODY_PLACEHOLDER: &str = "{}.body";

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("Failed to run `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("`{program}` exited with {status}")]
    Status { program: String, status: ExitStatus },
}

/// Handles a message by running a command and waiting for it to exit.
#[derive(Debug, Clone)]
pub struct ExecHandler {
    program: String,
    args: Vec<String>,
}

impl ExecHandler {
    /// Build a handler from `--exec` arguments. The first one is the program. Returns `None`
    /// when there are no arguments.
    pub fn from_args(exec: &[String]) -> Option<Self> {
        let (program, args) = exec.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn command(&self, text: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        for arg in &self.args {
            if arg == BODY_PLACEHOLDER {
                cmd.arg(text);
            } else {
                cmd.arg(arg);
            }
        }
        cmd
    }
}

#[async_trait]
impl Handler for ExecHandler {
    // The child always runs to completion, shutdown waits for it.
    async fn consume(&self, text: &str, _cancel: &CancellationToken) -> Result<(), BoxError> {
        let mut cmd = self.command(text);
        debug!(?cmd, "Running command");

        let status = cmd.status().await.map_err(|source| ExecError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(ExecError::Status {
                program: self.program.clone(),
                status,
            }
            .into())
        }
    }
}
