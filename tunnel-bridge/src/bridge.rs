/*!
 * Command Bridge
 * Single call path from the application to the tunnel daemon
 */

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::Value;
use tokio::time;
use tracing::{debug, warn};

use crate::client::{Args, Backend, InvokeError};
use crate::notify::Notifier;

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

const UNKNOWN_ERROR: &str = "Unknown error";

/// Outcome of a daemon command: either the decoded payload or a printable error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult<T> {
    Success(T),
    Failure(String),
}

impl<T> CommandResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandResult::Success(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            CommandResult::Success(data) => Some(data),
            CommandResult::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            CommandResult::Success(_) => None,
            CommandResult::Failure(message) => Some(message),
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            CommandResult::Success(data) => Some(data),
            CommandResult::Failure(_) => None,
        }
    }

    pub fn into_result(self) -> Result<T, String> {
        match self {
            CommandResult::Success(data) => Ok(data),
            CommandResult::Failure(message) => Err(message),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CommandResult<U> {
        match self {
            CommandResult::Success(data) => CommandResult::Success(f(data)),
            CommandResult::Failure(message) => CommandResult::Failure(message),
        }
    }

    /// Drops the payload, keeping only the error.
    pub fn status(&self) -> CommandStatus {
        CommandStatus {
            error: self.error().map(str::to_owned),
        }
    }
}

/// Serializes as `{"data": ..., "error": null}` or `{"data": null, "error": "..."}`.
/// A unit payload has nothing to carry, so `Success(())` is `{"data": null, "error": null}`.
impl<T: Serialize> Serialize for CommandResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("CommandResult", 2)?;
        state.serialize_field("data", &self.data())?;
        state.serialize_field("error", &self.error())?;
        state.end()
    }
}

/// Error-only view of a command that carries no payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandStatus {
    pub error: Option<String>,
}

impl CommandStatus {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Renders whatever the daemon raised as a non-empty message.
pub fn render_error(err: &InvokeError) -> String {
    let message = match err {
        InvokeError::Raised(Value::String(message)) => message.clone(),
        InvokeError::Raised(value) => serde_json::to_string(value).unwrap_or_default(),
        other => other.to_string(),
    };

    if message.trim().is_empty() {
        UNKNOWN_ERROR.to_string()
    } else {
        message
    }
}

pub struct CommandBridge<B> {
    backend: B,
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
}

impl<B: Backend> CommandBridge<B> {
    pub fn new(backend: B, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            backend,
            notifier,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Invokes `name` on the daemon. Failures come back as
    /// [`CommandResult::Failure`] and, with `notify_error`, are shown to the user.
    pub async fn run_command<T: DeserializeOwned>(
        &self,
        name: &str,
        notify_error: bool,
        args: Args,
    ) -> CommandResult<T> {
        let outcome = match time::timeout(self.timeout, self.backend.invoke(name, args)).await {
            Ok(Ok(payload)) => serde_json::from_value::<T>(payload)
                .map_err(|e| format!("unexpected payload from `{}`: {}", name, e)),
            Ok(Err(err)) => Err(render_error(&err)),
            Err(_) => Err(format!(
                "command `{}` timed out after {}ms",
                name,
                self.timeout.as_millis()
            )),
        };

        match outcome {
            Ok(data) => {
                debug!("Command {} succeeded", name);
                CommandResult::Success(data)
            }
            Err(message) => {
                if notify_error {
                    warn!("Command {} failed: {}", name, message);
                    self.notifier.notify(&message);
                } else {
                    debug!("Command {} failed: {}", name, message);
                }
                CommandResult::Failure(message)
            }
        }
    }

    /// [`run_command`](Self::run_command) without arguments.
    pub async fn run<T: DeserializeOwned>(&self, name: &str, notify_error: bool) -> CommandResult<T> {
        self.run_command(name, notify_error, Args::new()).await
    }
}
