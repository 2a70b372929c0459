/*!
 * Tunnel Daemon Client
 * JSON IPC communication with the privileged tunnel daemon
 */

use std::future::Future;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

/// Named command arguments, serialized as a JSON object.
pub type Args = Map<String, Value>;

#[derive(Debug, Error)]
pub enum InvokeError {
    /// The daemon handled the command and raised an error value.
    #[error("daemon raised {0}")]
    Raised(Value),
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed daemon message: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("daemon closed the connection without responding")]
    Closed,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    pub cmd: String,
    #[serde(default)]
    pub args: Args,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Success {
        #[serde(default)]
        data: Value,
    },
    Error {
        error: Value,
    },
}

/// A process boundary that executes named commands.
pub trait Backend: Send + Sync {
    fn invoke(
        &self,
        cmd: &str,
        args: Args,
    ) -> impl Future<Output = Result<Value, InvokeError>> + Send;
}

/// Newline-delimited JSON over a Unix socket, one connection per command.
#[derive(Debug, Clone)]
pub struct SocketBackend {
    socket_path: PathBuf,
}

impl SocketBackend {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Backend for SocketBackend {
    async fn invoke(&self, cmd: &str, args: Args) -> Result<Value, InvokeError> {
        tracing::debug!("Sending {} to {}", cmd, self.socket_path.display());

        let stream = UnixStream::connect(&self.socket_path).await?;
        let (read_half, mut write_half) = stream.into_split();

        let request = Request {
            cmd: cmd.to_string(),
            args,
        };
        let mut request_json = serde_json::to_vec(&request)?;
        request_json.push(b'\n');
        write_half.write_all(&request_json).await?;

        let mut reader = BufReader::new(read_half);
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Err(InvokeError::Closed);
        }

        match serde_json::from_str(line.trim())? {
            Response::Success { data } => Ok(data),
            Response::Error { error } => Err(InvokeError::Raised(error)),
        }
    }
}
