/*!
 * Tunnel Lifecycle
 * Start/stop of the tunnel and the background ping loop
 */

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::bridge::{CommandBridge, CommandResult, CommandStatus};
use crate::client::{Args, Backend};

/// Reported by daemons that say which configuration a quick connect picked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectResponse {
    pub config_name: String,
    pub success: bool,
}

/// Stateless: whether the tunnel is up is only ever asked of the daemon.
pub struct TunnelController<B> {
    bridge: Arc<CommandBridge<B>>,
}

impl<B: Backend> TunnelController<B> {
    pub fn new(bridge: Arc<CommandBridge<B>>) -> Self {
        Self { bridge }
    }

    pub async fn quick_connect(&self) -> CommandResult<()> {
        let result: CommandResult<Value> = self.bridge.run("quick_connect", true).await;
        result.map(|payload| {
            if let Ok(started) = serde_json::from_value::<ConnectResponse>(payload) {
                info!("Quick connect started {}", started.config_name);
            }
        })
    }

    /// Brings up the tunnel described by `file_path`.
    pub async fn connect(&self, file_path: &str) -> CommandResult<()> {
        let mut args = Args::new();
        args.insert("conf_name".into(), Value::String(file_path.to_string()));
        let result: CommandResult<Value> =
            self.bridge.run_command("start_vpn_tunnel", true, args).await;
        result.map(|_| ())
    }

    pub async fn stop_tunnel(&self) -> CommandStatus {
        self.bridge.run::<Value>("stop_tunnel", true).await.status()
    }

    pub async fn is_active(&self, name: &str) -> CommandResult<bool> {
        let mut args = Args::new();
        args.insert("name".into(), Value::String(name.to_string()));
        self.bridge.run_command("is_tunnel_active", false, args).await
    }

    /// Failures go to the log only; the ping loop runs in the background.
    pub async fn start_pinging(&self) -> CommandStatus {
        let status = self.bridge.run::<Value>("start_ping_loop", false).await.status();
        if let Some(message) = &status.error {
            error!("Failed to start ping loop: {}", message);
        }
        status
    }

    pub async fn stop_pinging(&self) {
        if let CommandResult::Failure(message) = self.bridge.run::<Value>("stop_ping_loop", false).await {
            debug!("Ignoring stop_ping_loop failure: {}", message);
        }
    }
}
