/*!
 * Tunnel Bridge
 * Client-side command bridge to the privileged tunnel daemon
 */

pub mod bridge;
pub mod client;
pub mod config;
pub mod configs;
pub mod geo;
pub mod notify;
pub mod tunnel;

#[cfg(test)]
mod testing;

pub use bridge::{CommandBridge, CommandResult, CommandStatus};
pub use client::{Args, Backend, InvokeError, SocketBackend};
pub use config::{ClientConfig, GeoConfig, GeoSourceKind};
pub use configs::{ConfigService, VpnConfig};
pub use geo::{GeoLocation, GeoResolver};
pub use notify::{ChannelNotifier, NoopNotifier, Notification, Notifier};
pub use tunnel::{ConnectResponse, TunnelController};
