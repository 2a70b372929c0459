/*!
 * Tunnel Bridge CLI
 * Command-line control for the privileged tunnel daemon
 */

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

use tunnel_bridge::{
    ChannelNotifier, ClientConfig, CommandBridge, CommandResult, ConfigService, GeoResolver,
    Notification, SocketBackend, TunnelController, VpnConfig,
};

#[derive(Parser)]
#[command(name = "tunnelctl")]
#[command(about = "Tunnel daemon control")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "/etc/tunnel-bridge/client.toml")]
    config: String,

    /// Daemon socket path (overrides the configuration file)
    #[arg(short, long)]
    socket: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List configurations with their server locations
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Connect a configuration, or the first available one
    Connect { file: Option<String> },
    /// Stop the active tunnel
    Stop,
    /// Ask the daemon whether a tunnel is up
    Status { name: String },
    /// Control the background ping loop
    Ping {
        #[command(subcommand)]
        action: PingAction,
    },
    /// Locate an address, or this machine
    Geo { ip: Option<String> },
}

#[derive(Subcommand)]
enum PingAction {
    Start,
    Stop,
}

type Bridge = Arc<CommandBridge<SocketBackend>>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so `list --json` stays clean
    let log_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("tunnel_bridge={0},tunnelctl={0}", log_level))
        .with_writer(std::io::stderr)
        .init();

    let mut config = ClientConfig::load(&cli.config)?;
    if let Some(socket) = cli.socket {
        config.socket_path = socket;
    }
    debug!("Using daemon socket {}", config.socket_path);

    let (notifier, notifications) = ChannelNotifier::new();
    let bridge = Arc::new(
        CommandBridge::new(SocketBackend::new(&config.socket_path), Arc::new(notifier))
            .with_timeout(config.command_timeout()),
    );

    let outcome = run(cli.command, &config, bridge).await;
    let succeeded = finish(outcome, notifications, &mut io::stderr())?;

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}

async fn run(command: Commands, config: &ClientConfig, bridge: Bridge) -> Result<bool> {
    match command {
        Commands::List { json } => {
            let geo = GeoResolver::from_config(bridge.clone(), &config.geo)?;
            let configs = ConfigService::new(bridge, geo).list().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&configs)?);
            } else {
                print_configs(&configs);
            }
            Ok(true)
        }
        Commands::Connect { file } => {
            let tunnel = TunnelController::new(bridge);
            let result = match file {
                Some(file) => tunnel.connect(&file).await,
                None => tunnel.quick_connect().await,
            };
            Ok(result.is_success())
        }
        Commands::Stop => Ok(TunnelController::new(bridge).stop_tunnel().await.is_ok()),
        Commands::Status { name } => match TunnelController::new(bridge).is_active(&name).await {
            CommandResult::Success(active) => {
                println!("{}: {}", name, if active { "up" } else { "down" });
                Ok(true)
            }
            CommandResult::Failure(message) => {
                eprintln!("{}", message);
                Ok(false)
            }
        },
        Commands::Ping { action } => {
            let tunnel = TunnelController::new(bridge);
            match action {
                PingAction::Start => Ok(tunnel.start_pinging().await.is_ok()),
                PingAction::Stop => {
                    tunnel.stop_pinging().await;
                    Ok(true)
                }
            }
        }
        Commands::Geo { ip } => {
            let geo = GeoResolver::from_config(bridge, &config.geo)?;
            match geo.resolve(ip.as_deref()).await {
                Some(location) => {
                    println!("{}", serde_json::to_string_pretty(&location)?);
                    Ok(true)
                }
                None => {
                    eprintln!("Location unavailable");
                    Ok(false)
                }
            }
        }
    }
}

fn print_configs(configs: &[VpnConfig]) {
    if configs.is_empty() {
        println!("No configurations available");
        return;
    }

    println!("{:<18} {:<4} {:<24} {}", "NAME", "CC", "NETWORK", "FILE");
    for config in configs {
        let (country_code, network) = match &config.location {
            Some(location) => (
                location.country_code.as_str(),
                location.as_name.as_deref().unwrap_or("-"),
            ),
            None => ("-", "-"),
        };
        println!(
            "{:<18} {:<4} {:<24} {}",
            config.name, country_code, network, config.file_path
        );
    }
}

/// Prints every queued notification, then hands back the command outcome,
/// so toasts raised before an error are not lost.
fn finish(
    outcome: Result<bool>,
    mut notifications: UnboundedReceiver<Notification>,
    out: &mut impl Write,
) -> Result<bool> {
    while let Ok(notification) = notifications.try_recv() {
        let _ = writeln!(
            out,
            "[{}] {}",
            notification.at.with_timezone(&Local).format("%H:%M:%S"),
            notification.message
        );
    }
    outcome
}
