/*!
 * Tunnel Configurations
 * Daemon config listing enriched with per-server geolocation
 */

use std::sync::Arc;

use futures::future;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bridge::{CommandBridge, CommandResult};
use crate::client::Backend;
use crate::geo::{GeoLocation, GeoResolver};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpnConfig {
    pub name: String,
    pub file_path: String,
    pub location: Option<GeoLocation>,
}

/// Display name for a config file: everything before the last `.`.
pub fn display_name(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(index) => &file_name[..index],
        None => file_name,
    }
}

pub struct ConfigService<B> {
    bridge: Arc<CommandBridge<B>>,
    geo: GeoResolver<B>,
}

impl<B: Backend> ConfigService<B> {
    pub fn new(bridge: Arc<CommandBridge<B>>, geo: GeoResolver<B>) -> Self {
        Self { bridge, geo }
    }

    /// Lists configurations whose server could be located, in daemon order.
    pub async fn list(&self) -> Vec<VpnConfig> {
        let files: Vec<String> = match self.bridge.run::<Option<Vec<String>>>("get_configs", true).await {
            CommandResult::Success(files) => files.unwrap_or_default(),
            CommandResult::Failure(_) => return Vec::new(),
        };

        // All lookups are in flight before any is awaited
        let lookups = files.iter().map(|file| async move {
            let name = display_name(file);
            (file, self.geo.resolve(Some(name)).await)
        });
        let resolved = future::join_all(lookups).await;

        let total = resolved.len();
        let configs: Vec<VpnConfig> = resolved
            .into_iter()
            .filter_map(|(file, location)| match location {
                Some(location) => Some(VpnConfig {
                    name: display_name(file).to_string(),
                    file_path: file.clone(),
                    location: Some(location),
                }),
                None => {
                    debug!("Dropping {}: no location", file);
                    None
                }
            })
            .collect();

        info!("Listed {} of {} configurations", configs.len(), total);
        configs
    }
}
