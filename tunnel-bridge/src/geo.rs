/*!
 * Geolocation Resolver
 * Best-effort IP to location lookups, via the daemon or a public HTTP service
 */

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time;
use tracing::debug;

use crate::bridge::{CommandBridge, CommandResult};
use crate::client::{Args, Backend};
use crate::config::{GeoConfig, GeoSourceKind};

pub const DEFAULT_GEO_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub ip: String,
    pub asn: Option<String>,
    pub as_name: Option<String>,
    pub as_domain: Option<String>,
    pub country_code: String,
    pub country: Option<String>,
    pub continent_code: Option<String>,
    pub continent: Option<String>,
}

impl GeoLocation {
    /// Reads an unvalidated lookup response. Both the ipinfo-lite field names
    /// and the ip-api ones (`query`, `countryCode`, `as`) are understood.
    pub fn from_untyped(body: &Value) -> Option<Self> {
        if body.get("status").and_then(Value::as_str) == Some("fail") {
            return None;
        }

        let field = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| body.get(*key).and_then(Value::as_str))
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_owned)
        };

        // ip-api packs "AS15169 Google LLC" into one field
        let (as_number, as_label) = match field(&["as"]) {
            Some(combined) => match combined.split_once(' ') {
                Some((number, label)) => (Some(number.to_string()), Some(label.to_string())),
                None => (Some(combined.clone()), None),
            },
            None => (None, None),
        };

        Some(Self {
            ip: field(&["ip", "query"])?,
            asn: field(&["asn"]).or(as_number),
            as_name: field(&["as_name"]).or(as_label).or_else(|| field(&["isp"])),
            as_domain: field(&["as_domain"]),
            country_code: field(&["country_code", "countryCode"])?,
            country: field(&["country"]),
            continent_code: field(&["continent_code", "continentCode"]),
            continent: field(&["continent"]),
        })
    }
}

/// `{base}/json` for the caller's own address, `{base}/json/{address}` otherwise.
/// The address is percent-encoded as a single path segment.
pub fn lookup_url(base_url: &str, address: Option<&str>) -> Option<Url> {
    let mut url = Url::parse(base_url).ok()?;
    {
        let mut segments = url.path_segments_mut().ok()?;
        segments.pop_if_empty().push("json");
        if let Some(address) = address {
            segments.push(address);
        }
    }
    Some(url)
}

pub enum GeoSource<B> {
    /// `get_geo_info` on the daemon.
    Backend(Arc<CommandBridge<B>>),
    /// Direct unauthenticated lookup against a public service.
    Http {
        client: reqwest::Client,
        base_url: String,
    },
}

pub struct GeoResolver<B> {
    source: GeoSource<B>,
    timeout: Duration,
}

impl<B: Backend> GeoResolver<B> {
    pub fn backend(bridge: Arc<CommandBridge<B>>) -> Self {
        Self {
            source: GeoSource::Backend(bridge),
            timeout: DEFAULT_GEO_TIMEOUT,
        }
    }

    pub fn http(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build geolocation HTTP client")?;
        Ok(Self::with_client(client, base_url).with_timeout(timeout))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            source: GeoSource::Http {
                client,
                base_url: base_url.into(),
            },
            timeout: DEFAULT_GEO_TIMEOUT,
        }
    }

    pub fn from_config(bridge: Arc<CommandBridge<B>>, config: &GeoConfig) -> Result<Self> {
        match config.source {
            GeoSourceKind::Backend => Ok(Self::backend(bridge).with_timeout(config.timeout())),
            GeoSourceKind::Http => Self::http(&config.base_url, config.timeout()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Locates `address`, or this machine when `None`. Every failure,
    /// including a timeout, is `None`.
    pub async fn resolve(&self, address: Option<&str>) -> Option<GeoLocation> {
        let address = address.filter(|address| !address.is_empty());
        let target = address.unwrap_or("self");

        let lookup = async {
            match &self.source {
                GeoSource::Backend(bridge) => via_backend(bridge, address).await,
                GeoSource::Http { client, base_url } => via_http(client, base_url, address).await,
            }
        };

        match time::timeout(self.timeout, lookup).await {
            Ok(location) => location,
            Err(_) => {
                debug!("Geolocation lookup for {} timed out", target);
                None
            }
        }
    }
}

async fn via_backend<B: Backend>(
    bridge: &CommandBridge<B>,
    address: Option<&str>,
) -> Option<GeoLocation> {
    let mut args = Args::new();
    if let Some(ip) = address {
        args.insert("ip".into(), Value::String(ip.to_string()));
    }

    match bridge.run_command::<GeoLocation>("get_geo_info", false, args).await {
        CommandResult::Success(location) => Some(location),
        CommandResult::Failure(message) => {
            debug!("Geolocation for {} unavailable: {}", address.unwrap_or("self"), message);
            None
        }
    }
}

async fn via_http(
    client: &reqwest::Client,
    base_url: &str,
    address: Option<&str>,
) -> Option<GeoLocation> {
    let Some(url) = lookup_url(base_url, address) else {
        debug!("Geolocation base URL {} is not usable", base_url);
        return None;
    };

    let response = match client.get(url.as_str()).send().await {
        Ok(response) => response,
        Err(e) => {
            debug!("Geolocation request to {} failed: {}", url, e);
            return None;
        }
    };
    if !response.status().is_success() {
        debug!("Geolocation service returned {} for {}", response.status(), url);
        return None;
    }

    let body: Value = response.json().await.ok()?;
    let location = GeoLocation::from_untyped(&body);
    if location.is_none() {
        debug!("Geolocation response for {} had no usable location", url);
    }
    location
}
