use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    pub socket_path: String,
    pub command_timeout_ms: u64,
    pub geo: GeoConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoSourceKind {
    #[default]
    Backend,
    Http,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeoConfig {
    pub source: GeoSourceKind,
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            socket_path: "/run/tunnel-bridge/tunnel.sock".to_string(),
            command_timeout_ms: 30_000,
            geo: GeoConfig::default(),
        }
    }
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            source: GeoSourceKind::Backend,
            base_url: "http://ip-api.com".to_string(),
            timeout_ms: 5_000,
        }
    }
}

impl ClientConfig {
    /// Missing file means defaults; a file that exists must parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)
                .with_context(|| format!("Invalid configuration in {}", path.display())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("No configuration at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("Cannot read configuration {}", path.display())),
        }
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

impl GeoConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::load(dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.socket_path, "/run/tunnel-bridge/tunnel.sock");
        assert_eq!(config.command_timeout(), Duration::from_secs(30));
        assert_eq!(config.geo.source, GeoSourceKind::Backend);
        assert_eq!(config.geo.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "socket_path = \"/tmp/tunnel.sock\"").unwrap();
        writeln!(file, "[geo]").unwrap();
        writeln!(file, "source = \"http\"").unwrap();
        writeln!(file, "timeout_ms = 1500").unwrap();

        let config = ClientConfig::load(file.path()).unwrap();
        assert_eq!(config.socket_path, "/tmp/tunnel.sock");
        assert_eq!(config.command_timeout_ms, 30_000);
        assert_eq!(config.geo.source, GeoSourceKind::Http);
        assert_eq!(config.geo.base_url, "http://ip-api.com");
        assert_eq!(config.geo.timeout(), Duration::from_millis(1500));
    }

    #[test]
    fn test_unreadable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClientConfig::load(dir.path()).unwrap_err();
        assert!(err.to_string().starts_with("Cannot read configuration"));
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[geo]").unwrap();
        writeln!(file, "source = \"carrier-pigeon\"").unwrap();

        assert!(ClientConfig::load(file.path()).is_err());
    }
}
