/// Server Configuration
///
/// Configuration is layered: built-in defaults, then an optional TOML file
/// named by `MCP_CONFIG`, then environment variables.
///
/// Environment Variables:
/// - MCP_CONFIG: Path to a TOML config file (optional)
/// - SERVER_NAME: Name of the server (default: "weather-server")
/// - SERVER_VERSION: Version string (default: "1.0.0")
/// - MCP_TRANSPORT_MODE: "stdio", "http", or "both" (default: "stdio")
/// - HOST: Bind address for HTTP mode (default: "0.0.0.0")
/// - PORT: Port number for HTTP mode (default: 3000)
/// - WORKER_THREADS: HTTP worker count (default: 1, max 16)

use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

use crate::core::error::ConfigError;

pub const DEFAULT_NAME: &str = "weather-server";
pub const DEFAULT_VERSION: &str = "1.0.0";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;

/// Which transports the server runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Stdio,
    Http,
    Both,
}

impl FromStr for Transport {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Transport::Stdio),
            "http" => Ok(Transport::Http),
            "both" => Ok(Transport::Both),
            _ => Err(ConfigError::InvalidTransport(s.to_string())),
        }
    }
}

/// Fully resolved server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Server name as reported in MCP initialize responses
    pub name: String,
    /// Server version as reported in MCP initialize responses
    pub version: String,
    pub transport: Transport,
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            version: DEFAULT_VERSION.to_string(),
            transport: Transport::Stdio,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            workers: DEFAULT_WORKERS,
        }
    }
}

/// Config file contents; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    name: Option<String>,
    version: Option<String>,
    transport: Option<Transport>,
    host: Option<String>,
    port: Option<u16>,
    workers: Option<usize>,
}

pub const DEFAULT_WORKERS: usize = 1;
pub const MAX_WORKERS: usize = 16;

impl ServerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration using `lookup` in place of `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("MCP_CONFIG") {
            config.apply_file(load_file(Path::new(&path))?);
        }

        if let Some(name) = lookup("SERVER_NAME") {
            config.name = name;
        }
        if let Some(version) = lookup("SERVER_VERSION") {
            config.version = version;
        }
        if let Some(mode) = lookup("MCP_TRANSPORT_MODE") {
            config.transport = mode.parse()?;
        }
        if let Some(host) = lookup("HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("PORT") {
            match port.parse::<u16>() {
                Ok(p) => config.port = p,
                Err(_) => tracing::warn!(value = %port, fallback = config.port, "ignoring invalid PORT"),
            }
        }
        if let Some(workers) = lookup("WORKER_THREADS") {
            match workers.parse::<usize>() {
                Ok(w) if w > 0 => config.workers = w.min(MAX_WORKERS),
                _ => tracing::warn!(
                    value = %workers,
                    fallback = config.workers,
                    "ignoring invalid WORKER_THREADS"
                ),
            }
        }

        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(name) = file.name {
            self.name = name;
        }
        if let Some(version) = file.version {
            self.version = version;
        }
        if let Some(transport) = file.transport {
            self.transport = transport;
        }
        if let Some(host) = file.host {
            self.host = host;
        }
        if let Some(port) = file.port {
            self.port = port;
        }
        if let Some(workers) = file.workers.filter(|w| *w > 0) {
            self.workers = workers.min(MAX_WORKERS);
        }
    }

    /// `host:port` for the HTTP listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn load_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let display = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: display.clone(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: display,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn config_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_without_environment() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.name, "weather-server");
        assert_eq!(config.version, "1.0.0");
        assert_eq!(config.transport, Transport::Stdio);
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
        assert_eq!(config.workers, 1);
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("SERVER_NAME", "weer"),
            ("SERVER_VERSION", "2.0.0"),
            ("MCP_TRANSPORT_MODE", "HTTP"),
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("WORKER_THREADS", "3"),
        ]))
        .unwrap();

        assert_eq!(
            config,
            ServerConfig {
                name: "weer".to_string(),
                version: "2.0.0".to_string(),
                transport: Transport::Http,
                host: "127.0.0.1".to_string(),
                port: 8080,
                workers: 3,
            }
        );
    }

    #[test]
    fn invalid_transport_is_an_error() {
        let err = ServerConfig::from_lookup(lookup(&[("MCP_TRANSPORT_MODE", "udp")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTransport(mode) if mode == "udp"));
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PORT", "not-a-port"),
            ("WORKER_THREADS", "0"),
        ]))
        .unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.workers, DEFAULT_WORKERS);
    }

    #[test]
    fn worker_count_is_capped() {
        let config = ServerConfig::from_lookup(lookup(&[("WORKER_THREADS", "64")])).unwrap();
        assert_eq!(config.workers, MAX_WORKERS);
    }

    #[test]
    fn file_layer_sits_between_defaults_and_environment() {
        let file = config_file(
            r#"
            name = "from-file"
            transport = "both"
            port = 4000
            workers = 2
            "#,
        );
        let path = file.path().to_string_lossy().to_string();

        let config = ServerConfig::from_lookup(lookup(&[
            ("MCP_CONFIG", path.as_str()),
            ("PORT", "5000"),
        ]))
        .unwrap();

        assert_eq!(config.name, "from-file");
        assert_eq!(config.version, DEFAULT_VERSION);
        assert_eq!(config.transport, Transport::Both);
        assert_eq!(config.port, 5000);
        assert_eq!(config.workers, 2);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml").to_string_lossy().to_string();
        let err = ServerConfig::from_lookup(lookup(&[("MCP_CONFIG", path.as_str())])).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn malformed_config_file_is_an_error() {
        let file = config_file("port = \"three thousand\"\n");
        let path = file.path().to_string_lossy().to_string();
        let err = ServerConfig::from_lookup(lookup(&[("MCP_CONFIG", path.as_str())])).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn unknown_config_keys_are_rejected() {
        let file = config_file("colour = \"blue\"\n");
        let path = file.path().to_string_lossy().to_string();
        let err = ServerConfig::from_lookup(lookup(&[("MCP_CONFIG", path.as_str())])).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
