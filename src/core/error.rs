/// Error Types
///
/// Errors raised by the tool dispatcher and by configuration loading. Transport
/// I/O errors stay `std::io::Error` and are not wrapped here.

use thiserror::Error;

/// Failure of a tool invocation.
///
/// The dispatcher never catches these; the protocol layer turns them into a
/// JSON-RPC error response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// The request named a tool that is not registered.
    #[error("Onbekende tool: {0}")]
    UnknownTool(String),
}

/// Failure while assembling the server configuration at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid transport mode '{0}': must be 'stdio', 'http', or 'both'")]
    InvalidTransport(String),
}
