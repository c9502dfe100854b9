/// Core Server Framework Module
///
/// - config.rs: Layered server configuration
/// - error.rs: Tool and configuration errors
/// - registry.rs: Tool descriptors, results and the tool registry
/// - server.rs: JSON-RPC dispatch with HTTP and STDIO transports

pub mod config;
pub mod error;
pub mod registry;
pub mod server;
