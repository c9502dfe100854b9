/// MCP Server Implementation
///
/// This module contains the protocol runtime that hosts the tool registry:
/// - JSON-RPC 2.0 request/response structures
/// - A single dispatcher shared by every transport
/// - HTTP server setup with Actix Web
/// - STDIO server implementation for line-based communication

use actix_web::{
    App, HttpResponse, HttpServer, Result,
    middleware::{Compress, DefaultHeaders, Logger},
    web,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

use crate::core::config::ServerConfig;
use crate::core::registry::{ToolCallRequest, ToolRegistry};
use crate::tools;

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;

/// Server identity reported in `initialize` responses.
#[derive(Clone, Debug)]
pub struct AppState {
    pub server_name: String,
    pub server_version: String,
}

impl From<&ServerConfig> for AppState {
    fn from(config: &ServerConfig) -> Self {
        Self {
            server_name: config.name.clone(),
            server_version: config.version.clone(),
        }
    }
}

/// JSON-RPC 2.0 request structure for MCP protocol.
///
/// A request without `id` is a notification and never gets a response.
#[derive(Deserialize, Debug)]
pub struct MCPRequest {
    jsonrpc: String,
    #[serde(default)]
    id: Option<Value>,
    /// MCP method name (e.g., "initialize", "tools/list", "tools/call")
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

/// JSON-RPC 2.0 response structure.
///
/// Exactly one of `result` and `error` is present.
#[derive(Serialize, Debug, PartialEq)]
pub struct MCPResponse {
    jsonrpc: String,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<MCPError>,
}

/// JSON-RPC 2.0 error structure.
#[derive(Serialize, Debug, PartialEq)]
pub struct MCPError {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl MCPResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(MCPError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// Initialize and register all tools.
///
/// Add new tool registrations here when implementing additional tools.
pub fn initialize_tools() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    tools::weather::register(&mut registry);
    Arc::new(registry)
}

/// Handle one raw JSON-RPC message.
///
/// Returns `None` when nothing should be written back (notifications, or
/// well-formed JSON that is not a request and carries no id).
///
/// # Arguments
/// * `state` - Server identity reported by `initialize`
/// * `registry` - Tool registry for `tools/list` and `tools/call`
/// * `raw` - One JSON-RPC message as received from the transport
pub fn handle_message(state: &AppState, registry: &ToolRegistry, raw: &str) -> Option<MCPResponse> {
    let value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "parse error");
            return Some(MCPResponse::error(
                Value::Null,
                PARSE_ERROR,
                format!("Parse error: {}", e),
            ));
        }
    };

    let id = value.get("id").cloned();
    match serde_json::from_value::<MCPRequest>(value) {
        Ok(req) => dispatch(state, registry, req),
        Err(e) => {
            tracing::warn!(error = %e, "invalid request");
            id.filter(|id| !id.is_null()).map(|id| {
                MCPResponse::error(id, INVALID_REQUEST, format!("Invalid request: {}", e))
            })
        }
    }
}

/// Route a decoded request to its method handler.
///
/// # Arguments
/// * `state` - Server identity reported by `initialize`
/// * `registry` - Tool registry for `tools/list` and `tools/call`
/// * `req` - Decoded request; without an id it is a notification and yields `None`
pub fn dispatch(state: &AppState, registry: &ToolRegistry, req: MCPRequest) -> Option<MCPResponse> {
    let Some(id) = req.id.filter(|id| !id.is_null()) else {
        tracing::debug!(method = %req.method, "notification");
        return None;
    };

    if req.jsonrpc != JSONRPC_VERSION {
        return Some(MCPResponse::error(
            id,
            INVALID_REQUEST,
            format!("Unsupported jsonrpc version: {}", req.jsonrpc),
        ));
    }

    tracing::debug!(method = %req.method, "dispatching");
    let response = match req.method.as_str() {
        "initialize" => MCPResponse::success(id, initialize_result(state)),
        "ping" => MCPResponse::success(id, json!({})),
        "tools/list" => MCPResponse::success(id, json!({ "tools": registry.list_tools() })),
        "tools/call" => handle_tools_call(registry, id, req.params),
        _ => MCPResponse::error(
            id,
            METHOD_NOT_FOUND,
            format!("Method not found: {}", req.method),
        ),
    };
    Some(response)
}

fn initialize_result(state: &AppState) -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "experimental": {},
            "tools": { "listChanged": false }
        },
        "serverInfo": {
            "name": state.server_name,
            "version": state.server_version
        }
    })
}

fn handle_tools_call(registry: &ToolRegistry, id: Value, params: Option<Value>) -> MCPResponse {
    let Some(params) = params else {
        return MCPResponse::error(id, INVALID_PARAMS, "Invalid params");
    };

    let request: ToolCallRequest = match serde_json::from_value(params) {
        Ok(r) => r,
        Err(e) => {
            return MCPResponse::error(id, INVALID_PARAMS, format!("Invalid params: {}", e));
        }
    };

    match registry.call_tool(&request) {
        Ok(result) => MCPResponse::success(id, json!(result)),
        Err(e) => {
            tracing::warn!(tool = %request.name, error = %e, "tool call failed");
            MCPResponse::error(id, METHOD_NOT_FOUND, e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP transport
// ---------------------------------------------------------------------------

async fn health(state: web::Data<AppState>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "status": "ok",
        "service": state.server_name
    })))
}

/// MCP JSON-RPC request handler.
///
/// The body is decoded by `handle_message` rather than an extractor so that
/// malformed JSON gets a JSON-RPC parse error instead of a bare 400.
async fn mcp_handler(
    state: web::Data<AppState>,
    registry: web::Data<ToolRegistry>,
    counter: web::Data<AtomicU64>,
    body: web::Bytes,
) -> Result<HttpResponse> {
    counter.fetch_add(1, Ordering::Relaxed);

    let raw = String::from_utf8_lossy(&body);
    match handle_message(&state, &registry, &raw) {
        Some(response) => Ok(HttpResponse::Ok().json(response)),
        None => Ok(HttpResponse::Accepted().finish()),
    }
}

async fn metrics_handler(counter: web::Data<AtomicU64>) -> Result<HttpResponse> {
    let count = counter.load(Ordering::Relaxed);
    Ok(HttpResponse::Ok().json(json!({
        "requests_total": count,
        "status": "ok"
    })))
}

/// Server-Sent Events endpoint for tools discovery.
///
/// Emits a single event carrying the same tool list as `tools/list`.
async fn sse_tools_discovery(registry: web::Data<ToolRegistry>) -> Result<HttpResponse> {
    use actix_web::http::header;

    let tools = registry.list_tools();
    let tools_data = json!({
        "tools": tools,
        "count": tools.len()
    });
    let sse_data = format!(
        "data: {}\n\n",
        serde_json::to_string(&tools_data).unwrap_or_else(|_| "{}".to_string())
    );

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(header::CacheControl(vec![
            header::CacheDirective::NoCache,
            header::CacheDirective::NoStore,
            header::CacheDirective::MustRevalidate,
        ]))
        // nginx must not buffer the stream
        .insert_header(("x-accel-buffering", "no"))
        .body(sse_data))
}

/// Route table for the HTTP transport.
///
/// Expects `web::Data<AppState>`, `web::Data<ToolRegistry>` and
/// `web::Data<AtomicU64>` to be registered on the app.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics_handler))
        .route("/sse", web::get().to(sse_tools_discovery))
        .route("/mcp", web::post().to(mcp_handler))
        .route("/", web::post().to(mcp_handler))
        .route("/", web::get().to(health));
}

/// Run the MCP server in HTTP mode.
///
/// Opt-in transport, selected with `MCP_TRANSPORT_MODE=http` or `both`. It
/// runs a single worker unless `WORKER_THREADS` asks for more, in which case
/// requests may be handled concurrently across workers.
///
/// # Arguments
/// * `config` - Resolved configuration (identity, bind address, worker count)
/// * `registry` - Tool registry shared read-only with every worker
///
/// # Configuration
/// - Max connections: 10,000 concurrent connections
/// - Connection rate limit: 1,000 connections per second
/// - Keep-alive and client request timeout: 30 seconds
/// - Disconnect timeout: 2 seconds
/// - Shutdown timeout: 10 seconds
pub async fn run_server_http(config: ServerConfig, registry: Arc<ToolRegistry>) -> std::io::Result<()> {
    let bind_addr = config.bind_addr();
    let app_state = web::Data::new(AppState::from(&config));
    let tool_registry = web::Data::from(registry);
    let request_count = web::Data::new(AtomicU64::new(0));

    tracing::info!(
        name = %config.name,
        version = %config.version,
        bind = %bind_addr,
        workers = config.workers,
        "MCP server starting (HTTP mode)"
    );

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .app_data(tool_registry.clone())
            .app_data(request_count.clone())
            .wrap(Compress::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY"))
                    .add(("X-XSS-Protection", "1; mode=block")),
            )
            .wrap(Logger::new("%r %s %Dms"))
            .configure(routes)
    })
    .workers(config.workers)
    .max_connections(10000)
    .max_connection_rate(1000)
    .keep_alive(Duration::from_secs(30))
    .client_request_timeout(Duration::from_secs(30))
    .client_disconnect_timeout(Duration::from_secs(2))
    .shutdown_timeout(10)
    .bind(&bind_addr)?
    .run()
    .await
}

// ---------------------------------------------------------------------------
// STDIO transport
// ---------------------------------------------------------------------------

/// Serve line-delimited JSON-RPC from `reader` to `writer` until EOF.
///
/// Requests are handled strictly one at a time; each response is flushed
/// before the next line is read. Lines are read as raw bytes so that a line
/// which is not valid UTF-8 is answered with a parse error instead of ending
/// the session.
///
/// # Arguments
/// * `reader` - Buffered source of newline-terminated requests (stdin in production)
/// * `writer` - Sink for newline-terminated responses (stdout in production)
/// * `state` - Server identity reported by `initialize`
/// * `registry` - Tool registry used for `tools/list` and `tools/call`
///
/// # Errors
/// Returns an error only when reading from `reader` or writing to `writer`
/// fails; malformed input never ends the loop.
pub async fn serve_lines<R, W>(
    mut reader: R,
    mut writer: W,
    state: &AppState,
    registry: &ToolRegistry,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::with_capacity(8192);

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }

        let response = match std::str::from_utf8(&buf) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => handle_message(state, registry, line),
            Err(e) => {
                tracing::warn!(error = %e, "line is not valid UTF-8");
                Some(MCPResponse::error(
                    Value::Null,
                    PARSE_ERROR,
                    format!("Parse error: {}", e),
                ))
            }
        };

        if let Some(response) = response {
            write_response(&mut writer, &response).await?;
        }
    }

    tracing::info!("stdin closed, STDIO transport stopping");
    Ok(())
}

/// Write one response followed by a newline and flush it.
async fn write_response<W>(writer: &mut W, response: &MCPResponse) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let response_json = match serde_json::to_string(response) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize response");
            return Ok(());
        }
    };

    writer.write_all(response_json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

/// Run the MCP server in STDIO mode.
///
/// This is the default transport. stdout carries the protocol stream only;
/// logging goes to stderr. Uses 8KB buffers on both streams.
///
/// # Arguments
/// * `state` - Server identity reported by `initialize`
/// * `registry` - Tool registry built once at startup by `initialize_tools`
pub async fn run_server_stdio(state: AppState, registry: Arc<ToolRegistry>) -> std::io::Result<()> {
    tracing::info!(
        name = %state.server_name,
        version = %state.server_version,
        "MCP server starting (STDIO mode)"
    );

    let stdin = BufReader::with_capacity(8192, tokio::io::stdin());
    let stdout = BufWriter::with_capacity(8192, tokio::io::stdout());
    serve_lines(stdin, stdout, &state, &registry).await
}
