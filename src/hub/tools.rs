//! JSON-RPC dispatch for `/mcp`
//!
//! Two tools are exposed: `validate` (hands back the configured identifier)
//! and `minecraft_server_finder` (the status probe with fallback discovery).

use super::common::{
    FinderArgs, RpcError, RpcRequest, RpcResponse, ToolCallParams, INTERNAL_ERROR, INVALID_REQUEST,
    JSONRPC_VERSION, PARSE_ERROR,
};
use super::AppState;
use crate::{Error, VERSION};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

/// Protocol revision announced by `initialize`
pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "Minecraft Server Finder";

pub const VALIDATE_TOOL: &str = "validate";
pub const FINDER_TOOL: &str = "minecraft_server_finder";

const FINDER_DESCRIPTION: &str =
    "Check Minecraft server status by IP/Domain, and suggest alternatives if offline.";

/// POST /mcp
pub async fn handle_rpc(State(state): State<AppState>, body: Bytes) -> Response {
    let raw: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            debug!("Rejecting unparsable request: {}", e);
            return reply(RpcResponse::failure(
                Value::Null,
                RpcError::new(PARSE_ERROR, format!("Parse error: {}", e)),
            ));
        }
    };

    let id = raw.get("id").cloned().unwrap_or(Value::Null);
    let req: RpcRequest = match serde_json::from_value(raw) {
        Ok(r) => r,
        Err(e) => {
            return reply(RpcResponse::failure(
                id,
                RpcError::new(INVALID_REQUEST, format!("Invalid request: {}", e)),
            ))
        }
    };
    if req.jsonrpc != JSONRPC_VERSION {
        return reply(RpcResponse::failure(
            id,
            RpcError::new(INVALID_REQUEST, "jsonrpc must be \"2.0\""),
        ));
    }

    if req.is_notification() {
        debug!("Notification {}", req.method);
        return StatusCode::ACCEPTED.into_response();
    }

    let id = req.id.clone().unwrap_or(Value::Null);
    match dispatch(&state, req).await {
        Ok(result) => reply(RpcResponse::success(id, result)),
        Err(error) => reply(RpcResponse::failure(id, error)),
    }
}

fn reply(response: RpcResponse) -> Response {
    Json(response).into_response()
}

async fn dispatch(state: &AppState, req: RpcRequest) -> Result<Value, RpcError> {
    match req.method.as_str() {
        "initialize" => Ok(initialize_result()),
        "ping" => Ok(json!({})),
        "tools/list" => Ok(tools_list()),
        "tools/call" => {
            let params: ToolCallParams = req
                .params
                .ok_or_else(|| RpcError::invalid_params("missing params"))
                .and_then(|p| {
                    serde_json::from_value(p)
                        .map_err(|e| RpcError::invalid_params(format!("invalid params: {}", e)))
                })?;
            call_tool(state, params).await
        }
        other => Err(RpcError::method_not_found(other)),
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": {} },
        "serverInfo": { "name": SERVER_NAME, "version": VERSION }
    })
}

/// Tool descriptors returned by `tools/list`
pub fn tools_list() -> Value {
    json!({
        "tools": [
            {
                "name": VALIDATE_TOOL,
                "description": "Return the identifier of the operator running this server.",
                "inputSchema": { "type": "object", "properties": {} }
            },
            {
                "name": FINDER_TOOL,
                "description": FINDER_DESCRIPTION,
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "server_address": {
                            "type": "string",
                            "description": "Minecraft server IP or domain"
                        },
                        "port": {
                            "type": "integer",
                            "description": "Server port (default 25565)"
                        }
                    },
                    "required": ["server_address"]
                }
            }
        ]
    })
}

async fn call_tool(state: &AppState, params: ToolCallParams) -> Result<Value, RpcError> {
    match params.name.as_str() {
        VALIDATE_TOOL => Ok(text_content(state.validate_id.to_string())),
        FINDER_TOOL => {
            let args: FinderArgs = serde_json::from_value(params.arguments.unwrap_or(Value::Null))
                .map_err(|e| RpcError::invalid_params(format!("invalid arguments: {}", e)))?;
            info!("{} called for {:?} port {:?}", FINDER_TOOL, args.server_address, args.port);

            match state.finder.find_server(&args.server_address, args.port).await {
                Ok(report) => Ok(text_content(report.to_string())),
                Err(Error::InvalidInput(msg)) => Err(RpcError::invalid_params(msg)),
                Err(e) => {
                    warn!("{} failed: {}", FINDER_TOOL, e);
                    Err(RpcError::new(INTERNAL_ERROR, e.to_string()))
                }
            }
        }
        other => Err(RpcError::invalid_params(format!("Unknown tool: {}", other))),
    }
}

fn text_content(text: String) -> Value {
    json!({
        "content": [{ "type": "text", "text": text }],
        "isError": false
    })
}
