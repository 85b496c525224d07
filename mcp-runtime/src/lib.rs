//! MCP runtime for the ORDS bridge: a stdio JSON-RPC server whose tool
//! surface is synthesized at startup from a remote ORDS OpenAPI catalog.

use serde_json::{Value, json};
use tokio::io::{self, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};

use ords_core::catalog::OperationRegistry;
use ords_core::input::OperationInput;

pub mod auth;
pub mod error;
pub mod executor;
pub mod synthesis;
#[cfg(test)]
mod testing;

use executor::Executor;

const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
const MCP_SERVER_NAME: &str = "ords-mcp";
const OPERATIONS_RESOURCE_URI: &str = "ords://operations";

/// Every synthesized tool accepts the same structured input.
fn operation_input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "headers": {
                "type": "object",
                "additionalProperties": { "type": "string" }
            },
            "body": {},
            "params": {
                "type": "object",
                "additionalProperties": { "type": ["string", "number"] }
            },
            "query": {
                "type": "object",
                "additionalProperties": { "type": ["string", "number", "boolean"] }
            }
        },
        "additionalProperties": false
    })
}

/// Serves the synthesized operation registry over MCP. The registry is
/// immutable for the server's lifetime; a process restart re-synthesizes it.
pub struct McpServer {
    registry: OperationRegistry,
    executor: Executor,
}

impl McpServer {
    pub fn new(registry: OperationRegistry, executor: Executor) -> Self {
        Self { registry, executor }
    }

    pub async fn serve_stdio(&self) -> Result<(), String> {
        let stdin = io::stdin();
        let mut reader = BufReader::new(stdin);
        let mut stdout = io::stdout();

        loop {
            let incoming = read_framed_json(&mut reader)
                .await
                .map_err(|e| format!("Failed to read MCP message: {e}"))?;
            let Some(incoming) = incoming else {
                break;
            };

            let responses = self.handle_incoming_message(incoming).await;
            for response in responses {
                write_framed_json(&mut stdout, &response)
                    .await
                    .map_err(|e| format!("Failed to write MCP response: {e}"))?;
            }
        }

        Ok(())
    }

    pub async fn handle_incoming_message(&self, incoming: Value) -> Vec<Value> {
        let mut responses = Vec::new();

        if let Some(batch) = incoming.as_array() {
            if batch.is_empty() {
                responses.push(error_response(
                    Value::Null,
                    RpcError::invalid_request("Batch request must not be empty"),
                ));
                return responses;
            }
            for item in batch {
                if let Some(response) = self.handle_single_message(item.clone()).await {
                    responses.push(response);
                }
            }
            return responses;
        }

        if let Some(response) = self.handle_single_message(incoming).await {
            responses.push(response);
        }
        responses
    }

    async fn handle_single_message(&self, incoming: Value) -> Option<Value> {
        let Some(obj) = incoming.as_object() else {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Request must be a JSON object"),
            ));
        };

        if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            let id = obj.get("id").cloned().unwrap_or(Value::Null);
            return Some(error_response(
                id,
                RpcError::invalid_request("jsonrpc must be '2.0'"),
            ));
        }

        let Some(method) = obj.get("method").and_then(Value::as_str) else {
            // Most likely a client response; this server issues no outbound
            // requests.
            return None;
        };

        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        if let Some(id) = obj.get("id").cloned() {
            let result = self.handle_request(method, params).await;
            Some(match result {
                Ok(payload) => success_response(id, payload),
                Err(err) => error_response(id, err),
            })
        } else {
            // Notifications (notifications/initialized etc.) need no reply;
            // unknown ones are intentionally ignored.
            None
        }
    }

    async fn handle_request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(self.initialize_payload()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.tools_list_payload()),
            "tools/call" => self.handle_tools_call(params).await,
            "resources/list" => Ok(resources_list_payload()),
            "resources/read" => self.handle_resources_read(params),
            "prompts/list" => Ok(json!({ "prompts": [] })),
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    fn initialize_payload(&self) -> Value {
        let instructions = format!(
            "Each tool is one REST operation synthesized from the ORDS OpenAPI catalog ({} registered). \
             All tools share one input shape: 'params' fills {{placeholders}} in the path, 'query' appends \
             query-string pairs, 'body' is sent as JSON on POST/PUT/PATCH, and 'headers' are merged into \
             the request. Results carry the upstream status_code and body verbatim; non-2xx responses are \
             returned as data, not raised as errors.",
            self.registry.len()
        );
        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {
                "tools": { "listChanged": false },
                "resources": { "listChanged": false },
                "prompts": { "listChanged": false }
            },
            "serverInfo": {
                "name": MCP_SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            },
            "instructions": instructions
        })
    }

    fn tools_list_payload(&self) -> Value {
        let tools: Vec<Value> = self
            .registry
            .iter()
            .map(|op| {
                json!({
                    "name": op.id,
                    "description": op.description,
                    "inputSchema": operation_input_schema(),
                })
            })
            .collect();
        json!({ "tools": tools })
    }

    async fn handle_tools_call(&self, params: Value) -> Result<Value, RpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| RpcError::invalid_params("tools/call params must be an object"))?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("tools/call requires string field 'name'"))?;

        let Some(operation) = self.registry.get(name) else {
            return Err(RpcError::invalid_params(format!("Unknown tool '{name}'")));
        };

        let input: OperationInput = match params.get("arguments") {
            Some(Value::Null) | None => OperationInput::default(),
            Some(args @ Value::Object(_)) => serde_json::from_value(args.clone())
                .map_err(|e| RpcError::invalid_params(format!("Invalid tool arguments: {e}")))?,
            Some(_) => {
                return Err(RpcError::invalid_params(
                    "tools/call 'arguments' must be an object",
                ));
            }
        };

        match self.executor.execute(operation, &input).await {
            Ok(outcome) => {
                // Pass the body through parsed when it is JSON, raw otherwise.
                let body = serde_json::from_str::<Value>(&outcome.body)
                    .unwrap_or_else(|_| Value::String(outcome.body.clone()));
                let envelope = json!({ "status_code": outcome.status_code, "body": body });
                Ok(json!({
                    "content": [{ "type": "text", "text": envelope.to_string() }],
                    "structuredContent": envelope
                }))
            }
            Err(err) => {
                tracing::error!(tool = name, error = %err, "operation execution failed");
                let envelope = json!({ "error": err.to_string() });
                Ok(json!({
                    "isError": true,
                    "content": [{ "type": "text", "text": envelope.to_string() }],
                    "structuredContent": envelope
                }))
            }
        }
    }

    fn handle_resources_read(&self, params: Value) -> Result<Value, RpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| RpcError::invalid_params("resources/read params must be an object"))?;
        let uri = params.get("uri").and_then(Value::as_str).ok_or_else(|| {
            RpcError::invalid_params("resources/read requires string field 'uri'")
        })?;

        if uri != OPERATIONS_RESOURCE_URI {
            return Err(RpcError::invalid_params(format!(
                "Unknown resource uri '{uri}'"
            )));
        }

        Ok(json!({
            "contents": [{
                "uri": uri,
                "mimeType": "application/json",
                "text": to_pretty_json(&self.operations_index())
            }]
        }))
    }

    /// Registry index rendered for the operations resource.
    fn operations_index(&self) -> Value {
        let operations: Vec<Value> = self
            .registry
            .iter()
            .map(|op| {
                json!({
                    "id": op.id,
                    "method": op.verb.upper(),
                    "path": op.path,
                    "description": op.description
                })
            })
            .collect();
        json!({ "operations": operations })
    }
}

fn resources_list_payload() -> Value {
    json!({
        "resources": [{
            "uri": OPERATIONS_RESOURCE_URI,
            "name": "operations",
            "description": "Index of the synthesized operations: id, method, path, description.",
            "mimeType": "application/json"
        }]
    })
}

#[derive(Debug)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcError {
    fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: -32600,
            message: message.into(),
        }
    }

    fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {method}"),
        }
    }

    fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
        }
    }
}

fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

fn error_response(id: Value, error: RpcError) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": error.code,
            "message": error.message
        }
    })
}

async fn read_framed_json(
    reader: &mut BufReader<tokio::io::Stdin>,
) -> Result<Option<Value>, std::io::Error> {
    let mut content_length: Option<usize> = None;

    loop {
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            if content_length.is_none() {
                return Ok(None);
            }
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Unexpected EOF while reading MCP headers",
            ));
        }

        if line == "\r\n" {
            break;
        }

        let line = line.trim_end_matches(['\r', '\n']);
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                let parsed = value.trim().parse::<usize>().map_err(|_| {
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "Invalid Content-Length header",
                    )
                })?;
                content_length = Some(parsed);
            }
        }
    }

    let content_length = content_length.ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "Missing Content-Length header",
        )
    })?;
    let mut payload = vec![0_u8; content_length];
    reader.read_exact(&mut payload).await?;

    let json: Value = serde_json::from_slice(&payload).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Invalid JSON payload: {e}"),
        )
    })?;
    Ok(Some(json))
}

async fn write_framed_json(
    writer: &mut tokio::io::Stdout,
    value: &Value,
) -> Result<(), std::io::Error> {
    let body = serde_json::to_vec(value).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Failed to serialize JSON: {e}"),
        )
    })?;
    let header = format!(
        "Content-Length: {}\r\nContent-Type: application/json\r\n\r\n",
        body.len()
    );
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

fn to_pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}
