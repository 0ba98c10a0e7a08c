//! MCP JSON-RPC 2.0 server: requests on stdin, responses on stdout.
//!
//! The MCP protocol uses newline-delimited JSON over STDIO.
//! Tracing output goes to stderr so it doesn't interfere with the protocol.

use std::io::{self, BufRead, Write};

use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::tools;
use super::types::*;
use crate::analyzer::ProjectAnalyzer;

/// Serve requests until stdin closes.
///
/// Each tool call queries the analyzer's current snapshot, so a
/// `refresh_project` call is visible to every request after it.
pub fn run(analyzer: &ProjectAnalyzer) {
    info!(root = %analyzer.root().display(), "MCP server starting");

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut stdout = stdout.lock();
    serve(analyzer, stdin.lock(), &mut stdout);

    info!("MCP server shutting down");
}

/// The request loop over arbitrary streams.
pub fn serve(analyzer: &ProjectAnalyzer, input: impl BufRead, output: &mut impl Write) {
    for line in input.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                error!(error = %e, "failed to read stdin");
                break;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        debug!(request = %trimmed, "received request");

        let request: JsonRpcRequest = match serde_json::from_str(trimmed) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "invalid JSON-RPC request");
                let response =
                    JsonRpcResponse::error(None, PARSE_ERROR, format!("Parse error: {}", e));
                write_response(output, &response);
                continue;
            }
        };

        if let Some(resp) = handle_request(analyzer, &request) {
            write_response(output, &resp);
        }
    }
}

/// Handle a single request; notifications get no response.
pub fn handle_request(
    analyzer: &ProjectAnalyzer,
    request: &JsonRpcRequest,
) -> Option<JsonRpcResponse> {
    let id = request.id.clone();

    match request.method.as_str() {
        "initialize" => {
            info!("client initializing");
            let result = InitializeResult {
                protocol_version: PROTOCOL_VERSION.to_string(),
                capabilities: ServerCapabilities {
                    tools: ToolCapability {},
                },
                server_info: ServerInfo {
                    name: "anchor-cpp".to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                },
            };
            Some(JsonRpcResponse::from_result(id, &result))
        }

        "notifications/initialized" => {
            info!("client initialized");
            None
        }

        "tools/list" => {
            debug!("listing tools");
            let result = ToolsListResult {
                tools: tools::list_tools(),
            };
            Some(JsonRpcResponse::from_result(id, &result))
        }

        "tools/call" => {
            let params: ToolsCallParams = match serde_json::from_value(request.params.clone()) {
                Ok(p) => p,
                Err(e) => {
                    return Some(JsonRpcResponse::error(
                        id,
                        INVALID_PARAMS,
                        format!("Invalid params: {}", e),
                    ));
                }
            };

            debug!(tool = %params.name, "calling tool");
            let result = tools::call_tool(analyzer, &params.name, &params.arguments);
            Some(JsonRpcResponse::from_result(id, &result))
        }

        "ping" => Some(JsonRpcResponse::success(id, Value::Object(Default::default()))),

        _ if request.id.is_none() => {
            debug!(method = %request.method, "ignoring notification");
            None
        }

        _ => {
            warn!(method = %request.method, "unknown method");
            Some(JsonRpcResponse::error(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            ))
        }
    }
}

/// Write a JSON-RPC response (newline-delimited).
fn write_response(output: &mut impl Write, response: &JsonRpcResponse) {
    let json = serde_json::to_string(response).unwrap_or_default();
    debug!(response = %json, "sending response");
    let _ = writeln!(output, "{}", json);
    let _ = output.flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnchorConfig;
    use std::fs;
    use tempfile::TempDir;

    fn analyzer() -> (TempDir, ProjectAnalyzer) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.cpp"), "void a() {}\n").unwrap();
        let config = AnchorConfig {
            workers: Some(1),
            ..AnchorConfig::default()
        };
        let analyzer = ProjectAnalyzer::new(dir.path(), config).unwrap();
        analyzer.index().unwrap();
        (dir, analyzer)
    }

    fn exchange(analyzer: &ProjectAnalyzer, input: &str) -> Vec<Value> {
        let mut out = Vec::new();
        serve(analyzer, input.as_bytes(), &mut out);
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_session() {
        let (_dir, analyzer) = analyzer();
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"search_functions","arguments":{"pattern":"^a$"}}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":4,"method":"ping"}"#,
            "\n",
        );
        let responses = exchange(&analyzer, input);
        assert_eq!(responses.len(), 4);
        assert_eq!(responses[0]["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(responses[0]["result"]["serverInfo"]["name"], "anchor-cpp");
        assert!(responses[1]["result"]["tools"].as_array().unwrap().len() > 10);

        let text = responses[2]["result"]["content"][0]["text"].as_str().unwrap();
        let body: Value = serde_json::from_str(text).unwrap();
        assert_eq!(body["status"], "found");
        assert_eq!(body["results"][0]["qualified_name"], "a");

        assert_eq!(responses[3]["id"], 4);
        assert!(responses[3]["result"].is_object());
    }

    #[test]
    fn test_protocol_errors() {
        let (_dir, analyzer) = analyzer();
        let input = concat!(
            "not json\n",
            r#"{"jsonrpc":"2.0","id":7,"method":"resources/list"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":8,"method":"tools/call","params":{"arguments":{}}}"#,
            "\n",
        );
        let responses = exchange(&analyzer, input);
        assert_eq!(responses[0]["error"]["code"], PARSE_ERROR);
        assert_eq!(responses[1]["error"]["code"], METHOD_NOT_FOUND);
        assert_eq!(responses[2]["error"]["code"], INVALID_PARAMS);
    }
}
