//! MCP tool implementations, mapping tool calls to snapshot queries.

use serde_json::{json, Value};
use tracing::{info, warn};

use super::types::{ToolDefinition, ToolsCallResult};
use crate::analyzer::ProjectAnalyzer;
use crate::graph::types::SymbolKind;
use crate::query::{self, SearchOptions};

fn tool(name: &str, description: &str, input_schema: Value) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    }
}

fn search_schema(extra: Value) -> Value {
    let mut properties = json!({
        "pattern": {
            "type": "string",
            "description": "Regular expression matched against symbol names (e.g. 'Parser', '^get_')"
        },
        "case_sensitive": {
            "type": "boolean",
            "description": "Match case exactly (default from config, usually false)"
        },
        "project_only": {
            "type": "boolean",
            "description": "Exclude symbols from dependency directories",
            "default": true
        }
    });
    if let (Some(props), Value::Object(extra)) = (properties.as_object_mut(), extra) {
        props.extend(extra);
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": ["pattern"]
    })
}

fn name_schema(field: &str, description: &str, with_class: bool) -> Value {
    let mut properties = json!({
        field: { "type": "string", "description": description }
    });
    if with_class {
        if let Some(props) = properties.as_object_mut() {
            props.insert(
                "class_name".to_string(),
                json!({
                    "type": "string",
                    "description": "Optional: only members of this class"
                }),
            );
        }
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": [field]
    })
}

/// Return the list of all available tools with their JSON schemas.
pub fn list_tools() -> Vec<ToolDefinition> {
    vec![
        tool(
            "search_classes",
            "Search classes and structs by name pattern. Results are ordered by qualified name.",
            search_schema(json!({})),
        ),
        tool(
            "search_functions",
            "Search free functions and methods by name pattern, optionally within one class.",
            search_schema(json!({
                "class_name": {
                    "type": "string",
                    "description": "Optional: only methods of this class"
                }
            })),
        ),
        tool(
            "search_symbols",
            "Search every indexed symbol by name pattern, optionally filtered by kind.",
            search_schema(json!({
                "kinds": {
                    "type": "array",
                    "items": {
                        "type": "string",
                        "enum": ["class", "struct", "function", "method", "field", "enum", "namespace"]
                    },
                    "description": "Optional: symbol kinds to include"
                }
            })),
        ),
        tool(
            "get_class_info",
            "Class details: location, base classes, methods and fields.",
            name_schema("class_name", "Simple or qualified class name (e.g. 'geo::Shape')", false),
        ),
        tool(
            "get_function_signature",
            "Signatures of a function. Every overload is returned when the name is ambiguous.",
            name_schema("function_name", "Simple or qualified function name", true),
        ),
        tool(
            "find_in_file",
            "All symbols declared in a file, ordered by line.",
            json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Path relative to the project root, or absolute"
                    },
                    "pattern": {
                        "type": "string",
                        "description": "Optional: regular expression on symbol names"
                    }
                },
                "required": ["file_path"]
            }),
        ),
        tool(
            "get_class_hierarchy",
            "Ancestor chain of a class, root first. Cyclic inheritance is reported, not followed.",
            name_schema("class_name", "Simple or qualified class name", false),
        ),
        tool(
            "get_derived_classes",
            "Direct and transitive subclasses of a class, including subclasses of external bases such as std::exception.",
            json!({
                "type": "object",
                "properties": {
                    "class_name": {
                        "type": "string",
                        "description": "Simple or qualified class name"
                    },
                    "project_only": {
                        "type": "boolean",
                        "description": "Exclude subclasses from dependency directories",
                        "default": true
                    }
                },
                "required": ["class_name"]
            }),
        ),
        tool(
            "find_callers",
            "Functions that call the given function, with call sites.",
            name_schema("function_name", "Simple or qualified function name", true),
        ),
        tool(
            "find_callees",
            "Functions called by the given function, with call sites and unresolved calls.",
            name_schema("function_name", "Simple or qualified function name", true),
        ),
        tool(
            "get_call_path",
            "Shortest call chain from one function to another.",
            json!({
                "type": "object",
                "properties": {
                    "from_function": { "type": "string", "description": "Starting function" },
                    "to_function": { "type": "string", "description": "Target function" },
                    "max_depth": {
                        "type": "integer",
                        "description": "Maximum number of calls in the path (default from config)"
                    }
                },
                "required": ["from_function", "to_function"]
            }),
        ),
        tool(
            "get_stats",
            "Index statistics: files, symbols, call edges, cache hits, failures and diagnostics.",
            json!({ "type": "object", "properties": {} }),
        ),
        tool(
            "refresh_project",
            "Re-index changed files. With force=true the cache is dropped and every file is parsed again.",
            json!({
                "type": "object",
                "properties": {
                    "force": {
                        "type": "boolean",
                        "description": "Discard cached results",
                        "default": false
                    }
                }
            }),
        ),
    ]
}

/// Dispatch a tool call to the appropriate handler.
pub fn call_tool(analyzer: &ProjectAnalyzer, name: &str, arguments: &Value) -> ToolsCallResult {
    match name {
        "search_classes" | "search_functions" | "search_symbols" => {
            handle_search(analyzer, name, arguments)
        }
        "get_class_info" => handle_class(analyzer, arguments, ClassQuery::Info),
        "get_class_hierarchy" => handle_class(analyzer, arguments, ClassQuery::Hierarchy),
        "get_derived_classes" => handle_class(analyzer, arguments, ClassQuery::Derived),
        "get_function_signature" => handle_function(analyzer, arguments, FunctionQuery::Signature),
        "find_callers" => handle_function(analyzer, arguments, FunctionQuery::Callers),
        "find_callees" => handle_function(analyzer, arguments, FunctionQuery::Callees),
        "find_in_file" => handle_find_in_file(analyzer, arguments),
        "get_call_path" => handle_call_path(analyzer, arguments),
        "get_stats" => ToolsCallResult::json(&query::get_stats(&analyzer.snapshot())),
        "refresh_project" => handle_refresh(analyzer, arguments),
        _ => ToolsCallResult::error(format!("Unknown tool: {}", name)),
    }
}

fn required<'a>(args: &'a Value, field: &str) -> Result<&'a str, ToolsCallResult> {
    args.get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolsCallResult::error(format!("Missing required parameter: {}", field)))
}

fn optional_str<'a>(args: &'a Value, field: &str) -> Option<&'a str> {
    args.get(field).and_then(|v| v.as_str())
}

fn flag(args: &Value, field: &str) -> Option<bool> {
    args.get(field).and_then(|v| v.as_bool())
}

fn handle_search(analyzer: &ProjectAnalyzer, tool: &str, args: &Value) -> ToolsCallResult {
    let pattern = match required(args, "pattern") {
        Ok(p) => p,
        Err(e) => return e,
    };

    let options = SearchOptions {
        case_sensitive: flag(args, "case_sensitive")
            .unwrap_or(analyzer.config().case_sensitive_search),
        project_only: flag(args, "project_only").unwrap_or(true),
        class_name: optional_str(args, "class_name").map(String::from),
    };

    let mut kinds = Vec::new();
    if let Some(requested) = args.get("kinds").and_then(|v| v.as_array()) {
        for kind in requested {
            match kind.as_str().and_then(SymbolKind::parse) {
                Some(k) => kinds.push(k),
                None => return ToolsCallResult::error(format!("Unknown symbol kind: {}", kind)),
            }
        }
    }

    let snapshot = analyzer.snapshot();
    let response = match tool {
        "search_classes" => query::search_classes(&snapshot, pattern, &options),
        "search_functions" => query::search_functions(&snapshot, pattern, &options),
        _ => {
            let kinds = (!kinds.is_empty()).then_some(kinds.as_slice());
            query::search_symbols(&snapshot, pattern, kinds, &options)
        }
    };

    match response {
        Ok(r) => ToolsCallResult::json(&r),
        Err(e) => ToolsCallResult::error(e.to_string()),
    }
}

enum ClassQuery {
    Info,
    Hierarchy,
    Derived,
}

fn handle_class(analyzer: &ProjectAnalyzer, args: &Value, which: ClassQuery) -> ToolsCallResult {
    let name = match required(args, "class_name") {
        Ok(n) => n,
        Err(e) => return e,
    };
    let snapshot = analyzer.snapshot();
    match which {
        ClassQuery::Info => ToolsCallResult::json(&query::get_class_info(&snapshot, name)),
        ClassQuery::Hierarchy => ToolsCallResult::json(&query::get_class_hierarchy(&snapshot, name)),
        ClassQuery::Derived => {
            let project_only = flag(args, "project_only").unwrap_or(true);
            ToolsCallResult::json(&query::get_derived_classes(&snapshot, name, project_only))
        }
    }
}

enum FunctionQuery {
    Signature,
    Callers,
    Callees,
}

fn handle_function(
    analyzer: &ProjectAnalyzer,
    args: &Value,
    which: FunctionQuery,
) -> ToolsCallResult {
    let name = match required(args, "function_name") {
        Ok(n) => n,
        Err(e) => return e,
    };
    let class_name = optional_str(args, "class_name");
    let snapshot = analyzer.snapshot();
    match which {
        FunctionQuery::Signature => {
            ToolsCallResult::json(&query::get_function_signature(&snapshot, name, class_name))
        }
        FunctionQuery::Callers => {
            ToolsCallResult::json(&query::find_callers(&snapshot, name, class_name))
        }
        FunctionQuery::Callees => {
            ToolsCallResult::json(&query::find_callees(&snapshot, name, class_name))
        }
    }
}

fn handle_find_in_file(analyzer: &ProjectAnalyzer, args: &Value) -> ToolsCallResult {
    let file = match required(args, "file_path") {
        Ok(f) => f,
        Err(e) => return e,
    };
    let pattern = optional_str(args, "pattern");
    let case_sensitive = analyzer.config().case_sensitive_search;

    match query::find_in_file(&analyzer.snapshot(), file, pattern, case_sensitive) {
        Ok(r) => ToolsCallResult::json(&r),
        Err(e) => ToolsCallResult::error(e.to_string()),
    }
}

fn handle_call_path(analyzer: &ProjectAnalyzer, args: &Value) -> ToolsCallResult {
    let from = match required(args, "from_function") {
        Ok(f) => f,
        Err(e) => return e,
    };
    let to = match required(args, "to_function") {
        Ok(t) => t,
        Err(e) => return e,
    };
    let max_depth = args
        .get("max_depth")
        .and_then(|v| v.as_u64())
        .map(|d| d as usize)
        .unwrap_or(analyzer.config().max_call_path_depth);

    ToolsCallResult::json(&query::get_call_path(&analyzer.snapshot(), from, to, max_depth))
}

fn handle_refresh(analyzer: &ProjectAnalyzer, args: &Value) -> ToolsCallResult {
    let force = flag(args, "force").unwrap_or(false);
    info!(force, "refreshing project");
    let result = if force {
        analyzer.force_reindex()
    } else {
        analyzer.refresh()
    };
    match result {
        Ok(snapshot) => ToolsCallResult::json(&query::get_stats(&snapshot)),
        Err(e) => {
            warn!(error = %e, "refresh failed");
            ToolsCallResult::error(format!("Refresh failed: {}", e))
        }
    }
}
