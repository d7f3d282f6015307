//! Per-server tool allowlist: admission checks and `tools/list` rewriting.
//!
//! An empty allowlist disables filtering entirely. Admission is an exact,
//! case-sensitive name match.

use crate::jsonrpc::JsonRpcRequest;
use crate::types::ServerRecord;
use serde_json::Value;

/// Whether a tool may be listed or called on this server.
pub fn tool_allowed(record: &ServerRecord, name: &str) -> bool {
    !record.is_filtered() || record.allowed_tools.iter().any(|t| t == name)
}

/// The tool name of a `tools/call` request, if the params carry one.
pub fn call_tool_name(request: &JsonRpcRequest) -> Option<&str> {
    request
        .params
        .as_ref()
        .and_then(|p| p.get("name"))
        .and_then(|n| n.as_str())
}

pub fn tool_not_allowed_message(name: &str) -> String {
    format!("Tool '{}' is not allowed on this server", name)
}

/// Rewrite a `tools/list` result to the allowed subset, preserving the
/// backend's tool order and any sibling result fields (e.g. `nextCursor`).
///
/// Returns `None` when the result does not have the `{tools: [...]}` shape;
/// the caller then relays the original bytes untouched.
pub fn filter_tools_result(result: &Value, record: &ServerRecord) -> Option<Value> {
    let obj = result.as_object()?;
    let tools = obj.get("tools")?.as_array()?;

    let filtered: Vec<Value> = tools
        .iter()
        .filter(|tool| {
            tool.get("name")
                .and_then(|n| n.as_str())
                .map(|name| tool_allowed(record, name))
                .unwrap_or(false)
        })
        .cloned()
        .collect();

    let mut out = obj.clone();
    out.insert("tools".to_string(), Value::Array(filtered));
    Some(Value::Object(out))
}
