//! Tool declaration fixes applied before requests cross the wire.

use serde_json::{Map, Value};

/// Ensure every function tool's `parameters` object carries `type: "object"`.
///
/// LM Studio rejects parameter schemas without a top-level `type`, which some
/// clients omit. Anything that isn't a function tool with an object `parameters`
/// is left alone. Mutates in place.
pub fn ensure_tool_parameters_type(tools: &mut [Value]) {
    for tool in tools.iter_mut() {
        if tool.get("type").and_then(Value::as_str) != Some("function") {
            continue;
        }
        let Some(params) = tool
            .get_mut("function")
            .and_then(|f| f.get_mut("parameters"))
            .and_then(Value::as_object_mut)
        else {
            continue;
        };
        if !params.contains_key("type") {
            params.insert("type".to_string(), Value::String("object".to_string()));
        }
    }
}

/// Apply [`ensure_tool_parameters_type`] to a raw JSON request body.
///
/// Returns `None` when the body isn't a JSON object with a `tools` array, in which
/// case the caller should forward the original bytes untouched.
pub fn fix_tools_in_body(body: &[u8]) -> Option<Vec<u8>> {
    let mut value: Value = serde_json::from_slice(body).ok()?;
    let tools = value.get_mut("tools")?.as_array_mut()?;
    ensure_tool_parameters_type(tools);
    serde_json::to_vec(&value).ok()
}

/// Reshape nested chat-completions function tools into the flat responses shape:
/// `{type, function: {name, description, parameters}}` becomes
/// `{type, name, description, parameters}`.
pub fn flatten_function_tools(tools: Vec<Value>) -> Vec<Value> {
    tools.into_iter().map(flatten_tool).collect()
}

fn flatten_tool(tool: Value) -> Value {
    let Value::Object(mut obj) = tool else {
        return tool;
    };
    if obj.get("type").and_then(Value::as_str) != Some("function")
        || !obj.get("function").is_some_and(Value::is_object)
    {
        return Value::Object(obj);
    }
    let Some(Value::Object(function)) = obj.remove("function") else {
        return Value::Object(obj);
    };

    let mut flat = Map::new();
    flat.insert("type".to_string(), Value::String("function".to_string()));
    for key in ["name", "description", "parameters"] {
        if let Some(v) = function.get(key) {
            flat.insert(key.to_string(), v.clone());
        }
    }
    // Keep anything else the caller put beside `function` (e.g. `strict`)
    for (key, v) in obj {
        flat.entry(key).or_insert(v);
    }
    Value::Object(flat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_adds_missing_object_type() {
        let mut tools = vec![json!({
            "type": "function",
            "function": {
                "name": "test",
                "parameters": { "properties": { "foo": { "type": "string" } } }
            }
        })];

        ensure_tool_parameters_type(&mut tools);

        assert_eq!(
            tools[0],
            json!({
                "type": "function",
                "function": {
                    "name": "test",
                    "parameters": {
                        "type": "object",
                        "properties": { "foo": { "type": "string" } }
                    }
                }
            })
        );
    }

    #[test]
    fn test_existing_type_untouched() {
        let original = json!({
            "type": "function",
            "function": { "name": "t", "parameters": { "type": "array" } }
        });
        let mut tools = vec![original.clone()];
        ensure_tool_parameters_type(&mut tools);
        assert_eq!(tools[0], original);
    }

    #[test]
    fn test_malformed_entries_pass_through() {
        let original = vec![
            Value::Null,
            json!(42),
            json!("tool"),
            json!({ "type": "retrieval" }),
            json!({ "type": "function" }),
            json!({ "type": "function", "function": null }),
            json!({ "type": "function", "function": { "name": "no_params" } }),
            json!({ "type": "function", "function": { "parameters": "oops" } }),
        ];
        let mut tools = original.clone();
        ensure_tool_parameters_type(&mut tools);
        assert_eq!(tools, original);
    }

    #[test]
    fn test_normalizer_is_idempotent() {
        let mut once = vec![
            json!({ "type": "function", "function": { "name": "a", "parameters": {} } }),
            json!({ "type": "code_interpreter" }),
        ];
        ensure_tool_parameters_type(&mut once);
        let mut twice = once.clone();
        ensure_tool_parameters_type(&mut twice);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_fix_tools_in_body() {
        let body = br#"{"model":"m","tools":[{"type":"function","function":{"name":"f","parameters":{}}}]}"#;
        let fixed = fix_tools_in_body(body).unwrap();
        let value: Value = serde_json::from_slice(&fixed).unwrap();
        assert_eq!(value["tools"][0]["function"]["parameters"]["type"], "object");

        assert!(fix_tools_in_body(b"{not json").is_none());
        assert!(fix_tools_in_body(br#"{"model":"m"}"#).is_none());
        assert!(fix_tools_in_body(br#"{"tools":"none"}"#).is_none());
    }

    #[test]
    fn test_flatten_function_tools() {
        let tools = vec![
            json!({
                "type": "function",
                "function": {
                    "name": "get_weather",
                    "description": "Weather for a city",
                    "parameters": { "type": "object" }
                }
            }),
            json!({ "type": "file_search", "vector_store_ids": ["vs_1"] }),
        ];

        let flat = flatten_function_tools(tools);

        assert_eq!(
            flat[0],
            json!({
                "type": "function",
                "name": "get_weather",
                "description": "Weather for a city",
                "parameters": { "type": "object" }
            })
        );
        assert_eq!(flat[1], json!({ "type": "file_search", "vector_store_ids": ["vs_1"] }));
    }

    #[test]
    fn test_flatten_keeps_function_tool_without_function_object() {
        let tool = json!({ "type": "function", "name": "already_flat" });
        assert_eq!(flatten_function_tools(vec![tool.clone()]), vec![tool]);
    }
}
