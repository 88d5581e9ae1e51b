//! Translation of server tool definitions into model tool descriptors.

use std::collections::HashSet;

use mcp::Tool;
use serde_json::{Map, Value};

use super::{Parameter, ParamType, SchemaError, ToolDescriptor};

/// Translate a whole catalog.
///
/// Fails on the first malformed entry or repeated name: the model is given
/// either every tool or none of them.
pub fn translate_catalog(tools: &[Tool]) -> Result<Vec<ToolDescriptor>, SchemaError> {
    let mut seen = HashSet::new();
    tools
        .iter()
        .map(|tool| {
            if !seen.insert(tool.name.as_str()) {
                return Err(SchemaError::DuplicateTool {
                    tool: tool.name.clone(),
                });
            }
            translate(tool)
        })
        .collect()
}

/// Translate one server tool definition.
pub fn translate(tool: &Tool) -> Result<ToolDescriptor, SchemaError> {
    let name = &tool.name;
    let schema = tool
        .input_schema
        .as_object()
        .ok_or_else(|| SchemaError::NotAnObject { tool: name.clone() })?;

    if let Some(kind) = schema.get("type") {
        if kind.as_str() != Some("object") {
            return Err(SchemaError::NotObjectType {
                tool: name.clone(),
                found: kind.to_string(),
            });
        }
    }

    let empty = Map::new();
    let properties = match schema.get("properties") {
        None => &empty,
        Some(value) => value
            .as_object()
            .ok_or_else(|| SchemaError::InvalidProperties { tool: name.clone() })?,
    };

    let parameters = properties
        .iter()
        .map(|(property, spec)| parameter(name, property, spec))
        .collect::<Result<Vec<_>, _>>()?;

    let required = match schema.get("required") {
        None => Vec::new(),
        Some(value) => required_names(name, value)?,
    };

    if let Some(unknown) = required.iter().find(|r| !properties.contains_key(*r)) {
        return Err(SchemaError::UnknownRequired {
            tool: name.clone(),
            property: unknown.clone(),
        });
    }

    Ok(ToolDescriptor {
        name: name.clone(),
        description: tool.description.clone().unwrap_or_default(),
        parameters,
        required,
    })
}

fn parameter(tool: &str, property: &str, spec: &Value) -> Result<Parameter, SchemaError> {
    let kind = spec.get("type").ok_or_else(|| SchemaError::MissingType {
        tool: tool.to_string(),
        property: property.to_string(),
    })?;

    let kind = kind
        .as_str()
        .and_then(ParamType::parse)
        .ok_or_else(|| SchemaError::UnsupportedType {
            tool: tool.to_string(),
            property: property.to_string(),
            found: kind.to_string(),
        })?;

    // A `title` is a label, not a description; fall back to the name instead.
    let description = spec
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or(property)
        .to_string();

    Ok(Parameter {
        name: property.to_string(),
        kind,
        description,
    })
}

fn required_names(tool: &str, value: &Value) -> Result<Vec<String>, SchemaError> {
    let invalid = || SchemaError::InvalidRequired {
        tool: tool.to_string(),
    };
    value
        .as_array()
        .ok_or_else(invalid)?
        .iter()
        .map(|entry| entry.as_str().map(str::to_string).ok_or_else(invalid))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(name: &str, schema: Value) -> Tool {
        Tool {
            name: name.to_string(),
            description: Some(format!("{name} tool")),
            input_schema: schema,
        }
    }

    fn add_tool() -> Tool {
        mcp::testing::binary_tool("add", "Add two numbers")
    }

    #[test]
    fn translates_binary_tool() {
        let descriptor = translate(&add_tool()).unwrap();
        assert_eq!(descriptor.name, "add");
        assert_eq!(descriptor.description, "Add two numbers");
        assert_eq!(descriptor.required, ["a", "b"]);

        let names: Vec<_> = descriptor.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        let a = descriptor.parameter("a").unwrap();
        assert_eq!(a.kind, ParamType::Integer);
        // Only a title was given.
        assert_eq!(a.description, "a");
    }

    #[test]
    fn prefers_property_description() {
        let descriptor = translate(&tool(
            "search",
            json!({
                "type": "object",
                "properties": {"query": {"type": "string", "title": "Q", "description": "Search text"}},
                "required": ["query"]
            }),
        ))
        .unwrap();
        assert_eq!(descriptor.parameter("query").unwrap().description, "Search text");
    }

    #[test]
    fn catalog_of_n_yields_n_descriptors() {
        let tools = vec![
            add_tool(),
            mcp::testing::binary_tool("subtract", "Subtract two numbers"),
            mcp::testing::binary_tool("multiply", "Multiply two numbers"),
        ];
        let catalog = translate_catalog(&tools).unwrap();
        assert_eq!(catalog.len(), 3);
        for (descriptor, tool) in catalog.iter().zip(&tools) {
            assert_eq!(descriptor.name, tool.name);
            assert_eq!(Some(descriptor.description.as_str()), tool.description.as_deref());
            assert_eq!(descriptor.required, ["a", "b"]);
        }
    }

    #[test]
    fn missing_type_aborts_whole_catalog() {
        let broken = tool(
            "broken",
            json!({
                "type": "object",
                "properties": {"x": {"title": "X"}},
                "required": []
            }),
        );
        let err = translate_catalog(&[add_tool(), broken, add_tool()]).unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingType {
                tool: "broken".into(),
                property: "x".into()
            }
        );
    }

    #[test]
    fn duplicate_name_aborts_whole_catalog() {
        let tools = [
            mcp::testing::binary_tool("add", "Add two numbers"),
            mcp::testing::binary_tool("subtract", "Subtract two numbers"),
            mcp::testing::binary_tool("add", "Concatenate two numbers"),
        ];
        let err = translate_catalog(&tools).unwrap_err();
        assert_eq!(err, SchemaError::DuplicateTool { tool: "add".into() });
    }

    #[test]
    fn union_types_are_unsupported() {
        let err = translate(&tool(
            "maybe",
            json!({"type": "object", "properties": {"x": {"type": ["string", "null"]}}}),
        ))
        .unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedType { .. }));

        let err = translate(&tool(
            "odd",
            json!({"type": "object", "properties": {"x": {"type": "date"}}}),
        ))
        .unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedType { .. }));
    }

    #[test]
    fn zero_argument_tool() {
        let descriptor = translate(&tool("now", json!({"type": "object"}))).unwrap();
        assert!(descriptor.parameters.is_empty());
        assert!(descriptor.required.is_empty());
    }

    #[test]
    fn rejects_unknown_required_entry() {
        let err = translate(&tool(
            "add",
            json!({
                "type": "object",
                "properties": {"a": {"type": "integer"}},
                "required": ["a", "c"]
            }),
        ))
        .unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnknownRequired {
                tool: "add".into(),
                property: "c".into()
            }
        );
    }

    #[test]
    fn rejects_malformed_top_level() {
        assert!(matches!(
            translate(&tool("a", json!("nope"))),
            Err(SchemaError::NotAnObject { .. })
        ));
        assert!(matches!(
            translate(&tool("b", json!({"type": "array"}))),
            Err(SchemaError::NotObjectType { .. })
        ));
        assert!(matches!(
            translate(&tool("c", json!({"type": "object", "properties": []}))),
            Err(SchemaError::InvalidProperties { .. })
        ));
        assert!(matches!(
            translate(&tool("d", json!({"type": "object", "properties": {}, "required": [1]}))),
            Err(SchemaError::InvalidRequired { .. })
        ));
    }

    #[test]
    fn missing_description_is_empty() {
        let mut bare = add_tool();
        bare.description = None;
        assert_eq!(translate(&bare).unwrap().description, "");
    }
}
