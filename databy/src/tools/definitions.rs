//! Tool specifications and their LLM tool-calling schema.

use crate::core::DataTable;
use crate::errors::ToolError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;

/// Arguments passed to a tool, keyed by parameter name.
pub type ToolArguments = Map<String, Value>;

/// A registered tool body. Takes ownership of the table and returns the
/// transformed one.
pub type ToolHandler =
    Arc<dyn Fn(DataTable, &ToolArguments) -> Result<DataTable, ToolError> + Send + Sync>;

/// JSON schema type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WireType {
    /// Whole numbers.
    Integer,
    /// Any number.
    Number,
    /// `true` or `false`.
    Boolean,
    /// Anything else.
    #[default]
    String,
}

impl WireType {
    /// Parses a type name. Unrecognised names become [`WireType::String`].
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "integer" | "int" | "i64" | "usize" => Self::Integer,
            "number" | "float" | "f64" => Self::Number,
            "boolean" | "bool" => Self::Boolean,
            _ => Self::String,
        }
    }

    /// Returns the JSON schema name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::String => "string",
        }
    }

    /// Returns true if `value` has this wire type. `null` never matches.
    ///
    /// `String` is also the type of parameters declared without one, so it
    /// takes any scalar.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::String => value.is_string() || value.is_number() || value.is_boolean(),
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared tool parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolParameter {
    /// Parameter name.
    pub name: String,
    /// JSON schema type.
    pub wire_type: WireType,
    /// Human readable description, if any.
    pub description: Option<String>,
    /// Whether callers must supply it.
    pub required: bool,
}

impl ToolParameter {
    /// A parameter callers must supply.
    #[must_use]
    pub fn required(name: impl Into<String>, wire_type: WireType) -> Self {
        Self {
            name: name.into(),
            wire_type,
            description: None,
            required: true,
        }
    }

    /// A parameter callers may omit.
    #[must_use]
    pub fn optional(name: impl Into<String>, wire_type: WireType) -> Self {
        Self {
            required: false,
            ..Self::required(name, wire_type)
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns the description, or a generated one when none was declared.
    #[must_use]
    pub fn description_or_default(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| format!("Argument `{}` of type {}", self.name, self.wire_type))
    }
}

/// Declares a tool: its name, what it does and what it takes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    /// Tool name, unique within a workflow.
    pub name: String,
    /// What the tool does.
    pub description: String,
    /// Declared parameters, in order.
    pub parameters: Vec<ToolParameter>,
}

impl ToolSpec {
    /// Creates a spec without parameters.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, parameter: ToolParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Returns the names of required parameters in declaration order.
    #[must_use]
    pub fn required(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Returns the tool-calling schema:
    /// `{type: function, function: {name, description, parameters}}`.
    #[must_use]
    pub fn to_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    json!({
                        "type": p.wire_type.as_str(),
                        "description": p.description_or_default(),
                    }),
                )
            })
            .collect();

        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": {
                    "type": "object",
                    "required": self.required(),
                    "properties": properties,
                },
            },
        })
    }

    /// Checks that every required argument is present and that supplied
    /// arguments have the declared wire type.
    ///
    /// Undeclared arguments are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::MissingArgument`] or [`ToolError::InvalidArgument`].
    pub fn check_arguments(&self, args: &ToolArguments) -> Result<(), ToolError> {
        for parameter in &self.parameters {
            match args.get(&parameter.name) {
                None | Some(Value::Null) if parameter.required => {
                    return Err(ToolError::missing_argument(&self.name, &parameter.name));
                }
                None | Some(Value::Null) => {}
                Some(value) if !parameter.wire_type.accepts(value) => {
                    return Err(ToolError::invalid_argument(
                        &self.name,
                        &parameter.name,
                        format!("expected {}, got {value}", parameter.wire_type),
                    ));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// A registered tool: its spec, rendered schema and handler.
#[derive(Clone)]
pub struct ToolEntry {
    spec: ToolSpec,
    schema: Value,
    handler: ToolHandler,
}

impl ToolEntry {
    /// Creates an entry and renders its schema once.
    #[must_use]
    pub fn new(spec: ToolSpec, handler: ToolHandler) -> Self {
        let schema = spec.to_schema();
        Self {
            spec,
            schema,
            handler,
        }
    }

    /// Returns the declaration.
    #[must_use]
    pub fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    /// Returns the tool-calling schema.
    #[must_use]
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Returns the handler.
    #[must_use]
    pub fn handler(&self) -> &ToolHandler {
        &self.handler
    }
}

impl fmt::Debug for ToolEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolEntry")
            .field("name", &self.spec.name)
            .field("parameters", &self.spec.parameters.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn spec() -> ToolSpec {
        ToolSpec::new("drop_missing", "Drop rows with a missing value in the column.")
            .with_parameter(
                ToolParameter::required("target_col", WireType::String)
                    .with_description("Column to inspect."),
            )
            .with_parameter(ToolParameter::optional("limit", WireType::parse("int")))
    }

    #[test]
    fn test_wire_type_parse_falls_back_to_string() {
        assert_eq!(WireType::parse("bool"), WireType::Boolean);
        assert_eq!(WireType::parse("Number"), WireType::Number);
        assert_eq!(WireType::parse("DataFrame"), WireType::String);
        assert_eq!(WireType::parse(""), WireType::String);
    }

    #[test]
    fn test_schema_layout() {
        let schema = spec().to_schema();

        assert_eq!(
            schema,
            json!({
                "type": "function",
                "function": {
                    "name": "drop_missing",
                    "description": "Drop rows with a missing value in the column.",
                    "parameters": {
                        "type": "object",
                        "required": ["target_col"],
                        "properties": {
                            "target_col": {"type": "string", "description": "Column to inspect."},
                            "limit": {"type": "integer", "description": "Argument `limit` of type integer"},
                        },
                    },
                },
            })
        );
    }

    #[test]
    fn test_check_arguments() {
        let spec = spec();
        let mut args = ToolArguments::new();

        assert_eq!(
            spec.check_arguments(&args),
            Err(ToolError::missing_argument("drop_missing", "target_col"))
        );

        args.insert("target_col".to_string(), json!("age"));
        assert!(spec.check_arguments(&args).is_ok());

        args.insert("limit".to_string(), json!("ten"));
        assert!(matches!(
            spec.check_arguments(&args),
            Err(ToolError::InvalidArgument { argument, .. }) if argument == "limit"
        ));
    }
}
