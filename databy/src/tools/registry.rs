//! Workflow-scoped tool registry.

use super::{ToolArguments, ToolEntry, ToolHandler, ToolSpec};
use crate::context::RunContext;
use crate::core::DataTable;
use crate::errors::ToolError;
use crate::events::names;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A tool call that parsed and names a registered tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedToolCall {
    /// The call ID, empty when the model sent none.
    pub id: String,
    /// The tool name.
    pub name: String,
    /// The parsed arguments.
    pub arguments: ToolArguments,
    /// The original raw call.
    pub raw: Value,
}

/// A tool call that could not be parsed or resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedToolCall {
    /// The call ID if available.
    pub id: Option<String>,
    /// The tool name if available.
    pub name: Option<String>,
    /// Why the call was rejected.
    pub error: String,
    /// The original raw call.
    pub raw: Value,
}

/// Tools grouped into named workflows.
///
/// Populated at start-up through `&mut self`, then shared read-only.
#[derive(Debug, Default, Clone)]
pub struct ToolRegistry {
    workflows: BTreeMap<String, BTreeMap<String, ToolEntry>>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the workflow bucket if it does not exist yet.
    ///
    /// Registering an existing workflow keeps its tools.
    pub fn register(&mut self, workflow: impl Into<String>) -> &mut Self {
        let workflow = workflow.into();
        if !self.workflows.contains_key(&workflow) {
            debug!(%workflow, "registering workflow");
            self.workflows.insert(workflow, BTreeMap::new());
        }
        self
    }

    /// Adds a tool to `workflow`, creating the workflow if needed.
    ///
    /// A tool registered again under the same name replaces the earlier one.
    pub fn register_tool<F>(&mut self, workflow: &str, spec: ToolSpec, handler: F) -> &mut Self
    where
        F: Fn(DataTable, &ToolArguments) -> Result<DataTable, ToolError> + Send + Sync + 'static,
    {
        let handler: ToolHandler = Arc::new(handler);
        debug!(workflow, tool = %spec.name, "registering tool");
        self.register(workflow);
        if let Some(bucket) = self.workflows.get_mut(workflow) {
            bucket.insert(spec.name.clone(), ToolEntry::new(spec, handler));
        }
        self
    }

    fn entry(&self, workflow: &str, tool: &str) -> Result<&ToolEntry, ToolError> {
        self.workflows
            .get(workflow)
            .and_then(|bucket| bucket.get(tool))
            .ok_or_else(|| ToolError::not_registered(workflow, tool))
    }

    /// Returns the handler of a tool.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::NotRegistered`] naming both the workflow and tool.
    pub fn get(&self, workflow: &str, tool: &str) -> Result<ToolHandler, ToolError> {
        self.entry(workflow, tool).map(|e| Arc::clone(e.handler()))
    }

    /// Returns the tool-calling schema of a tool.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::NotRegistered`] naming both the workflow and tool.
    pub fn get_metadata(&self, workflow: &str, tool: &str) -> Result<&Value, ToolError> {
        self.entry(workflow, tool).map(ToolEntry::schema)
    }

    /// Returns the declared spec of a tool.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::NotRegistered`] naming both the workflow and tool.
    pub fn get_spec(&self, workflow: &str, tool: &str) -> Result<&ToolSpec, ToolError> {
        self.entry(workflow, tool).map(ToolEntry::spec)
    }

    /// Returns every workflow name, sorted.
    #[must_use]
    pub fn list_workflows(&self) -> Vec<&str> {
        self.workflows.keys().map(String::as_str).collect()
    }

    /// Returns the tool names of `workflow`, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::WorkflowNotRegistered`].
    pub fn action_space(&self, workflow: &str) -> Result<Vec<&str>, ToolError> {
        self.workflows
            .get(workflow)
            .map(|bucket| bucket.keys().map(String::as_str).collect())
            .ok_or_else(|| ToolError::workflow_not_registered(workflow))
    }

    /// Returns the schemas of every tool in `workflow`, for a tool-calling
    /// request.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::WorkflowNotRegistered`].
    pub fn tool_schemas(&self, workflow: &str) -> Result<Vec<Value>, ToolError> {
        self.workflows
            .get(workflow)
            .map(|bucket| bucket.values().map(|e| e.schema().clone()).collect())
            .ok_or_else(|| ToolError::workflow_not_registered(workflow))
    }

    /// Checks the arguments against the tool spec and runs the tool.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool is unknown, an argument is missing or
    /// mistyped, or the tool itself fails.
    pub fn invoke(
        &self,
        workflow: &str,
        tool: &str,
        args: &ToolArguments,
        table: DataTable,
    ) -> Result<DataTable, ToolError> {
        let entry = self.entry(workflow, tool)?;
        entry.spec().check_arguments(args)?;

        let rows_before = table.row_count();
        let result = (entry.handler())(table, args);
        match &result {
            Ok(out) => info!(
                workflow,
                tool,
                rows_before,
                rows_after = out.row_count(),
                "tool invoked"
            ),
            Err(err) => warn!(workflow, tool, error = %err, "tool failed"),
        }
        result
    }

    /// Runs [`invoke`](Self::invoke) and publishes a `tool.invoked` event.
    ///
    /// # Errors
    ///
    /// Same as [`invoke`](Self::invoke).
    pub async fn invoke_in(
        &self,
        ctx: &RunContext,
        workflow: &str,
        tool: &str,
        args: &ToolArguments,
        table: DataTable,
    ) -> Result<DataTable, ToolError> {
        let result = self.invoke(workflow, tool, args, table);
        ctx.emit(
            names::TOOL_INVOKED,
            json!({
                "workflow": workflow,
                "tool": tool,
                "success": result.is_ok(),
                "error": result.as_ref().err().map(ToString::to_string),
            }),
        )
        .await;
        result
    }

    /// Parses model tool calls of the form
    /// `{"id": .., "function": {"name": .., "arguments": ..}}` against
    /// `workflow`.
    ///
    /// Arguments may be a JSON object or a string holding one; an empty
    /// string means no arguments.
    #[must_use]
    pub fn parse_and_resolve(
        &self,
        workflow: &str,
        calls: &[Value],
    ) -> Vec<Result<ResolvedToolCall, UnresolvedToolCall>> {
        calls.iter().map(|call| self.resolve_call(workflow, call)).collect()
    }

    fn resolve_call(&self, workflow: &str, call: &Value) -> Result<ResolvedToolCall, UnresolvedToolCall> {
        let id = call.get("id").and_then(Value::as_str).map(String::from);
        let reject = |name: Option<String>, error: String| UnresolvedToolCall {
            id: id.clone(),
            name,
            error,
            raw: call.clone(),
        };

        let function = call
            .get("function")
            .ok_or_else(|| reject(None, "Missing function wrapper".to_string()))?;
        let name = function
            .get("name")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| reject(None, "Missing tool name".to_string()))?;

        let arguments = match function.get("arguments") {
            Some(Value::String(s)) if s.trim().is_empty() => ToolArguments::new(),
            Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    return Err(reject(
                        Some(name),
                        "Arguments must be a JSON object".to_string(),
                    ))
                }
                Err(err) => {
                    return Err(reject(Some(name), format!("Invalid JSON in arguments: {err}")))
                }
            },
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Null) | None => ToolArguments::new(),
            Some(_) => {
                return Err(reject(
                    Some(name),
                    "Arguments must be a JSON object".to_string(),
                ))
            }
        };

        if let Err(err) = self.entry(workflow, &name) {
            return Err(reject(Some(name), err.to_string()));
        }

        Ok(ResolvedToolCall {
            id: id.unwrap_or_default(),
            name,
            arguments,
            raw: call.clone(),
        })
    }
}
