//! Error types for the databy pipeline.
//!
//! Every failure inside the chain is a local, synchronous `Err` that unwinds
//! the whole traversal. Stage errors always carry the name of the stage that
//! raised them so callers can report which step broke.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for databy operations.
#[derive(Debug, Error)]
pub enum DatabyError {
    /// A stage failed its precondition or postcondition checks.
    #[error("{0}")]
    Stage(#[from] StageError),

    /// A chain or registry definition is invalid.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// A tool lookup or invocation failed.
    #[error("{0}")]
    Tool(#[from] ToolError),

    /// A language-model call failed.
    #[error("{0}")]
    Llm(#[from] LlmError),

    /// A table could not be built or modified.
    #[error("{0}")]
    Table(#[from] TableError),

    /// Settings could not be loaded.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// The requested pipeline was never registered.
    #[error("Pipeline '{0}' is not registered")]
    PipelineNotFound(String),

    /// The agent status is internally inconsistent.
    #[error("Agent is not alive but state shows the agent is {0}")]
    AgentState(String),

    /// A pipeline run exceeded its deadline and was abandoned.
    #[error("Pipeline '{pipeline}' timed out after {seconds}s")]
    Timeout {
        /// The pipeline name.
        pipeline: String,
        /// The deadline in seconds.
        seconds: f64,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DatabyError {
    /// Short machine-readable kind, used in client-facing error bodies.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Stage(err) => err.kind(),
            Self::Validation(_) => "pipeline_validation",
            Self::Tool(_) => "tool",
            Self::Llm(_) => "llm",
            Self::Table(_) => "table",
            Self::Config(_) => "config",
            Self::PipelineNotFound(_) => "pipeline_not_found",
            Self::AgentState(_) => "agent_state",
            Self::Timeout { .. } => "timeout",
            Self::Serialization(_) => "serialization",
        }
    }
}

impl From<serde_json::Error> for DatabyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

fn fmt_columns(columns: &[String]) -> String {
    if columns.is_empty() {
        "None".to_string()
    } else {
        format!("[{}]", columns.join(", "))
    }
}

/// Errors raised by pipeline stages.
#[derive(Debug, Error)]
pub enum StageError {
    /// A required upstream field was absent when the stage started.
    #[error("{stage}: session {field} unavailable. Please define {field} in the session before proceeding to this stage.")]
    Precondition {
        /// The stage that refused to run.
        stage: String,
        /// The missing session field.
        field: String,
    },

    /// The stage finished but an attribute it owns is missing.
    #[error("{stage}: expected attribute {attribute} either returned None or missing.")]
    MissingAttribute {
        /// The stage that produced the output.
        stage: String,
        /// The missing attribute.
        attribute: String,
    },

    /// The data summary does not have exactly the expected column set.
    #[error(
        "{stage}: data summary columns mismatch. Missing: {}, Extra: {}",
        fmt_columns(.missing),
        fmt_columns(.extra)
    )]
    SchemaMismatch {
        /// The stage that produced the output.
        stage: String,
        /// Expected columns that are absent.
        missing: Vec<String>,
        /// Columns present that were not expected.
        extra: Vec<String>,
    },

    /// Columns the stage should have added are absent.
    #[error("{stage}: expected data_summary fields after this stage but detected missing fields: {}", fmt_columns(.missing))]
    MissingColumns {
        /// The stage that produced the output.
        stage: String,
        /// The absent columns.
        missing: Vec<String>,
    },

    /// A language-model call made by the stage failed.
    #[error("{stage}: {source}")]
    Llm {
        /// The stage that made the call.
        stage: String,
        /// The underlying error.
        #[source]
        source: LlmError,
    },

    /// A table operation made by the stage failed.
    #[error("{stage}: {source}")]
    Table {
        /// The stage that touched the table.
        stage: String,
        /// The underlying error.
        #[source]
        source: TableError,
    },
}

impl StageError {
    /// Creates a precondition error.
    #[must_use]
    pub fn precondition(stage: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Precondition {
            stage: stage.into(),
            field: field.into(),
        }
    }

    /// Creates a missing attribute error.
    #[must_use]
    pub fn missing_attribute(stage: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::MissingAttribute {
            stage: stage.into(),
            attribute: attribute.into(),
        }
    }

    /// Wraps a language-model error.
    #[must_use]
    pub fn llm(stage: impl Into<String>, source: LlmError) -> Self {
        Self::Llm {
            stage: stage.into(),
            source,
        }
    }

    /// Wraps a table error.
    #[must_use]
    pub fn table(stage: impl Into<String>, source: TableError) -> Self {
        Self::Table {
            stage: stage.into(),
            source,
        }
    }

    /// Returns the name of the stage that raised the error.
    #[must_use]
    pub fn stage(&self) -> &str {
        match self {
            Self::Precondition { stage, .. }
            | Self::MissingAttribute { stage, .. }
            | Self::SchemaMismatch { stage, .. }
            | Self::MissingColumns { stage, .. }
            | Self::Llm { stage, .. }
            | Self::Table { stage, .. } => stage,
        }
    }

    /// Returns true for errors raised by the stage's own checks rather than
    /// by an external collaborator.
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        !matches!(self, Self::Llm { .. } | Self::Table { .. })
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Precondition { .. } => "precondition",
            Self::MissingAttribute { .. } | Self::SchemaMismatch { .. } | Self::MissingColumns { .. } => {
                "validation"
            }
            Self::Llm { .. } => "llm",
            Self::Table { .. } => "table",
        }
    }
}

/// Metadata about a contract error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "CONTRACT-001-EMPTY").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }
}

/// Error raised when a chain or pipeline registration is invalid.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the contract code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}

/// Errors related to the tool registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    /// The workflow bucket was never created.
    #[error("Workflow '{workflow}' is not registered")]
    WorkflowNotRegistered {
        /// The workflow name.
        workflow: String,
    },

    /// The tool is not registered in the workflow.
    #[error("Tool '{tool}' is not registered in workflow '{workflow}'")]
    NotRegistered {
        /// The workflow name.
        workflow: String,
        /// The tool name.
        tool: String,
    },

    /// A required argument was not supplied.
    #[error("Tool '{tool}' is missing required argument '{argument}'")]
    MissingArgument {
        /// The tool name.
        tool: String,
        /// The argument name.
        argument: String,
    },

    /// An argument had an unusable value.
    #[error("Tool '{tool}' received invalid argument '{argument}': {reason}")]
    InvalidArgument {
        /// The tool name.
        tool: String,
        /// The argument name.
        argument: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// Tool execution failed.
    #[error("Tool execution failed: {tool} - {reason}")]
    ExecutionFailed {
        /// The tool name.
        tool: String,
        /// The reason for failure.
        reason: String,
    },
}

impl ToolError {
    /// Creates a not registered error.
    #[must_use]
    pub fn not_registered(workflow: impl Into<String>, tool: impl Into<String>) -> Self {
        Self::NotRegistered {
            workflow: workflow.into(),
            tool: tool.into(),
        }
    }

    /// Creates a workflow not registered error.
    #[must_use]
    pub fn workflow_not_registered(workflow: impl Into<String>) -> Self {
        Self::WorkflowNotRegistered {
            workflow: workflow.into(),
        }
    }

    /// Creates a missing argument error.
    #[must_use]
    pub fn missing_argument(tool: impl Into<String>, argument: impl Into<String>) -> Self {
        Self::MissingArgument {
            tool: tool.into(),
            argument: argument.into(),
        }
    }

    /// Creates an invalid argument error.
    #[must_use]
    pub fn invalid_argument(
        tool: impl Into<String>,
        argument: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidArgument {
            tool: tool.into(),
            argument: argument.into(),
            reason: reason.into(),
        }
    }

    /// Creates an execution failed error.
    #[must_use]
    pub fn execution_failed(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            tool: tool.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by language-model callers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    /// A prompt argument required by `pre_process` was not supplied.
    #[error("{function}: missing required prompt argument '{argument}'")]
    MissingArgument {
        /// The caller label.
        function: String,
        /// The argument name.
        argument: String,
    },

    /// `pre_process` received an argument it does not accept.
    #[error("{function}: unexpected prompt argument '{argument}'")]
    UnexpectedArgument {
        /// The caller label.
        function: String,
        /// The argument name.
        argument: String,
    },

    /// The model answered outside the accepted vocabulary.
    #[error("{function}: invalid model response '{response}'")]
    InvalidResponse {
        /// The caller label.
        function: String,
        /// The raw response.
        response: String,
    },

    /// The transport failed before a response was received.
    #[error("LLM transport error: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("LLM server returned status {status}: {body}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The response body.
        body: String,
    },
}

/// Errors raised while building or editing a `DataTable`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TableError {
    /// A column length does not match the table's row count.
    #[error("Column '{column}' has {actual} values but the table has {expected} rows")]
    LengthMismatch {
        /// The column name.
        column: String,
        /// The table row count.
        expected: usize,
        /// The column length.
        actual: usize,
    },

    /// Two columns share a name.
    #[error("Duplicate column '{0}'")]
    DuplicateColumn(String),

    /// A referenced column does not exist.
    #[error("Unknown column '{0}'")]
    UnknownColumn(String),

    /// The JSON input does not describe a table.
    #[error("Unsupported table input: {0}")]
    UnsupportedJson(String),
}

/// Errors raised while loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file could not be read.
    #[error("Failed to read settings file '{path}': {source}")]
    Io {
        /// The file path.
        path: String,
        /// The IO error.
        #[source]
        source: std::io::Error,
    },

    /// The settings document could not be parsed.
    #[error("Failed to parse settings: {0}")]
    Parse(String),

    /// A model name is missing from the catalogue.
    #[error("Invalid model '{0}' requested. Please update the model catalogue.")]
    UnknownModel(String),

    /// A prompt key is missing from the prompt catalogue.
    #[error("Prompt '{0}' is not defined in the prompt catalogue")]
    UnknownPrompt(String),

    /// A setting has an unusable value.
    #[error("Invalid value '{value}' for setting '{key}'")]
    InvalidValue {
        /// The setting key.
        key: String,
        /// The rejected value.
        value: String,
    },

    /// The logging subscriber could not be installed.
    #[error("Failed to initialise logging: {0}")]
    Logging(String),
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
