//! Tools (actuators) the agent can call on a dataset.
//!
//! Each tool is registered under a workflow with an explicit [`ToolSpec`],
//! from which its tool-calling schema is rendered.

mod definitions;
mod missing_values;
mod registry;

pub use definitions::{
    ToolArguments, ToolEntry, ToolHandler, ToolParameter, ToolSpec, WireType,
};
pub use missing_values::{
    drop_incomplete_rows, drop_missing, fill_with_mean, fill_with_median, fill_with_mode,
    fill_with_value, handle_missing_values, register_missing_value_tools, MissingValueStrategy,
    MISSING_VAL_RESOLVER, UNKNOWN_FILL,
};
pub use registry::{ResolvedToolCall, ToolRegistry, UnresolvedToolCall};
