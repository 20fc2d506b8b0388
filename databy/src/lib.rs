//! # databy
//!
//! An LLM-driven data exploration agent.
//!
//! A dataset travels through a chain of stages inside a [`SessionRecord`]:
//!
//! - **`DefineDataset`** profiles every column (dtype, missing values,
//!   distinct values) into a summary table
//! - **`DescribeDataset`** asks a language model to describe the dataset and
//!   each of its columns
//! - **`DataTyperStage`** asks a language model to classify each column's
//!   semantic type
//!
//! Each stage checks its inputs before touching the session and validates its
//! own output before the agent state advances to the next stage. Pipelines
//! are looked up by name in a [`PipelineRegistry`]; dataset tools such as the
//! missing-value resolvers live in a [`ToolRegistry`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use databy::prelude::*;
//!
//! let settings = Settings::load()?;
//! let registry = PipelineRegistry::with_defaults(&settings)?;
//! let ctx = RunContext::new(Arc::new(OllamaClient::from_config(&settings.llm)?));
//!
//! let session = SessionRecord::new(DataTable::from_json_columns(&input)?);
//! let session = run_pipeline(&registry, DATA_EXPLORER, &ctx, session, None).await?;
//! println!("{}", serde_json::to_string_pretty(&SessionReport::from(&session))?);
//! ```
//!
//! [`SessionRecord`]: context::SessionRecord
//! [`PipelineRegistry`]: pipeline::PipelineRegistry
//! [`ToolRegistry`]: tools::ToolRegistry

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod api;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod llm;
pub mod observability;
pub mod pipeline;
pub mod stages;
pub mod testing;
pub mod tools;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::api::{ErrorResponse, SessionReport};
    pub use crate::config::Settings;
    pub use crate::context::{AgentStatus, RunContext, SessionRecord};
    pub use crate::core::{Cell, Column, DType, DataTable};
    pub use crate::errors::{
        DatabyError, LlmError, PipelineValidationError, StageError, TableError, ToolError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::llm::{CallHistory, ChatClient, Instruct, MockChatClient};
    #[cfg(feature = "ollama")]
    pub use crate::llm::OllamaClient;
    pub use crate::pipeline::{
        data_explorer_chain, run_pipeline, run_with_timeout, Chain, ChainBuilder,
        PipelineRegistry, DATA_EXPLORER,
    };
    pub use crate::stages::{DataTyperStage, DefineDataset, DescribeDataset, Stage};
    pub use crate::tools::{
        register_missing_value_tools, ToolParameter, ToolRegistry, ToolSpec, WireType,
        MISSING_VAL_RESOLVER,
    };
}
