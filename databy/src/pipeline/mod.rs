//! Pipeline chains, discovery and execution.

mod chain;
mod data_explorer;
#[cfg(test)]
mod integration_tests;
mod registry;
mod runner;

pub use chain::{Chain, ChainBuilder};
pub use data_explorer::{data_explorer_chain, DATA_EXPLORER};
pub use registry::{PipelineDescriptor, PipelineRegistry};
pub use runner::{run_pipeline, run_with_timeout};
