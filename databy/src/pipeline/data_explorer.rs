//! The data explorer pipeline: profile, describe, classify.

use super::{Chain, ChainBuilder};
use crate::config::Settings;
use crate::errors::DatabyError;
use crate::stages::{DataTyperStage, DefineDataset, DescribeDataset};
use std::sync::Arc;

/// Registry name of the data explorer pipeline.
pub const DATA_EXPLORER: &str = "data_explorer";

/// Builds `DefineDataset -> DescribeDataset -> DataTyperStage`.
pub fn data_explorer_chain(settings: &Settings) -> Result<Chain, DatabyError> {
    let chain = ChainBuilder::new(DATA_EXPLORER, Arc::new(DefineDataset::new()))
        .set_next(Arc::new(DescribeDataset::new(settings)?))
        .set_next(Arc::new(DataTyperStage::new(settings)?))
        .build()?;
    Ok(chain)
}
