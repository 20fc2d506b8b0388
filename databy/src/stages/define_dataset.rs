//! First stage: profile the raw dataset.

use super::schema::{FIELD_NAME, MISSING_RATIO_PRECISION};
use super::Stage;
use crate::context::{RunContext, SessionRecord};
use crate::core::{Cell, Column, DType, DataTable};
use crate::errors::{StageError, TableError};
use async_trait::async_trait;
use tracing::debug;

/// Writes `data_types` and the five-column `data_summary`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefineDataset;

impl DefineDataset {
    /// Name published to `agent.state`.
    pub const NAME: &'static str = "DefineDataset";

    /// Creates the stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10_f64.powi(places);
    (value * factor).round() / factor
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
fn as_int(value: usize) -> Cell {
    Cell::Int(value as i64)
}

/// Builds the per-column profile of `data`.
///
/// `missing_ratio` is the percentage of null cells rounded to five decimals;
/// it is `0.0` for a table without rows.
pub fn build_data_summary(data: &DataTable) -> Result<DataTable, TableError> {
    let rows = data.row_count();
    let columns = data.columns();

    let ratio = |nulls: usize| {
        if rows == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            round_to(nulls as f64 / rows as f64 * 100.0, MISSING_RATIO_PRECISION)
        }
    };

    DataTable::from_columns(vec![
        Column::new(
            FIELD_NAME,
            DType::Object,
            columns.iter().map(|c| Cell::from(c.name())).collect(),
        ),
        Column::new(
            "data_type",
            DType::Object,
            columns.iter().map(|c| Cell::Text(c.dtype().to_string())).collect(),
        ),
        Column::new(
            "missing_count",
            DType::Int64,
            columns.iter().map(|c| as_int(c.null_count())).collect(),
        ),
        Column::new(
            "missing_ratio",
            DType::Float64,
            columns.iter().map(|c| Cell::Float(ratio(c.null_count()))).collect(),
        ),
        Column::new(
            "unique_count",
            DType::Int64,
            columns.iter().map(|c| as_int(c.unique_count())).collect(),
        ),
    ])
}

#[async_trait]
impl Stage for DefineDataset {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn check_input(&self, session: &SessionRecord) -> Result<(), StageError> {
        if session.data.is_none() {
            return Err(StageError::precondition(Self::NAME, "data"));
        }
        Ok(())
    }

    async fn forward(&self, _ctx: &RunContext, session: &mut SessionRecord) -> Result<(), StageError> {
        let data = session
            .data
            .as_ref()
            .ok_or_else(|| StageError::precondition(Self::NAME, "data"))?;

        let data_types = data
            .columns()
            .iter()
            .map(|c| (c.name().to_string(), c.dtype()))
            .collect();
        let summary = build_data_summary(data).map_err(|e| StageError::table(Self::NAME, e))?;

        debug!(
            rows = data.row_count(),
            columns = data.column_count(),
            "profiled dataset"
        );
        session.data_types = Some(data_types);
        session.data_summary = Some(summary);
        Ok(())
    }

    fn validate_output(&self, session: &SessionRecord) -> Result<(), StageError> {
        if session.data_summary.is_none() {
            return Err(StageError::missing_attribute(Self::NAME, "data_summary"));
        }
        Ok(())
    }
}
