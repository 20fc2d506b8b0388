//! Tools that resolve missing values in a dataset.
//!
//! Numeric fills follow dataframe conventions: an integer column filled with
//! a fractional mean or median becomes a float column.

use super::{ToolArguments, ToolParameter, ToolRegistry, ToolSpec, WireType};
use crate::core::{Cell, Column, DType, DataTable};
use crate::errors::ToolError;
use serde_json::Value;
use std::str::FromStr;
use tracing::debug;

/// Workflow holding the missing-value tools.
pub const MISSING_VAL_RESOLVER: &str = "missing_val_resolver";

/// Value used by [`fill_with_value`] for text columns without a mode.
pub const UNKNOWN_FILL: &str = "Unknown";

/// How [`handle_missing_values`] resolves missing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingValueStrategy {
    /// Drop every row holding a missing value.
    Drop,
    /// Fill numeric columns with their mean.
    Mean,
    /// Fill numeric columns with their median.
    Median,
    /// Fill every column with its mode.
    Mode,
    /// Fill with a constant, or a per-dtype default.
    Fill,
}

impl FromStr for MissingValueStrategy {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "mean" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            "mode" => Ok(Self::Mode),
            "fill" => Ok(Self::Fill),
            other => Err(ToolError::invalid_argument(
                "handle_missing_values",
                "strategy",
                format!("Unknown strategy '{other}'"),
            )),
        }
    }
}

fn fill_column(column: &mut Column, value: &Cell) {
    if value.is_null() || column.null_count() == 0 {
        return;
    }
    let name = column.name().to_string();
    let values = std::mem::take(column.values_mut())
        .into_iter()
        .map(|cell| if cell.is_null() { value.clone() } else { cell })
        .collect();
    *column = Column::infer(name, values);
}

fn numeric_values(column: &Column) -> Vec<f64> {
    column.values().iter().filter_map(Cell::as_f64).collect()
}

fn mean(column: &Column) -> Option<f64> {
    let values = numeric_values(column);
    if values.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn median(column: &Column) -> Option<f64> {
    let mut values = numeric_values(column);
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

fn fill_numeric_with(mut table: DataTable, stat: fn(&Column) -> Option<f64>) -> DataTable {
    for column in table.columns_mut() {
        if !column.dtype().is_numeric() {
            continue;
        }
        if let Some(value) = stat(column) {
            fill_column(column, &Cell::Float(value));
        }
    }
    table
}

/// Drops the rows whose `target_col` value is missing.
///
/// # Errors
///
/// Returns [`ToolError::InvalidArgument`] if the column does not exist.
pub fn drop_missing(mut table: DataTable, target_col: &str) -> Result<DataTable, ToolError> {
    let missing: Vec<bool> = table
        .column(target_col)
        .ok_or_else(|| {
            ToolError::invalid_argument(
                "drop_missing",
                "target_col",
                format!("unknown column '{target_col}'"),
            )
        })?
        .values()
        .iter()
        .map(Cell::is_null)
        .collect();

    let removed = table.retain_rows(|row| !missing[row]);
    debug!(target_col, removed, "dropped rows with missing values");
    Ok(table)
}

/// Drops every row holding at least one missing value.
#[must_use]
pub fn drop_incomplete_rows(mut table: DataTable) -> DataTable {
    let incomplete: Vec<bool> = (0..table.row_count())
        .map(|row| table.columns().iter().any(|c| c.values()[row].is_null()))
        .collect();
    table.retain_rows(|row| !incomplete[row]);
    table
}

/// Fills numeric columns with their mean. Other columns are left as is.
#[must_use]
pub fn fill_with_mean(table: DataTable) -> DataTable {
    fill_numeric_with(table, mean)
}

/// Fills numeric columns with their median. Other columns are left as is.
#[must_use]
pub fn fill_with_median(table: DataTable) -> DataTable {
    fill_numeric_with(table, median)
}

/// Fills each column with its most frequent value. Columns without any
/// value are left as is.
#[must_use]
pub fn fill_with_mode(mut table: DataTable) -> DataTable {
    for column in table.columns_mut() {
        if let Some(mode) = column.mode() {
            fill_column(column, &mode);
        }
    }
    table
}

/// Fills every column with `fill_value`.
///
/// Without a value, numeric columns get zero, and other columns get their
/// mode, or [`UNKNOWN_FILL`] when they have none.
#[must_use]
pub fn fill_with_value(mut table: DataTable, fill_value: Option<&Cell>) -> DataTable {
    for column in table.columns_mut() {
        let value = match fill_value {
            Some(value) => value.clone(),
            None => match column.dtype() {
                DType::Int64 => Cell::Int(0),
                DType::Float64 => Cell::Float(0.0),
                DType::Bool | DType::Object => column
                    .mode()
                    .unwrap_or_else(|| Cell::from(UNKNOWN_FILL)),
            },
        };
        fill_column(column, &value);
    }
    table
}

/// Routes to the tool matching `strategy` (case-insensitive): `drop`,
/// `mean`, `median`, `mode` or `fill`.
///
/// # Errors
///
/// Returns [`ToolError::InvalidArgument`] for an unknown strategy.
pub fn handle_missing_values(
    table: DataTable,
    strategy: &str,
    fill_value: Option<&Cell>,
) -> Result<DataTable, ToolError> {
    let strategy = strategy.parse::<MissingValueStrategy>()?;
    debug!(?strategy, "handling missing values");
    Ok(match strategy {
        MissingValueStrategy::Drop => drop_incomplete_rows(table),
        MissingValueStrategy::Mean => fill_with_mean(table),
        MissingValueStrategy::Median => fill_with_median(table),
        MissingValueStrategy::Mode => fill_with_mode(table),
        MissingValueStrategy::Fill => fill_with_value(table, fill_value),
    })
}

fn fill_value_arg(tool: &str, args: &ToolArguments) -> Result<Option<Cell>, ToolError> {
    match args.get("fill_value") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => Cell::from_json(value)
            .map(Some)
            .map_err(|err| ToolError::invalid_argument(tool, "fill_value", err.to_string())),
    }
}

/// Registers the `missing_val_resolver` workflow.
pub fn register_missing_value_tools(registry: &mut ToolRegistry) -> &mut ToolRegistry {
    registry
        .register(MISSING_VAL_RESOLVER)
        .register_tool(
            MISSING_VAL_RESOLVER,
            ToolSpec::new(
                "drop_missing",
                "Drop the rows with a missing value in the given column.",
            )
            .with_parameter(
                ToolParameter::required("target_col", WireType::String)
                    .with_description("Name of the column to check for missing values."),
            ),
            |table, args| {
                let target = args
                    .get("target_col")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ToolError::missing_argument("drop_missing", "target_col"))?;
                drop_missing(table, target)
            },
        )
        .register_tool(
            MISSING_VAL_RESOLVER,
            ToolSpec::new("fill_with_mean", "Fill numeric columns with their mean."),
            |table, _| Ok(fill_with_mean(table)),
        )
        .register_tool(
            MISSING_VAL_RESOLVER,
            ToolSpec::new("fill_with_median", "Fill numeric columns with their median."),
            |table, _| Ok(fill_with_median(table)),
        )
        .register_tool(
            MISSING_VAL_RESOLVER,
            ToolSpec::new("fill_with_mode", "Fill each column with its mode."),
            |table, _| Ok(fill_with_mode(table)),
        )
        .register_tool(
            MISSING_VAL_RESOLVER,
            ToolSpec::new(
                "fill_with_value",
                "Fill missing values using a constant or inferred defaults.",
            )
            .with_parameter(ToolParameter::optional("fill_value", WireType::parse("any"))),
            |table, args| {
                let value = fill_value_arg("fill_with_value", args)?;
                Ok(fill_with_value(table, value.as_ref()))
            },
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{customers_table, scenario_a_table};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        register_missing_value_tools(&mut registry);
        registry
    }

    #[test]
    fn test_workflow_tools() {
        let registry = registry();
        assert_eq!(
            registry.action_space(MISSING_VAL_RESOLVER).unwrap(),
            vec![
                "drop_missing",
                "fill_with_mean",
                "fill_with_median",
                "fill_with_mode",
                "fill_with_value",
            ]
        );
        assert_eq!(
            registry.get_metadata(MISSING_VAL_RESOLVER, "drop_missing").unwrap()["function"]
                ["parameters"]["required"],
            json!(["target_col"])
        );
        assert_eq!(
            registry.get_metadata(MISSING_VAL_RESOLVER, "fill_with_value").unwrap()["function"]
                ["parameters"]["properties"]["fill_value"]["description"],
            json!("Argument `fill_value` of type string")
        );
    }

    #[test]
    fn test_registering_again_keeps_tools() {
        let mut registry = registry();
        registry.register(MISSING_VAL_RESOLVER);
        register_missing_value_tools(&mut registry);

        assert_eq!(registry.list_workflows(), vec![MISSING_VAL_RESOLVER]);
        assert_eq!(registry.action_space(MISSING_VAL_RESOLVER).unwrap().len(), 5);
    }

    #[test]
    fn test_drop_missing_by_column() {
        let table = drop_missing(scenario_a_table(), "age").unwrap();

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column("age").unwrap().values(), &[Cell::Int(29), Cell::Int(42)]);
        assert_eq!(table.column("city").unwrap().null_count(), 1);

        let err = drop_missing(scenario_a_table(), "height").unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgument { argument, .. } if argument == "target_col"));
    }

    #[test]
    fn test_drop_missing_requires_target_through_registry() {
        let err = registry()
            .invoke(MISSING_VAL_RESOLVER, "drop_missing", &ToolArguments::new(), scenario_a_table())
            .unwrap_err();
        assert_eq!(err, ToolError::missing_argument("drop_missing", "target_col"));
    }

    #[test]
    fn test_fill_with_mean_promotes_integers() {
        let table = fill_with_mean(scenario_a_table());

        let age = table.column("age").unwrap();
        assert_eq!(age.dtype(), DType::Float64);
        assert_eq!(age.values(), &[Cell::Float(29.0), Cell::Float(35.5), Cell::Float(42.0)]);
        assert_eq!(table.column("city").unwrap().null_count(), 1);
    }

    #[test]
    fn test_fill_with_median() {
        let table = fill_with_median(customers_table());

        // ages present: 29, 35, 41, 23, 35
        let age = table.column("age").unwrap();
        assert_eq!(age.null_count(), 0);
        assert_eq!(age.values()[2], Cell::Float(35.0));
        assert_eq!(table.column("spend").unwrap().null_count(), 0);
        assert_eq!(table.column("city").unwrap().null_count(), 1);
    }

    #[test]
    fn test_fill_with_mode() {
        let table = fill_with_mode(customers_table());

        assert_eq!(table.column("age").unwrap().values()[2], Cell::Int(35));
        assert_eq!(table.column("age").unwrap().dtype(), DType::Int64);
        // Perth and Sydney tie; the smaller value wins
        assert_eq!(table.column("city").unwrap().values()[3], Cell::from("Perth"));
    }

    #[test]
    fn test_fill_with_value_defaults() {
        let table = fill_with_value(scenario_a_table(), None);

        assert_eq!(table.column("age").unwrap().values()[1], Cell::Int(0));
        // city mode: Perth and Sydney tie, smaller wins
        assert_eq!(table.column("city").unwrap().values()[2], Cell::from("Perth"));

        let empty_text = DataTable::from_columns(vec![Column::new(
            "note",
            DType::Object,
            vec![Cell::Null, Cell::Null],
        )])
        .unwrap();
        let filled = fill_with_value(empty_text, None);
        assert_eq!(filled.column("note").unwrap().values()[0], Cell::from(UNKNOWN_FILL));
    }

    #[test]
    fn test_fill_with_value_through_registry() {
        let mut args = ToolArguments::new();
        args.insert("fill_value".to_string(), json!("n/a"));

        let table = registry()
            .invoke(MISSING_VAL_RESOLVER, "fill_with_value", &args, scenario_a_table())
            .unwrap();

        assert_eq!(table.column("city").unwrap().values()[2], Cell::from("n/a"));
        let age = table.column("age").unwrap();
        assert_eq!(age.values()[1], Cell::from("n/a"));
        assert_eq!(age.dtype(), DType::Object);
    }

    #[test]
    fn test_handle_missing_values_routes() {
        assert_eq!(
            handle_missing_values(customers_table(), "DROP", None).unwrap().row_count(),
            4
        );
        assert_eq!(
            handle_missing_values(scenario_a_table(), "mean", None).unwrap(),
            fill_with_mean(scenario_a_table())
        );
        let fill = Cell::Int(7);
        let table = handle_missing_values(scenario_a_table(), "fill", Some(&fill)).unwrap();
        assert_eq!(table.column("age").unwrap().values()[1], Cell::Int(7));

        let err = handle_missing_values(scenario_a_table(), "interpolate", None).unwrap_err();
        assert!(err.to_string().contains("Unknown strategy 'interpolate'"));
    }
}
