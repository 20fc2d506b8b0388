//! Column names of the data summary table.

/// Columns written by `DefineDataset`.
pub const DATA_SUMMARY_COLS: [&str; 5] = [
    "data_field_name",
    "data_type",
    "missing_count",
    "missing_ratio",
    "unique_count",
];

/// Columns added by `DescribeDataset`.
pub const DATA_SUMMARY_NEW_COLS: [&str; 1] = ["description"];

/// Columns added by `DataTyperStage`.
pub const DATA_SUMMARY_TYPE_COLS: [&str; 2] = ["_data_types", "_data_num_types"];

/// Key column used to attach per-column results.
pub const FIELD_NAME: &str = "data_field_name";

/// Decimal places kept in `missing_ratio`.
pub const MISSING_RATIO_PRECISION: i32 = 5;
