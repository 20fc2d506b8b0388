//! Column-oriented table used for datasets and summary reports.

use crate::errors::TableError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// The storage type of a column, rendered with the familiar dataframe tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    /// 64-bit signed integers.
    Int64,
    /// 64-bit floats.
    Float64,
    /// Booleans.
    Bool,
    /// Anything else (strings, mixed values).
    #[default]
    Object,
}

impl DType {
    /// Returns true for integer and float columns.
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int64 | Self::Float64)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int64 => write!(f, "int64"),
            Self::Float64 => write!(f, "float64"),
            Self::Bool => write!(f, "bool"),
            Self::Object => write!(f, "object"),
        }
    }
}

/// A single table value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Cell {
    /// A missing value.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// An integer.
    Int(i64),
    /// A float. `NaN` counts as missing.
    Float(f64),
    /// A string.
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CellKey {
    Bool(bool),
    Int(i64),
    Float(u64),
    Text(String),
}

impl Cell {
    /// Returns true for `Null` and `NaN`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Float(v) => v.is_nan(),
            _ => false,
        }
    }

    /// Returns the value as a float when it is numeric.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) if !v.is_nan() => Some(*v),
            _ => None,
        }
    }

    /// Converts a JSON scalar into a cell.
    ///
    /// # Errors
    ///
    /// Returns an error for arrays and objects.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, TableError> {
        match value {
            serde_json::Value::Null => Ok(Self::Null),
            serde_json::Value::Bool(b) => Ok(Self::Bool(*b)),
            serde_json::Value::Number(n) => Ok(n
                .as_i64()
                .map_or_else(|| n.as_f64().map_or(Self::Null, Self::Float), Self::Int)),
            serde_json::Value::String(s) => Ok(Self::Text(s.clone())),
            other => Err(TableError::UnsupportedJson(format!(
                "nested value {other} cannot be stored in a cell"
            ))),
        }
    }

    /// Converts the cell into a JSON value. `NaN` becomes `null`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::json!(b),
            Self::Int(v) => serde_json::json!(v),
            Self::Float(v) => serde_json::Number::from_f64(*v)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::Text(s) => serde_json::json!(s),
        }
    }

    fn key(&self) -> Option<CellKey> {
        match self {
            Self::Null => None,
            Self::Float(v) if v.is_nan() => None,
            Self::Bool(b) => Some(CellKey::Bool(*b)),
            Self::Int(v) => Some(CellKey::Int(*v)),
            // -0.0 and 0.0 are the same value
            Self::Float(v) => Some(CellKey::Float(if *v == 0.0 { 0.0_f64.to_bits() } else { v.to_bits() })),
            Self::Text(s) => Some(CellKey::Text(s.clone())),
        }
    }

    /// Total order used to break ties: booleans, then numbers, then text.
    pub(crate) fn cmp_values(&self, other: &Self) -> Ordering {
        fn rank(cell: &Cell) -> u8 {
            match cell {
                Cell::Null => 0,
                Cell::Bool(_) => 1,
                Cell::Int(_) | Cell::Float(_) => 2,
                Cell::Text(_) => 3,
            }
        }

        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (a, b) if rank(a) == 2 && rank(b) == 2 => a
                .as_f64()
                .partial_cmp(&b.as_f64())
                .unwrap_or(Ordering::Equal),
            (a, b) => rank(a).cmp(&rank(b)),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) if v.is_nan() => Ok(()),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Cell {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Cell {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    name: String,
    dtype: DType,
    values: Vec<Cell>,
}

impl Column {
    /// Creates a column with an explicit dtype.
    #[must_use]
    pub fn new(name: impl Into<String>, dtype: DType, values: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            dtype,
            values,
        }
    }

    /// Creates a column and infers its dtype from the values.
    ///
    /// Integers mixed with floats are promoted to floats.
    #[must_use]
    pub fn infer(name: impl Into<String>, values: Vec<Cell>) -> Self {
        let dtype = infer_dtype(&values);
        let values = if dtype == DType::Float64 {
            values
                .into_iter()
                .map(|cell| match cell {
                    #[allow(clippy::cast_precision_loss)]
                    Cell::Int(v) => Cell::Float(v as f64),
                    other => other,
                })
                .collect()
        } else {
            values
        };
        Self::new(name, dtype, values)
    }

    /// Builds a column from any iterator of cell-convertible values.
    #[must_use]
    pub fn from_values<I, T>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Cell>,
    {
        Self::infer(name, values.into_iter().map(Into::into).collect())
    }

    /// Builds a column by looking up each value of `keys` in `mapping`.
    ///
    /// Keys without an entry become nulls.
    #[must_use]
    pub fn map_from(
        name: impl Into<String>,
        keys: &Self,
        mapping: &HashMap<String, String>,
    ) -> Self {
        let values = keys
            .values
            .iter()
            .map(|key| {
                mapping
                    .get(&key.to_string())
                    .map_or(Cell::Null, |v| Cell::Text(v.clone()))
            })
            .collect();
        Self::new(name, DType::Object, values)
    }

    /// Returns the column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the column dtype.
    #[must_use]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Returns the column values.
    #[must_use]
    pub fn values(&self) -> &[Cell] {
        &self.values
    }

    /// Returns mutable access to the column values.
    pub fn values_mut(&mut self) -> &mut Vec<Cell> {
        &mut self.values
    }

    /// Changes the column dtype.
    pub fn set_dtype(&mut self, dtype: DType) {
        self.dtype = dtype;
    }

    /// Returns the number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the column has no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Counts missing values.
    #[must_use]
    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }

    /// Counts distinct non-null values.
    #[must_use]
    pub fn unique_count(&self) -> usize {
        self.values
            .iter()
            .filter_map(Cell::key)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Returns the most frequent non-null value. Ties go to the smallest value.
    #[must_use]
    pub fn mode(&self) -> Option<Cell> {
        let mut counts: HashMap<CellKey, (usize, &Cell)> = HashMap::new();
        for cell in &self.values {
            if let Some(key) = cell.key() {
                counts.entry(key).or_insert((0, cell)).0 += 1;
            }
        }

        counts
            .into_values()
            .max_by(|(count_a, a), (count_b, b)| {
                count_a.cmp(count_b).then_with(|| b.cmp_values(a))
            })
            .map(|(_, cell)| cell.clone())
    }

    /// Returns the first `n` values as a new column.
    #[must_use]
    pub fn head(&self, n: usize) -> Self {
        Self::new(
            self.name.clone(),
            self.dtype,
            self.values.iter().take(n).cloned().collect(),
        )
    }

    /// Renders the column as a single-column markdown table.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        render_markdown(std::slice::from_ref(self))
    }
}

fn infer_dtype(values: &[Cell]) -> DType {
    let mut saw_int = false;
    let mut saw_float = false;
    let mut saw_bool = false;
    let mut saw_other = false;

    for value in values {
        match value {
            Cell::Null => {}
            Cell::Int(_) => saw_int = true,
            Cell::Float(_) => saw_float = true,
            Cell::Bool(_) => saw_bool = true,
            Cell::Text(_) => saw_other = true,
        }
    }

    match (saw_int, saw_float, saw_bool, saw_other) {
        (_, _, _, true) | (true, _, true, _) | (_, true, true, _) => DType::Object,
        (_, true, false, false) => DType::Float64,
        (true, false, false, false) => DType::Int64,
        (false, false, true, false) => DType::Bool,
        (false, false, false, false) => DType::Object,
    }
}

#[derive(Deserialize)]
struct RawTable {
    columns: Vec<Column>,
}

impl TryFrom<RawTable> for DataTable {
    type Error = TableError;

    fn try_from(raw: RawTable) -> Result<Self, Self::Error> {
        Self::from_columns(raw.columns)
    }
}

/// An ordered collection of equally long, uniquely named columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTable")]
pub struct DataTable {
    columns: Vec<Column>,
}

impl DataTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table from columns.
    ///
    /// # Errors
    ///
    /// Returns an error if two columns share a name or lengths differ.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self, TableError> {
        let mut table = Self::new();
        for column in columns {
            if table.contains_column(column.name()) {
                return Err(TableError::DuplicateColumn(column.name));
            }
            table.insert_column(column)?;
        }
        Ok(table)
    }

    /// Creates a table from a JSON object mapping column names to arrays.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not an object of arrays of scalars.
    pub fn from_json_columns(value: &serde_json::Value) -> Result<Self, TableError> {
        let object = value
            .as_object()
            .ok_or_else(|| TableError::UnsupportedJson("expected an object of columns".to_string()))?;

        let mut columns = Vec::with_capacity(object.len());
        for (name, values) in object {
            let values = values.as_array().ok_or_else(|| {
                TableError::UnsupportedJson(format!("column '{name}' is not an array"))
            })?;
            let cells = values
                .iter()
                .map(Cell::from_json)
                .collect::<Result<Vec<_>, _>>()?;
            columns.push(Column::infer(name.clone(), cells));
        }

        Self::from_columns(columns)
    }

    /// Creates a table from a JSON array of row objects.
    ///
    /// Columns appear in order of first occurrence; absent keys become nulls.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not an array of objects of scalars.
    pub fn from_json_records(value: &serde_json::Value) -> Result<Self, TableError> {
        let rows = value
            .as_array()
            .ok_or_else(|| TableError::UnsupportedJson("expected an array of records".to_string()))?;

        let mut names: Vec<String> = Vec::new();
        for row in rows {
            let object = row
                .as_object()
                .ok_or_else(|| TableError::UnsupportedJson("record is not an object".to_string()))?;
            for key in object.keys() {
                if !names.contains(key) {
                    names.push(key.clone());
                }
            }
        }

        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let cells = rows
                .iter()
                .map(|row| row.get(&name).map_or(Ok(Cell::Null), Cell::from_json))
                .collect::<Result<Vec<_>, _>>()?;
            columns.push(Column::infer(name, cells));
        }

        Self::from_columns(columns)
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns all columns in order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns mutable access to all columns.
    ///
    /// Callers must keep every column at the same length.
    pub fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns true if a column with this name exists.
    #[must_use]
    pub fn contains_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Returns the column names in order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    /// Adds a column, replacing an existing column of the same name in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the column length differs from the row count of a
    /// non-empty table.
    pub fn insert_column(&mut self, column: Column) -> Result<(), TableError> {
        if !self.columns.is_empty() && column.len() != self.row_count() {
            return Err(TableError::LengthMismatch {
                column: column.name,
                expected: self.row_count(),
                actual: column.values.len(),
            });
        }

        if let Some(existing) = self.columns.iter_mut().find(|c| c.name == column.name) {
            *existing = column;
        } else {
            self.columns.push(column);
        }
        Ok(())
    }

    /// Keeps only the rows for which `keep` returns true.
    pub fn retain_rows<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(usize) -> bool,
    {
        let mask: Vec<bool> = (0..self.row_count()).map(&mut keep).collect();
        let removed = mask.iter().filter(|k| !**k).count();
        for column in &mut self.columns {
            let mut index = 0;
            column.values.retain(|_| {
                let kept = mask[index];
                index += 1;
                kept
            });
        }
        removed
    }

    /// Returns the first `n` rows as a new table.
    #[must_use]
    pub fn head(&self, n: usize) -> Self {
        Self {
            columns: self.columns.iter().map(|c| c.head(n)).collect(),
        }
    }

    /// Renders the table as a markdown pipe table without an index.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        render_markdown(&self.columns)
    }

    /// Converts the table into row objects.
    #[must_use]
    pub fn to_records(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        (0..self.row_count())
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| (c.name.clone(), c.values[row].to_json()))
                    .collect()
            })
            .collect()
    }
}

fn render_markdown(columns: &[Column]) -> String {
    if columns.is_empty() {
        return String::new();
    }

    let rows = columns.first().map_or(0, Column::len);
    let rendered: Vec<Vec<String>> = columns
        .iter()
        .map(|c| c.values.iter().map(ToString::to_string).collect())
        .collect();
    let widths: Vec<usize> = columns
        .iter()
        .zip(&rendered)
        .map(|(c, cells)| {
            cells
                .iter()
                .map(|s| s.chars().count())
                .chain(std::iter::once(c.name.chars().count()))
                .max()
                .unwrap_or(0)
                .max(3)
        })
        .collect();

    let mut out = String::new();
    let line = |cells: Vec<String>| format!("| {} |\n", cells.join(" | "));

    out.push_str(&line(
        columns
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<w$}", c.name, w = *w))
            .collect(),
    ));

    let separators: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| {
            if c.dtype.is_numeric() {
                format!("{}:", "-".repeat(*w + 1))
            } else {
                format!(":{}", "-".repeat(*w + 1))
            }
        })
        .collect();
    out.push_str(&format!("|{}|\n", separators.join("|")));

    for row in 0..rows {
        out.push_str(&line(
            columns
                .iter()
                .zip(&rendered)
                .zip(&widths)
                .map(|((c, cells), w)| {
                    if c.dtype.is_numeric() {
                        format!("{:>w$}", cells[row], w = *w)
                    } else {
                        format!("{:<w$}", cells[row], w = *w)
                    }
                })
                .collect(),
        ));
    }

    out.truncate(out.trim_end().len());
    out
}
