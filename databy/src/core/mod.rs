//! Core tabular model.
//!
//! Datasets and the per-column summary report are both stored as a
//! [`DataTable`]: an ordered list of equally long, uniquely named columns.

mod table;

pub use table::{Cell, Column, DType, DataTable};
