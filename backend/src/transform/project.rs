//! Column projection.

use crate::error::{SelectionError, TableError};
use crate::models::{ColumnSelection, Table};

/// Project `table` onto the selected columns, in selection order.
///
/// The input is only borrowed: on error the caller's table is untouched.
/// An empty selection keeps every row and no column.
pub fn select_columns(table: &Table, selection: &ColumnSelection) -> Result<Table, SelectionError> {
    let Some(names) = selection.names() else {
        return Ok(table.clone());
    };

    let frame = table.frame();
    let unknown: Vec<String> = names
        .iter()
        .filter(|n| frame.get_column_index(n).is_none())
        .map(|n| n.to_string())
        .collect();
    if !unknown.is_empty() {
        return Err(SelectionError::UnknownColumns(unknown));
    }

    let projected = frame.select(names).map_err(TableError::from)?;
    Ok(Table::from_parts(projected, table.index().to_vec()))
}
