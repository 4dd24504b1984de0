//! Cleaning operations: duplicate removal and mean imputation.

use polars::prelude::{col, lit, DataType, IntoLazy, UniqueKeepStrategy};

use crate::error::TableError;
use crate::models::{ColumnType, Table};

/// Keep the first occurrence of every distinct row, preserving order.
///
/// Missing equals missing. Surviving rows keep their source row labels.
pub fn remove_duplicates(table: Table) -> Result<Table, TableError> {
    let names = table.column_names();
    if names.is_empty() {
        // Every row of a column-less table is the empty row
        let index = table.index().iter().take(1).copied().collect();
        return Ok(Table::from_parts(table.frame().clone(), index));
    }

    let label = row_label_name(&names);
    let deduped = table
        .frame()
        .with_row_index(label.as_str().into(), None)?
        .unique_stable(Some(names.as_slice()), UniqueKeepStrategy::First, None)?;

    let positions = deduped.column(&label)?.cast(&DataType::UInt64)?;
    let index = positions
        .as_materialized_series()
        .u64()?
        .into_iter()
        .flatten()
        .filter_map(|p| table.index().get(p as usize).copied())
        .collect();

    Ok(Table::from_parts(deduped.drop(&label)?, index))
}

/// Name for the temporary row-label column that no data column uses.
fn row_label_name(names: &[String]) -> String {
    let mut label = "__row".to_string();
    while names.contains(&label) {
        label.push('_');
    }
    label
}

/// Replace missing cells of numeric columns with the column mean.
///
/// Every mean is computed before the first write. A numeric column with no
/// values stays fully missing; text columns are not touched.
pub fn fill_missing_numeric(table: Table) -> Result<Table, TableError> {
    let fills: Vec<_> = table
        .frame()
        .get_columns()
        .iter()
        .filter(|c| ColumnType::of(c.dtype()) == ColumnType::Numeric)
        .filter_map(|c| {
            let mean = c.as_materialized_series().mean()?;
            Some(col(c.name().as_str()).fill_null(lit(mean)))
        })
        .collect();

    if fills.is_empty() {
        return Ok(table);
    }

    let filled = table.frame().clone().lazy().with_columns(fills).collect()?;
    Ok(Table::from_parts(filled, table.index().to_vec()))
}
