//! Chart series extraction.

use crate::models::{ChartData, ChartSeries, Table};

/// Maximum number of series handed to the chart.
pub const MAX_SERIES: usize = 2;

/// First two numeric columns as parallel series.
///
/// The index carries each row's source position, so it has gaps after
/// duplicate removal. Returns `None` when the table has no numeric column.
pub fn extract_chart_series(table: &Table) -> Option<ChartData> {
    let series: Vec<ChartSeries> = table
        .numeric_columns()
        .into_iter()
        .take(MAX_SERIES)
        .map(|c| ChartSeries {
            values: c.numbers(),
            name: c.name,
        })
        .collect();

    if series.is_empty() {
        return None;
    }

    Some(ChartData {
        index: table.index().to_vec(),
        series,
    })
}
