//! Read-only queries over a dataset snapshot

use carprice_core::schema::NAME_CODE_FEATURE;
use carprice_core::{Cell, Dataset};
use serde::Serialize;
use serde_json::{Map, Value};

/// One dataset row as a column-keyed JSON object
pub fn row_object(dataset: &Dataset, index: usize) -> Option<Map<String, Value>> {
    let row = dataset.row(index)?;
    Some(
        dataset
            .columns()
            .iter()
            .zip(row)
            .map(|(column, cell)| (column.clone(), cell.to_json()))
            .collect(),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub cars: Vec<Map<String, Value>>,
    pub total: usize,
    pub count: usize,
}

/// Rows `offset..offset + limit`; no limit (or a zero limit) means every
/// remaining row
pub fn page(dataset: &Dataset, limit: Option<usize>, offset: usize) -> Page {
    let end = match limit.filter(|&limit| limit > 0) {
        Some(limit) => offset.saturating_add(limit).min(dataset.len()),
        None => dataset.len(),
    };
    let cars: Vec<_> = (offset..end)
        .filter_map(|i| row_object(dataset, i))
        .collect();
    Page {
        count: cars.len(),
        total: dataset.len(),
        cars,
    }
}

/// Rows whose `column` contains `query`, ignoring case.
///
/// Defaults to the label-encoded name column. Unknown columns match nothing.
pub fn search(dataset: &Dataset, query: &str, column: Option<&str>) -> Vec<Map<String, Value>> {
    let column = column.unwrap_or(NAME_CODE_FEATURE);
    let Some(col) = dataset.column_index(column) else {
        return Vec::new();
    };
    let needle = query.to_lowercase();

    dataset
        .rows()
        .enumerate()
        .filter(|(_, row)| row[col].display_text().to_lowercase().contains(&needle))
        .filter_map(|(i, _)| row_object(dataset, i))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnRange {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; `None` below two values
    pub std: Option<f64>,
}

fn numeric_value(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Number(v) => Some(*v),
        Cell::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Cell::Text(_) | Cell::Missing => None,
    }
}

/// Summary statistics over the numeric cells of `column`.
///
/// `None` when the column is unknown, holds text, or has no values.
pub fn range(dataset: &Dataset, column: &str) -> Option<ColumnRange> {
    let cells = dataset.column(column)?;
    let mut values = Vec::new();
    for cell in cells {
        match cell {
            Cell::Text(_) => return None,
            other => values.extend(numeric_value(other)),
        }
    }
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);

    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;
    let median = if n % 2 == 0 {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    } else {
        values[n / 2]
    };
    let std = (n > 1).then(|| {
        let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        (ss / (n - 1) as f64).sqrt()
    });

    Some(ColumnRange {
        min: values[0],
        max: values[n - 1],
        mean,
        median,
        std,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetStats {
    pub total_cars: usize,
    pub columns: Vec<String>,
    pub numeric_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
    /// Estimated footprint in bytes
    pub memory_usage: usize,
}

pub fn stats(dataset: &Dataset) -> DatasetStats {
    let numeric_columns = dataset
        .columns()
        .iter()
        .filter(|c| dataset.is_numeric_column(c))
        .cloned()
        .collect();
    let categorical_columns = dataset
        .columns()
        .iter()
        .filter(|c| {
            dataset
                .column(c)
                .is_some_and(|mut cells| cells.any(|cell| matches!(cell, Cell::Text(_))))
        })
        .cloned()
        .collect();

    DatasetStats {
        total_cars: dataset.len(),
        columns: dataset.columns().to_vec(),
        numeric_columns,
        categorical_columns,
        memory_usage: dataset.memory_usage(),
    }
}
