//! Canonical (engineered) dataset used by row-mode prediction and the catalog

use crate::errors::DatasetError;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, instrument};

/// One parsed CSV cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Bool(bool),
    Text(String),
    Missing,
}

impl Cell {
    /// Empty, `NaN`-like or blank fields become [`Cell::Missing`]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Missing;
        }
        match trimmed {
            "True" | "true" => return Cell::Bool(true),
            "False" | "false" => return Cell::Bool(false),
            _ => {}
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() => Cell::Number(v),
            Ok(_) => Cell::Missing,
            Err(_) => Cell::Text(trimmed.to_string()),
        }
    }

    /// Contribution of this cell to a feature vector
    pub fn as_feature(&self) -> f64 {
        match self {
            Cell::Number(v) => *v,
            Cell::Bool(true) => 1.0,
            Cell::Bool(false) => 0.0,
            Cell::Text(_) | Cell::Missing => 0.0,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Text form used for substring search
    pub fn display_text(&self) -> String {
        match self {
            Cell::Number(v) => format_number(*v),
            Cell::Bool(true) => "True".to_string(),
            Cell::Bool(false) => "False".to_string(),
            Cell::Text(s) => s.clone(),
            Cell::Missing => String::new(),
        }
    }
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl Cell {
    /// JSON form; integral numbers become JSON integers, missing becomes null
    pub fn to_json(&self) -> Value {
        match self {
            Cell::Number(v) if v.fract() == 0.0 && v.abs() < 1e15 => Value::from(*v as i64),
            Cell::Number(v) => Value::from(*v),
            Cell::Bool(b) => Value::Bool(*b),
            Cell::Text(s) => Value::String(s.clone()),
            Cell::Missing => Value::Null,
        }
    }
}

/// Rectangular table with a header row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<Cell>>,
}

impl Dataset {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self, DatasetError> {
        if columns.is_empty() {
            return Err(DatasetError::MissingHeader);
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(DatasetError::Ragged {
                    line: i + 2,
                    expected: columns.len(),
                    actual: row.len(),
                });
            }
        }
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Ok(Self {
            columns,
            index,
            rows,
        })
    }

    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self, DatasetError> {
        let file = File::open(path.as_ref())?;
        let dataset = Self::from_reader(file)?;
        debug!(
            "Parsed dataset: {} rows x {} columns",
            dataset.len(),
            dataset.columns.len()
        );
        Ok(dataset)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DatasetError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let columns: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        if columns.iter().all(String::is_empty) {
            return Err(DatasetError::MissingHeader);
        }

        let mut rows = Vec::new();
        for (i, record) in csv_reader.records().enumerate() {
            let record = record?;
            if record.len() != columns.len() {
                return Err(DatasetError::Ragged {
                    line: i + 2,
                    expected: columns.len(),
                    actual: record.len(),
                });
            }
            rows.push(record.iter().map(Cell::parse).collect());
        }

        Self::new(columns, rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn row(&self, index: usize) -> Option<&[Cell]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.rows.iter().map(Vec::as_slice)
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Cell> {
        let col = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Every cell of `column`, top to bottom
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Cell>> {
        let col = self.column_index(name)?;
        Some(self.rows.iter().map(move |r| &r[col]))
    }

    /// True when every non-missing cell of `column` is a number and at least one is
    pub fn is_numeric_column(&self, name: &str) -> bool {
        let Some(cells) = self.column(name) else {
            return false;
        };
        let mut seen = false;
        for cell in cells {
            match cell {
                Cell::Number(_) => seen = true,
                Cell::Missing => {}
                _ => return false,
            }
        }
        seen
    }

    /// Rough in-memory footprint in bytes
    pub fn memory_usage(&self) -> usize {
        let header: usize = self.columns.iter().map(|c| c.capacity()).sum();
        let cells: usize = self
            .rows
            .iter()
            .flat_map(|r| r.iter())
            .map(|cell| {
                std::mem::size_of::<Cell>()
                    + match cell {
                        Cell::Text(s) => s.capacity(),
                        _ => 0,
                    }
            })
            .sum();
        header + cells
    }
}
