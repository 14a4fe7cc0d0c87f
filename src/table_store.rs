//! Table Store
//!
//! Loads every cataloged CSV into an in-memory table at startup. Cells are
//! coerced to typed scalars exactly once at load time and the per-column kind
//! is recorded in the table schema, so downstream code does lookups instead of
//! re-inspecting values. Columns whose name contains "date" are kept as
//! strings: the assistant's time scoping works by substring match on the
//! stringified date, not by calendar parsing.

use crate::catalog::Catalog;
use crate::error::{AssistantError, Result};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

/// A single typed cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Numeric view of the cell; `None` for missing or non-numeric values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            Scalar::Text(s) => s.trim().parse::<f64>().ok(),
            Scalar::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Scalar::Null => None,
        }
    }

    /// Display form used for example values and date substring matching.
    pub fn display(&self) -> String {
        match self {
            Scalar::Null => String::new(),
            Scalar::Bool(b) => b.to_string(),
            Scalar::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < i64::MAX as f64 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            Scalar::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Text,
    Date,
}

/// One loaded dataset: ordered columns, a load-time schema, and rows of
/// typed cells. Read-only after construction.
#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub schema: HashMap<String, ColumnKind>,
    pub rows: Vec<HashMap<String, Scalar>>,
}

impl Table {
    pub fn from_rows(
        name: impl Into<String>,
        columns: Vec<String>,
        rows: Vec<HashMap<String, Scalar>>,
    ) -> Self {
        let mut schema = HashMap::new();
        for column in &columns {
            schema.insert(column.clone(), infer_kind(column, &rows));
        }
        Self {
            name: name.into(),
            columns,
            schema,
            rows,
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.schema.contains_key(column)
    }

    /// First column whose name contains "date" (case-insensitive), used for
    /// time scoping.
    pub fn first_date_column(&self) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.to_lowercase().contains("date"))
            .map(String::as_str)
    }
}

fn infer_kind(column: &str, rows: &[HashMap<String, Scalar>]) -> ColumnKind {
    if column.to_lowercase().contains("date") {
        return ColumnKind::Date;
    }
    let mut saw_number = false;
    for row in rows {
        match row.get(column) {
            Some(Scalar::Number(_)) => saw_number = true,
            Some(Scalar::Null) | None => {}
            Some(_) => return ColumnKind::Text,
        }
    }
    if saw_number {
        ColumnKind::Numeric
    } else {
        ColumnKind::Text
    }
}

/// All loaded tables, keyed by dataset name. Shared read-only across
/// concurrent questions after startup.
#[derive(Debug, Default)]
pub struct TableStore {
    tables: HashMap<String, Table>,
}

impl TableStore {
    /// Load every dataset in the catalog. A missing file is a fatal
    /// configuration error, raised before any question is served.
    pub fn load(catalog: &Catalog) -> Result<Self> {
        let mut tables = HashMap::new();
        for descriptor in catalog.iter() {
            if !descriptor.path.exists() {
                return Err(AssistantError::Config(format!(
                    "Missing dataset file for '{}': {}",
                    descriptor.name,
                    descriptor.path.display()
                )));
            }
            let table = load_csv(&descriptor.name, &descriptor.path)?;
            info!(
                "Loaded dataset '{}' ({} rows, {} columns)",
                table.name,
                table.rows.len(),
                table.columns.len()
            );
            tables.insert(descriptor.name.clone(), table);
        }
        if tables.is_empty() {
            return Err(AssistantError::Config(
                "No datasets loaded for assistant".to_string(),
            ));
        }
        Ok(Self { tables })
    }

    /// Build a store from already-constructed tables.
    pub fn from_tables(tables: Vec<Table>) -> Self {
        Self {
            tables: tables.into_iter().map(|t| (t.name.clone(), t)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

fn load_csv(name: &str, path: &std::path::Path) -> Result<Table> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let date_flags: Vec<bool> = columns
        .iter()
        .map(|c| c.to_lowercase().contains("date"))
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = HashMap::new();
        for (idx, column) in columns.iter().enumerate() {
            let raw = record.get(idx).unwrap_or("");
            let cell = if date_flags[idx] {
                normalize_date_cell(raw)
            } else {
                coerce_cell(raw)
            };
            row.insert(column.clone(), cell);
        }
        rows.push(row);
    }

    Ok(Table::from_rows(name, columns, rows))
}

/// Date-like cells stay strings so that year scoping can substring-match them.
fn normalize_date_cell(raw: &str) -> Scalar {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Scalar::Null
    } else {
        Scalar::Text(trimmed.to_string())
    }
}

fn coerce_cell(raw: &str) -> Scalar {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Scalar::Null;
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return Scalar::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Scalar::Bool(false);
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Scalar::Number(i as f64);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        return Scalar::Number(f);
    }
    Scalar::Text(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, DatasetDescriptor};
    use std::fs;

    fn write_csv(dir: &std::path::Path, file: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(file);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn coerces_cells_and_normalizes_dates() {
        let dir = std::env::temp_dir().join("wash_assistant_table_store_test");
        fs::create_dir_all(&dir).unwrap();
        let path = write_csv(
            &dir,
            "access.csv",
            "country,date_YY,safely_managed_pct,zone\nKenya,2020,80,\nKenya,2021,90.5,west\n",
        );

        let catalog = Catalog::new(vec![DatasetDescriptor::new(
            "water_access",
            path,
            "test",
            "",
        )]);
        let store = TableStore::load(&catalog).unwrap();
        let table = store.get("water_access").unwrap();

        assert_eq!(table.columns.len(), 4);
        assert_eq!(table.rows.len(), 2);
        // date column is kept textual even though the raw cell is numeric
        assert_eq!(
            table.rows[0].get("date_YY"),
            Some(&Scalar::Text("2020".to_string()))
        );
        assert_eq!(table.schema.get("date_YY"), Some(&ColumnKind::Date));
        assert_eq!(
            table.rows[1].get("safely_managed_pct"),
            Some(&Scalar::Number(90.5))
        );
        assert_eq!(
            table.schema.get("safely_managed_pct"),
            Some(&ColumnKind::Numeric)
        );
        // empty cell becomes null, column stays text
        assert_eq!(table.rows[0].get("zone"), Some(&Scalar::Null));
        assert_eq!(table.schema.get("zone"), Some(&ColumnKind::Text));
        assert_eq!(table.first_date_column(), Some("date_YY"));
    }

    #[test]
    fn missing_file_is_fatal() {
        let catalog = Catalog::new(vec![DatasetDescriptor::new(
            "ghost",
            "/nonexistent/ghost.csv",
            "test",
            "",
        )]);
        let err = TableStore::load(&catalog).unwrap_err();
        assert!(matches!(err, AssistantError::Config(_)));
    }

    #[test]
    fn scalar_numeric_view() {
        assert_eq!(Scalar::Number(2.0).as_f64(), Some(2.0));
        assert_eq!(Scalar::Text("2020".to_string()).as_f64(), Some(2020.0));
        assert_eq!(Scalar::Text("kenya".to_string()).as_f64(), None);
        assert_eq!(Scalar::Null.as_f64(), None);
    }

    #[test]
    fn scalar_display_drops_trailing_zero() {
        assert_eq!(Scalar::Number(2020.0).display(), "2020");
        assert_eq!(Scalar::Number(80.5).display(), "80.5");
        assert_eq!(Scalar::Null.display(), "");
    }
}
