use std::fmt;
use std::path::Path;

use similar::TextDiff;

use crate::error::ReconError;
use crate::value::Value;

/// One table cell. Delimited files load as `Text`/`Missing`; recomputed
/// tables may also hold numbers and nested lists (flattened collections).
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Missing,
    Text(String),
    Number(f64),
    List(Vec<Cell>),
}

impl Cell {
    pub fn from_field(field: &str) -> Cell {
        if field.is_empty() {
            Cell::Missing
        } else {
            Cell::Text(field.to_string())
        }
    }

    pub fn from_value(value: &Value) -> Cell {
        match value {
            Value::Null => Cell::Missing,
            Value::Bool(flag) => Cell::Text(if *flag { "True" } else { "False" }.to_string()),
            Value::Number(num) if num.is_nan() => Cell::Missing,
            Value::Number(num) => Cell::Number(*num),
            Value::Text(text) => Cell::Text(text.clone()),
            Value::List(items) => Cell::List(items.iter().map(Cell::from_value).collect()),
            Value::Map(_) => Cell::Text(value.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(num) => Some(*num),
            Cell::Text(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Missing => Ok(()),
            Cell::Text(text) => write!(f, "{text}"),
            Cell::Number(num) => write!(f, "{num}"),
            Cell::List(items) => {
                write!(f, "[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    match item {
                        Cell::Text(text) => write!(f, "'{text}'")?,
                        Cell::Missing => write!(f, "None")?,
                        other => write!(f, "{other}")?,
                    }
                }
                write!(f, "]")
            }
        }
    }
}

/// Row-major table with named columns.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn read_tsv(path: &Path) -> Result<Table, ReconError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .from_path(path)
            .map_err(|err| ReconError::Csv(format!("{}: {err}", path.display())))?;
        let columns = reader
            .headers()
            .map_err(|err| ReconError::Csv(err.to_string()))?
            .iter()
            .map(|name| name.trim().to_string())
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|err| ReconError::Csv(err.to_string()))?;
            let mut row: Vec<Cell> = record.iter().map(Cell::from_field).collect();
            row.resize(columns.len(), Cell::Missing);
            rows.push(row);
        }
        Ok(Table { columns, rows })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize, ReconError> {
        self.column_index(name)
            .ok_or_else(|| ReconError::MissingColumn(name.to_string()))
    }

    /// Distinct values of one column in first-seen order.
    pub fn unique_values(&self, column: &str) -> Result<Vec<String>, ReconError> {
        let index = self.require_column(column)?;
        let mut seen = Vec::new();
        for row in &self.rows {
            let value = row[index].to_string();
            if !seen.contains(&value) {
                seen.push(value);
            }
        }
        Ok(seen)
    }

    /// Sort rows by every column, alphabetical column order, missing last.
    pub fn sort_by_all_columns(&mut self) {
        let mut order: Vec<usize> = (0..self.columns.len()).collect();
        order.sort_by(|&a, &b| self.columns[a].cmp(&self.columns[b]));
        self.sort_by_column_indices(&order);
    }

    pub fn sort_by_columns(&mut self, names: &[&str]) -> Result<(), ReconError> {
        let order = names
            .iter()
            .map(|name| self.require_column(name))
            .collect::<Result<Vec<_>, _>>()?;
        self.sort_by_column_indices(&order);
        Ok(())
    }

    fn sort_by_column_indices(&mut self, order: &[usize]) {
        self.rows.sort_by(|left, right| {
            for &index in order {
                let ordering = compare_cells(&left[index], &right[index]);
                if ordering != std::cmp::Ordering::Equal {
                    return ordering;
                }
            }
            std::cmp::Ordering::Equal
        });
    }

    /// Serialize in the pandas `to_csv` shape (leading positional index
    /// column) so mismatching runs diff cleanly against older snapshots.
    pub fn to_csv_string(&self) -> String {
        let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
        let mut header = vec![String::new()];
        header.extend(self.columns.iter().cloned());
        // Writer errors cannot occur on an in-memory buffer.
        let _ = writer.write_record(&header);
        for (index, row) in self.rows.iter().enumerate() {
            let mut record = vec![index.to_string()];
            record.extend(row.iter().map(|cell| cell.to_string()));
            let _ = writer.write_record(&record);
        }
        let bytes = writer.into_inner().unwrap_or_default();
        String::from_utf8(bytes).unwrap_or_default()
    }
}

/// Total order over cells for sorting: missing sorts last, numbers compare
/// numerically when both sides coerce, text falls back to string order.
pub fn compare_cells(left: &Cell, right: &Cell) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    match (left.is_missing(), right.is_missing()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }
    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        return a.partial_cmp(&b).unwrap_or(Ordering::Equal);
    }
    left.to_string().cmp(&right.to_string())
}

/// Unified diff of two serialized tables, for the human-readable report.
pub fn unified_diff(left: &str, right: &str, from_label: &str, to_label: &str) -> String {
    TextDiff::from_lines(left, right)
        .unified_diff()
        .header(from_label, to_label)
        .to_string()
}
