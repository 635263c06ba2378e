use std::path::Path;

use rayon::prelude::*;

use crate::error::ReconError;
use crate::table::Cell;
use crate::transform::format_float_scientific;

/// Number of column chunks the rounding pass fans out over.
const ROUND_CHUNKS: usize = 32;

/// A sample-per-column reference matrix: one row-id column followed by one
/// numeric column per sample.
#[derive(Debug, Clone)]
pub struct WideMatrix {
    pub row_ids: Vec<String>,
    pub samples: Vec<String>,
    pub columns: Vec<Vec<Cell>>,
}

impl WideMatrix {
    pub fn read_tsv(path: &Path) -> Result<Self, ReconError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .from_path(path)
            .map_err(|err| ReconError::Csv(format!("{}: {err}", path.display())))?;
        let header = reader
            .headers()
            .map_err(|err| ReconError::Csv(err.to_string()))?;
        // First header cell labels the row-id column and is not a sample.
        let samples: Vec<String> = header
            .iter()
            .skip(1)
            .map(|name| name.trim().to_string())
            .collect();

        let mut row_ids = Vec::new();
        let mut columns: Vec<Vec<Cell>> = vec![Vec::new(); samples.len()];
        for record in reader.records() {
            let record = record.map_err(|err| ReconError::Csv(err.to_string()))?;
            let mut fields = record.iter();
            row_ids.push(fields.next().unwrap_or("").to_string());
            for (index, column) in columns.iter_mut().enumerate() {
                column.push(Cell::from_field(record.get(index + 1).unwrap_or("")));
            }
        }
        Ok(Self {
            row_ids,
            samples,
            columns,
        })
    }

    pub fn column(&self, sample: &str) -> Option<&[Cell]> {
        let index = self.samples.iter().position(|name| name == sample)?;
        Some(&self.columns[index])
    }

    /// Re-render every numeric cell at the given precision. Columns are
    /// independent, so the matrix is partitioned into chunks and each chunk
    /// is rounded by its own worker; the column order never changes because
    /// chunks are rounded in place.
    pub fn round_values(&mut self, precision: usize) {
        let chunk_size = self.columns.len().div_ceil(ROUND_CHUNKS).max(1);
        self.columns
            .par_chunks_mut(chunk_size)
            .for_each(|chunk| {
                for column in chunk {
                    round_column(column, precision);
                }
            });
    }
}

fn round_column(column: &mut [Cell], precision: usize) {
    for cell in column {
        round_cell(cell, precision);
    }
}

/// Re-render one cell at fixed precision; textual NaN markers become
/// missing, non-numeric text is left untouched.
pub(crate) fn round_cell(cell: &mut Cell, precision: usize) {
    match cell {
        Cell::Missing => {}
        Cell::Number(num) if num.is_nan() => *cell = Cell::Missing,
        Cell::Number(num) => {
            *cell = Cell::Text(format_float_scientific(*num, precision));
        }
        Cell::Text(text) => {
            let lowered = text.trim().to_lowercase();
            if lowered == "nan" {
                *cell = Cell::Missing;
            } else if let Ok(parsed) = text.trim().parse::<f64>() {
                *cell = Cell::Text(format_float_scientific(parsed, precision));
            }
        }
        Cell::List(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_matrix(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn matrix_loads_column_major() {
        let file = write_matrix("probe\tS1\tS2\ncg01\t0.5\t\ncg02\t0.25\t0.75\n");
        let matrix = WideMatrix::read_tsv(file.path()).unwrap();
        assert_eq!(matrix.row_ids, vec!["cg01".to_string(), "cg02".to_string()]);
        assert_eq!(
            matrix.column("S1").unwrap(),
            &[Cell::Text("0.5".into()), Cell::Text("0.25".into())]
        );
        assert_eq!(
            matrix.column("S2").unwrap(),
            &[Cell::Missing, Cell::Text("0.75".into())]
        );
    }

    #[test]
    fn rounding_renders_numeric_cells_in_place() {
        let file = write_matrix("probe\tS1\ncg01\t0.25\ncg02\tNaN\ncg03\t\n");
        let mut matrix = WideMatrix::read_tsv(file.path()).unwrap();
        matrix.round_values(8);
        assert_eq!(
            matrix.column("S1").unwrap(),
            &[
                Cell::Text("2.5e-01".into()),
                Cell::Missing,
                Cell::Missing
            ]
        );
    }

    #[test]
    fn rounding_preserves_column_order() {
        let header: Vec<String> = (0..100).map(|i| format!("S{i}")).collect();
        let mut content = format!("id\t{}\n", header.join("\t"));
        content.push_str("r1");
        for i in 0..100 {
            content.push_str(&format!("\t{i}.5"));
        }
        content.push('\n');
        let file = write_matrix(&content);
        let mut matrix = WideMatrix::read_tsv(file.path()).unwrap();
        matrix.round_values(8);
        assert_eq!(matrix.samples, header);
        assert_eq!(
            matrix.column("S2").unwrap(),
            &[Cell::Text("2.5e+00".into())]
        );
        assert_eq!(
            matrix.column("S99").unwrap(),
            &[Cell::Text("9.95e+01".into())]
        );
    }
}
