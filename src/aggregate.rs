use crate::error::ReconError;

/// One raw per-file measurement table, keyed by a stable row identifier
/// (gene id, CpG probe, peptide target). Missing measurements are NaN.
#[derive(Debug, Clone, Default)]
pub struct MeasurementTable {
    pub keys: Vec<String>,
    pub values: Vec<f64>,
}

impl MeasurementTable {
    pub fn new(keys: Vec<String>, values: Vec<f64>) -> Self {
        debug_assert_eq!(keys.len(), values.len());
        Self { keys, values }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Combine replicate per-file tables for one sample into a single table whose
/// value is the mean over non-missing entries: a row present in 1 of 3 files
/// averages over 1, and a row missing everywhere stays NaN.
///
/// All inputs must agree on the row-key sequence; the original pipeline only
/// caught divergence indirectly through the final equality check, here it is
/// rejected up front.
pub fn aggregate(tables: &[MeasurementTable], context: &str) -> Result<MeasurementTable, ReconError> {
    let Some(first) = tables.first() else {
        return Ok(MeasurementTable::default());
    };

    for table in &tables[1..] {
        if table.keys != first.keys {
            let detail = first
                .keys
                .iter()
                .zip(table.keys.iter())
                .position(|(left, right)| left != right)
                .map(|row| format!("{context}: first divergence at row {row}"))
                .unwrap_or_else(|| {
                    format!(
                        "{context}: row counts {} vs {}",
                        first.len(),
                        table.len()
                    )
                });
            return Err(ReconError::RowKeyMismatch(detail));
        }
    }

    let mut sums = vec![0.0f64; first.len()];
    let mut counts = vec![0u32; first.len()];
    for table in tables {
        for (row, value) in table.values.iter().enumerate() {
            if !value.is_nan() {
                sums[row] += value;
                counts[row] += 1;
            }
        }
    }

    let values = sums
        .into_iter()
        .zip(counts)
        .map(|(sum, count)| if count > 0 { sum / f64::from(count) } else { f64::NAN })
        .collect();

    Ok(MeasurementTable::new(first.keys.clone(), values))
}
