use std::collections::BTreeSet;
use std::path::Path;

use serde_json::Value as JsonValue;
use tracing::info;

use crate::aggregate::{MeasurementTable, aggregate};
use crate::cache::files_needing_download;
use crate::domain::{DataType, ProjectId, QueryProfile};
use crate::error::ReconError;
use crate::fetch::FileFetcher;
use crate::gdc::{Endpoint, GdcClient, PAGE_SIZE, cases_filter, files_filter};
use crate::manifest::SampleManifest;
use crate::matrix::WideMatrix;
use crate::reconcile::reconcile_sample_sets;
use crate::store::Store;
use crate::table::Cell;
use crate::transform;

mod clinical;
mod cnv_gene;
mod cnv_segment;
mod expression;
mod methylation;
mod mirna;
mod mutation;
mod protein;
mod survival;

/// Everything one modality check needs from the orchestrator.
pub struct CheckContext<'a> {
    pub project: &'a ProjectId,
    pub data_type: DataType,
    pub store: &'a Store,
    pub gdc: &'a dyn GdcClient,
    pub fetcher: &'a dyn FileFetcher,
}

/// Result of one (project, data type) check: which samples disagreed.
#[derive(Debug, Clone, Default)]
pub struct CheckOutcome {
    pub total_samples: usize,
    pub failed_samples: Vec<String>,
}

impl CheckOutcome {
    pub fn passed(&self) -> bool {
        self.failed_samples.is_empty()
    }
}

pub fn run(ctx: &CheckContext<'_>) -> Result<CheckOutcome, ReconError> {
    info!(
        "Testing [{}] data for [{}].",
        ctx.data_type,
        ctx.project.as_str()
    );
    match ctx.data_type {
        DataType::StarCounts
        | DataType::StarTpm
        | DataType::StarFpkm
        | DataType::StarFpkmUq => expression::run(ctx),
        DataType::Mirna => mirna::run(ctx),
        DataType::Methylation27
        | DataType::Methylation450
        | DataType::MethylationEpic
        | DataType::MethylationEpicV2 => methylation::run(ctx),
        DataType::GeneLevelAscatNgs
        | DataType::GeneLevelAscat2
        | DataType::GeneLevelAscat3
        | DataType::GeneLevelAbsolute => cnv_gene::run(ctx),
        DataType::SegmentCnvAscatNgs | DataType::MaskedCnvDnacopy => cnv_segment::run(ctx),
        DataType::SomaticMutationWxs | DataType::SomaticMutationTargeted => mutation::run(ctx),
        DataType::Protein => protein::run(ctx),
        DataType::Clinical => clinical::run(ctx),
        DataType::Survival => survival::run(ctx),
    }
}

pub(crate) fn profile_for(data_type: DataType) -> Result<QueryProfile, ReconError> {
    data_type
        .query_profile()
        .ok_or_else(|| ReconError::UnsupportedDataType(data_type.to_string()))
}

/// Expected sample universe: every `submitter_sample_ids` entry of the cases
/// owning at least one file of the modality.
pub(crate) fn expected_samples(
    ctx: &CheckContext<'_>,
    profile: &QueryProfile,
) -> Result<Vec<String>, ReconError> {
    let filter = cases_filter(ctx.project, profile);
    let hits = ctx
        .gdc
        .query(Endpoint::Cases, &filter, &["submitter_sample_ids"], PAGE_SIZE)?;
    let mut samples = Vec::new();
    for case in &hits {
        if let Some(ids) = case.get("submitter_sample_ids").and_then(JsonValue::as_array) {
            for id in ids {
                if let Some(id) = id.as_str() {
                    samples.push(id.to_string());
                }
            }
        }
    }
    Ok(samples)
}

pub(crate) fn fetch_manifest(
    ctx: &CheckContext<'_>,
    profile: &QueryProfile,
    samples: &[String],
    fields: &[&str],
    replicated: bool,
) -> Result<SampleManifest, ReconError> {
    let filter = files_filter(ctx.project, profile, samples);
    let hits = ctx.gdc.query(Endpoint::Files, &filter, fields, PAGE_SIZE)?;
    if replicated {
        SampleManifest::from_hits_replicated(&hits, profile.tumor_only)
    } else {
        SampleManifest::from_hits(&hits, profile.tumor_only)
    }
}

/// Download whatever the cache pre-filter says is not already on disk.
pub(crate) fn ensure_raw_files(
    ctx: &CheckContext<'_>,
    manifest: &SampleManifest,
) -> Result<(), ReconError> {
    let raw_dir = ctx.store.raw_dir(ctx.project, ctx.data_type);
    let files = manifest.all_files();
    let needed = files_needing_download(raw_dir.as_std_path(), &files)?;
    if !needed.is_empty() {
        ctx.fetcher.fetch(&needed, raw_dir.as_std_path())?;
    }
    Ok(())
}

/// Pandas-style column equality of two already-rendered columns: missing
/// matches missing, everything else must match exactly.
pub(crate) fn rendered_columns_equal(reference: &[Cell], recomputed: &[Cell]) -> bool {
    reference.len() == recomputed.len()
        && reference.iter().zip(recomputed).all(|(a, b)| match (a, b) {
            (Cell::Missing, Cell::Missing) => true,
            (a, b) => a == b,
        })
}

/// The shared wide-matrix flow: reconcile the sample universes, fetch raw
/// files, then per sample aggregate replicate files, transform, render, and
/// check against the sample's matrix column.
pub(crate) fn run_wide(
    ctx: &CheckContext<'_>,
    manifest: &SampleManifest,
    reader: &dyn Fn(&Path) -> Result<MeasurementTable, ReconError>,
) -> Result<CheckOutcome, ReconError> {
    let matrix_path = ctx.store.matrix_path(ctx.project, ctx.data_type);
    if !matrix_path.as_std_path().is_file() {
        return Err(ReconError::MatrixNotFound(
            matrix_path.as_std_path().to_path_buf(),
        ));
    }
    let mut matrix = WideMatrix::read_tsv(matrix_path.as_std_path())?;

    let repository: BTreeSet<String> = manifest.sample_set();
    let reference: BTreeSet<String> = matrix.samples.iter().cloned().collect();
    reconcile_sample_sets(&repository, &reference)?;

    ensure_raw_files(ctx, manifest)?;

    let precision = ctx.data_type.precision();
    matrix.round_values(precision);

    let raw_dir = ctx.store.raw_dir(ctx.project, ctx.data_type);
    let kind = ctx.data_type.transform();

    let total = manifest.len();
    let mut failed = Vec::new();
    for (number, (sample, files)) in manifest.iter().enumerate() {
        let mut tables = Vec::with_capacity(files.len());
        for file in files {
            tables.push(reader(raw_dir.join(&file.file_name).as_std_path())?);
        }
        let recomputed = match aggregate(&tables, sample) {
            Ok(table) => table,
            Err(ReconError::RowKeyMismatch(detail)) => {
                info!("[{}/{}] Sample: {} - Failed ({detail})", number + 1, total, sample);
                failed.push(sample.clone());
                continue;
            }
            Err(err) => return Err(err),
        };

        let rendered: Vec<Cell> = recomputed
            .values
            .iter()
            .map(|value| {
                match transform::round_keeping_nans(transform::apply(kind, *value), precision) {
                    Some(text) => Cell::Text(text),
                    None => Cell::Missing,
                }
            })
            .collect();

        let matches = matrix
            .column(sample)
            .is_some_and(|column| rendered_columns_equal(column, &rendered));
        if matches {
            info!("[{}/{}] Sample: {} - Passed", number + 1, total, sample);
        } else {
            info!("[{}/{}] Sample: {} - Failed", number + 1, total, sample);
            failed.push(sample.clone());
        }
    }

    Ok(CheckOutcome {
        total_samples: total,
        failed_samples: failed,
    })
}

/// Molecular data categories whose files admit a sample into the clinical
/// and survival universes. Copy-number and mutation files only admit tumor
/// tissue.
const OPEN_CATEGORIES: [&str; 5] = [
    "transcriptome profiling",
    "proteome profiling",
    "dna methylation",
    "copy number variation",
    "simple nucleotide variation",
];

const UNRESTRICTED_CATEGORIES: [&str; 3] = [
    "Transcriptome Profiling",
    "Proteome Profiling",
    "DNA Methylation",
];

const TUMOR_ONLY_CATEGORIES: [&str; 2] = ["Copy Number Variation", "Simple Nucleotide Variation"];

/// Samples with at least one open-access molecular file, per the category
/// rules above.
pub(crate) fn keep_samples(ctx: &CheckContext<'_>) -> Result<BTreeSet<String>, ReconError> {
    let filter = crate::gdc::Filter::and(vec![
        crate::gdc::Filter::field_in("cases.project.project_id", [ctx.project.as_str()]),
        crate::gdc::Filter::field_in("access", ["open"]),
        crate::gdc::Filter::field_in("files.data_category", OPEN_CATEGORIES),
    ]);
    let hits = ctx.gdc.query(
        Endpoint::Files,
        &filter,
        &[
            "data_category",
            "cases.samples.submitter_id",
            "cases.samples.tissue_type",
        ],
        crate::gdc::PAGE_SIZE_WIDE,
    )?;

    let mut keep = BTreeSet::new();
    for hit in &hits {
        let Some(category) = hit.get("data_category").and_then(JsonValue::as_str) else {
            continue;
        };
        let samples = hit
            .get("cases")
            .and_then(|cases| cases.get(0))
            .and_then(|case| case.get("samples"))
            .and_then(JsonValue::as_array);
        let Some(samples) = samples else { continue };
        for sample in samples {
            let Some(submitter_id) = sample.get("submitter_id").and_then(JsonValue::as_str) else {
                continue;
            };
            let tissue_type = sample.get("tissue_type").and_then(JsonValue::as_str);
            if UNRESTRICTED_CATEGORIES.contains(&category)
                || (TUMOR_ONLY_CATEGORIES.contains(&category) && tissue_type == Some("Tumor"))
            {
                keep.insert(submitter_id.to_string());
            }
        }
    }
    Ok(keep)
}

/// Load the published long-format matrix for this (project, data type).
pub(crate) fn read_reference_table(
    ctx: &CheckContext<'_>,
) -> Result<crate::table::Table, ReconError> {
    let matrix_path = ctx.store.matrix_path(ctx.project, ctx.data_type);
    if !matrix_path.as_std_path().is_file() {
        return Err(ReconError::MatrixNotFound(
            matrix_path.as_std_path().to_path_buf(),
        ));
    }
    crate::table::Table::read_tsv(matrix_path.as_std_path())
}

/// Re-render one numeric column of a long table at the modality precision.
pub(crate) fn render_numeric_column(
    table: &mut crate::table::Table,
    column: &str,
    precision: usize,
) -> Result<(), ReconError> {
    let index = table.require_column(column)?;
    for row in &mut table.rows {
        crate::matrix::round_cell(&mut row[index], precision);
    }
    Ok(())
}

/// Persist both serialized tables and their unified diff next to the working
/// files so a failure can be inspected after the run.
pub(crate) fn write_mismatch_artifacts(
    ctx: &CheckContext<'_>,
    reference: &crate::table::Table,
    recomputed: &crate::table::Table,
) -> Result<(), ReconError> {
    let recomputed_path = ctx.store.snapshot_path(ctx.project, ctx.data_type, "recomputed");
    let reference_path = ctx.store.snapshot_path(ctx.project, ctx.data_type, "reference");
    let recomputed_csv = recomputed.to_csv_string();
    let reference_csv = reference.to_csv_string();
    Store::write_text_atomic(&recomputed_path, &recomputed_csv)?;
    Store::write_text_atomic(&reference_path, &reference_csv)?;
    let diff = crate::table::unified_diff(
        &recomputed_csv,
        &reference_csv,
        recomputed_path.as_str(),
        reference_path.as_str(),
    );
    let diff_path = ctx.store.diff_path(ctx.project, ctx.data_type);
    Store::write_text_atomic(&diff_path, &diff)?;
    info!("wrote table diff to {diff_path}");
    Ok(())
}

/// Parse a numeric field the way the reference pipeline's table reader does:
/// blank and textual NA markers load as missing.
pub(crate) fn parse_measurement(field: &str) -> f64 {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return f64::NAN;
    }
    match trimmed.to_lowercase().as_str() {
        "na" | "nan" | "null" | "none" => f64::NAN,
        _ => trimmed.parse::<f64>().unwrap_or(f64::NAN),
    }
}

/// Read a keyed one-measurement TSV. `headers` supplies column names for
/// headerless files; `comment` skips repository preamble lines;
/// `skip_data_rows` drops leading summary rows after the header.
pub(crate) fn read_measurement_tsv(
    path: &Path,
    key_column: &str,
    value_column: &str,
    headers: Option<&[&str]>,
    comment: Option<u8>,
    skip_data_rows: usize,
) -> Result<MeasurementTable, ReconError> {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .delimiter(b'\t')
        .flexible(true)
        .comment(comment)
        .has_headers(headers.is_none());
    let mut reader = builder
        .from_path(path)
        .map_err(|err| ReconError::Csv(format!("{}: {err}", path.display())))?;

    let columns: Vec<String> = match headers {
        Some(names) => names.iter().map(|name| name.to_string()).collect(),
        None => reader
            .headers()
            .map_err(|err| ReconError::Csv(err.to_string()))?
            .iter()
            .map(|name| name.trim().to_string())
            .collect(),
    };
    let key_index = columns
        .iter()
        .position(|name| name == key_column)
        .ok_or_else(|| ReconError::MissingColumn(format!("{key_column} in {}", path.display())))?;
    let value_index = columns
        .iter()
        .position(|name| name == value_column)
        .ok_or_else(|| {
            ReconError::MissingColumn(format!("{value_column} in {}", path.display()))
        })?;

    let mut keys = Vec::new();
    let mut values = Vec::new();
    for record in reader.records().skip(skip_data_rows) {
        let record = record.map_err(|err| ReconError::Csv(err.to_string()))?;
        keys.push(record.get(key_index).unwrap_or("").to_string());
        values.push(parse_measurement(record.get(value_index).unwrap_or("")));
    }
    Ok(MeasurementTable::new(keys, values))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn measurement_parsing_maps_na_markers_to_nan() {
        assert!(parse_measurement("").is_nan());
        assert!(parse_measurement("NA").is_nan());
        assert!(parse_measurement("nan").is_nan());
        assert_eq!(parse_measurement(" 2.5 "), 2.5);
    }

    #[test]
    fn reader_skips_comment_and_summary_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "# gene-model: GENCODE v36\n\
             gene_id\tunstranded\ttpm_unstranded\n\
             N_unmapped\t100\t0\n\
             N_multimapping\t100\t0\n\
             N_noFeature\t100\t0\n\
             N_ambiguous\t100\t0\n\
             ENSG1\t7\t1.5\n\
             ENSG2\t\t2.5\n"
        )
        .unwrap();
        file.flush().unwrap();

        let table = read_measurement_tsv(
            file.path(),
            "gene_id",
            "unstranded",
            None,
            Some(b'#'),
            4,
        )
        .unwrap();
        assert_eq!(table.keys, vec!["ENSG1".to_string(), "ENSG2".to_string()]);
        assert_eq!(table.values[0], 7.0);
        assert!(table.values[1].is_nan());
    }

    #[test]
    fn headerless_files_take_supplied_names() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "cg01\t0.5\ncg02\t\n").unwrap();
        file.flush().unwrap();

        let table = read_measurement_tsv(
            file.path(),
            "compElement",
            "betaValue",
            Some(&["compElement", "betaValue"]),
            None,
            0,
        )
        .unwrap();
        assert_eq!(table.keys, vec!["cg01".to_string(), "cg02".to_string()]);
        assert_eq!(table.values[0], 0.5);
        assert!(table.values[1].is_nan());
    }

    #[test]
    fn rendered_comparison_requires_exact_match() {
        let left = vec![Cell::Text("2.5e-01".into()), Cell::Missing];
        let right = vec![Cell::Text("2.5e-01".into()), Cell::Missing];
        assert!(rendered_columns_equal(&left, &right));
        let off = vec![Cell::Text("2.5e-01".into()), Cell::Text("0".into())];
        assert!(!rendered_columns_equal(&left, &off));
        assert!(!rendered_columns_equal(&left, &left[..1].to_vec()));
    }
}
