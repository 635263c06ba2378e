use std::collections::BTreeSet;
use std::path::Path;

use super::{
    CheckContext, CheckOutcome, ensure_raw_files, expected_samples, fetch_manifest,
    parse_measurement, profile_for, render_numeric_column, write_mismatch_artifacts,
};
use crate::compare::compare_positional;
use crate::error::ReconError;
use crate::manifest::base_sample_name;
use crate::reconcile::reconcile_sample_sets;
use crate::table::{Cell, Table};
use crate::transform::round_keeping_nans;

const FIELDS: &[&str] = &[
    "cases.samples.submitter_id",
    "cases.samples.tissue_type",
    "file_id",
    "file_name",
];

const COLUMNS: [&str; 5] = ["sample", "Chrom", "Start", "End", "value"];

pub(super) fn run(ctx: &CheckContext<'_>) -> Result<CheckOutcome, ReconError> {
    let profile = profile_for(ctx.data_type)?;
    let samples = expected_samples(ctx, &profile)?;
    let manifest = fetch_manifest(ctx, &profile, &samples, FIELDS, true)?;

    let mut reference = super::read_reference_table(ctx)?;
    let reference_samples: BTreeSet<String> =
        reference.unique_values("sample")?.into_iter().collect();
    reconcile_sample_sets(&manifest.sample_set(), &reference_samples)?;

    ensure_raw_files(ctx, &manifest)?;

    let precision = ctx.data_type.precision();
    render_numeric_column(&mut reference, "value", precision)?;

    let raw_dir = ctx.store.raw_dir(ctx.project, ctx.data_type);
    let mut recomputed = Table::new(COLUMNS.iter().map(|name| name.to_string()).collect());
    for (key, files) in manifest.iter() {
        let sample = base_sample_name(key);
        for file in files {
            append_segments(
                raw_dir.join(&file.file_name).as_std_path(),
                sample,
                precision,
                &mut recomputed,
            )?;
        }
    }

    let total = reference_samples.len();
    let failed = match compare_positional(&mut reference, &mut recomputed, "sample") {
        Ok(failed) => failed,
        Err(ReconError::RowCountMismatch { context, left, right }) => {
            write_mismatch_artifacts(ctx, &reference, &recomputed)?;
            vec![format!("row count mismatch ({context}): {left} vs {right}")]
        }
        Err(err) => return Err(err),
    };
    if !failed.is_empty() {
        write_mismatch_artifacts(ctx, &reference, &recomputed)?;
    }

    Ok(CheckOutcome {
        total_samples: total,
        failed_samples: failed,
    })
}

/// One copy-number segment file: aliquot rows become sample rows, the major
/// and minor allele columns are dropped, and the segment value is rendered
/// at the modality precision.
fn append_segments(
    path: &Path,
    sample: &str,
    precision: usize,
    out: &mut Table,
) -> Result<(), ReconError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_path(path)
        .map_err(|err| ReconError::Csv(format!("{}: {err}", path.display())))?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(|err| ReconError::Csv(err.to_string()))?
        .iter()
        .map(|name| name.trim().to_string())
        .collect();
    let column = |name: &str| {
        headers
            .iter()
            .position(|header| header == name)
            .ok_or_else(|| ReconError::MissingColumn(format!("{name} in {}", path.display())))
    };
    let chromosome = column("Chromosome")?;
    let start = column("Start")?;
    let end = column("End")?;
    // AscatNGS segments carry Copy_Number, masked DNAcopy segments carry
    // Segment_Mean.
    let copy_number = column("Copy_Number").or_else(|_| column("Segment_Mean"))?;

    for record in reader.records() {
        let record = record.map_err(|err| ReconError::Csv(err.to_string()))?;
        let field = |index: usize| Cell::from_field(record.get(index).unwrap_or(""));
        let value = match round_keeping_nans(
            parse_measurement(record.get(copy_number).unwrap_or("")),
            precision,
        ) {
            Some(text) => Cell::Text(text),
            None => Cell::Missing,
        };
        out.rows.push(vec![
            Cell::Text(sample.to_string()),
            field(chromosome),
            field(start),
            field(end),
            value,
        ]);
    }
    Ok(())
}
