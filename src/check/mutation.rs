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
use crate::transform::{round_keeping_nans, vaf};

const FIELDS: &[&str] = &[
    "cases.samples.submitter_id",
    "cases.samples.tissue_type",
    "file_id",
    "file_name",
    "md5sum",
];

const COLUMNS: [&str; 12] = [
    "sample",
    "gene",
    "chrom",
    "start",
    "end",
    "ref",
    "alt",
    "Tumor_Sample_Barcode",
    "Amino_Acid_Change",
    "effect",
    "callers",
    "dna_vaf",
];

/// Sentinel start/end marking "sample has no mutations".
const NO_MUTATION: &str = "-1";

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
    render_numeric_column(&mut reference, "dna_vaf", precision)?;

    let raw_dir = ctx.store.raw_dir(ctx.project, ctx.data_type);
    let mut recomputed = Table::new(COLUMNS.iter().map(|name| name.to_string()).collect());
    for (key, files) in manifest.iter() {
        let sample = base_sample_name(key);
        for file in files {
            append_mutations(
                raw_dir.join(&file.file_name).as_std_path(),
                sample,
                precision,
                &mut recomputed,
            )?;
        }
    }

    drop_shadowed_sentinels(&reference, &mut recomputed)?;

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

/// A sentinel row stands in for a sample with an empty mutation file. Once
/// the reference carries a real mutation row for that sample, the sentinel
/// would double-count it, so it is dropped; with no real row it stays and
/// must match the reference's own sentinel.
fn drop_shadowed_sentinels(reference: &Table, recomputed: &mut Table) -> Result<(), ReconError> {
    let ref_sample = reference.require_column("sample")?;
    let ref_start = reference.require_column("start")?;
    let real_samples: BTreeSet<String> = reference
        .rows
        .iter()
        .filter(|row| row[ref_start].to_string() != NO_MUTATION)
        .map(|row| row[ref_sample].to_string())
        .collect();

    let rec_sample = recomputed.require_column("sample")?;
    let rec_start = recomputed.require_column("start")?;
    recomputed.rows.retain(|row| {
        row[rec_start].to_string() != NO_MUTATION
            || !real_samples.contains(&row[rec_sample].to_string())
    });
    Ok(())
}

/// Append one MAF's rows under the portal column names. An empty MAF
/// contributes the no-mutation sentinel row instead.
fn append_mutations(
    path: &Path,
    sample: &str,
    precision: usize,
    out: &mut Table,
) -> Result<(), ReconError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .comment(Some(b'#'))
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
    let gene = column("Hugo_Symbol")?;
    let chrom = column("Chromosome")?;
    let start = column("Start_Position")?;
    let end = column("End_Position")?;
    let reference_allele = column("Reference_Allele")?;
    let alt = column("Tumor_Seq_Allele2")?;
    let barcode = column("Tumor_Sample_Barcode")?;
    let amino_acid_change = column("HGVSp_Short")?;
    let effect = column("Consequence")?;
    let callers = column("callers")?;
    let t_depth = column("t_depth")?;
    let t_alt_count = column("t_alt_count")?;

    let mut rows = 0usize;
    for record in reader.records() {
        let record = record.map_err(|err| ReconError::Csv(err.to_string()))?;
        let field = |index: usize| Cell::from_field(record.get(index).unwrap_or(""));
        let dna_vaf = round_keeping_nans(
            vaf(
                parse_measurement(record.get(t_alt_count).unwrap_or("")),
                parse_measurement(record.get(t_depth).unwrap_or("")),
            ),
            precision,
        )
        .map(Cell::Text)
        .unwrap_or(Cell::Missing);

        out.rows.push(vec![
            Cell::Text(sample.to_string()),
            field(gene),
            field(chrom),
            field(start),
            field(end),
            field(reference_allele),
            field(alt),
            field(barcode),
            field(amino_acid_change),
            field(effect),
            field(callers),
            dna_vaf,
        ]);
        rows += 1;
    }

    if rows == 0 {
        let mut sentinel = vec![Cell::Missing; COLUMNS.len()];
        sentinel[0] = Cell::Text(sample.to_string());
        sentinel[3] = Cell::Text(NO_MUTATION.to_string());
        sentinel[4] = Cell::Text(NO_MUTATION.to_string());
        out.rows.push(sentinel);
    }
    Ok(())
}
