use super::{CheckContext, CheckOutcome, expected_samples, fetch_manifest, profile_for, run_wide};
use crate::error::ReconError;

const FIELDS: &[&str] = &[
    "cases.samples.submitter_id",
    "file_id",
    "file_name",
    "cases.samples.tissue_type",
    "md5sum",
];

/// STAR gene counts files open with a gene-model comment line and four
/// unmapped/multimapping summary rows ahead of the per-gene body.
const SUMMARY_ROWS: usize = 4;

pub(super) fn run(ctx: &CheckContext<'_>) -> Result<CheckOutcome, ReconError> {
    let profile = profile_for(ctx.data_type)?;
    let value_column = ctx
        .data_type
        .value_column()
        .ok_or_else(|| ReconError::UnsupportedDataType(ctx.data_type.to_string()))?;

    let samples = expected_samples(ctx, &profile)?;
    let manifest = fetch_manifest(ctx, &profile, &samples, FIELDS, false)?;

    run_wide(ctx, &manifest, &|path| {
        super::read_measurement_tsv(path, "gene_id", value_column, None, Some(b'#'), SUMMARY_ROWS)
    })
}
