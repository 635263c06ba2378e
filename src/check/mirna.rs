use super::{CheckContext, CheckOutcome, expected_samples, fetch_manifest, profile_for, run_wide};
use crate::error::ReconError;

const FIELDS: &[&str] = &["cases.samples.submitter_id", "file_id", "file_name"];

pub(super) fn run(ctx: &CheckContext<'_>) -> Result<CheckOutcome, ReconError> {
    let profile = profile_for(ctx.data_type)?;
    let samples = expected_samples(ctx, &profile)?;
    let manifest = fetch_manifest(ctx, &profile, &samples, FIELDS, false)?;

    run_wide(ctx, &manifest, &|path| {
        super::read_measurement_tsv(
            path,
            "miRNA_ID",
            "reads_per_million_miRNA_mapped",
            None,
            None,
            0,
        )
    })
}
