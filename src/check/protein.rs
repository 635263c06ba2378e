use super::{CheckContext, CheckOutcome, fetch_manifest, profile_for, run_wide};
use crate::error::ReconError;

const FIELDS: &[&str] = &["cases.samples.submitter_id", "file_id", "file_name"];

/// RPPA expression has no per-case pre-query; the files endpoint alone
/// defines the sample universe.
pub(super) fn run(ctx: &CheckContext<'_>) -> Result<CheckOutcome, ReconError> {
    let profile = profile_for(ctx.data_type)?;
    let manifest = fetch_manifest(ctx, &profile, &[], FIELDS, false)?;

    run_wide(ctx, &manifest, &|path| {
        super::read_measurement_tsv(path, "peptide_target", "protein_expression", None, None, 0)
    })
}
