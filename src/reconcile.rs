use std::collections::BTreeSet;

use crate::error::ReconError;

/// Gate the run on the two sample universes agreeing exactly. Runs before any
/// download or aggregation; a mismatch aborts with the full symmetric
/// difference so the operator can see both directions at once.
pub fn reconcile_sample_sets(
    repository: &BTreeSet<String>,
    reference: &BTreeSet<String>,
) -> Result<(), ReconError> {
    if repository == reference {
        return Ok(());
    }
    Err(ReconError::SampleSetMismatch {
        only_repository: repository.difference(reference).cloned().collect(),
        only_reference: reference.difference(repository).cloned().collect(),
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn set(samples: &[&str]) -> BTreeSet<String> {
        samples.iter().map(|sample| sample.to_string()).collect()
    }

    #[test]
    fn equal_sets_pass() {
        assert!(reconcile_sample_sets(&set(&["S1", "S2"]), &set(&["S2", "S1"])).is_ok());
    }

    #[test]
    fn mismatch_reports_both_directions() {
        let err = reconcile_sample_sets(&set(&["S1", "S2"]), &set(&["S2", "S3"])).unwrap_err();
        assert_matches!(
            err,
            ReconError::SampleSetMismatch {
                only_repository,
                only_reference,
            } => {
                assert_eq!(only_repository, vec!["S1".to_string()]);
                assert_eq!(only_reference, vec!["S3".to_string()]);
            }
        );
    }

    #[test]
    fn reference_superset_is_still_fatal() {
        let err = reconcile_sample_sets(&set(&["S1", "S2"]), &set(&["S1", "S2", "S3"])).unwrap_err();
        assert_matches!(
            err,
            ReconError::SampleSetMismatch { only_repository, only_reference } => {
                assert!(only_repository.is_empty());
                assert_eq!(only_reference, vec!["S3".to_string()]);
            }
        );
    }
}
