use std::path::Path;

use camino::Utf8PathBuf;
use serde_json::{Value as JsonValue, json};

use xena_recon::app::{App, RunStatus};
use xena_recon::domain::{DataType, ProjectId};
use xena_recon::error::ReconError;
use xena_recon::fetch::FileFetcher;
use xena_recon::gdc::{Endpoint, Filter, GdcClient};
use xena_recon::manifest::FileEntry;
use xena_recon::store::Store;

struct MockGdc;

impl GdcClient for MockGdc {
    fn query(
        &self,
        endpoint: Endpoint,
        _filter: &Filter,
        fields: &[&str],
        _size: u64,
    ) -> Result<Vec<JsonValue>, ReconError> {
        match endpoint {
            Endpoint::Projects => Ok(vec![json!({
                "id": "internal-uuid",
                "name": "TARGET Acute Myeloid Leukemia"
            })]),
            // The per-case sample collections call.
            Endpoint::Cases => Ok(vec![json!({
                "case_id": "c1",
                "samples": [
                    {"submitter_id": "S1", "sample_type": "Primary Tumor"},
                    {"submitter_id": "S-excluded", "sample_type": "Blood Derived Normal"}
                ]
            })]),
            Endpoint::Files => {
                if fields.contains(&"data_category") {
                    // Open-access category sweep deciding the sample universe.
                    Ok(vec![json!({
                        "data_category": "Transcriptome Profiling",
                        "cases": [{
                            "samples": [{"submitter_id": "S1", "tissue_type": "Tumor"}]
                        }]
                    })])
                } else {
                    // Both field-list halves see the same case; the merge must
                    // not duplicate anything. The diagnosis arrives twice and
                    // collapses by id.
                    Ok(vec![json!({
                        "cases": [{
                            "case_id": "c1",
                            "demographic": {"gender": "female"},
                            "diagnoses": [
                                {
                                    "diagnosis_id": "d1",
                                    "primary_diagnosis": "AML",
                                    "age_at_diagnosis": 730
                                },
                                {
                                    "diagnosis_id": "d1",
                                    "primary_diagnosis": "AML",
                                    "age_at_diagnosis": 730
                                }
                            ]
                        }]
                    })])
                }
            }
        }
    }

    fn field_mapping(&self) -> Result<Vec<String>, ReconError> {
        Ok(vec![
            "cases.case_id".to_string(),
            "cases.demographic.gender".to_string(),
            "cases.diagnoses.primary_diagnosis".to_string(),
            "cases.diagnoses.age_at_diagnosis".to_string(),
            "cases.project.name".to_string(),
            "cases.samples.submitter_id".to_string(),
            "cases.samples.sample_type".to_string(),
            // Excluded attributes must never reach a query.
            "cases.state".to_string(),
            "cases.summary.file_count".to_string(),
            "files.file_id".to_string(),
        ])
    }

    fn survival(&self, _project: &ProjectId) -> Result<Vec<JsonValue>, ReconError> {
        Ok(Vec::new())
    }
}

struct NoFetch;

impl FileFetcher for NoFetch {
    fn fetch(&self, _files: &[&FileEntry], _dest_dir: &Path) -> Result<(), ReconError> {
        panic!("clinical reconciliation downloads no raw files");
    }
}

const MATRIX: &str = "sample\tid\tgender.demographic\tprimary_diagnosis.diagnoses\t\
    age_at_diagnosis.diagnoses\tage_at_earliest_diagnosis.diagnoses.xena_derived\t\
    age_at_earliest_diagnosis_in_years.diagnoses.xena_derived\tname.project\t\
    sample_type.samples\n\
    S1\tc1\tFemale\tAML\t730\t730\t2.0\tTARGET Acute Myeloid Leukemia\tPrimary Tumor\n";

#[test]
fn clinical_rows_rebuild_and_match_the_matrix() {
    let temp = tempfile::tempdir().unwrap();
    let work_root = Utf8PathBuf::from_path_buf(temp.path().join("work")).unwrap();
    let matrix_root = Utf8PathBuf::from_path_buf(temp.path().join("data")).unwrap();

    let dir = matrix_root.join("TARGET-AML").join("Xena_Matrices");
    std::fs::create_dir_all(dir.as_std_path()).unwrap();
    std::fs::write(dir.join("TARGET-AML.clinical.tsv").as_std_path(), MATRIX).unwrap();

    let store = Store::new_with_paths(work_root, matrix_root);
    let app = App::new(store, MockGdc, NoFetch);
    let project: ProjectId = "TARGET-AML".parse().unwrap();

    // The normal-tissue sample carries no open-access molecular file, so the
    // row universe is exactly {S1}; gender compares case-insensitively and the
    // derived earliest-diagnosis columns come out of the per-diagnosis data.
    let report = app.run_one(&project, DataType::Clinical);
    assert_eq!(report.status, RunStatus::Passed, "{:?}", report.error);
    assert_eq!(report.total_samples, 1);
}
