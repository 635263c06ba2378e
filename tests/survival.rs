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
        _fields: &[&str],
        _size: u64,
    ) -> Result<Vec<JsonValue>, ReconError> {
        match endpoint {
            Endpoint::Cases => Ok(vec![
                json!({
                    "submitter_id": "P1",
                    "demographic": {"vital_status": "Dead"},
                    "submitter_sample_ids": ["S1", "S-filtered"]
                }),
                json!({
                    "submitter_id": "P2",
                    "demographic": {"vital_status": "Not Reported"},
                    "submitter_sample_ids": ["S2"]
                }),
            ]),
            Endpoint::Files => Ok(vec![json!({
                "data_category": "DNA Methylation",
                "cases": [{
                    "samples": [
                        {"submitter_id": "S1", "tissue_type": "Tumor"},
                        {"submitter_id": "S2", "tissue_type": "Normal"}
                    ]
                }]
            })]),
            Endpoint::Projects => Ok(Vec::new()),
        }
    }

    fn field_mapping(&self) -> Result<Vec<String>, ReconError> {
        Ok(Vec::new())
    }

    fn survival(&self, _project: &ProjectId) -> Result<Vec<JsonValue>, ReconError> {
        Ok(vec![
            json!({"submitter_id": "P1", "time": 500.5, "censored": false}),
            json!({"submitter_id": "P2", "time": 91.0, "censored": true}),
        ])
    }
}

struct NoFetch;

impl FileFetcher for NoFetch {
    fn fetch(&self, _files: &[&FileEntry], _dest_dir: &Path) -> Result<(), ReconError> {
        panic!("survival reconciliation downloads no raw files");
    }
}

/// P1 died (OS 1); P2 has no usable vital status and falls back to the
/// censored flag (OS 0). The filtered sample never appears because it has no
/// open-access molecular file.
const MATRIX: &str = "sample\tOS.time\tOS\t_PATIENT\n\
    S1\t500.5\t1\tP1\n\
    S2\t91\t0\tP2\n";

#[test]
fn survival_rows_rebuild_and_match_the_matrix() {
    let temp = tempfile::tempdir().unwrap();
    let work_root = Utf8PathBuf::from_path_buf(temp.path().join("work")).unwrap();
    let matrix_root = Utf8PathBuf::from_path_buf(temp.path().join("data")).unwrap();

    let dir = matrix_root.join("TARGET-AML").join("Xena_Matrices");
    std::fs::create_dir_all(dir.as_std_path()).unwrap();
    std::fs::write(dir.join("TARGET-AML.survival.tsv").as_std_path(), MATRIX).unwrap();

    let store = Store::new_with_paths(work_root, matrix_root);
    let app = App::new(store, MockGdc, NoFetch);
    let project: ProjectId = "TARGET-AML".parse().unwrap();

    let report = app.run_one(&project, DataType::Survival);
    assert_eq!(report.status, RunStatus::Passed, "{:?}", report.error);
    assert_eq!(report.total_samples, 2);
}
