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

struct MockGdc {
    cases: Vec<JsonValue>,
    files: Vec<JsonValue>,
}

impl GdcClient for MockGdc {
    fn query(
        &self,
        endpoint: Endpoint,
        _filter: &Filter,
        _fields: &[&str],
        _size: u64,
    ) -> Result<Vec<JsonValue>, ReconError> {
        match endpoint {
            Endpoint::Cases => Ok(self.cases.clone()),
            Endpoint::Files => Ok(self.files.clone()),
            Endpoint::Projects => Ok(Vec::new()),
        }
    }

    fn field_mapping(&self) -> Result<Vec<String>, ReconError> {
        Ok(Vec::new())
    }

    fn survival(&self, _project: &ProjectId) -> Result<Vec<JsonValue>, ReconError> {
        Ok(Vec::new())
    }
}

struct MockFetcher {
    contents: Vec<(String, String)>,
}

impl FileFetcher for MockFetcher {
    fn fetch(&self, files: &[&FileEntry], dest_dir: &Path) -> Result<(), ReconError> {
        std::fs::create_dir_all(dest_dir).unwrap();
        for file in files {
            let content = self
                .contents
                .iter()
                .find(|(name, _)| *name == file.file_name)
                .map(|(_, content)| content.clone())
                .unwrap_or_default();
            std::fs::write(dest_dir.join(&file.file_name), content).unwrap();
        }
        Ok(())
    }
}

fn file_hit(file_id: &str, sample: &str) -> JsonValue {
    json!({
        "file_id": file_id,
        "file_name": format!("{file_id}.maf"),
        "md5sum": format!("md5-{file_id}"),
        "cases": [{
            "samples": [{"submitter_id": sample, "tissue_type": "Tumor"}]
        }]
    })
}

const MAF_HEADER: &str = "#version gdc-1.0\n\
    Hugo_Symbol\tChromosome\tStart_Position\tEnd_Position\tReference_Allele\t\
    Tumor_Seq_Allele2\tTumor_Sample_Barcode\tHGVSp_Short\tConsequence\tcallers\t\
    t_depth\tt_alt_count\n";

fn empty_maf() -> String {
    MAF_HEADER.to_string()
}

fn maf_with_tp53_row() -> String {
    format!(
        "{MAF_HEADER}TP53\tchr17\t7675088\t7675088\tC\tT\tTCGA-XX\tp.R175H\t\
         missense_variant\tmuse;mutect2\t48\t12\n"
    )
}

const MATRIX_HEADER: &str = "sample\tgene\tchrom\tstart\tend\tref\talt\t\
    Tumor_Sample_Barcode\tAmino_Acid_Change\teffect\tcallers\tdna_vaf\n";

const TP53_ROW: &str =
    "S4\tTP53\tchr17\t7675088\t7675088\tC\tT\tTCGA-XX\tp.R175H\tmissense_variant\t\
     muse;mutect2\t0.25\n";

const SENTINEL_ROW: &str = "S4\t\t\t-1\t-1\t\t\t\t\t\t\t\n";

fn setup(
    matrix_body: &str,
    files: Vec<JsonValue>,
    contents: Vec<(String, String)>,
) -> (tempfile::TempDir, App<MockGdc, MockFetcher>, ProjectId) {
    let temp = tempfile::tempdir().unwrap();
    let work_root = Utf8PathBuf::from_path_buf(temp.path().join("work")).unwrap();
    let matrix_root = Utf8PathBuf::from_path_buf(temp.path().join("data")).unwrap();

    let dir = matrix_root.join("TARGET-AML").join("Xena_Matrices");
    std::fs::create_dir_all(dir.as_std_path()).unwrap();
    std::fs::write(
        dir.join("TARGET-AML.somaticmutation_wxs.tsv").as_std_path(),
        format!("{MATRIX_HEADER}{matrix_body}"),
    )
    .unwrap();

    let gdc = MockGdc {
        cases: vec![json!({"submitter_sample_ids": ["S4"]})],
        files,
    };
    let fetcher = MockFetcher { contents };
    let store = Store::new_with_paths(work_root, matrix_root);
    let app = App::new(store, gdc, fetcher);
    let project: ProjectId = "TARGET-AML".parse().unwrap();
    (temp, app, project)
}

/// The sample has one empty and one real mutation file; the reference holds
/// only the real row, so the no-mutation sentinel must be dropped before
/// comparison.
#[test]
fn sentinel_dropped_when_reference_has_a_real_row() {
    let (_temp, app, project) = setup(
        TP53_ROW,
        vec![file_hit("f-empty", "S4"), file_hit("f-real", "S4")],
        vec![
            ("f-empty.maf".to_string(), empty_maf()),
            ("f-real.maf".to_string(), maf_with_tp53_row()),
        ],
    );

    let report = app.run_one(&project, DataType::SomaticMutationWxs);
    assert_eq!(report.status, RunStatus::Passed, "{:?}", report.error);
}

/// With no other row for the sample, the sentinel is retained and must match
/// the reference's own no-mutation row.
#[test]
fn sentinel_retained_when_reference_has_no_real_row() {
    let (_temp, app, project) = setup(
        SENTINEL_ROW,
        vec![file_hit("f-empty", "S4")],
        vec![("f-empty.maf".to_string(), empty_maf())],
    );

    let report = app.run_one(&project, DataType::SomaticMutationWxs);
    assert_eq!(report.status, RunStatus::Passed, "{:?}", report.error);
}

/// The computed variant allele frequency must agree with the published one
/// after both render at the same precision.
#[test]
fn vaf_disagreement_is_reported_per_sample() {
    let wrong_vaf_row = TP53_ROW.replace("0.25", "0.5");
    let (_temp, app, project) = setup(
        &wrong_vaf_row,
        vec![file_hit("f-real", "S4")],
        vec![("f-real.maf".to_string(), maf_with_tp53_row())],
    );

    let report = app.run_one(&project, DataType::SomaticMutationWxs);
    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.failed_samples, vec!["S4".to_string()]);
}
