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

#[derive(Default)]
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

fn file_hit(file_id: &str, file_name: &str, sample: &str) -> JsonValue {
    json!({
        "file_id": file_id,
        "file_name": file_name,
        "md5sum": format!("md5-{file_id}"),
        "cases": [{
            "samples": [{"submitter_id": sample, "tissue_type": "Tumor"}]
        }]
    })
}

fn star_file(rows: &[(&str, &str)]) -> String {
    let mut content = String::from(
        "# gene-model: GENCODE v36\n\
         gene_id\tgene_name\tunstranded\n\
         N_unmapped\t\t100\n\
         N_multimapping\t\t100\n\
         N_noFeature\t\t100\n\
         N_ambiguous\t\t100\n",
    );
    for (gene, value) in rows {
        content.push_str(&format!("{gene}\t{gene}\t{value}\n"));
    }
    content
}

fn write_matrix(matrix_root: &Utf8PathBuf, project: &str, data_type: &str, content: &str) {
    let dir = matrix_root.join(project).join("Xena_Matrices");
    std::fs::create_dir_all(dir.as_std_path()).unwrap();
    std::fs::write(
        dir.join(format!("{project}.{data_type}.tsv")).as_std_path(),
        content,
    )
    .unwrap();
}

/// Two replicate files for one sample: NaN drops out of the denominator and
/// the log2(x+1) result matches the published column after rendering.
#[test]
fn replicate_files_average_and_match_the_matrix() {
    let temp = tempfile::tempdir().unwrap();
    let work_root = Utf8PathBuf::from_path_buf(temp.path().join("work")).unwrap();
    let matrix_root = Utf8PathBuf::from_path_buf(temp.path().join("data")).unwrap();

    write_matrix(
        &matrix_root,
        "TARGET-AML",
        "star_counts",
        "Ensembl_ID\tS1\ngeneX\t2.0\ngeneY\t2.8073549220576042\n",
    );

    let gdc = MockGdc {
        cases: vec![json!({"submitter_sample_ids": ["S1"]})],
        files: vec![
            file_hit("f1", "f1.tsv", "S1"),
            file_hit("f2", "f2.tsv", "S1"),
        ],
    };
    let fetcher = MockFetcher {
        contents: vec![
            ("f1.tsv".to_string(), star_file(&[("geneX", "2.0"), ("geneY", "")])),
            ("f2.tsv".to_string(), star_file(&[("geneX", "4.0"), ("geneY", "6.0")])),
        ],
    };

    let store = Store::new_with_paths(work_root, matrix_root);
    let app = App::new(store, gdc, fetcher);
    let project: ProjectId = "TARGET-AML".parse().unwrap();

    let report = app.run_one(&project, DataType::StarCounts);
    assert_eq!(report.status, RunStatus::Passed, "{:?}", report.error);
    assert_eq!(report.total_samples, 1);
}

/// A value disagreement is recorded per sample, not fatal.
#[test]
fn value_disagreement_fails_the_sample() {
    let temp = tempfile::tempdir().unwrap();
    let work_root = Utf8PathBuf::from_path_buf(temp.path().join("work")).unwrap();
    let matrix_root = Utf8PathBuf::from_path_buf(temp.path().join("data")).unwrap();

    write_matrix(
        &matrix_root,
        "TARGET-AML",
        "star_counts",
        "Ensembl_ID\tS1\ngeneX\t5.0\n",
    );

    let gdc = MockGdc {
        cases: vec![json!({"submitter_sample_ids": ["S1"]})],
        files: vec![file_hit("f1", "f1.tsv", "S1")],
    };
    let fetcher = MockFetcher {
        contents: vec![("f1.tsv".to_string(), star_file(&[("geneX", "3.0")]))],
    };

    let store = Store::new_with_paths(work_root, matrix_root);
    let app = App::new(store, gdc, fetcher);
    let project: ProjectId = "TARGET-AML".parse().unwrap();

    let report = app.run_one(&project, DataType::StarCounts);
    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.failed_samples, vec!["S1".to_string()]);
}

/// A sample-universe mismatch aborts before any download is attempted.
#[test]
fn sample_set_mismatch_aborts_before_fetch() {
    let temp = tempfile::tempdir().unwrap();
    let work_root = Utf8PathBuf::from_path_buf(temp.path().join("work")).unwrap();
    let matrix_root = Utf8PathBuf::from_path_buf(temp.path().join("data")).unwrap();

    write_matrix(
        &matrix_root,
        "TARGET-AML",
        "star_counts",
        "Ensembl_ID\tS1\tS2\tS3\ngeneX\t1.0\t1.0\t1.0\n",
    );

    let gdc = MockGdc {
        cases: vec![json!({"submitter_sample_ids": ["S1", "S2"]})],
        files: vec![
            file_hit("f1", "f1.tsv", "S1"),
            file_hit("f2", "f2.tsv", "S2"),
        ],
    };
    let fetcher = MockFetcher::default();

    let store = Store::new_with_paths(work_root.clone(), matrix_root);
    let project: ProjectId = "TARGET-AML".parse().unwrap();

    let app = App::new(store, gdc, fetcher);
    let report = app.run_one(&project, DataType::StarCounts);
    assert_eq!(report.status, RunStatus::Error);
    assert!(report.error.as_deref().unwrap().contains("sample sets disagree"));
    // Nothing was downloaded: the raw dir was never created.
    assert!(!work_root.join("gdcFiles").as_std_path().exists());
}
