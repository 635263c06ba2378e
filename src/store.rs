use std::fs;

use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::{DataType, ProjectId};
use crate::error::ReconError;

/// Filesystem layout of one reconciliation run: where raw repository files
/// land, where the published matrices live, and where scratch output goes.
#[derive(Debug, Clone)]
pub struct Store {
    work_root: Utf8PathBuf,
    matrix_root: Utf8PathBuf,
}

impl Store {
    pub fn new(matrix_root: Utf8PathBuf) -> Result<Self, ReconError> {
        let cwd = std::env::current_dir().map_err(|err| ReconError::Filesystem(err.to_string()))?;
        let work_root = Utf8PathBuf::from_path_buf(cwd)
            .map_err(|_| ReconError::Filesystem("invalid working directory path".to_string()))?;
        Ok(Self {
            work_root,
            matrix_root,
        })
    }

    pub fn new_with_paths(work_root: Utf8PathBuf, matrix_root: Utf8PathBuf) -> Self {
        Self {
            work_root,
            matrix_root,
        }
    }

    pub fn work_root(&self) -> &Utf8Path {
        &self.work_root
    }

    pub fn matrix_root(&self) -> &Utf8Path {
        &self.matrix_root
    }

    /// Raw repository files for one (project, modality).
    pub fn raw_dir(&self, project: &ProjectId, data_type: DataType) -> Utf8PathBuf {
        self.work_root
            .join("gdcFiles")
            .join(project.as_str())
            .join(data_type.raw_subdir())
    }

    /// The published matrix under reconciliation.
    pub fn matrix_path(&self, project: &ProjectId, data_type: DataType) -> Utf8PathBuf {
        self.matrix_root
            .join(project.as_str())
            .join("Xena_Matrices")
            .join(format!("{}.{}.tsv", project.as_str(), data_type.as_str()))
    }

    pub fn scratch_dir(&self) -> Utf8PathBuf {
        self.work_root.join("scratch")
    }

    pub fn snapshot_path(
        &self,
        project: &ProjectId,
        data_type: DataType,
        side: &str,
    ) -> Utf8PathBuf {
        self.scratch_dir()
            .join(format!("{}.{}.{side}.csv", project.as_str(), data_type.as_str()))
    }

    pub fn diff_path(&self, project: &ProjectId, data_type: DataType) -> Utf8PathBuf {
        self.scratch_dir()
            .join(format!("{}.{}.diff.txt", project.as_str(), data_type.as_str()))
    }

    pub fn write_text_atomic(path: &Utf8Path, content: &str) -> Result<(), ReconError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| ReconError::Filesystem(err.to_string()))?;
        }
        let tmp_path = path.with_extension("tmp");
        fs::write(tmp_path.as_std_path(), content)
            .map_err(|err| ReconError::Filesystem(err.to_string()))?;
        fs::rename(tmp_path.as_std_path(), path.as_std_path())
            .map_err(|err| ReconError::Filesystem(err.to_string()))?;
        Ok(())
    }
}
