use serde::Serialize;
use tracing::info;

use crate::check::{self, CheckContext};
use crate::domain::{DataType, ProjectId};
use crate::error::ReconError;
use crate::fetch::FileFetcher;
use crate::gdc::GdcClient;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Passed,
    Failed,
    Error,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Passed => write!(f, "PASSED"),
            RunStatus::Failed => write!(f, "FAILED"),
            RunStatus::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub project: String,
    pub data_type: String,
    pub status: RunStatus,
    pub total_samples: usize,
    pub failed_samples: Vec<String>,
    pub error: Option<String>,
    pub checked_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub reports: Vec<RunReport>,
}

impl RunSummary {
    pub fn all_passed(&self) -> bool {
        self.reports
            .iter()
            .all(|report| report.status == RunStatus::Passed)
    }
}

pub struct App<G: GdcClient, F: FileFetcher> {
    store: Store,
    gdc: G,
    fetcher: F,
}

impl<G: GdcClient, F: FileFetcher> App<G, F> {
    pub fn new(store: Store, gdc: G, fetcher: F) -> Self {
        Self { store, gdc, fetcher }
    }

    /// Check every requested (project, data type) pair. A failure or error in
    /// one pair never stops the rest of the run.
    pub fn run(&self, projects: &[ProjectId], data_types: &[DataType]) -> RunSummary {
        let mut reports = Vec::with_capacity(projects.len() * data_types.len());
        for project in projects {
            for data_type in data_types {
                reports.push(self.run_one(project, *data_type));
            }
        }
        RunSummary { reports }
    }

    pub fn run_one(&self, project: &ProjectId, data_type: DataType) -> RunReport {
        let ctx = CheckContext {
            project,
            data_type,
            store: &self.store,
            gdc: &self.gdc,
            fetcher: &self.fetcher,
        };
        match check::run(&ctx) {
            Ok(outcome) if outcome.passed() => {
                info!("[{data_type}] test passed for [{project}].");
                RunReport {
                    project: project.to_string(),
                    data_type: data_type.to_string(),
                    status: RunStatus::Passed,
                    total_samples: outcome.total_samples,
                    failed_samples: Vec::new(),
                    error: None,
                    checked_at: iso_timestamp(),
                }
            }
            Ok(outcome) => {
                info!("[{data_type}] test failed for [{project}].");
                info!("Samples failed: {:?}", outcome.failed_samples);
                RunReport {
                    project: project.to_string(),
                    data_type: data_type.to_string(),
                    status: RunStatus::Failed,
                    total_samples: outcome.total_samples,
                    failed_samples: outcome.failed_samples,
                    error: None,
                    checked_at: iso_timestamp(),
                }
            }
            Err(err) => {
                if let ReconError::SampleSetMismatch {
                    only_repository,
                    only_reference,
                } = &err
                {
                    info!(
                        "ERROR: Samples retrieved from the GDC do not match those found in the matrix."
                    );
                    info!("Samples from GDC and not in the matrix: {only_repository:?}");
                    info!("Samples from the matrix and not in GDC: {only_reference:?}");
                }
                info!("[{data_type}] test errored for [{project}]: {err}");
                RunReport {
                    project: project.to_string(),
                    data_type: data_type.to_string(),
                    status: RunStatus::Error,
                    total_samples: 0,
                    failed_samples: Vec::new(),
                    error: Some(err.to_string()),
                    checked_at: iso_timestamp(),
                }
            }
        }
    }
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
