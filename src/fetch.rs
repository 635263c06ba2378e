use std::fs;
use std::path::{Component, Path};
use std::time::Duration;

use flate2::read::GzDecoder;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use tar::Archive;
use tracing::info;

use crate::error::ReconError;
use crate::manifest::FileEntry;

/// Bulk file-fetch collaborator: given manifest entries, materialize their
/// contents under `dest_dir`.
pub trait FileFetcher: Send + Sync {
    fn fetch(&self, files: &[&FileEntry], dest_dir: &Path) -> Result<(), ReconError>;
}

#[derive(Serialize)]
struct DownloadPayload<'a> {
    ids: Vec<&'a str>,
}

/// Downloads through the repository's data endpoint. More than one id comes
/// back as a tar.gz archive with one leading path component per file;
/// exactly one id comes back as the bare file.
#[derive(Clone)]
pub struct GdcFileFetcher {
    client: Client,
    base_url: String,
}

impl GdcFileFetcher {
    pub fn new() -> Result<Self, ReconError> {
        Self::with_base_url("https://api.gdc.cancer.gov".to_string())
    }

    pub fn with_base_url(base_url: String) -> Result<Self, ReconError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("xena-recon/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| ReconError::FetchHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(600))
            .build()
            .map_err(|err| ReconError::FetchHttp(err.to_string()))?;
        Ok(Self { client, base_url })
    }

    fn download(&self, ids: &[&str], destination: &Path) -> Result<(), ReconError> {
        let url = format!("{}/data", self.base_url);
        let payload = DownloadPayload { ids: ids.to_vec() };
        let mut response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .map_err(|err| ReconError::FetchHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "GDC data request failed".to_string());
            return Err(ReconError::FetchStatus { status, message });
        }
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|err| ReconError::Filesystem(err.to_string()))?;
        }
        let mut file = fs::File::create(destination)
            .map_err(|err| ReconError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| ReconError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

impl FileFetcher for GdcFileFetcher {
    fn fetch(&self, files: &[&FileEntry], dest_dir: &Path) -> Result<(), ReconError> {
        if files.is_empty() {
            return Ok(());
        }
        fs::create_dir_all(dest_dir).map_err(|err| ReconError::Filesystem(err.to_string()))?;
        info!("downloading {} file(s) from the GDC", files.len());

        let ids: Vec<&str> = files.iter().map(|file| file.file_id.as_str()).collect();
        if let [only] = files {
            return self.download(&ids, &dest_dir.join(&only.file_name));
        }

        let scratch = tempfile::Builder::new()
            .prefix("xena-recon-fetch")
            .tempdir()
            .map_err(|err| ReconError::Filesystem(err.to_string()))?;
        let archive_path = scratch.path().join("gdcFiles.tar.gz");
        self.download(&ids, &archive_path)?;
        extract_tar_gz(&archive_path, dest_dir)
    }
}

/// Unpack a gzipped tar into `dest_dir`, stripping the leading per-file
/// directory component the data endpoint adds.
pub fn extract_tar_gz(archive_path: &Path, dest_dir: &Path) -> Result<(), ReconError> {
    let file = fs::File::open(archive_path)
        .map_err(|err| ReconError::Filesystem(format!("{}: {err}", archive_path.display())))?;
    let mut archive = Archive::new(GzDecoder::new(file));
    let entries = archive
        .entries()
        .map_err(|err| ReconError::Filesystem(err.to_string()))?;
    for entry in entries {
        let mut entry = entry.map_err(|err| ReconError::Filesystem(err.to_string()))?;
        let path = entry
            .path()
            .map_err(|err| ReconError::Filesystem(err.to_string()))?
            .into_owned();
        let mut components = path.components();
        components.next();
        let stripped: std::path::PathBuf = components
            .filter(|component| matches!(component, Component::Normal(_)))
            .collect();
        if stripped.as_os_str().is_empty() {
            continue;
        }
        let target = dest_dir.join(stripped);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|err| ReconError::Filesystem(err.to_string()))?;
        }
        entry
            .unpack(&target)
            .map_err(|err| ReconError::Filesystem(err.to_string()))?;
    }
    Ok(())
}
