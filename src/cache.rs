use std::fs;
use std::io::Read;
use std::path::Path;

use md5::{Digest, Md5};
use tracing::info;

use crate::error::ReconError;
use crate::manifest::FileEntry;

/// MD5 of a file, lowercase hex, matching the checksums the repository
/// publishes per file.
pub fn md5_hex(path: &Path) -> Result<String, ReconError> {
    let mut file = fs::File::open(path)
        .map_err(|err| ReconError::Filesystem(format!("{}: {err}", path.display())))?;
    let mut hasher = Md5::new();
    let mut buffer = [0u8; 4096];
    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|err| ReconError::Filesystem(err.to_string()))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Cache-miss pre-filter: which manifest files are not already on disk?
///
/// Files whose published checksum matches one already in `dir` are skipped.
/// Entries without a checksum fall back to a file-name existence check.
pub fn files_needing_download<'a>(
    dir: &Path,
    files: &[&'a FileEntry],
) -> Result<Vec<&'a FileEntry>, ReconError> {
    let mut existing_sums = Vec::new();
    let mut existing_names = Vec::new();
    if dir.is_dir() {
        let entries =
            fs::read_dir(dir).map_err(|err| ReconError::Filesystem(err.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|err| ReconError::Filesystem(err.to_string()))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') || !entry.path().is_file() {
                continue;
            }
            existing_sums.push(md5_hex(&entry.path())?);
            existing_names.push(name);
        }
    }

    let needed: Vec<&FileEntry> = files
        .iter()
        .filter(|file| match &file.md5sum {
            Some(sum) => !existing_sums.iter().any(|existing| existing == sum),
            None => !existing_names.iter().any(|name| *name == file.file_name),
        })
        .copied()
        .collect();

    info!(
        "{} files found from the GDC, {} files found at {}, {} files needed to download",
        files.len(),
        existing_sums.len(),
        dir.display(),
        needed.len()
    );
    Ok(needed)
}
