use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use crate::error::ReconError;

/// One remote file associated with a sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub file_id: String,
    pub file_name: String,
    pub md5sum: Option<String>,
}

/// Association of sample submitter ids with their raw files, built from
/// files-endpoint hits. Keys are sample ids, or `SAMPLE.n` replicate keys for
/// modalities where each (file, tumor aliquot) pair is its own unit.
#[derive(Debug, Clone, Default)]
pub struct SampleManifest {
    entries: IndexMap<String, Vec<FileEntry>>,
}

impl SampleManifest {
    /// Group files under plain sample keys; a sample seen in several hits
    /// accumulates all of its files.
    pub fn from_hits(hits: &[JsonValue], tumor_only: bool) -> Result<Self, ReconError> {
        let mut entries: IndexMap<String, Vec<FileEntry>> = IndexMap::new();
        for hit in hits {
            let file = file_entry(hit)?;
            for sample in hit_samples(hit) {
                if tumor_only && sample.tissue_type.as_deref() != Some("Tumor") {
                    continue;
                }
                entries.entry(sample.submitter_id).or_default().push(file.clone());
            }
        }
        Ok(Self { entries })
    }

    /// One manifest key per (sample, hit) occurrence: `SAMPLE.1`, `SAMPLE.2`,
    /// each holding a single file. Used where replicate aliquots must stay
    /// separate rows instead of being averaged.
    pub fn from_hits_replicated(hits: &[JsonValue], tumor_only: bool) -> Result<Self, ReconError> {
        let mut entries: IndexMap<String, Vec<FileEntry>> = IndexMap::new();
        let mut seen: IndexMap<String, usize> = IndexMap::new();
        for hit in hits {
            let file = file_entry(hit)?;
            for sample in hit_samples(hit) {
                if tumor_only && sample.tissue_type.as_deref() != Some("Tumor") {
                    continue;
                }
                let count = seen.entry(sample.submitter_id.clone()).or_insert(0);
                *count += 1;
                entries.insert(
                    format!("{}.{count}", sample.submitter_id),
                    vec![file.clone()],
                );
            }
        }
        Ok(Self { entries })
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &[FileEntry])> {
        self.entries.iter().map(|(key, files)| (key, files.as_slice()))
    }

    pub fn files_for(&self, key: &str) -> &[FileEntry] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Distinct sample submitter ids, replicate suffixes stripped.
    pub fn sample_set(&self) -> BTreeSet<String> {
        self.entries
            .keys()
            .map(|key| base_sample_name(key).to_string())
            .collect()
    }

    /// Every file once, in first-seen order.
    pub fn all_files(&self) -> Vec<&FileEntry> {
        let mut seen = BTreeSet::new();
        let mut files = Vec::new();
        for entry in self.entries.values().flatten() {
            if seen.insert(entry.file_id.as_str()) {
                files.push(entry);
            }
        }
        files
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Strip the replicate suffix from a manifest key: `S1.2` names sample `S1`.
pub fn base_sample_name(key: &str) -> &str {
    match key.rsplit_once('.') {
        Some((base, suffix)) if suffix.chars().all(|ch| ch.is_ascii_digit()) => base,
        _ => key,
    }
}

struct HitSample {
    submitter_id: String,
    tissue_type: Option<String>,
}

fn file_entry(hit: &JsonValue) -> Result<FileEntry, ReconError> {
    let file_id = hit
        .get("file_id")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| ReconError::MalformedRecord("file hit missing file_id".to_string()))?;
    let file_name = hit
        .get("file_name")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| ReconError::MalformedRecord("file hit missing file_name".to_string()))?;
    Ok(FileEntry {
        file_id: file_id.to_string(),
        file_name: file_name.to_string(),
        md5sum: hit
            .get("md5sum")
            .and_then(JsonValue::as_str)
            .map(str::to_string),
    })
}

fn hit_samples(hit: &JsonValue) -> Vec<HitSample> {
    // The files endpoint nests samples under the first (only) owning case.
    let samples = hit
        .get("cases")
        .and_then(|cases| cases.get(0))
        .and_then(|case| case.get("samples"))
        .and_then(JsonValue::as_array);
    let Some(samples) = samples else {
        return Vec::new();
    };
    samples
        .iter()
        .filter_map(|sample| {
            let submitter_id = sample.get("submitter_id").and_then(JsonValue::as_str)?;
            Some(HitSample {
                submitter_id: submitter_id.to_string(),
                tissue_type: sample
                    .get("tissue_type")
                    .and_then(JsonValue::as_str)
                    .map(str::to_string),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(file_id: &str, samples: &[(&str, &str)]) -> JsonValue {
        serde_json::json!({
            "file_id": file_id,
            "file_name": format!("{file_id}.tsv"),
            "md5sum": format!("md5-{file_id}"),
            "cases": [{
                "samples": samples.iter().map(|(id, tissue)| {
                    serde_json::json!({"submitter_id": id, "tissue_type": tissue})
                }).collect::<Vec<_>>()
            }]
        })
    }

    #[test]
    fn files_accumulate_under_their_sample() {
        let hits = vec![
            hit("f1", &[("S1", "Tumor")]),
            hit("f2", &[("S1", "Tumor")]),
            hit("f3", &[("S2", "Normal")]),
        ];
        let manifest = SampleManifest::from_hits(&hits, false).unwrap();
        assert_eq!(manifest.files_for("S1").len(), 2);
        assert_eq!(manifest.files_for("S2").len(), 1);
        assert_eq!(manifest.sample_set().len(), 2);
    }

    #[test]
    fn tumor_only_drops_normal_tissue() {
        let hits = vec![hit("f1", &[("S1", "Tumor"), ("S2", "Normal")])];
        let manifest = SampleManifest::from_hits(&hits, true).unwrap();
        assert_eq!(manifest.files_for("S1").len(), 1);
        assert!(manifest.files_for("S2").is_empty());
    }

    #[test]
    fn replicated_keys_count_occurrences() {
        let hits = vec![hit("f1", &[("S1", "Tumor")]), hit("f2", &[("S1", "Tumor")])];
        let manifest = SampleManifest::from_hits_replicated(&hits, true).unwrap();
        let keys: Vec<&String> = manifest.keys().collect();
        assert_eq!(keys, vec!["S1.1", "S1.2"]);
        assert_eq!(manifest.sample_set().into_iter().collect::<Vec<_>>(), vec!["S1"]);
    }

    #[test]
    fn all_files_dedup_by_id() {
        let hits = vec![hit("f1", &[("S1", "Tumor"), ("S2", "Tumor")])];
        let manifest = SampleManifest::from_hits(&hits, false).unwrap();
        assert_eq!(manifest.all_files().len(), 1);
    }

    #[test]
    fn base_name_strips_only_numeric_suffix() {
        assert_eq!(base_sample_name("S1.2"), "S1");
        assert_eq!(base_sample_name("S1"), "S1");
        assert_eq!(base_sample_name("S1.rep"), "S1.rep");
    }
}
