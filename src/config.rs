use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::{DataType, ProjectId};
use crate::error::ReconError;

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub projects: Vec<String>,
    #[serde(default)]
    pub data_types: Vec<String>,
    #[serde(default)]
    pub matrix_dir: Option<String>,
    #[serde(default)]
    pub work_dir: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub projects: Vec<ProjectId>,
    pub data_types: Vec<DataType>,
    pub matrix_dir: Option<Utf8PathBuf>,
    pub work_dir: Option<Utf8PathBuf>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, ReconError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("xena-recon.json"),
        };

        if path.is_none() && !config_path.exists() {
            return Err(ReconError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| ReconError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| ReconError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, ReconError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let projects = config
            .projects
            .iter()
            .map(|value| value.parse())
            .collect::<Result<Vec<ProjectId>, ReconError>>()?;

        let data_types = expand_data_types(&config.data_types)?;

        Ok(ResolvedConfig {
            schema_version,
            projects,
            data_types,
            matrix_dir: config.matrix_dir.map(Utf8PathBuf::from),
            work_dir: config.work_dir.map(Utf8PathBuf::from),
        })
    }
}

/// Parse data-type names, expanding the `STAR` shorthand to the four
/// expression flavors. Duplicates collapse, first occurrence wins.
pub fn expand_data_types(names: &[String]) -> Result<Vec<DataType>, ReconError> {
    let mut data_types = Vec::new();
    for name in names {
        if name == "STAR" {
            for star in DataType::STAR {
                if !data_types.contains(&star) {
                    data_types.push(star);
                }
            }
            continue;
        }
        let parsed: DataType = name.parse()?;
        if !data_types.contains(&parsed) {
            data_types.push(parsed);
        }
    }
    Ok(data_types)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn resolve_config_parses_projects_and_types() {
        let config = Config {
            schema_version: None,
            projects: vec!["TARGET-AML".to_string()],
            data_types: vec!["mirna".to_string(), "methylation450".to_string()],
            matrix_dir: Some("/data".to_string()),
            work_dir: None,
        };
        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.projects.len(), 1);
        assert_eq!(
            resolved.data_types,
            vec![DataType::Mirna, DataType::Methylation450]
        );
        assert_eq!(resolved.matrix_dir, Some(Utf8PathBuf::from("/data")));
    }

    #[test]
    fn star_shorthand_expands() {
        let expanded =
            expand_data_types(&["STAR".to_string(), "star_tpm".to_string()]).unwrap();
        assert_eq!(expanded.len(), 4);
        assert_eq!(expanded[0], DataType::StarCounts);
    }

    #[test]
    fn unknown_data_type_is_rejected() {
        let err = expand_data_types(&["star_rsem".to_string()]).unwrap_err();
        assert_matches!(err, ReconError::UnsupportedDataType(_));
    }
}
