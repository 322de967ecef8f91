use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::ConstructId;
use crate::error::PulseError;

pub const DEFAULT_GITHUB_OWNER: &str = "HsiehShuJeng";
pub const DEFAULT_STATS_DIR: &str = "maven-stats-source";

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub constructs: Vec<ConstructEntry>,
    #[serde(default)]
    pub series_root: Option<String>,
    #[serde(default)]
    pub csv_dir: Option<String>,
    #[serde(default)]
    pub github_owner: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ConstructEntry {
    Shorthand(String),
    Detailed(ConstructEntryObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ConstructEntryObject {
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub constructs: Vec<ConstructId>,
    pub series_root: Utf8PathBuf,
    pub csv_dir: Utf8PathBuf,
    pub github_owner: String,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, PulseError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("construct-pulse.json"),
        };

        if path.is_none() && !config_path.exists() {
            return Err(PulseError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| PulseError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| PulseError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, PulseError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let constructs = config
            .constructs
            .into_iter()
            .map(|entry| match entry {
                ConstructEntry::Shorthand(value) => value.parse(),
                ConstructEntry::Detailed(obj) => obj.id.parse(),
            })
            .collect::<Result<Vec<_>, PulseError>>()?;

        Ok(ResolvedConfig {
            schema_version,
            constructs,
            series_root: Utf8PathBuf::from(
                config.series_root.unwrap_or_else(|| DEFAULT_STATS_DIR.to_string()),
            ),
            csv_dir: Utf8PathBuf::from(
                config.csv_dir.unwrap_or_else(|| DEFAULT_STATS_DIR.to_string()),
            ),
            github_owner: config
                .github_owner
                .unwrap_or_else(|| DEFAULT_GITHUB_OWNER.to_string()),
        })
    }

    /// The construct set tracked by the original deployment, used when no
    /// config file is present.
    pub fn default_run() -> Result<ResolvedConfig, PulseError> {
        Self::resolve_config(Config {
            schema_version: None,
            constructs: [
                "cdk-comprehend-s3olap",
                "cdk-lambda-subminute",
                "cdk-emrserverless-with-delta-lake",
                "cdk-databrew-cicd",
                "projen-statemachine",
            ]
            .iter()
            .map(|id| ConstructEntry::Shorthand(id.to_string()))
            .collect(),
            series_root: None,
            csv_dir: None,
            github_owner: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn resolve_shorthand_entries() {
        let config = Config {
            schema_version: None,
            constructs: vec![
                ConstructEntry::Shorthand("cdk-databrew-cicd".to_string()),
                ConstructEntry::Detailed(ConstructEntryObject {
                    id: "projen-statemachine".to_string(),
                }),
            ],
            series_root: None,
            csv_dir: None,
            github_owner: None,
        };

        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.constructs.len(), 2);
        assert_eq!(resolved.series_root, Utf8PathBuf::from(DEFAULT_STATS_DIR));
        assert_eq!(resolved.github_owner, DEFAULT_GITHUB_OWNER);
    }

    #[test]
    fn resolve_rejects_bad_construct_id() {
        let config = Config {
            schema_version: None,
            constructs: vec![ConstructEntry::Shorthand("Not Valid!".to_string())],
            series_root: None,
            csv_dir: None,
            github_owner: None,
        };
        let err = ConfigLoader::resolve_config(config).unwrap_err();
        assert_matches!(err, PulseError::InvalidConstructId(_));
    }

    #[test]
    fn default_run_tracks_five_constructs() {
        let resolved = ConfigLoader::default_run().unwrap();
        assert_eq!(resolved.constructs.len(), 5);
    }
}
