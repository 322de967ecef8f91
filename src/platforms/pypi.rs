use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::domain::{ConstructId, Platform};
use crate::error::PulseError;
use crate::platforms::{BoundedCache, PlatformClient, blocking_client};

pub struct PypiClient {
    client: Client,
    index_url: String,
    stats_url: String,
    first_release: BoundedCache<String, NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct ProjectDocument {
    releases: HashMap<String, Vec<ReleaseFile>>,
}

#[derive(Debug, Deserialize)]
struct ReleaseFile {
    upload_time: String,
}

#[derive(Debug, Deserialize)]
struct ProjectStats {
    total_downloads: u64,
}

impl PypiClient {
    pub fn new() -> Result<Self, PulseError> {
        Ok(Self {
            client: blocking_client(PulseError::PypiHttp)?,
            index_url: "https://pypi.org".to_string(),
            stats_url: "https://pepy.tech".to_string(),
            first_release: BoundedCache::new(10),
        })
    }

    fn first_release_date(&self, package: &str) -> Result<Option<NaiveDate>, PulseError> {
        if let Some(date) = self.first_release.get(&package.to_string()) {
            return Ok(Some(date));
        }
        let url = format!("{}/pypi/{package}/json", self.index_url);
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| PulseError::PypiHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "PyPI request failed".to_string());
            return Err(PulseError::PypiStatus { status, message });
        }
        let document: ProjectDocument = response
            .json()
            .map_err(|err| PulseError::PypiHttp(err.to_string()))?;
        let earliest = document
            .releases
            .values()
            .filter_map(|files| files.first())
            .filter_map(|file| parse_upload_time(&file.upload_time))
            .min();
        if let Some(date) = earliest {
            self.first_release.insert(package.to_string(), date);
        }
        Ok(earliest)
    }
}

impl PlatformClient for PypiClient {
    fn platform(&self) -> Platform {
        Platform::PyPi
    }

    fn download_count(&self, construct: &ConstructId) -> Result<u64, PulseError> {
        let package = pypi_package_name(construct);
        let url = format!("{}/api/v2/projects/{package}", self.stats_url);
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| PulseError::PypiHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "PyPI request failed".to_string());
            return Err(PulseError::PypiStatus { status, message });
        }
        let stats: ProjectStats = response
            .json()
            .map_err(|err| PulseError::PypiHttp(err.to_string()))?;
        Ok(stats.total_downloads)
    }

    fn first_available(&self, construct: &ConstructId) -> Result<Option<NaiveDate>, PulseError> {
        let package = pypi_package_name(construct);
        self.first_release_date(&package)
    }
}

/// The statemachine construct is published on PyPI under its author prefix.
pub fn pypi_package_name(construct: &ConstructId) -> String {
    match construct.as_str() {
        "projen-statemachine" => "scotthsieh-projen-statemachine".to_string(),
        other => other.to_string(),
    }
}

fn parse_upload_time(value: &str) -> Option<NaiveDate> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .map(|datetime| datetime.date())
        .ok()
}
