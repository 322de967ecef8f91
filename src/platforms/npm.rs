use std::collections::HashMap;

use chrono::{Local, NaiveDate};
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::warn;

use crate::domain::{ConstructId, Platform};
use crate::error::PulseError;
use crate::platforms::{BoundedCache, PlatformClient, blocking_client};

/// Date assumed when the registry will not tell us when a package first
/// appeared; wide enough to cover any real publication history.
const FALLBACK_START_DATE: &str = "2000-01-01";

pub struct NpmClient {
    client: Client,
    registry_url: String,
    downloads_url: String,
    first_published: BoundedCache<String, NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct RegistryDocument {
    time: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct DownloadsRange {
    downloads: Vec<DailyDownloads>,
}

#[derive(Debug, Deserialize)]
struct DailyDownloads {
    downloads: u64,
}

impl NpmClient {
    pub fn new() -> Result<Self, PulseError> {
        Ok(Self {
            client: blocking_client(PulseError::NpmHttp)?,
            registry_url: "https://registry.npmjs.org".to_string(),
            downloads_url: "https://api.npmjs.org".to_string(),
            first_published: BoundedCache::new(10),
        })
    }

    fn first_publication_date(&self, package: &str) -> Result<NaiveDate, PulseError> {
        if let Some(date) = self.first_published.get(&package.to_string()) {
            return Ok(date);
        }
        let url = format!("{}/{package}", self.registry_url);
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| PulseError::NpmHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "NPM request failed".to_string());
            return Err(PulseError::NpmStatus { status, message });
        }
        let document: RegistryDocument = response
            .json()
            .map_err(|err| PulseError::NpmHttp(err.to_string()))?;
        let created = document
            .time
            .get("created")
            .ok_or_else(|| PulseError::NpmHttp("registry document has no created time".to_string()))?;
        let date = parse_registry_date(created)?;
        self.first_published.insert(package.to_string(), date);
        Ok(date)
    }
}

impl PlatformClient for NpmClient {
    fn platform(&self) -> Platform {
        Platform::Npm
    }

    fn download_count(&self, construct: &ConstructId) -> Result<u64, PulseError> {
        let package = npm_package_name(construct);
        let start = match self.first_publication_date(&package) {
            Ok(date) => date,
            Err(err) => {
                warn!(%package, error = %err, "falling back to default start date");
                parse_registry_date(FALLBACK_START_DATE)?
            }
        };
        let end = Local::now().date_naive();
        let url = format!(
            "{}/downloads/range/{}:{}/{package}",
            self.downloads_url,
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        );
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| PulseError::NpmHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "NPM request failed".to_string());
            return Err(PulseError::NpmStatus { status, message });
        }
        let range: DownloadsRange = response
            .json()
            .map_err(|err| PulseError::NpmHttp(err.to_string()))?;
        Ok(range.downloads.iter().map(|day| day.downloads).sum())
    }

    fn first_available(&self, construct: &ConstructId) -> Result<Option<NaiveDate>, PulseError> {
        let package = npm_package_name(construct);
        self.first_publication_date(&package).map(Some)
    }
}

/// The statemachine construct publishes to NPM under a different name than
/// its construct id.
pub fn npm_package_name(construct: &ConstructId) -> String {
    match construct.as_str() {
        "projen-statemachine" => "projen-statemachine-example".to_string(),
        other => other.to_string(),
    }
}

fn parse_registry_date(value: &str) -> Result<NaiveDate, PulseError> {
    let date_part = value.split('T').next().unwrap_or(value);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|_| PulseError::NpmHttp(format!("unparseable registry date: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_name_alias() {
        let plain: ConstructId = "cdk-databrew-cicd".parse().unwrap();
        assert_eq!(npm_package_name(&plain), "cdk-databrew-cicd");

        let aliased: ConstructId = "projen-statemachine".parse().unwrap();
        assert_eq!(npm_package_name(&aliased), "projen-statemachine-example");
    }

    #[test]
    fn registry_date_strips_time_component() {
        let date = parse_registry_date("2021-04-27T03:30:19.529Z").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2021, 4, 27).unwrap());
    }

    #[test]
    fn registry_date_rejects_garbage() {
        assert!(parse_registry_date("not-a-date").is_err());
    }
}
