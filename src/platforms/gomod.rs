use regex::Regex;
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::warn;

use crate::domain::{ConstructId, Platform};
use crate::error::PulseError;
use crate::platforms::{PlatformClient, blocking_client};

/// Go has no central download counter. The closest signals are the
/// "Imported By" count on pkg.go.dev and the repository's clone traffic on
/// GitHub; this client adds the two.
pub struct GoModClient {
    client: Client,
    pkg_site_url: String,
    github_api_url: String,
    github_owner: String,
    github_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CloneTraffic {
    #[serde(default)]
    count: u64,
    #[serde(default)]
    uniques: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloneStats {
    pub total: u64,
    pub unique: u64,
}

impl GoModClient {
    pub fn new(github_owner: String, github_token: Option<String>) -> Result<Self, PulseError> {
        Ok(Self {
            client: blocking_client(PulseError::GoDevHttp)?,
            pkg_site_url: "https://pkg.go.dev".to_string(),
            github_api_url: "https://api.github.com".to_string(),
            github_owner,
            github_token,
        })
    }

    pub fn import_count(&self, construct: &ConstructId) -> Result<u64, PulseError> {
        let module = go_module_name(construct);
        let package = go_package_name(construct);
        let url = format!(
            "{}/github.com/{}/{module}/{package}/v2/jsii",
            self.pkg_site_url, self.github_owner
        );
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| PulseError::GoDevHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "pkg.go.dev request failed".to_string());
            return Err(PulseError::GoDevStatus { status, message });
        }
        let page = response
            .text()
            .map_err(|err| PulseError::GoDevHttp(err.to_string()))?;
        extract_imported_by(&page)
    }

    pub fn clone_stats(&self, construct: &ConstructId) -> Result<CloneStats, PulseError> {
        let Some(token) = self.github_token.as_deref() else {
            warn!("no GitHub token configured, skipping clone traffic");
            return Ok(CloneStats { total: 0, unique: 0 });
        };
        let repo = go_module_name(construct);
        let url = format!(
            "{}/repos/{}/{repo}/traffic/clones",
            self.github_api_url, self.github_owner
        );
        let response = self
            .client
            .get(url)
            .header("Authorization", format!("token {token}"))
            .header("Accept", "application/vnd.github.v3+json")
            .send()
            .map_err(|err| PulseError::GitHubHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "GitHub request failed".to_string());
            return Err(PulseError::GitHubStatus { status, message });
        }
        let traffic: CloneTraffic = response
            .json()
            .map_err(|err| PulseError::GitHubHttp(err.to_string()))?;
        Ok(CloneStats {
            total: traffic.count,
            unique: traffic.uniques,
        })
    }
}

impl PlatformClient for GoModClient {
    fn platform(&self) -> Platform {
        Platform::Go
    }

    /// Each signal degrades to zero independently so a missing pkg.go.dev
    /// page does not hide the clone traffic, and vice versa.
    fn download_count(&self, construct: &ConstructId) -> Result<u64, PulseError> {
        let imports = match self.import_count(construct) {
            Ok(count) => count,
            Err(err) => {
                warn!(%construct, error = %err, "import count unavailable, counting zero");
                0
            }
        };
        let clones = match self.clone_stats(construct) {
            Ok(stats) => stats.total,
            Err(err) => {
                warn!(%construct, error = %err, "clone traffic unavailable, counting zero");
                0
            }
        };
        Ok(imports + clones)
    }
}

/// Go bindings live in a sibling repository named `<construct>-go`.
pub fn go_module_name(construct: &ConstructId) -> String {
    format!("{construct}-go")
}

/// The Go package inside the module drops the hyphens and the module's
/// `go` suffix; the statemachine module keeps its NPM alias instead.
pub fn go_package_name(construct: &ConstructId) -> String {
    let module = go_module_name(construct);
    let base = match module.as_str() {
        "projen-statemachine-go" => "projen-statemachine-example",
        other => other,
    };
    let compact = base.replace('-', "");
    match compact.strip_suffix("go") {
        Some(stripped) => stripped.to_string(),
        None => compact,
    }
}

fn extract_imported_by(page: &str) -> Result<u64, PulseError> {
    let pattern = Regex::new(r#"aria-label="Imported By:\s*([\d,]+)""#)
        .map_err(|err| PulseError::PageExtraction(err.to_string()))?;
    let raw = pattern
        .captures(page)
        .and_then(|captures| captures.get(1))
        .map(|group| group.as_str())
        .ok_or_else(|| {
            PulseError::PageExtraction("no Imported By counter on pkg.go.dev page".to_string())
        })?;
    raw.replace(',', "")
        .parse()
        .map_err(|_| PulseError::PageExtraction(format!("unparseable import count: {raw}")))
}
