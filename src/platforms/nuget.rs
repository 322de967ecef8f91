use chrono::NaiveDate;
use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;

use crate::domain::{ConstructId, Platform};
use crate::error::PulseError;
use crate::platforms::{BoundedCache, PlatformClient, blocking_client};

/// The gallery serves the package page to browsers only; API-ish user
/// agents get bounced.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

pub struct NugetClient {
    client: Client,
    gallery_url: String,
    earliest_upload: BoundedCache<String, NaiveDate>,
}

impl NugetClient {
    pub fn new() -> Result<Self, PulseError> {
        Ok(Self {
            client: blocking_client(PulseError::NugetHttp)?,
            gallery_url: "https://www.nuget.org".to_string(),
            earliest_upload: BoundedCache::new(10),
        })
    }

    fn fetch_page(&self, url: String) -> Result<String, PulseError> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .map_err(|err| PulseError::NugetHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "NuGet request failed".to_string());
            return Err(PulseError::NugetStatus { status, message });
        }
        response
            .text()
            .map_err(|err| PulseError::NugetHttp(err.to_string()))
    }

    fn earliest_upload_date(&self, package: &str) -> Result<NaiveDate, PulseError> {
        if let Some(date) = self.earliest_upload.get(&package.to_string()) {
            return Ok(date);
        }
        // Version 0.0.0 never exists; the gallery still renders the About
        // sidebar with the package's earliest upload timestamp.
        let page = self.fetch_page(format!("{}/packages/{package}/0.0.0", self.gallery_url))?;
        let date = extract_earliest_upload(&page)?;
        self.earliest_upload.insert(package.to_string(), date);
        Ok(date)
    }
}

impl PlatformClient for NugetClient {
    fn platform(&self) -> Platform {
        Platform::Nuget
    }

    fn download_count(&self, construct: &ConstructId) -> Result<u64, PulseError> {
        let package = dotnet_package_name(construct);
        self.earliest_upload_date(&package)?;
        let page = self.fetch_page(format!("{}/packages/{package}/", self.gallery_url))?;
        let raw = extract_download_text(&page)?;
        parse_abbreviated_count(&raw)
    }

    fn first_available(&self, construct: &ConstructId) -> Result<Option<NaiveDate>, PulseError> {
        let package = dotnet_package_name(construct);
        self.earliest_upload_date(&package).map(Some)
    }
}

/// NuGet ids follow .NET conventions: hyphen-separated parts become
/// dot-separated capitalized segments, and the `cdk` marker is dropped
/// (`cdk-databrew-cicd` publishes as `Databrew.Cicd`).
pub fn dotnet_package_name(construct: &ConstructId) -> String {
    construct
        .as_str()
        .split('-')
        .filter(|part| *part != "cdk" && !part.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(".")
}

fn capitalize(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn extract_earliest_upload(page: &str) -> Result<NaiveDate, PulseError> {
    let pattern = Regex::new(r#"data-datetime="([^"]+)""#)
        .map_err(|err| PulseError::PageExtraction(err.to_string()))?;
    let raw = pattern
        .captures(page)
        .and_then(|captures| captures.get(1))
        .map(|group| group.as_str())
        .ok_or_else(|| {
            PulseError::PageExtraction("no upload timestamp on NuGet package page".to_string())
        })?;
    let date_part = raw.split('T').next().unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|_| PulseError::PageExtraction(format!("unparseable upload timestamp: {raw}")))
}

fn extract_download_text(page: &str) -> Result<String, PulseError> {
    let pattern = Regex::new(r#"class="download-info-content"[^>]*>\s*([^<]+?)\s*<"#)
        .map_err(|err| PulseError::PageExtraction(err.to_string()))?;
    pattern
        .captures(page)
        .and_then(|captures| captures.get(1))
        .map(|group| group.as_str().trim().to_string())
        .ok_or_else(|| {
            PulseError::PageExtraction("no download counter on NuGet package page".to_string())
        })
}

/// The gallery abbreviates counters ("132.2K", "1.2M"); small packages show
/// a plain integer.
pub fn parse_abbreviated_count(text: &str) -> Result<u64, PulseError> {
    let trimmed = text.trim();
    let (digits, multiplier) = if let Some(rest) = trimmed.strip_suffix('K') {
        (rest, 1_000.0)
    } else if let Some(rest) = trimmed.strip_suffix('M') {
        (rest, 1_000_000.0)
    } else {
        (trimmed, 1.0)
    };
    let value: f64 = digits
        .replace(',', "")
        .parse()
        .map_err(|_| PulseError::PageExtraction(format!("unparseable download count: {text}")))?;
    if value < 0.0 {
        return Err(PulseError::PageExtraction(format!(
            "negative download count: {text}"
        )));
    }
    Ok((value * multiplier) as u64)
}
