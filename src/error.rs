use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PulseError {
    #[error("invalid construct id: {0}")]
    InvalidConstructId(String),

    #[error("invalid month (expected YYYY-MM): {0}")]
    InvalidMonth(String),

    #[error("malformed statistics export: {0}")]
    MalformedInput(String),

    #[error("series storage error: {0}")]
    Storage(String),

    #[error("missing config file construct-pulse.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("NPM request failed: {0}")]
    NpmHttp(String),

    #[error("NPM returned status {status}: {message}")]
    NpmStatus { status: u16, message: String },

    #[error("PyPI request failed: {0}")]
    PypiHttp(String),

    #[error("PyPI returned status {status}: {message}")]
    PypiStatus { status: u16, message: String },

    #[error("NuGet request failed: {0}")]
    NugetHttp(String),

    #[error("NuGet returned status {status}: {message}")]
    NugetStatus { status: u16, message: String },

    #[error("pkg.go.dev request failed: {0}")]
    GoDevHttp(String),

    #[error("pkg.go.dev returned status {status}: {message}")]
    GoDevStatus { status: u16, message: String },

    #[error("GitHub request failed: {0}")]
    GitHubHttp(String),

    #[error("GitHub returned status {status}: {message}")]
    GitHubStatus { status: u16, message: String },

    #[error("{0}")]
    PageExtraction(String),
}
