pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod platforms;
pub mod report;
pub mod series;
