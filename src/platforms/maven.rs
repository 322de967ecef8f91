use std::fs;

use camino::Utf8PathBuf;
use chrono::{Local, NaiveDate};
use tracing::{debug, info};

use crate::domain::{ConstructId, Month, Platform};
use crate::error::PulseError;
use crate::platforms::PlatformClient;
use crate::series::{IngestBatch, SeriesStore, parse_export_csv};

/// Maven Central has no queryable download API; Sonatype only hands out
/// periodic CSV exports. This client folds a fresh export into the durable
/// monthly series and answers from the accumulated history.
pub struct MavenStatsClient {
    store: SeriesStore,
    csv_dir: Utf8PathBuf,
}

impl MavenStatsClient {
    pub fn new(store: SeriesStore, csv_dir: Utf8PathBuf) -> Self {
        Self { store, csv_dir }
    }

    pub fn export_path(&self, construct: &ConstructId) -> Utf8PathBuf {
        self.csv_dir.join(format!("{construct}.csv"))
    }

    /// Merges the construct's CSV export into its series, if one is lying
    /// in the export directory. A rejected export leaves the persisted
    /// series untouched.
    pub fn ingest_pending_export(&self, construct: &ConstructId) -> Result<bool, PulseError> {
        let path = self.export_path(construct);
        if !path.as_std_path().exists() {
            debug!(%construct, "no pending statistics export");
            return Ok(false);
        }
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| PulseError::Storage(format!("read export {path}: {err}")))?;
        let rows = parse_export_csv(&content)?;
        let batch = IngestBatch::from_rows(&rows, export_start_month(Local::now().date_naive()));
        let series = self.store.ingest(construct, &batch)?;
        info!(
            %construct,
            months = series.len(),
            "merged statistics export into accumulated series"
        );
        Ok(true)
    }
}

impl PlatformClient for MavenStatsClient {
    fn platform(&self) -> Platform {
        Platform::Maven
    }

    fn download_count(&self, construct: &ConstructId) -> Result<u64, PulseError> {
        self.ingest_pending_export(construct)?;
        match self.store.aggregate(construct)? {
            Some(aggregate) => Ok(aggregate.total_downloads),
            None => {
                info!(%construct, "no accumulated Maven series yet, counting zero");
                Ok(0)
            }
        }
    }

    fn first_available(&self, construct: &ConstructId) -> Result<Option<NaiveDate>, PulseError> {
        let Some(aggregate) = self.store.aggregate(construct)? else {
            return Ok(None);
        };
        let month = aggregate.earliest_month;
        Ok(NaiveDate::from_ymd_opt(month.year(), month.month(), 1))
    }
}

/// Exports cover the trailing twelve months; row zero is the month one year
/// before the export date.
pub fn export_start_month(export_date: NaiveDate) -> Month {
    Month::from_date(export_date).one_year_earlier()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_month_is_one_year_back() {
        let date = NaiveDate::from_ymd_opt(2024, 7, 19).unwrap();
        assert_eq!(export_start_month(date).to_string(), "2023-07");

        let leap = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(export_start_month(leap).to_string(), "2023-02");
    }
}
