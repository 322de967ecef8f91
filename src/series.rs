use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};

use camino::{Utf8Path, Utf8PathBuf};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::domain::{ConstructId, Month};
use crate::error::PulseError;

/// One row of the accumulated series: download count for one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthlyRecord {
    pub month: Month,
    pub downloads: u64,
}

/// The accumulated download history of one construct, keyed by month.
/// Month uniqueness and ordering fall out of the map key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstructSeries {
    records: BTreeMap<Month, u64>,
}

impl ConstructSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, month: Month) -> Option<u64> {
        self.records.get(&month).copied()
    }

    pub fn records(&self) -> impl Iterator<Item = MonthlyRecord> + '_ {
        self.records.iter().map(|(&month, &downloads)| MonthlyRecord { month, downloads })
    }

    /// Merges a fresh export into the series. Batch values win for every
    /// month the batch covers; months outside the batch are untouched.
    /// Exports are full re-exports of a trailing window, so this makes
    /// re-ingesting the same export a no-op.
    pub fn merge_batch(&mut self, batch: &IngestBatch) {
        for record in batch.records() {
            self.records.insert(record.month, record.downloads);
        }
    }

    pub fn aggregate(&self) -> Option<SeriesAggregate> {
        let (&earliest_month, _) = self.records.iter().next()?;
        let total_downloads = self.records.values().sum();
        Some(SeriesAggregate {
            total_downloads,
            earliest_month,
        })
    }
}

impl FromIterator<MonthlyRecord> for ConstructSeries {
    fn from_iter<I: IntoIterator<Item = MonthlyRecord>>(iter: I) -> Self {
        Self {
            records: iter
                .into_iter()
                .map(|record| (record.month, record.downloads))
                .collect(),
        }
    }
}

/// A transient batch built from one CSV export, ready to merge.
#[derive(Debug, Clone)]
pub struct IngestBatch {
    records: Vec<MonthlyRecord>,
}

impl IngestBatch {
    /// Row `i` of the export maps to `start_month + i` months.
    pub fn from_rows(rows: &[u64], start_month: Month) -> Self {
        let records = rows
            .iter()
            .enumerate()
            .map(|(index, &downloads)| MonthlyRecord {
                month: start_month.plus_months(index as u32),
                downloads,
            })
            .collect();
        Self { records }
    }

    pub fn records(&self) -> &[MonthlyRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesAggregate {
    pub total_downloads: u64,
    pub earliest_month: Month,
}

/// Parses a headerless statistics export: one non-negative integer per row.
/// Any bad row rejects the whole export so a partial merge never happens.
pub fn parse_export_csv(text: &str) -> Result<Vec<u64>, PulseError> {
    let mut rows = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let value: u64 = trimmed.parse().map_err(|_| {
            PulseError::MalformedInput(format!("row {index}: expected a non-negative integer, got {trimmed:?}"))
        })?;
        rows.push(value);
    }
    Ok(rows)
}

/// Durable per-construct store of monthly download counts. One artifact per
/// construct: gzip-compressed `downloads,month` lines under
/// `<root>/accumulation/`.
#[derive(Debug, Clone)]
pub struct SeriesStore {
    root: Utf8PathBuf,
}

impl SeriesStore {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn artifact_path(&self, construct: &ConstructId) -> Utf8PathBuf {
        self.root
            .join("accumulation")
            .join(format!("{construct}.csv.gz"))
    }

    /// Loads the persisted series, or `None` when the construct has never
    /// been tracked. A never-tracked construct is the expected initial
    /// state, not an error.
    pub fn load_existing(
        &self,
        construct: &ConstructId,
    ) -> Result<Option<ConstructSeries>, PulseError> {
        let path = self.artifact_path(construct);
        if !path.as_std_path().exists() {
            return Ok(None);
        }
        let file = fs::File::open(path.as_std_path())
            .map_err(|err| PulseError::Storage(format!("open {path}: {err}")))?;
        let mut decoder = GzDecoder::new(file);
        let mut content = String::new();
        decoder
            .read_to_string(&mut content)
            .map_err(|err| PulseError::Storage(format!("decompress {path}: {err}")))?;
        let series = decode_series(&content)
            .map_err(|err| PulseError::Storage(format!("corrupt artifact {path}: {err}")))?;
        Ok(Some(series))
    }

    /// Writes the full series back as one artifact. The write goes to a
    /// temp file in the destination directory and is renamed over the old
    /// artifact, so a concurrent reader never sees a partial write.
    pub fn persist(
        &self,
        construct: &ConstructId,
        series: &ConstructSeries,
    ) -> Result<(), PulseError> {
        let path = self.artifact_path(construct);
        let parent = path
            .parent()
            .ok_or_else(|| PulseError::Storage("invalid artifact path".to_string()))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| PulseError::Storage(err.to_string()))?;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(encode_series(series).as_bytes())
            .map_err(|err| PulseError::Storage(err.to_string()))?;
        let compressed = encoder
            .finish()
            .map_err(|err| PulseError::Storage(err.to_string()))?;

        let temp = tempfile::Builder::new()
            .prefix("construct-pulse")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| PulseError::Storage(err.to_string()))?;
        fs::write(temp.path(), &compressed).map_err(|err| PulseError::Storage(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| PulseError::Storage(err.to_string()))?;
        Ok(())
    }

    /// Load, merge, persist as one step. The previous artifact survives
    /// untouched when the batch is rejected.
    pub fn ingest(
        &self,
        construct: &ConstructId,
        batch: &IngestBatch,
    ) -> Result<ConstructSeries, PulseError> {
        let mut series = self.load_existing(construct)?.unwrap_or_default();
        series.merge_batch(batch);
        self.persist(construct, &series)?;
        Ok(series)
    }

    /// Sum plus earliest month over the whole accumulated history.
    /// `Ok(None)` when no artifact exists or the series is empty; callers
    /// treat that as zero downloads.
    pub fn aggregate(&self, construct: &ConstructId) -> Result<Option<SeriesAggregate>, PulseError> {
        let Some(series) = self.load_existing(construct)? else {
            return Ok(None);
        };
        Ok(series.aggregate())
    }
}

fn encode_series(series: &ConstructSeries) -> String {
    let mut out = String::new();
    for record in series.records() {
        out.push_str(&format!("{},{}\n", record.downloads, record.month));
    }
    out
}

fn decode_series(content: &str) -> Result<ConstructSeries, PulseError> {
    let mut records = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let (downloads, month) = trimmed
            .split_once(',')
            .ok_or_else(|| PulseError::Storage(format!("line {index}: missing column separator")))?;
        let downloads: u64 = downloads
            .trim()
            .parse()
            .map_err(|_| PulseError::Storage(format!("line {index}: bad download count")))?;
        let month: Month = month
            .parse()
            .map_err(|_| PulseError::Storage(format!("line {index}: bad month label")))?;
        records.push(MonthlyRecord { month, downloads });
    }
    Ok(records.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn month(label: &str) -> Month {
        label.parse().unwrap()
    }

    fn series_of(pairs: &[(&str, u64)]) -> ConstructSeries {
        pairs
            .iter()
            .map(|&(label, downloads)| MonthlyRecord {
                month: month(label),
                downloads,
            })
            .collect()
    }

    #[test]
    fn batch_maps_rows_to_consecutive_months() {
        let batch = IngestBatch::from_rows(&[5, 10, 0], month("2023-08"));
        let records = batch.records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].month, month("2023-08"));
        assert_eq!(records[0].downloads, 5);
        assert_eq!(records[1].month, month("2023-09"));
        assert_eq!(records[1].downloads, 10);
        assert_eq!(records[2].month, month("2023-10"));
        assert_eq!(records[2].downloads, 0);
    }

    #[test]
    fn merge_overlap_takes_batch_value() {
        let mut series = series_of(&[("2024-01", 100)]);
        let batch = IngestBatch::from_rows(&[150], month("2024-01"));
        series.merge_batch(&batch);
        assert_eq!(series.len(), 1);
        assert_eq!(series.get(month("2024-01")), Some(150));
    }

    #[test]
    fn merge_preserves_months_outside_batch() {
        let mut series = series_of(&[
            ("2024-01", 1),
            ("2024-02", 2),
            ("2024-03", 3),
            ("2024-04", 4),
            ("2024-05", 5),
        ]);
        let batch = IngestBatch::from_rows(&[6, 7, 8, 9, 10, 11, 12], month("2024-06"));
        series.merge_batch(&batch);
        assert_eq!(series.len(), 12);
        for (index, label) in ["2024-01", "2024-02", "2024-03", "2024-04", "2024-05"]
            .iter()
            .enumerate()
        {
            assert_eq!(series.get(month(label)), Some(index as u64 + 1));
        }
        assert_eq!(series.get(month("2024-12")), Some(12));
    }

    #[test]
    fn merge_is_idempotent() {
        let base = series_of(&[("2023-11", 40), ("2023-12", 50)]);
        let batch = IngestBatch::from_rows(&[55, 60], month("2023-12"));

        let mut once = base.clone();
        once.merge_batch(&batch);
        let mut twice = once.clone();
        twice.merge_batch(&batch);

        assert_eq!(once, twice);
        assert_eq!(once.get(month("2023-11")), Some(40));
        assert_eq!(once.get(month("2023-12")), Some(55));
        assert_eq!(once.get(month("2024-01")), Some(60));
    }

    #[test]
    fn aggregate_sums_and_finds_earliest() {
        let series = series_of(&[("2023-02", 20), ("2023-01", 10), ("2023-03", 5)]);
        let aggregate = series.aggregate().unwrap();
        assert_eq!(aggregate.total_downloads, 35);
        assert_eq!(aggregate.earliest_month, month("2023-01"));
    }

    #[test]
    fn aggregate_of_empty_series_is_none() {
        assert_eq!(ConstructSeries::new().aggregate(), None);
    }

    #[test]
    fn parse_export_rejects_negative_row() {
        let err = parse_export_csv("12\n-3\n7\n").unwrap_err();
        assert_matches!(err, PulseError::MalformedInput(_));
    }

    #[test]
    fn parse_export_rejects_non_numeric_row() {
        let err = parse_export_csv("12\nabc\n").unwrap_err();
        assert_matches!(err, PulseError::MalformedInput(_));
    }

    #[test]
    fn parse_export_accepts_blank_lines() {
        let rows = parse_export_csv("1\n\n2\n3\n\n").unwrap();
        assert_eq!(rows, vec![1, 2, 3]);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert_matches!(decode_series("not-a-row"), Err(PulseError::Storage(_)));
        assert_matches!(decode_series("x,2024-01"), Err(PulseError::Storage(_)));
        assert_matches!(decode_series("5,month"), Err(PulseError::Storage(_)));
    }

    #[test]
    fn encode_decode_round_trip() {
        let series = series_of(&[("2023-01", 10), ("2023-02", 0), ("2024-12", 999)]);
        let decoded = decode_series(&encode_series(&series)).unwrap();
        assert_eq!(decoded, series);
    }
}
