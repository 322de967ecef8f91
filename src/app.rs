use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{ConstructId, Platform};
use crate::platforms::PlatformClient;

/// Per-platform download counts for one construct, in fixed platform order.
#[derive(Debug, Clone, Serialize)]
pub struct ConstructTotals {
    pub construct: ConstructId,
    pub counts: Vec<PlatformCount>,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlatformCount {
    #[serde(serialize_with = "serialize_platform")]
    pub platform: Platform,
    pub downloads: u64,
}

fn serialize_platform<S: serde::Serializer>(
    platform: &Platform,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(platform.label())
}

impl ConstructTotals {
    pub fn downloads_for(&self, platform: Platform) -> u64 {
        self.counts
            .iter()
            .find(|count| count.platform == platform)
            .map(|count| count.downloads)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub constructs: Vec<ConstructTotals>,
    pub grand_total: u64,
    #[serde(skip)]
    pub elapsed: Duration,
}

/// Orchestrates the platform clients for one run. A failing platform is
/// logged and contributes zero so one bad source never blocks the rest of
/// the run.
pub struct App {
    clients: Vec<Box<dyn PlatformClient>>,
}

impl App {
    pub fn new(clients: Vec<Box<dyn PlatformClient>>) -> Self {
        Self { clients }
    }

    pub fn collect_construct(&self, construct: &ConstructId) -> (ConstructTotals, Duration) {
        let started = Instant::now();
        info!(%construct, "collecting download statistics");

        let counts: Vec<PlatformCount> = self
            .clients
            .iter()
            .map(|client| {
                let platform = client.platform();
                let downloads = match client.download_count(construct) {
                    Ok(count) => count,
                    Err(err) => {
                        warn!(%construct, %platform, error = %err, "platform lookup failed, counting zero");
                        0
                    }
                };
                PlatformCount {
                    platform,
                    downloads,
                }
            })
            .collect();

        let total = counts.iter().map(|count| count.downloads).sum();
        let elapsed = started.elapsed();
        info!(
            %construct,
            total,
            elapsed_ms = elapsed.as_millis() as u64,
            "collected download statistics"
        );
        (
            ConstructTotals {
                construct: construct.clone(),
                counts,
                total,
            },
            elapsed,
        )
    }

    /// Sequential multi-construct pass; per-construct timing is summed
    /// into the report's elapsed time.
    pub fn collect_all(&self, constructs: &[ConstructId]) -> RunReport {
        let mut totals = Vec::with_capacity(constructs.len());
        let mut elapsed = Duration::ZERO;
        for construct in constructs {
            let (construct_totals, construct_elapsed) = self.collect_construct(construct);
            totals.push(construct_totals);
            elapsed += construct_elapsed;
        }
        let grand_total = totals.iter().map(|totals| totals.total).sum();
        RunReport {
            constructs: totals,
            grand_total,
            elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::PulseError;

    use super::*;

    struct FixedClient {
        platform: Platform,
        downloads: u64,
    }

    impl PlatformClient for FixedClient {
        fn platform(&self) -> Platform {
            self.platform
        }

        fn download_count(&self, _construct: &ConstructId) -> Result<u64, PulseError> {
            Ok(self.downloads)
        }
    }

    struct FailingClient {
        platform: Platform,
    }

    impl PlatformClient for FailingClient {
        fn platform(&self) -> Platform {
            self.platform
        }

        fn download_count(&self, _construct: &ConstructId) -> Result<u64, PulseError> {
            Err(PulseError::NpmHttp("connection refused".to_string()))
        }
    }

    fn construct(id: &str) -> ConstructId {
        id.parse().unwrap()
    }

    #[test]
    fn totals_sum_across_platforms() {
        let app = App::new(vec![
            Box::new(FixedClient {
                platform: Platform::Npm,
                downloads: 100,
            }),
            Box::new(FixedClient {
                platform: Platform::PyPi,
                downloads: 40,
            }),
        ]);
        let (totals, _) = app.collect_construct(&construct("cdk-databrew-cicd"));
        assert_eq!(totals.total, 140);
        assert_eq!(totals.downloads_for(Platform::Npm), 100);
        assert_eq!(totals.downloads_for(Platform::PyPi), 40);
        assert_eq!(totals.downloads_for(Platform::Go), 0);
    }

    #[test]
    fn failing_platform_contributes_zero() {
        let app = App::new(vec![
            Box::new(FailingClient {
                platform: Platform::Npm,
            }),
            Box::new(FixedClient {
                platform: Platform::Maven,
                downloads: 7,
            }),
        ]);
        let (totals, _) = app.collect_construct(&construct("cdk-databrew-cicd"));
        assert_eq!(totals.total, 7);
        assert_eq!(totals.downloads_for(Platform::Npm), 0);
    }

    #[test]
    fn run_report_accumulates_grand_total() {
        let app = App::new(vec![Box::new(FixedClient {
            platform: Platform::Npm,
            downloads: 5,
        })]);
        let constructs = vec![construct("cdk-databrew-cicd"), construct("cdk-lambda-subminute")];
        let report = app.collect_all(&constructs);
        assert_eq!(report.constructs.len(), 2);
        assert_eq!(report.grand_total, 10);
    }
}
