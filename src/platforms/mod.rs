use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::domain::{ConstructId, Platform};
use crate::error::PulseError;

pub mod gomod;
pub mod maven;
pub mod npm;
pub mod nuget;
pub mod pypi;

pub use gomod::GoModClient;
pub use maven::MavenStatsClient;
pub use npm::NpmClient;
pub use nuget::NugetClient;
pub use pypi::PypiClient;

/// One distribution platform's view of a construct. Implementations are
/// stateless request/parse clients apart from the bounded lookup cache.
pub trait PlatformClient: Send + Sync {
    fn platform(&self) -> Platform;

    /// Total download count for the construct on this platform.
    fn download_count(&self, construct: &ConstructId) -> Result<u64, PulseError>;

    /// Date the construct first became available on this platform, where
    /// the platform exposes one.
    fn first_available(&self, _construct: &ConstructId) -> Result<Option<NaiveDate>, PulseError> {
        Ok(None)
    }
}

pub(crate) fn blocking_client(wrap: fn(String) -> PulseError) -> Result<Client, PulseError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!("construct-pulse/{}", env!("CARGO_PKG_VERSION")))
            .map_err(|err| wrap(err.to_string()))?,
    );
    Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(60))
        .build()
        .map_err(|err| wrap(err.to_string()))
}

/// Small in-process memo for repeated metadata lookups (first-release
/// dates). Insertions stop at capacity; entries live for one run only.
pub(crate) struct BoundedCache<K, V> {
    capacity: usize,
    entries: Mutex<HashMap<K, V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> BoundedCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }

    pub fn insert(&self, key: K, value: V) {
        if let Ok(mut entries) = self.entries.lock() {
            if entries.len() < self.capacity || entries.contains_key(&key) {
                entries.insert(key, value);
            }
        }
    }
}
