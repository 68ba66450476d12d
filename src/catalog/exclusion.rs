//! Excluded-prefix cache
//!
//! Module paths can be excluded from the catalog by prefix. The list is
//! read often and changes rarely, so it is held in memory and reloaded:
//! - lazily, when a lookup finds the snapshot older than the refresh interval
//! - periodically, by the poller task returned from [`ExcludedPrefixCache::spawn_poller`]
//! - on demand, via [`ExcludedPrefixCache::poll_now`]
//!
//! Prefix forms:
//! - `github.com/a/b` excludes `github.com/a/b` and every path below it
//! - `github.com/a/b@v1.2.3` excludes only that module version

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

#[cfg(test)]
use mockall::automock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::catalog::error::StorageError;

/// Shortest period the poller accepts
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Where excluded prefixes are loaded from
#[cfg_attr(test, automock)]
pub trait ExclusionSource: Send + Sync + 'static {
    /// Get every excluded prefix
    fn excluded_prefixes(&self) -> Result<Vec<String>, StorageError>;
}

struct Snapshot {
    prefixes: Vec<String>,
    fetched_at: Instant,
}

pub struct ExcludedPrefixCache<S: ExclusionSource> {
    source: Arc<S>,
    refresh_interval: Duration,
    snapshot: RwLock<Option<Snapshot>>,
}

impl<S: ExclusionSource> ExcludedPrefixCache<S> {
    /// Create an empty cache. Nothing is loaded until the first lookup or poll.
    pub fn new(source: Arc<S>, refresh_interval: Duration) -> Self {
        Self {
            source,
            refresh_interval,
            snapshot: RwLock::new(None),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Reload the prefixes from the source
    ///
    /// Returns the number of prefixes loaded. On failure the previous
    /// snapshot is kept.
    pub fn poll_now(&self) -> Result<usize, StorageError> {
        let prefixes = self.source.excluded_prefixes()?;
        let count = prefixes.len();

        let mut snapshot = self
            .snapshot
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        *snapshot = Some(Snapshot {
            prefixes,
            fetched_at: Instant::now(),
        });

        info!("Loaded {} excluded prefixes", count);
        Ok(count)
    }

    /// Check whether a path, optionally at a version, is excluded
    ///
    /// Reloads the prefixes first when the snapshot is missing or stale.
    pub fn is_excluded(&self, path: &str, version: Option<&str>) -> Result<bool, StorageError> {
        if self.is_stale()? {
            debug!("Excluded prefix snapshot is stale, reloading");
            self.poll_now()?;
        }

        let snapshot = self
            .snapshot
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;

        Ok(snapshot.as_ref().is_some_and(|s| {
            s.prefixes
                .iter()
                .any(|prefix| prefix_excludes(prefix, path, version))
        }))
    }

    fn is_stale(&self) -> Result<bool, StorageError> {
        let snapshot = self
            .snapshot
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;

        Ok(match snapshot.as_ref() {
            Some(s) => s.fetched_at.elapsed() >= self.refresh_interval,
            None => true,
        })
    }

    /// Start reloading the prefixes every refresh interval.
    ///
    /// The first poll happens immediately. Failures are logged and the
    /// previous snapshot stays in use. Abort the returned handle to stop.
    pub fn spawn_poller(self: &Arc<Self>) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        let period = cache.refresh_interval.max(MIN_POLL_INTERVAL);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if let Err(e) = cache.poll_now() {
                    error!("Failed to poll excluded prefixes: {}", e);
                }
            }
        })
    }
}

fn prefix_excludes(prefix: &str, path: &str, version: Option<&str>) -> bool {
    match prefix.split_once('@') {
        Some((prefix_path, prefix_version)) => {
            path == prefix_path && version == Some(prefix_version)
        }
        None => path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/')),
    }
}
