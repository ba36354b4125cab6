use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use utoipa::ToSchema;

use super::error::{FetchError, StoreError};
use super::fetcher::TleFetcher;
use super::names::NameResolver;
use super::provider::ElementSetProvider;
use super::store::TleStore;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(2 * 60 * 60);

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("refresh already in progress")]
    Busy,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RefreshReport {
    /// Catalog IDs present in the store after the refresh
    pub fetched_ids: Vec<u32>,
    /// Caller-supplied IDs that are not part of the configured list
    pub added_ids: Vec<u32>,
}

/// Fetch-then-reload, serialized so only one provider session is ever active.
pub struct RefreshService<P> {
    fetcher: TleFetcher<P>,
    store: Arc<TleStore>,
    resolver: Arc<NameResolver<P>>,
    default_ids: Vec<u32>,
    in_flight: Mutex<()>,
}

impl<P: ElementSetProvider> RefreshService<P> {
    pub fn new(
        fetcher: TleFetcher<P>,
        store: Arc<TleStore>,
        resolver: Arc<NameResolver<P>>,
        default_ids: Vec<u32>,
    ) -> Self {
        Self {
            fetcher,
            store,
            resolver,
            default_ids,
            in_flight: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<TleStore> {
        &self.store
    }

    /// Refresh the configured IDs plus `extra_ids`, waiting for any refresh in progress.
    pub async fn refresh(&self, extra_ids: &[u32]) -> Result<RefreshReport, RefreshError> {
        let _guard = self.in_flight.lock().await;
        self.run(extra_ids).await
    }

    /// Refresh the configured IDs unless a refresh is already running.
    pub async fn try_refresh(&self) -> Result<RefreshReport, RefreshError> {
        let _guard = self.in_flight.try_lock().map_err(|_| RefreshError::Busy)?;
        self.run(&[]).await
    }

    /// Populate the store at startup: fetch only when no cache file exists yet, then load it.
    pub async fn bootstrap(&self) -> Result<usize, RefreshError> {
        let _guard = self.in_flight.lock().await;
        let cache_file = self.fetcher.cache_file();
        if !tokio::fs::try_exists(cache_file).await.unwrap_or(false) {
            log::info!("No TLE cache at {}, fetching", cache_file.display());
            if let Err(e) = self.run(&[]).await {
                log::error!("Initial TLE fetch failed: {}", e);
            }
        }
        Ok(self.store.load_file(cache_file, &self.resolver).await?)
    }

    async fn run(&self, extra_ids: &[u32]) -> Result<RefreshReport, RefreshError> {
        let ids = merge_ids(&self.default_ids, extra_ids);
        let added_ids: Vec<u32> = ids
            .iter()
            .copied()
            .filter(|id| !self.default_ids.contains(id))
            .collect();

        let raw = self.fetcher.fetch(&ids).await?;
        self.store.reload_from(&raw, &self.resolver).await;

        Ok(RefreshReport {
            fetched_ids: self.store.catalog_ids(),
            added_ids,
        })
    }
}

/// Configured IDs first, then unseen extras, without duplicates.
pub fn merge_ids(default_ids: &[u32], extra_ids: &[u32]) -> Vec<u32> {
    let mut ids: Vec<u32> = Vec::with_capacity(default_ids.len() + extra_ids.len());
    for &id in default_ids.iter().chain(extra_ids) {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

#[derive(Debug)]
pub struct SchedulerHandle {
    stop_tx: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the periodic task and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.stop_tx.send(());
        if let Err(e) = self.join.await {
            log::error!("TLE refresh scheduler panicked: {}", e);
        }
    }
}

/// Spawn the periodic refresh. The first tick fires one `period` from now.
pub fn spawn_scheduler<P>(service: Arc<RefreshService<P>>, period: Duration) -> SchedulerHandle
where
    P: ElementSetProvider + 'static,
{
    let (stop_tx, mut stop_rx) = oneshot::channel();

    let join = tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        log::info!(
            "TLE refresh scheduled every {}",
            humantime::format_duration(period)
        );

        loop {
            let should_stop = tokio::select! {
                _ = ticker.tick() => false,
                _ = &mut stop_rx => true,
            };
            if should_stop {
                log::info!("TLE refresh scheduler stopped");
                return;
            }

            match service.try_refresh().await {
                Ok(report) => log::info!(
                    "Scheduled TLE refresh loaded {} satellites",
                    report.fetched_ids.len()
                ),
                Err(RefreshError::Busy) => {
                    log::info!("Skipping scheduled TLE refresh, one is already running")
                }
                Err(e) => log::error!("Scheduled TLE refresh failed: {}", e),
            }
        }
    });

    SchedulerHandle { stop_tx, join }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tle::names::{NameMap, NameRetryPolicy};
    use crate::tle::provider::mock::{MockProvider, MockState, ISS, SAT_43017, SAT_7530};
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    fn service(provider: &MockProvider, dir: &TempDir, default_ids: Vec<u32>) -> RefreshService<MockProvider> {
        let provider = Arc::new(provider.clone());
        let map = NameMap::load(dir.path().join("names.json")).unwrap();
        let resolver = Arc::new(NameResolver::new(
            provider.clone(),
            map,
            NameRetryPolicy::OnReload,
        ));
        let fetcher = TleFetcher::new(provider, dir.path().join("tle_cache.txt"), 1);
        RefreshService::new(fetcher, Arc::new(TleStore::new()), resolver, default_ids)
    }

    #[test]
    fn merge_keeps_order_and_dedups() {
        assert_eq!(merge_ids(&[3, 1, 2], &[2, 5, 5, 4]), vec![3, 1, 2, 5, 4]);
        assert_eq!(merge_ids(&[], &[7]), vec![7]);
    }

    #[tokio::test]
    async fn refresh_reports_fetched_and_added() {
        let dir = TempDir::new().unwrap();
        let provider = MockProvider::with_fixtures(MockState::default());
        let service = service(&provider, &dir, vec![ISS.0, SAT_43017.0]);

        let report = service.refresh(&[SAT_7530.0, ISS.0]).await.unwrap();

        assert_eq!(report.fetched_ids, vec![7530, 25544, 43017]);
        assert_eq!(report.added_ids, vec![7530]);
        assert_eq!(service.store().get(SAT_7530.0).unwrap().name, "OSCAR 7");
    }

    #[tokio::test]
    async fn failed_batch_keeps_previous_store() {
        let dir = TempDir::new().unwrap();
        let provider = MockProvider::with_fixtures(MockState::default());
        let service = service(&provider, &dir, vec![ISS.0, SAT_43017.0]);
        service.refresh(&[]).await.unwrap();
        let cache_before = std::fs::read_to_string(dir.path().join("tle_cache.txt")).unwrap();

        // Same service data, but a provider whose second batch fails
        let failing = MockProvider::with_fixtures(MockState {
            fail_batch: Some(1),
            ..Default::default()
        });
        let failing_fetcher =
            TleFetcher::new(Arc::new(failing), dir.path().join("tle_cache.txt"), 1);
        let failing_service = RefreshService::new(
            failing_fetcher,
            service.store().clone(),
            service.resolver.clone(),
            vec![ISS.0, SAT_43017.0],
        );

        let result = failing_service.refresh(&[SAT_7530.0]).await;

        assert!(matches!(result, Err(RefreshError::Fetch(FetchError::Status { .. }))));
        assert_eq!(service.store().catalog_ids(), vec![25544, 43017]);
        let cache_after = std::fs::read_to_string(dir.path().join("tle_cache.txt")).unwrap();
        assert_eq!(cache_after, cache_before);
    }

    #[tokio::test]
    async fn concurrent_refreshes_never_overlap() {
        let dir = TempDir::new().unwrap();
        let provider = MockProvider::with_fixtures(MockState {
            delay: Some(Duration::from_millis(20)),
            ..Default::default()
        });
        let service = service(&provider, &dir, vec![ISS.0, SAT_43017.0, SAT_7530.0]);

        let (a, b) = tokio::join!(service.refresh(&[]), service.refresh(&[]));

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(provider.state.max_active_sessions.load(Ordering::SeqCst), 1);
        // Two full sequences of three batches, never interleaved
        let batches = provider.batches();
        assert_eq!(batches.len(), 6);
        assert_eq!(batches[..3], batches[3..]);
    }

    #[tokio::test]
    async fn scheduled_tick_skips_while_busy() {
        let dir = TempDir::new().unwrap();
        let provider = MockProvider::with_fixtures(MockState::default());
        let service = service(&provider, &dir, vec![ISS.0]);

        let guard = service.in_flight.lock().await;
        assert!(matches!(service.try_refresh().await, Err(RefreshError::Busy)));
        drop(guard);

        assert_eq!(provider.logins(), 0);
        assert!(provider.batches().is_empty());

        assert!(service.try_refresh().await.is_ok());
        assert_eq!(provider.logins(), 2); // elements + names
        assert_eq!(provider.batches().len(), 1);
    }

    #[tokio::test]
    async fn bootstrap_fetches_only_without_cache() {
        let dir = TempDir::new().unwrap();
        let provider = MockProvider::with_fixtures(MockState::default());
        let service = service(&provider, &dir, vec![ISS.0]);

        assert_eq!(service.bootstrap().await.unwrap(), 1);
        assert_eq!(provider.logins(), 2); // elements + names

        assert_eq!(service.bootstrap().await.unwrap(), 1);
        assert_eq!(provider.logins(), 2);
    }

    #[tokio::test]
    async fn scheduler_refreshes_and_shuts_down() {
        let dir = TempDir::new().unwrap();
        let provider = MockProvider::with_fixtures(MockState::default());
        let service = Arc::new(service(&provider, &dir, vec![ISS.0]));

        let handle = spawn_scheduler(service.clone(), Duration::from_millis(50));
        tokio::time::sleep(Duration::from_millis(400)).await;
        handle.shutdown().await;

        assert_eq!(service.store().catalog_ids(), vec![25544]);
    }
}
