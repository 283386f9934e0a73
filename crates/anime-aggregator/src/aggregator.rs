//! Multi-source aggregation.
//!
//! Every public operation has the same shape: build a cache key, return a
//! hit unless asked to refresh, otherwise fan the call out to every
//! registered adapter at once. Each branch races the per-source timeout;
//! failed or late branches are logged and dropped, the rest are merged in
//! registration order, cached and returned. No operation here returns an
//! error: an outage costs completeness, never availability.

use crate::adapters::SourceAdapter;
use crate::cache::TtlCache;
use crate::error::{Result, SourceError};
use crate::merger::SimilarityMerger;
use chrono::Weekday;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use shared::config::AggregatorConfig;
use shared::{MergedRecord, SourceRecord};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Timing knobs of an [`Aggregator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorOptions {
    pub per_source_timeout: Duration,
    pub list_ttl: Duration,
    pub search_ttl: Duration,
    pub schedule_ttl: Duration,
    pub detail_ttl: Duration,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self::from(&AggregatorConfig::default())
    }
}

impl From<&AggregatorConfig> for AggregatorOptions {
    fn from(config: &AggregatorConfig) -> Self {
        Self {
            per_source_timeout: config.per_source_timeout(),
            list_ttl: config.list_ttl(),
            search_ttl: config.search_ttl(),
            schedule_ttl: config.schedule_ttl(),
            detail_ttl: config.detail_ttl(),
        }
    }
}

/// How one adapter's branch of a fan-out ended
#[derive(Debug)]
pub enum BranchOutcome<T = Vec<SourceRecord>> {
    Succeeded(T),
    Failed(SourceError),
    TimedOut,
}

impl<T> BranchOutcome<T> {
    pub fn into_data(self) -> Option<T> {
        match self {
            BranchOutcome::Succeeded(data) => Some(data),
            BranchOutcome::Failed(_) | BranchOutcome::TimedOut => None,
        }
    }
}

/// Orchestrates the adapters, the merger and the cache
pub struct Aggregator {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    merger: SimilarityMerger,
    cache: Arc<TtlCache<Vec<MergedRecord>>>,
    options: AggregatorOptions,
}

impl Aggregator {
    /// Aggregator with a private cache
    pub fn new(
        adapters: Vec<Arc<dyn SourceAdapter>>,
        merger: SimilarityMerger,
        options: AggregatorOptions,
    ) -> Self {
        Self::with_cache(adapters, merger, Arc::new(TtlCache::new()), options)
    }

    /// Aggregator writing into a cache shared with other owners
    pub fn with_cache(
        adapters: Vec<Arc<dyn SourceAdapter>>,
        merger: SimilarityMerger,
        cache: Arc<TtlCache<Vec<MergedRecord>>>,
        options: AggregatorOptions,
    ) -> Self {
        Self {
            adapters,
            merger,
            cache,
            options,
        }
    }

    /// Build from configuration
    pub fn from_config(adapters: Vec<Arc<dyn SourceAdapter>>, config: &AggregatorConfig) -> Self {
        Self::new(
            adapters,
            SimilarityMerger::with_threshold(config.similarity_threshold),
            AggregatorOptions::from(config),
        )
    }

    /// Append an adapter; registration order is merge order
    pub fn register(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    pub fn platforms(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.platform()).collect()
    }

    pub fn has_platform(&self, platform: &str) -> bool {
        self.adapters.iter().any(|a| a.platform() == platform)
    }

    pub fn options(&self) -> &AggregatorOptions {
        &self.options
    }

    pub fn cache(&self) -> &Arc<TtlCache<Vec<MergedRecord>>> {
        &self.cache
    }

    /// Drop every cached result
    pub fn invalidate_all(&self) {
        let entries = self.cache.len();
        self.cache.clear();
        info!(entries = entries, "Cache invalidated");
    }

    /// One page of the merged catalog listing
    pub async fn list(&self, page: u32, page_size: u32, force_refresh: bool) -> Vec<MergedRecord> {
        let key = format!("list:{}:{}", page, page_size);
        if !force_refresh {
            if let Some(hit) = self.cached(&key) {
                return hit;
            }
        }

        let records = self
            .fan_out("list", |adapter| adapter.fetch_list(page, page_size))
            .await;
        let merged = self.merger.merge(records);

        self.cache
            .set_with_ttl(key, merged.clone(), self.options.list_ttl);
        merged
    }

    /// Titles matching `keyword`, truncated to `limit` after merging
    pub async fn search(&self, keyword: &str, limit: usize) -> Vec<MergedRecord> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            debug!("Empty search keyword, skipping fan-out");
            return Vec::new();
        }

        let key = format!("search:{}:{}", keyword, limit);
        if let Some(hit) = self.cached(&key) {
            return hit;
        }

        let records = self
            .fan_out("search", |adapter| adapter.search(keyword, limit))
            .await;
        let mut merged = self.merger.merge(records);
        merged.truncate(limit);

        self.cache
            .set_with_ttl(key, merged.clone(), self.options.search_ttl);
        merged
    }

    /// Airing schedule for one weekday, or the whole week
    pub async fn schedule(&self, day: Option<Weekday>) -> Vec<MergedRecord> {
        let key = match day {
            Some(day) => format!("schedule:{}", day.number_from_monday()),
            None => "schedule:all".to_string(),
        };
        if let Some(hit) = self.cached(&key) {
            return hit;
        }

        let records = self
            .fan_out("schedule", |adapter| adapter.fetch_schedule(day))
            .await;
        let merged = self.merger.merge(records);

        self.cache
            .set_with_ttl(key, merged.clone(), self.options.schedule_ttl);
        merged
    }

    /// A single title from one platform
    ///
    /// Unknown platforms, failures, timeouts and missing titles all read as
    /// `None`. Only found titles are cached.
    pub async fn detail(&self, platform: &str, id: &str) -> Option<MergedRecord> {
        let key = format!("detail:{}:{}", platform, id);
        if let Some(hit) = self.cached(&key) {
            return hit.into_iter().next();
        }

        let Some(adapter) = self.adapters.iter().find(|a| a.platform() == platform) else {
            debug!(platform = platform, "Detail requested for unregistered platform");
            return None;
        };

        let outcome = self.race(adapter.fetch_detail(id)).await;
        let record = match outcome {
            BranchOutcome::Succeeded(record) => record?,
            BranchOutcome::Failed(e) => {
                warn!(platform = platform, id = id, error = %e, "Detail lookup failed");
                return None;
            }
            BranchOutcome::TimedOut => {
                warn!(
                    platform = platform,
                    id = id,
                    timeout_ms = self.options.per_source_timeout.as_millis() as u64,
                    "Detail lookup timed out"
                );
                return None;
            }
        };

        let merged = MergedRecord::from_source(record);
        self.cache
            .set_with_ttl(key, vec![merged.clone()], self.options.detail_ttl);
        Some(merged)
    }

    fn cached(&self, key: &str) -> Option<Vec<MergedRecord>> {
        let hit = self.cache.get(key)?;
        debug!(key = key, records = hit.len(), "Cache hit");
        Some(hit)
    }

    /// Run one adapter call against the per-source timeout
    ///
    /// A call that loses the race is dropped, which cancels its request. A
    /// panicking adapter counts as a failed branch.
    async fn race<T, F>(&self, call: F) -> BranchOutcome<T>
    where
        F: Future<Output = Result<T>>,
    {
        let guarded = AssertUnwindSafe(call).catch_unwind();
        match tokio::time::timeout(self.options.per_source_timeout, guarded).await {
            Ok(Ok(Ok(data))) => BranchOutcome::Succeeded(data),
            Ok(Ok(Err(e))) => BranchOutcome::Failed(e),
            Ok(Err(payload)) => BranchOutcome::Failed(SourceError::Panicked(panic_message(payload))),
            Err(_) => BranchOutcome::TimedOut,
        }
    }

    /// Call every adapter concurrently and flatten the successful branches
    /// in registration order
    async fn fan_out<'a, F>(&'a self, operation: &'static str, call: F) -> Vec<SourceRecord>
    where
        F: Fn(&'a dyn SourceAdapter) -> BoxFuture<'a, Result<Vec<SourceRecord>>>,
    {
        if self.adapters.is_empty() {
            debug!(operation = operation, "No adapters registered");
            return Vec::new();
        }

        let started = Instant::now();
        let branches = self
            .adapters
            .iter()
            .map(|adapter| self.race(call(adapter.as_ref())));
        let outcomes = join_all(branches).await;

        let mut records = Vec::new();
        let mut succeeded = 0usize;

        for (adapter, outcome) in self.adapters.iter().zip(outcomes) {
            match outcome {
                BranchOutcome::Succeeded(data) => {
                    debug!(
                        operation = operation,
                        platform = adapter.platform(),
                        records = data.len(),
                        "Source answered"
                    );
                    succeeded += 1;
                    records.extend(data);
                }
                BranchOutcome::Failed(e) => {
                    warn!(
                        operation = operation,
                        platform = adapter.platform(),
                        error = %e,
                        "Source failed, excluding from results"
                    );
                }
                BranchOutcome::TimedOut => {
                    warn!(
                        operation = operation,
                        platform = adapter.platform(),
                        timeout_ms = self.options.per_source_timeout.as_millis() as u64,
                        "Source timed out, excluding from results"
                    );
                }
            }
        }

        info!(
            operation = operation,
            sources = self.adapters.len(),
            succeeded = succeeded,
            records = records.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Fan-out complete"
        );

        records
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    /// Scripted adapter: fixed records, optional delay, optional failure
    struct MockAdapter {
        platform: &'static str,
        records: Vec<SourceRecord>,
        delay: Duration,
        fail: bool,
        panic: bool,
        calls: AtomicUsize,
    }

    impl MockAdapter {
        fn new(platform: &'static str, titles: &[&str]) -> Self {
            Self {
                platform,
                records: titles
                    .iter()
                    .enumerate()
                    .map(|(i, title)| record(platform, &i.to_string(), title))
                    .collect(),
                delay: Duration::ZERO,
                fail: false,
                panic: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(platform: &'static str) -> Self {
            Self {
                fail: true,
                ..Self::new(platform, &[])
            }
        }

        fn panicking(platform: &'static str) -> Self {
            Self {
                panic: true,
                ..Self::new(platform, &[])
            }
        }

        fn slow(platform: &'static str, titles: &[&str], delay: Duration) -> Self {
            Self {
                delay,
                ..Self::new(platform, titles)
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        async fn respond(&self) -> Result<Vec<SourceRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.panic {
                panic!("{} exploded", self.platform);
            }
            if self.fail {
                return Err(SourceError::Api {
                    status_code: 503,
                    message: format!("{} unavailable", self.platform),
                });
            }
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            Ok(self.records.clone())
        }
    }

    #[async_trait]
    impl SourceAdapter for MockAdapter {
        fn platform(&self) -> &str {
            self.platform
        }

        async fn fetch_list(&self, _page: u32, _page_size: u32) -> Result<Vec<SourceRecord>> {
            self.respond().await
        }

        async fn search(&self, _keyword: &str, _limit: usize) -> Result<Vec<SourceRecord>> {
            self.respond().await
        }

        async fn fetch_detail(&self, id: &str) -> Result<Option<SourceRecord>> {
            Ok(self.respond().await?.into_iter().find(|r| r.id == id))
        }

        async fn fetch_schedule(&self, _day: Option<Weekday>) -> Result<Vec<SourceRecord>> {
            self.respond().await
        }
    }

    fn record(platform: &str, id: &str, title: &str) -> SourceRecord {
        SourceRecord::new(
            platform,
            id,
            title,
            format!("https://{}.example/{}", platform, id),
        )
    }

    fn options(timeout: Duration) -> AggregatorOptions {
        AggregatorOptions {
            per_source_timeout: timeout,
            ..AggregatorOptions::default()
        }
    }

    fn aggregator(adapters: Vec<Arc<MockAdapter>>) -> Aggregator {
        aggregator_with_timeout(adapters, Duration::from_secs(2))
    }

    fn aggregator_with_timeout(adapters: Vec<Arc<MockAdapter>>, timeout: Duration) -> Aggregator {
        let adapters = adapters
            .into_iter()
            .map(|a| a as Arc<dyn SourceAdapter>)
            .collect();
        Aggregator::new(adapters, SimilarityMerger::new(), options(timeout))
    }

    fn contributing_platforms(records: &[MergedRecord]) -> Vec<String> {
        let mut platforms: Vec<String> = records
            .iter()
            .flat_map(|r| r.platforms().map(str::to_string))
            .collect();
        platforms.sort();
        platforms.dedup();
        platforms
    }

    #[test]
    fn test_options_from_config() {
        let config = AggregatorConfig {
            per_source_timeout_ms: 1500,
            list_ttl_seconds: 10,
            ..AggregatorConfig::default()
        };
        let options = AggregatorOptions::from(&config);
        assert_eq!(options.per_source_timeout, Duration::from_millis(1500));
        assert_eq!(options.list_ttl, Duration::from_secs(10));
        assert_eq!(options.detail_ttl, Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_same_title_from_two_platforms_merges() {
        let bilibili = Arc::new(MockAdapter::new("bilibili", &["进击的巨人"]));
        let tmdb = Arc::new(MockAdapter::new("tmdb", &["进击的巨人"]));
        let agg = aggregator(vec![bilibili, tmdb]);

        let result = agg.list(1, 20, false).await;

        assert_eq!(result.len(), 1);
        let links: HashMap<&str, &str> = result[0]
            .platform_links
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(links.len(), 2);
        assert_eq!(links["bilibili"], "https://bilibili.example/0");
        assert_eq!(links["tmdb"], "https://tmdb.example/0");
    }

    #[tokio::test]
    async fn test_failing_source_is_excluded() {
        let a = Arc::new(MockAdapter::new("a", &["Cowboy Bebop"]));
        let b = Arc::new(MockAdapter::failing("b"));
        let c = Arc::new(MockAdapter::new("c", &["葬送的芙莉莲"]));
        let agg = aggregator(vec![a, b.clone(), c]);

        let result = agg.list(1, 20, false).await;

        assert_eq!(result.len(), 2);
        assert_eq!(contributing_platforms(&result), vec!["a", "c"]);
        assert_eq!(b.calls(), 1);
    }

    #[tokio::test]
    async fn test_all_sources_failing_yields_empty() {
        let agg = aggregator(vec![
            Arc::new(MockAdapter::failing("a")),
            Arc::new(MockAdapter::failing("b")),
        ]);

        assert!(agg.list(1, 20, false).await.is_empty());
        assert!(agg.search("bebop", 20).await.is_empty());
        assert!(agg.schedule(None).await.is_empty());
    }

    #[tokio::test]
    async fn test_fault_isolation_over_every_partition() {
        let platforms = ["p0", "p1", "p2"];
        let titles = ["Alpha Story", "蓝色监狱", "Mushishi"];

        for mask in 0u8..8 {
            let adapters: Vec<Arc<MockAdapter>> = (0..3)
                .map(|i| {
                    if mask & (1 << i) != 0 {
                        Arc::new(MockAdapter::failing(platforms[i]))
                    } else {
                        Arc::new(MockAdapter::new(platforms[i], &[titles[i]]))
                    }
                })
                .collect();
            let succeeding: Vec<String> = (0..3)
                .filter(|i| mask & (1 << i) == 0)
                .map(|i| platforms[i].to_string())
                .collect();

            let result = aggregator(adapters).list(1, 20, false).await;
            let contributing = contributing_platforms(&result);

            assert!(contributing.iter().all(|p| succeeding.contains(p)));
            assert_eq!(contributing.is_empty(), succeeding.is_empty());
        }
    }

    #[tokio::test]
    async fn test_panicking_source_is_excluded() {
        let a = Arc::new(MockAdapter::new("a", &["Cowboy Bebop"]));
        let boom = Arc::new(MockAdapter::panicking("boom"));
        let c = Arc::new(MockAdapter::new("c", &["葬送的芙莉莲"]));
        let agg = aggregator(vec![a, boom.clone(), c]);

        let result = agg.list(1, 20, false).await;

        assert_eq!(result.len(), 2);
        assert_eq!(contributing_platforms(&result), vec!["a", "c"]);
        assert_eq!(boom.calls(), 1);
        assert!(agg.detail("boom", "0").await.is_none());
    }

    #[tokio::test]
    async fn test_race_reports_panic_message() {
        let agg = aggregator(Vec::new());

        let outcome = agg
            .race(async {
                if agg.platforms().is_empty() {
                    panic!("bad payload");
                }
                Ok(Vec::<SourceRecord>::new())
            })
            .await;

        match outcome {
            BranchOutcome::Failed(SourceError::Panicked(message)) => assert_eq!(message, "bad payload"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_slow_source_never_contributes() {
        let fast = Arc::new(MockAdapter::new("fast", &["Mob Psycho 100"]));
        let slow = Arc::new(MockAdapter::slow(
            "slow",
            &["Ping Pong the Animation"],
            Duration::from_millis(500),
        ));
        let agg = aggregator_with_timeout(vec![fast, slow], Duration::from_millis(50));

        let started = Instant::now();
        let result = agg.list(1, 20, false).await;

        assert!(started.elapsed() < Duration::from_millis(450));
        assert_eq!(contributing_platforms(&result), vec!["fast"]);

        // the late answer must not leak into the cached entry either
        sleep(Duration::from_millis(500)).await;
        let cached = agg.list(1, 20, false).await;
        assert_eq!(contributing_platforms(&cached), vec!["fast"]);
    }

    #[tokio::test]
    async fn test_registration_order_decides_merged_fields() {
        let first = Arc::new(MockAdapter::new("first", &["Frieren"]));
        let second = Arc::new(MockAdapter::slow("second", &["Frieren"], Duration::from_millis(20)));
        let agg = aggregator(vec![second, first]);

        let result = agg.list(1, 20, false).await;

        assert_eq!(result.len(), 1);
        // "second" is registered first, so it seeds the merged record
        assert_eq!(result[0].source_platform, "second");
    }

    #[tokio::test]
    async fn test_list_is_cached_until_forced() {
        let adapter = Arc::new(MockAdapter::new("a", &["Planetes"]));
        let agg = aggregator(vec![adapter.clone()]);

        let first = agg.list(1, 20, false).await;
        let second = agg.list(1, 20, false).await;
        assert_eq!(first, second);
        assert_eq!(adapter.calls(), 1);

        agg.list(2, 20, false).await;
        assert_eq!(adapter.calls(), 2);

        agg.list(1, 20, true).await;
        assert_eq!(adapter.calls(), 3);
        assert!(agg.cache().has("list:1:20"));
        assert!(agg.cache().has("list:2:20"));
    }

    #[tokio::test]
    async fn test_search_truncates_after_merge() {
        let a = Arc::new(MockAdapter::new("a", &["Monster", "Steins;Gate", "Haikyu"]));
        let b = Arc::new(MockAdapter::new("b", &["Monster", "Steins;Gate", "Mononoke"]));
        let agg = aggregator(vec![a, b]);

        let result = agg.search("mon", 2).await;

        assert_eq!(result.len(), 2);
        // both survivors are complete clusters
        assert!(result.iter().all(|r| r.platform_links.len() == 2));
        assert!(agg.cache().has("search:mon:2"));
    }

    #[tokio::test]
    async fn test_blank_search_skips_sources() {
        let adapter = Arc::new(MockAdapter::new("a", &["Anything"]));
        let agg = aggregator(vec![adapter.clone()]);

        assert!(agg.search("", 20).await.is_empty());
        assert!(agg.search("   ", 20).await.is_empty());
        assert_eq!(adapter.calls(), 0);
        assert!(agg.cache().is_empty());
    }

    #[tokio::test]
    async fn test_schedule_keys_by_day() {
        let adapter = Arc::new(MockAdapter::new("a", &["Dandadan"]));
        let agg = aggregator(vec![adapter.clone()]);

        agg.schedule(Some(Weekday::Thu)).await;
        agg.schedule(Some(Weekday::Thu)).await;
        agg.schedule(None).await;

        assert_eq!(adapter.calls(), 2);
        assert!(agg.cache().has("schedule:4"));
        assert!(agg.cache().has("schedule:all"));
    }

    #[tokio::test]
    async fn test_empty_registry_yields_empty_results() {
        let agg = aggregator(Vec::new());

        assert!(agg.platforms().is_empty());
        assert!(agg.list(1, 20, false).await.is_empty());
        assert!(agg.search("anything", 20).await.is_empty());
        assert!(agg.schedule(Some(Weekday::Mon)).await.is_empty());
        assert!(agg.detail("bilibili", "1").await.is_none());
    }

    #[tokio::test]
    async fn test_detail_routes_to_one_platform() {
        let a = Arc::new(MockAdapter::new("a", &["Kaiba"]));
        let b = Arc::new(MockAdapter::new("b", &["Kaiba"]));
        let agg = aggregator(vec![a.clone(), b.clone()]);

        let found = agg.detail("b", "0").await.unwrap();
        assert_eq!(found.platforms().collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(a.calls(), 0);

        // cached under its own key
        agg.detail("b", "0").await.unwrap();
        assert_eq!(b.calls(), 1);

        assert!(agg.detail("b", "missing").await.is_none());
        assert!(agg.detail("nope", "0").await.is_none());
        assert!(!agg.cache().has("detail:b:missing"));
    }

    #[tokio::test]
    async fn test_detail_failure_and_timeout_read_as_absent() {
        let broken = Arc::new(MockAdapter::failing("broken"));
        let slow = Arc::new(MockAdapter::slow("slow", &["Kaiba"], Duration::from_millis(300)));
        let agg = aggregator_with_timeout(vec![broken, slow], Duration::from_millis(30));

        assert!(agg.detail("broken", "0").await.is_none());
        assert!(agg.detail("slow", "0").await.is_none());
    }

    #[tokio::test]
    async fn test_register_and_platforms() {
        let agg = aggregator(vec![Arc::new(MockAdapter::new("a", &[]))])
            .register(Arc::new(MockAdapter::new("b", &[])));

        assert_eq!(agg.platforms(), vec!["a", "b"]);
        assert!(agg.has_platform("b"));
        assert!(!agg.has_platform("c"));
    }

    #[tokio::test]
    async fn test_injected_cache_is_shared() {
        let cache = Arc::new(TtlCache::new());
        let adapter = Arc::new(MockAdapter::new("a", &["Haibane Renmei"]));

        let first = Aggregator::with_cache(
            vec![adapter.clone() as Arc<dyn SourceAdapter>],
            SimilarityMerger::new(),
            cache.clone(),
            AggregatorOptions::default(),
        );
        let second = Aggregator::with_cache(
            vec![adapter.clone() as Arc<dyn SourceAdapter>],
            SimilarityMerger::new(),
            cache.clone(),
            AggregatorOptions::default(),
        );

        first.list(1, 20, false).await;
        let from_second = second.list(1, 20, false).await;
        assert_eq!(from_second.len(), 1);
        assert_eq!(adapter.calls(), 1);

        second.invalidate_all();
        assert!(first.cache().is_empty());
    }

    #[tokio::test]
    async fn test_independent_aggregators_do_not_share_state() {
        let adapter = Arc::new(MockAdapter::new("a", &["Texhnolyze"]));
        let first = aggregator(vec![adapter.clone()]);
        let second = aggregator(vec![adapter.clone()]);

        first.list(1, 20, false).await;
        second.list(1, 20, false).await;

        assert_eq!(adapter.calls(), 2);
    }

    #[test]
    fn test_branch_outcome_data() {
        assert_eq!(BranchOutcome::Succeeded(vec![1]).into_data(), Some(vec![1]));
        assert_eq!(BranchOutcome::<Vec<i32>>::TimedOut.into_data(), None);
        assert_eq!(
            BranchOutcome::<Vec<i32>>::Failed(SourceError::InvalidArgument("x".into())).into_data(),
            None
        );
    }
}
