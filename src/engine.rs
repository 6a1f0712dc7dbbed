// src/engine.rs
use crate::domain::{normalize, DomainSet, DomainSink};
use crate::error::{Result, SubhiveError};
use crate::output::OutputManager;
use crate::resolver::Resolver;
use crate::session::Session;
use crate::sources::{build_worklist, AnubisDbSource, Source};
use crate::types::{
    Config, EnumerationStats, FailureKind, PublishOutcome, ScanReport, SourceFailure,
    SourceOutcome, SourceResult,
};
use dashmap::DashSet;
use futures::future::{BoxFuture, FutureExt};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use std::any::Any;
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Fans every connector out against a target, joins them, and hands the
/// merged domain set to post-processing.
pub struct Scanner {
    config: Config,
    session: Session,
    sources: Vec<Arc<dyn Source>>,
    resolver: Option<Arc<Resolver>>,
    publisher: Option<AnubisDbSource>,
    progress: bool,
    /// Run-wide set of names already scanned as targets, for recursion only.
    seen: DashSet<String>,
    recursion_budget: AtomicUsize,
}

impl Scanner {
    pub fn new(config: Config) -> Result<Self> {
        let sources = build_worklist(&config);
        Self::with_sources(config, sources)
    }

    pub fn with_sources(config: Config, sources: Vec<Arc<dyn Source>>) -> Result<Self> {
        if sources.is_empty() {
            return Err(SubhiveError::Config(
                "No valid sources configured".to_string(),
            ));
        }

        let session = Session::new(&config)?;

        let resolver = if config.resolver.enabled {
            Some(Arc::new(Resolver::new(&config.resolver)?))
        } else {
            None
        };

        let publisher = config
            .publish
            .then(|| AnubisDbSource::new(&config.anubis_db_url));

        let recursion_budget = AtomicUsize::new(config.recursion.max_targets);

        Ok(Self {
            config,
            session,
            sources,
            resolver,
            publisher,
            progress: false,
            seen: DashSet::new(),
            recursion_budget,
        })
    }

    /// Show a progress bar over the connector phase.
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    /// Scans targets one after another, writing and publishing each report
    /// before the next target starts. A report that cannot be written is
    /// logged and counted; the run carries on.
    pub async fn run(&self, targets: &[String], output: &OutputManager) -> Result<EnumerationStats> {
        if targets.is_empty() {
            return Err(SubhiveError::Config("No targets provided".to_string()));
        }

        info!("Starting enumeration for {} targets", targets.len());
        let start_time = Instant::now();
        let mut scanned = 0;
        let mut unique_subdomains = 0;
        let mut unique_ips = 0;
        let mut failed_sources = 0;
        let mut output_failures = 0;

        for target in targets {
            info!("Working on target: {}", target);
            let report = self.scan_target(target).await;

            scanned += 1;
            unique_subdomains += report.domains.len();
            unique_ips += report.unique_ips().len();
            failed_sources += report.failures();

            if let Err(e) = output.write_report(&report) {
                error!("Failed to write results for {}: {}", report.target, e);
                output_failures += 1;
            }
            self.publish(&report).await;
        }

        Ok(EnumerationStats {
            targets: scanned,
            unique_subdomains,
            unique_ips,
            failed_sources,
            output_failures,
            duration: start_time.elapsed(),
        })
    }

    /// Runs the whole pipeline for one target. Never fails: connector
    /// errors are recorded in `source_outcomes`.
    ///
    /// `scan_timeout` bounds the connector phase of the target including
    /// every recursive rescan under it.
    pub async fn scan_target(&self, target: &str) -> ScanReport {
        let start_time = Instant::now();
        let target = normalize(target);
        let target = target.as_str();
        self.seen.insert(target.to_string());

        let deadline = self
            .config
            .scan_timeout
            .map(|ceiling| tokio::time::Instant::now() + ceiling);

        let set = DomainSet::new();
        let mut source_outcomes = self.dispatch(target, &set, deadline).await;

        if self.config.recursion.enabled {
            source_outcomes.extend(self.rescan(target, &set, 1, deadline).await);
        }

        // Frozen from here on
        let domains = set.snapshot();
        info!("Found {} subdomains for {}", domains.len(), target);

        let resolved_ips = match &self.resolver {
            Some(resolver) => {
                info!("Resolving {} subdomains...", domains.len());
                Some(resolver.resolve_all(&domains).await)
            }
            None => None,
        };

        ScanReport {
            target: target.to_string(),
            domains,
            resolved_ips,
            source_outcomes,
            duration: start_time.elapsed(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub async fn publish(&self, report: &ScanReport) -> Option<PublishOutcome> {
        let publisher = self.publisher.as_ref()?;
        let outcome = publisher
            .publish(&self.session, std::slice::from_ref(&report.target), &report.domains)
            .await;
        debug!("Publish outcome for {}: {:?}", report.target, outcome);
        Some(outcome)
    }

    /// Runs every connector against `target` with at most `max_concurrency`
    /// in flight, and waits until each one has reached a terminal outcome.
    async fn dispatch(
        &self,
        target: &str,
        set: &DomainSet,
        deadline: Option<tokio::time::Instant>,
    ) -> Vec<SourceOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let source_timeout = self.config.source_timeout;
        let progress = self.progress_bar(target);

        let mut tasks = JoinSet::new();
        let mut pending: Vec<Option<String>> = Vec::with_capacity(self.sources.len());

        for (index, source) in self.sources.iter().enumerate() {
            let source = Arc::clone(source);
            let sink = DomainSink::new(set.clone(), target, source.info().scoped);
            let session = self.session.clone();
            let semaphore = Arc::clone(&semaphore);
            pending.push(Some(source.name().to_string()));

            tasks.spawn(async move {
                // The semaphore is never closed.
                let _permit = semaphore.acquire_owned().await.ok();
                let start = Instant::now();
                let result = run_source(source.as_ref(), &sink, &session, source_timeout).await;
                (index, result, start.elapsed())
            });
        }

        let mut deadline = deadline;
        let mut outcomes = Vec::with_capacity(pending.len());

        loop {
            let joined = match deadline {
                Some(at) => match tokio::time::timeout_at(at, tasks.join_next()).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        warn!("Scan deadline reached for {}, cancelling remaining sources", target);
                        tasks.abort_all();
                        deadline = None;
                        continue;
                    }
                },
                None => tasks.join_next().await,
            };

            match joined {
                Some(Ok((index, result, duration))) => {
                    if let Some(name) = pending.get_mut(index).and_then(Option::take) {
                        log_outcome(&name, target, &result, duration);
                        progress.inc(1);
                        outcomes.push(SourceOutcome {
                            source: name,
                            target: target.to_string(),
                            result,
                            duration,
                        });
                    }
                }
                // Aborted at the deadline; attributed below.
                Some(Err(err)) => debug!("Source task for {} ended early: {}", target, err),
                None => break,
            }
        }

        // Only tasks cut off by the scan deadline are still pending.
        let ceiling = self.config.scan_timeout.unwrap_or_default();
        for name in pending.into_iter().flatten() {
            warn!("[{}] cancelled for {} at the scan deadline", name, target);
            outcomes.push(SourceOutcome {
                source: name,
                target: target.to_string(),
                result: Err(SourceFailure::new(
                    FailureKind::Cancelled,
                    format!("cancelled at the scan deadline ({:?})", ceiling),
                )),
                duration: ceiling,
            });
        }

        progress.finish_and_clear();
        outcomes
    }

    /// Treats each newly discovered name as a target of its own and merges
    /// what it finds back into `set`. Bounded by depth and a run-wide budget.
    fn rescan<'a>(
        &'a self,
        parent: &'a str,
        set: &'a DomainSet,
        depth: usize,
        deadline: Option<tokio::time::Instant>,
    ) -> BoxFuture<'a, Vec<SourceOutcome>> {
        async move {
            let mut outcomes = Vec::new();
            if depth > self.config.recursion.max_depth {
                return outcomes;
            }

            for domain in set.snapshot() {
                if domain == parent || self.seen.contains(&domain) {
                    continue;
                }
                if deadline.is_some_and(|at| tokio::time::Instant::now() >= at) {
                    debug!("Scan deadline passed, not rescanning {}", domain);
                    break;
                }
                if !self.take_recursion_slot() {
                    debug!("Recursion budget exhausted, not rescanning {}", domain);
                    break;
                }
                self.seen.insert(domain.clone());

                info!("Recursive search on {} (depth {})", domain, depth);
                let child = DomainSet::new();
                outcomes.extend(self.dispatch(&domain, &child, deadline).await);
                outcomes.extend(self.rescan(&domain, &child, depth + 1, deadline).await);

                for found in child.snapshot() {
                    set.add(&found);
                }
            }

            outcomes
        }
        .boxed()
    }

    fn take_recursion_slot(&self) -> bool {
        self.recursion_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }

    fn progress_bar(&self, target: &str) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(self.sources.len() as u64);
        let style = ProgressStyle::with_template("{spinner} {msg} [{bar:30}] {pos}/{len} sources")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.set_message(target.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));
        bar
    }
}

/// The connector failure boundary: errors, timeouts and panics all come
/// back as a failed [`SourceResult`].
async fn run_source(
    source: &dyn Source,
    sink: &DomainSink,
    session: &Session,
    limit: Duration,
) -> SourceResult {
    let run = tokio::time::timeout(limit, source.enumerate(sink.target(), sink, session));

    match AssertUnwindSafe(run).catch_unwind().await {
        Ok(Ok(Ok(()))) => Ok(sink.contributed()),
        Ok(Ok(Err(e))) => Err(SourceFailure::from(e)),
        Ok(Err(_elapsed)) => Err(SourceFailure::from(SubhiveError::Timeout(limit))),
        Err(panic) => Err(SourceFailure::new(FailureKind::Panicked, panic_message(panic))),
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", msg)
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("panicked: {}", msg)
    } else {
        "panicked".to_string()
    }
}

fn log_outcome(name: &str, target: &str, result: &SourceResult, duration: Duration) {
    match result {
        Ok(count) => info!(
            "[{}] {} new subdomains for {} in {:?}",
            name, count, target, duration
        ),
        Err(failure) if failure.kind == FailureKind::Config => {
            warn!("[{}] skipped for {}: {}", name, target, failure.message)
        }
        Err(failure) => error!("[{}] failed for {}: {}", name, target, failure.message),
    }
}

/// Names of every source that failed in `outcomes`, sorted.
pub fn failed_sources(outcomes: &[SourceOutcome]) -> BTreeSet<&str> {
    outcomes
        .iter()
        .filter(|o| !o.is_success())
        .map(|o| o.source.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RecursionConfig, SourceGroup, SourceInfo};
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct StaticSource {
        name: String,
        findings: HashMap<String, Vec<String>>,
    }

    #[async_trait]
    impl Source for StaticSource {
        fn name(&self) -> &str {
            &self.name
        }

        fn info(&self) -> SourceInfo {
            SourceInfo {
                name: self.name.clone(),
                group: SourceGroup::Core,
                needs_key: false,
                scoped: true,
            }
        }

        async fn enumerate(&self, target: &str, sink: &DomainSink, _session: &Session) -> Result<()> {
            for raw in self.findings.get(target).into_iter().flatten() {
                sink.add(raw);
            }
            Ok(())
        }
    }

    struct SlowSource;

    #[async_trait]
    impl Source for SlowSource {
        fn name(&self) -> &str {
            "slow"
        }

        fn info(&self) -> SourceInfo {
            SourceInfo {
                name: "slow".to_string(),
                group: SourceGroup::Core,
                needs_key: false,
                scoped: true,
            }
        }

        async fn enumerate(&self, _target: &str, sink: &DomainSink, _session: &Session) -> Result<()> {
            sink.add("early.example.com");
            tokio::time::sleep(Duration::from_secs(30)).await;
            sink.add("late.example.com");
            Ok(())
        }
    }

    fn static_source(name: &str, findings: Vec<(&str, Vec<&str>)>) -> Arc<dyn Source> {
        Arc::new(StaticSource {
            name: name.to_string(),
            findings: findings
                .into_iter()
                .map(|(t, f)| (t.to_string(), f.into_iter().map(String::from).collect()))
                .collect(),
        })
    }

    fn quiet_config() -> Config {
        Config {
            publish: false,
            ..Config::default()
        }
    }

    #[test]
    fn test_empty_worklist_rejected() {
        assert!(matches!(
            Scanner::with_sources(quiet_config(), Vec::new()),
            Err(SubhiveError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_source_timeout_keeps_partial_findings() {
        let config = Config {
            source_timeout: Duration::from_millis(100),
            ..quiet_config()
        };
        let scanner = Scanner::with_sources(
            config,
            vec![
                Arc::new(SlowSource),
                static_source("fast", vec![("example.com", vec!["www.example.com"])]),
            ],
        )
        .unwrap();

        let report = scanner.scan_target("example.com").await;

        assert_eq!(report.domains, vec!["early.example.com", "www.example.com"]);
        let slow = report.source_outcomes.iter().find(|o| o.source == "slow").unwrap();
        assert_eq!(slow.result.as_ref().unwrap_err().kind, FailureKind::Timeout);
        assert_eq!(report.successes(), 1);
    }

    #[tokio::test]
    async fn test_scan_deadline_cancels_stragglers() {
        let config = Config {
            source_timeout: Duration::from_secs(60),
            scan_timeout: Some(Duration::from_millis(150)),
            ..quiet_config()
        };
        let scanner = Scanner::with_sources(
            config,
            vec![
                Arc::new(SlowSource),
                static_source("fast", vec![("example.com", vec!["www.example.com"])]),
            ],
        )
        .unwrap();

        let report = scanner.scan_target("example.com").await;

        assert_eq!(report.source_outcomes.len(), 2);
        assert_eq!(failed_sources(&report.source_outcomes), BTreeSet::from(["slow"]));
        let slow = report.source_outcomes.iter().find(|o| o.source == "slow").unwrap();
        assert_eq!(slow.result.as_ref().unwrap_err().kind, FailureKind::Cancelled);
        assert!(report.domains.contains(&"early.example.com".to_string()));
        assert!(!report.domains.contains(&"late.example.com".to_string()));
    }

    #[tokio::test]
    async fn test_recursion_is_bounded() {
        let findings = vec![
            ("example.com", vec!["a.example.com", "b.example.com"]),
            ("a.example.com", vec!["x.a.example.com"]),
            ("b.example.com", vec!["y.b.example.com"]),
            ("x.a.example.com", vec!["deep.x.a.example.com"]),
        ];
        let config = Config {
            recursion: RecursionConfig {
                enabled: true,
                max_depth: 1,
                max_targets: 1,
            },
            ..quiet_config()
        };
        let scanner =
            Scanner::with_sources(config, vec![static_source("static", findings)]).unwrap();

        let report = scanner.scan_target("example.com").await;

        // Budget of one: only a.example.com is rescanned, and depth 1 stops
        // before x.a.example.com is.
        assert_eq!(
            report.domains,
            vec!["a.example.com", "b.example.com", "x.a.example.com"]
        );
        assert_eq!(report.source_outcomes.len(), 2);
        assert!(report
            .source_outcomes
            .iter()
            .any(|o| o.target == "a.example.com"));
    }

    #[tokio::test]
    async fn test_concurrency_limit_of_one_still_runs_everything() {
        let config = Config {
            max_concurrency: 1,
            ..quiet_config()
        };
        let sources = (0..5)
            .map(|i| {
                let name = format!("s{}", i);
                let finding = format!("host{}.example.com", i);
                Arc::new(StaticSource {
                    name,
                    findings: HashMap::from([("example.com".to_string(), vec![finding])]),
                }) as Arc<dyn Source>
            })
            .collect();
        let scanner = Scanner::with_sources(config, sources).unwrap();

        let report = scanner.scan_target("example.com").await;
        assert_eq!(report.domains.len(), 5);
        assert_eq!(report.successes(), 5);
    }

    struct GaugedSource {
        name: String,
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Source for GaugedSource {
        fn name(&self) -> &str {
            &self.name
        }

        fn info(&self) -> SourceInfo {
            SourceInfo {
                name: self.name.clone(),
                group: SourceGroup::Core,
                needs_key: false,
                scoped: true,
            }
        }

        async fn enumerate(&self, target: &str, sink: &DomainSink, _session: &Session) -> Result<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            sink.add(&format!("{}.{}", self.name, target));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_in_flight_sources_never_exceed_limit() {
        let config = Config {
            max_concurrency: 2,
            ..quiet_config()
        };
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let sources = (0..6)
            .map(|i| {
                Arc::new(GaugedSource {
                    name: format!("g{}", i),
                    in_flight: Arc::clone(&in_flight),
                    peak: Arc::clone(&peak),
                }) as Arc<dyn Source>
            })
            .collect();
        let scanner = Scanner::with_sources(config, sources).unwrap();

        let report = scanner.scan_target("example.com").await;

        assert_eq!(report.successes(), 6);
        assert_eq!(report.domains.len(), 6);
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_target_is_normalized_before_scoping() {
        let scanner = Scanner::with_sources(
            quiet_config(),
            vec![static_source("static", vec![("example.com", vec!["www.example.com"])])],
        )
        .unwrap();

        let report = scanner.scan_target(" Example.COM. ").await;

        assert_eq!(report.target, "example.com");
        assert_eq!(report.domains, vec!["www.example.com"]);
    }

    /// Adds ten children for the root and sleeps on every call.
    struct FanOutSource;

    #[async_trait]
    impl Source for FanOutSource {
        fn name(&self) -> &str {
            "fanout"
        }

        fn info(&self) -> SourceInfo {
            SourceInfo {
                name: "fanout".to_string(),
                group: SourceGroup::Core,
                needs_key: false,
                scoped: true,
            }
        }

        async fn enumerate(&self, target: &str, sink: &DomainSink, _session: &Session) -> Result<()> {
            if target == "example.com" {
                for i in 0..10 {
                    sink.add(&format!("c{}.example.com", i));
                }
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_scan_deadline_covers_recursion() {
        let config = Config {
            source_timeout: Duration::from_secs(60),
            scan_timeout: Some(Duration::from_millis(250)),
            recursion: RecursionConfig {
                enabled: true,
                max_depth: 1,
                max_targets: 25,
            },
            ..quiet_config()
        };
        let scanner = Scanner::with_sources(config, vec![Arc::new(FanOutSource)]).unwrap();

        let report = scanner.scan_target("example.com").await;

        // Ten sequential child scans of 100ms each would take over a second.
        assert!(report.duration < Duration::from_millis(800));
        assert_eq!(report.domains.len(), 10);
        assert!(report.source_outcomes.len() < 11);
        assert!(report
            .source_outcomes
            .iter()
            .any(|o| matches!(&o.result, Err(f) if f.kind == FailureKind::Cancelled)));
    }
}
