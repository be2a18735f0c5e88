//! Ingestion scheduler.
//!
//! Each tick dispatches one fetch per watchlist symbol onto a bounded worker
//! pool. Workers push results onto the shared queue; a full queue blocks the
//! worker. A tick ends once every fetch it dispatched has been enqueued, and
//! an overrunning tick delays the next one instead of overlapping it.

use std::sync::Arc;
use std::time::{Duration, Instant};
use surveil_core::{Snapshot, Symbol};
use surveil_source::{SourceClient, SourceResult};
use surveil_telemetry::Metrics;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// One fetch result travelling from a worker to the consumer.
#[derive(Debug)]
pub struct FetchItem {
    pub symbol: Symbol,
    pub result: SourceResult<Snapshot>,
}

/// Scheduler tuning.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub polling_interval: Duration,
    pub pool_size: usize,
    pub shutdown_grace: Duration,
    /// Order-book levels fetched with each quote; 0 fetches quotes only.
    pub book_depth: usize,
}

/// Counters reported when the scheduler stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub dispatched: u64,
    /// Fetches still running when the shutdown grace expired.
    pub aborted: u64,
}

/// Periodic fan-out of watchlist fetches.
pub struct Scheduler {
    config: SchedulerConfig,
    client: Arc<SourceClient>,
    watchlist: Vec<Symbol>,
    tx: mpsc::Sender<FetchItem>,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        client: Arc<SourceClient>,
        watchlist: Vec<Symbol>,
        tx: mpsc::Sender<FetchItem>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            client,
            watchlist,
            tx,
            cancel,
        }
    }

    /// Run until cancelled.
    ///
    /// Consumes the scheduler so its queue sender is dropped on return,
    /// which lets the consumer drain the queue and stop.
    pub async fn run(self) -> SchedulerStats {
        let mut stats = SchedulerStats::default();
        let semaphore = Arc::new(Semaphore::new(self.config.pool_size.max(1)));
        let mut interval = tokio::time::interval(self.config.polling_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            symbols = self.watchlist.len(),
            pool_size = self.config.pool_size,
            interval_ms = self.config.polling_interval.as_millis() as u64,
            "Scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            let started = Instant::now();
            stats.ticks += 1;
            let mut tasks = JoinSet::new();

            for symbol in &self.watchlist {
                let permit = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break,
                    permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };

                let client = Arc::clone(&self.client);
                let tx = self.tx.clone();
                let symbol = symbol.clone();
                let book_depth = self.config.book_depth;
                tasks.spawn(async move {
                    let result = client.fetch_with_book(&symbol, book_depth).await;
                    // Hold the permit until the item is queued: backpressure
                    // from a full queue also throttles dispatch.
                    if tx.send(FetchItem { symbol, result }).await.is_err() {
                        debug!("Queue closed, dropping fetch result");
                    }
                    drop(permit);
                });
                stats.dispatched += 1;
            }

            let aborted = self.finish_tick(&mut tasks).await;
            stats.aborted += aborted;

            let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;
            Metrics::tick_duration(elapsed_ms);
            Metrics::queue_depth((self.tx.max_capacity() - self.tx.capacity()) as i64);
            trace!(tick = stats.ticks, elapsed_ms, "Tick complete");

            if self.cancel.is_cancelled() {
                break;
            }
        }

        info!(
            ticks = stats.ticks,
            dispatched = stats.dispatched,
            aborted = stats.aborted,
            "Scheduler stopped"
        );
        stats
    }

    /// Wait for this tick's fetches. On cancellation, give them the shutdown
    /// grace and abort whatever is still running. Returns the abort count.
    async fn finish_tick(&self, tasks: &mut JoinSet<()>) -> u64 {
        loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    None => return 0,
                    Some(Err(e)) if e.is_panic() => warn!(error = %e, "Fetch task panicked"),
                    Some(_) => {}
                },
                _ = self.cancel.cancelled() => break,
            }
        }

        let grace = tokio::time::sleep(self.config.shutdown_grace);
        tokio::pin!(grace);
        loop {
            tokio::select! {
                joined = tasks.join_next() => {
                    if joined.is_none() {
                        return 0;
                    }
                }
                _ = &mut grace => {
                    let remaining = tasks.len() as u64;
                    warn!(remaining, "Shutdown grace expired, aborting in-flight fetches");
                    tasks.abort_all();
                    while tasks.join_next().await.is_some() {}
                    return remaining;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use surveil_source::{BoxFuture, FetchOutcome, QuoteProvider, RateLimiter};

    struct SlowProvider {
        delay: Duration,
        calls: Arc<AtomicUsize>,
    }

    impl QuoteProvider for SlowProvider {
        fn id(&self) -> &str {
            "slow"
        }

        fn fetch<'a>(&'a self, symbol: &'a Symbol) -> BoxFuture<'a, FetchOutcome> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(self.delay).await;
                FetchOutcome::Success(Snapshot::new(
                    symbol.clone(),
                    Utc::now(),
                    dec!(10),
                    dec!(100),
                    "slow",
                ))
            })
        }
    }

    fn client(delay: Duration, calls: Arc<AtomicUsize>) -> Arc<SourceClient> {
        Arc::new(SourceClient::new(Duration::from_secs(5)).with_provider(
            Arc::new(SlowProvider { delay, calls }),
            RateLimiter::new(10_000, 60),
        ))
    }

    fn watchlist(n: usize) -> Vec<Symbol> {
        (0..n).map(|i| Symbol::new(format!("S{i}"))).collect()
    }

    #[tokio::test]
    async fn test_one_fetch_per_symbol_per_tick() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let scheduler = Scheduler::new(
            SchedulerConfig {
                polling_interval: Duration::from_secs(3600),
                pool_size: 2,
                shutdown_grace: Duration::from_secs(1),
                book_depth: 0,
            },
            client(Duration::from_millis(1), calls.clone()),
            watchlist(5),
            tx,
            cancel.clone(),
        );
        let handle = tokio::spawn(scheduler.run());

        let mut received = Vec::new();
        for _ in 0..5 {
            let item = rx.recv().await.unwrap();
            assert!(item.result.is_ok());
            received.push(item.symbol);
        }
        received.sort();
        assert_eq!(received, watchlist(5));

        cancel.cancel();
        let stats = handle.await.unwrap();
        assert_eq!(stats.ticks, 1);
        assert_eq!(stats.dispatched, 5);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        // Sender dropped with the scheduler.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_pool_bounds_concurrency() {
        struct Gauge {
            current: AtomicUsize,
            peak: AtomicUsize,
        }
        struct GaugedProvider(Arc<Gauge>);

        impl QuoteProvider for GaugedProvider {
            fn id(&self) -> &str {
                "gauged"
            }

            fn fetch<'a>(&'a self, symbol: &'a Symbol) -> BoxFuture<'a, FetchOutcome> {
                Box::pin(async move {
                    let now = self.0.current.fetch_add(1, Ordering::SeqCst) + 1;
                    self.0.peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    self.0.current.fetch_sub(1, Ordering::SeqCst);
                    FetchOutcome::Success(Snapshot::new(
                        symbol.clone(),
                        Utc::now(),
                        dec!(10),
                        dec!(100),
                        "gauged",
                    ))
                })
            }
        }

        let gauge = Arc::new(Gauge {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let client = Arc::new(SourceClient::new(Duration::from_secs(5)).with_provider(
            Arc::new(GaugedProvider(gauge.clone())),
            RateLimiter::new(10_000, 60),
        ));
        let (tx, mut rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(
            Scheduler::new(
                SchedulerConfig {
                    polling_interval: Duration::from_secs(3600),
                    pool_size: 3,
                    shutdown_grace: Duration::from_secs(1),
                    book_depth: 0,
                },
                client,
                watchlist(9),
                tx,
                cancel.clone(),
            )
            .run(),
        );

        for _ in 0..9 {
            rx.recv().await.unwrap();
        }
        cancel.cancel();
        handle.await.unwrap();
        assert!(gauge.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_shutdown_aborts_after_grace() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, _rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(
            Scheduler::new(
                SchedulerConfig {
                    polling_interval: Duration::from_secs(3600),
                    pool_size: 4,
                    shutdown_grace: Duration::from_millis(50),
                    book_depth: 0,
                },
                client(Duration::from_secs(30), calls.clone()),
                watchlist(2),
                tx,
                cancel.clone(),
            )
            .run(),
        );

        while calls.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cancel.cancel();
        let stats = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.aborted, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
