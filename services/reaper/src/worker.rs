//! Scheduling loop.
//!
//! Waits for each schedule tick and runs one reap cycle to completion before
//! waiting again, so cycles never overlap.

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{info, instrument};

use crate::error::ReaperResult;
use crate::reaper::Reaper;

/// Totals over every cycle the worker ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub reaped: u64,
}

/// Drives a [`Reaper`] on its configured schedule.
pub struct ReapWorker {
    reaper: Reaper,
}

async fn deadline_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl ReapWorker {
    pub fn new(reaper: Reaper) -> Self {
        Self { reaper }
    }

    pub fn reaper(&self) -> &Reaper {
        &self.reaper
    }

    /// Run until the run duration elapses or shutdown is signaled.
    ///
    /// Both are checked only between cycles, so a cycle in flight always
    /// finishes. The first retrieval error stops the loop and is returned.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> ReaperResult<RunSummary> {
        let options = self.reaper.options();
        let run_duration = options.run_duration;
        info!(
            schedule = %options.schedule,
            run_duration = ?run_duration,
            dry_run = options.dry_run,
            "Starting reap worker"
        );

        let deadline = run_duration.map(|d| Instant::now() + d);
        let mut ticker = options.schedule.ticker();
        let mut summary = RunSummary::default();

        loop {
            // A tick missed during a long cycle is ready at once; the deadline
            // and shutdown must win over it.
            tokio::select! {
                biased;

                _ = deadline_elapsed(deadline) => {
                    info!("Run duration elapsed, stopping reap worker");
                    break;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Reap worker shutting down");
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            let stats = self.reaper.reap_cycle().await?;
            summary.cycles += 1;
            summary.reaped += stats.reaped as u64;
        }

        info!(cycles = summary.cycles, reaped = summary.reaped, "Reap worker stopped");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use crate::error::StoreResult;
    use crate::report::MemoryReapLog;
    use crate::store::{InMemoryPodStore, PodStore};
    use async_trait::async_trait;
    use reaper_pod::{LabelSelector, Pod};
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    fn options(schedule: &str, run_duration: Option<&str>) -> Options {
        let mut source = BTreeMap::from([
            ("CHAOS_CHANCE", "1.0"),
            ("SCHEDULE", schedule),
        ]);
        if let Some(run_duration) = run_duration {
            source.insert("RUN_DURATION", run_duration);
        }
        Options::from_source(&source).unwrap()
    }

    fn worker(schedule: &str, run_duration: Option<&str>) -> (ReapWorker, Arc<InMemoryPodStore>) {
        let store = Arc::new(InMemoryPodStore::new([Pod::new("a", "default")]));
        let reaper = Reaper::new(
            store.clone(),
            options(schedule, run_duration),
            Arc::new(MemoryReapLog::new()),
        );
        (ReapWorker::new(reaper), store)
    }

    /// Store whose listing takes longer than the schedule period.
    struct SlowStore {
        latency: Duration,
    }

    #[async_trait]
    impl PodStore for SlowStore {
        async fn list(&self, _: &str, _: &LabelSelector) -> StoreResult<Vec<Pod>> {
            tokio::time::sleep(self.latency).await;
            Ok(Vec::new())
        }

        async fn delete(&self, _: &str, _: &str, _: Option<i64>) -> StoreResult<()> {
            Ok(())
        }

        async fn evict(&self, _: &str, _: &str, _: Option<i64>) -> StoreResult<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_before_first_tick() {
        let (worker, store) = worker("@every 1h", None);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move { worker.run(shutdown_rx).await });
        tokio::time::sleep(Duration::from_secs(60)).await;
        shutdown_tx.send(true).unwrap();

        let summary = handle.await.unwrap().unwrap();
        assert_eq!(summary, RunSummary::default());
        assert_eq!(store.pods().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_duration_shorter_than_period() {
        let (worker, store) = worker("@every 1h", Some("30m"));
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let start = Instant::now();
        let summary = worker.run(shutdown_rx).await.unwrap();
        assert_eq!(summary.cycles, 0);
        assert_eq!(start.elapsed(), Duration::from_secs(1800));
        assert_eq!(store.pods().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_cycle_past_deadline_is_the_last() {
        for _ in 0..20 {
            let store = Arc::new(SlowStore {
                latency: Duration::from_secs(25),
            });
            let reaper = Reaper::new(
                store,
                options("@every 10s", Some("15s")),
                Arc::new(MemoryReapLog::new()),
            );
            let worker = ReapWorker::new(reaper);
            let (_shutdown_tx, shutdown_rx) = watch::channel(false);

            let start = Instant::now();
            let summary = worker.run(shutdown_rx).await.unwrap();
            assert_eq!(summary.cycles, 1);
            assert_eq!(start.elapsed(), Duration::from_secs(35));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_shutdown_sender_stops_worker() {
        let (worker, _store) = worker("@every 1h", None);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        drop(shutdown_tx);

        let summary = worker.run(shutdown_rx).await.unwrap();
        assert_eq!(summary.cycles, 0);
    }
}
