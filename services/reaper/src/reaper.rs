//! Reap cycle orchestration.
//!
//! One cycle lists candidate pods, filters and orders them, evaluates the rule
//! set against each, and terminates matches one at a time up to the cap.

use std::sync::{Arc, Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::SeedableRng;
use reaper_pod::Pod;
use reaper_rules::{ReapReason, Verdict};
use tracing::{info, instrument};

use crate::config::Options;
use crate::error::{ReaperError, ReaperResult};
use crate::report::{ReapEvent, ReapLog};
use crate::sort::sort_pods;
use crate::store::{PodStore, ReapAction};

/// What happened to a single matching pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReapOutcome {
    Reaped,
    WouldReap,
    CapReached,
    Failed,
}

/// Statistics from one reap cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Pods returned by the store, after the annotation filter.
    pub candidates: usize,
    /// Pods every rule voted to reap.
    pub matched: usize,
    /// Pods terminated, or selected in dry run.
    pub reaped: usize,
    /// Matching pods left alone because the cap was reached.
    pub skipped: usize,
    /// Termination requests that failed.
    pub failed: usize,
}

impl CycleStats {
    fn record(&mut self, outcome: ReapOutcome) {
        match outcome {
            ReapOutcome::Reaped | ReapOutcome::WouldReap => self.reaped += 1,
            ReapOutcome::CapReached => self.skipped += 1,
            ReapOutcome::Failed => self.failed += 1,
        }
    }
}

/// Decides which pods to reap and reaps them.
pub struct Reaper {
    store: Arc<dyn PodStore>,
    options: Options,
    log: Arc<dyn ReapLog>,
    rng: Mutex<StdRng>,
}

impl Reaper {
    pub fn new(store: Arc<dyn PodStore>, options: Options, log: Arc<dyn ReapLog>) -> Self {
        Self {
            store,
            options,
            log,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Use `rng` for the random sorting strategy.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// List candidate pods, drop those failing the annotation requirement and
    /// order the rest.
    ///
    /// A listing failure is returned as [`ReaperError::Retrieval`]; it is never
    /// treated as an empty fleet.
    pub async fn get_pods(&self) -> ReaperResult<Vec<Pod>> {
        let selector = self.options.label_selector();
        let mut pods = self
            .store
            .list(&self.options.namespace, &selector)
            .await
            .map_err(ReaperError::Retrieval)?;

        if let Some(requirement) = &self.options.annotation_requirement {
            pods.retain(|pod| requirement.matches(&pod.metadata.annotations));
        }

        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        sort_pods(&mut pods, self.options.sorting, &mut *rng);
        Ok(pods)
    }

    /// Run one full pass over the current pods.
    #[instrument(skip(self), fields(namespace = %self.options.namespace))]
    pub async fn reap_cycle(&self) -> ReaperResult<CycleStats> {
        let pods = self.get_pods().await?;
        let mut stats = CycleStats {
            candidates: pods.len(),
            ..CycleStats::default()
        };

        for pod in &pods {
            let Verdict::Reap(reasons) = self.options.rules.should_reap(pod) else {
                continue;
            };
            stats.matched += 1;
            let outcome = self.reap(pod, &reasons, stats.reaped).await;
            stats.record(outcome);
        }

        info!(
            candidates = stats.candidates,
            matched = stats.matched,
            reaped = stats.reaped,
            skipped = stats.skipped,
            failed = stats.failed,
            dry_run = self.options.dry_run,
            "Reap cycle complete"
        );
        Ok(stats)
    }

    /// Reap one matching pod, given how many were already reaped this cycle.
    ///
    /// The cap applies in dry run too. A failed request is reported and does
    /// not take a slot.
    pub async fn reap(&self, pod: &Pod, reasons: &[ReapReason], reaped: usize) -> ReapOutcome {
        let cap = self.options.max_pods;
        if cap > 0 && reaped >= cap {
            self.log.record(ReapEvent::CapReached { pod, cap });
            return ReapOutcome::CapReached;
        }

        if self.options.dry_run {
            self.log.record(ReapEvent::WouldReap { pod, reasons });
            return ReapOutcome::WouldReap;
        }

        let grace_period = self.options.grace_period;
        let (action, result) = if self.options.evict {
            let result = self
                .store
                .evict(pod.namespace(), pod.name(), grace_period)
                .await;
            (ReapAction::Evict, result)
        } else {
            let result = self
                .store
                .delete(pod.namespace(), pod.name(), grace_period)
                .await;
            (ReapAction::Delete, result)
        };

        match result {
            Ok(()) => {
                self.log.record(ReapEvent::Reaped {
                    pod,
                    action,
                    reasons,
                });
                ReapOutcome::Reaped
            }
            Err(error) => {
                self.log.record(ReapEvent::Failed {
                    pod,
                    action,
                    error: &error,
                });
                ReapOutcome::Failed
            }
        }
    }
}
