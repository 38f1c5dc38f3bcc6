//! pod-reaper library.
//!
//! Periodically lists pods, reaps those that match every configured rule and
//! explains why. The binary is a thin wrapper; the library surface exists for
//! integration testing and reuse.
//!
//! ## Architecture
//!
//! - **Options**: validated once at startup from environment variables
//! - **Store**: list, delete and evict, backed by the Kubernetes API or memory
//! - **Reaper**: one cycle of retrieval, filtering, ordering and capped reaping
//! - **Worker**: drives cycles from a schedule until shutdown or the run
//!   duration elapses

pub mod config;
pub mod error;
pub mod kube;
pub mod reaper;
pub mod report;
pub mod schedule;
pub mod sort;
pub mod store;
pub mod worker;

pub use config::{Config, LogConfig, LogFormat, Options};
pub use error::{ConfigError, ReaperError, ReaperResult, ScheduleError, StoreError, StoreResult};
pub use kube::{KubeClient, KubeConfig};
pub use reaper::{CycleStats, ReapOutcome, Reaper};
pub use report::{MemoryReapLog, ReapEvent, ReapLog, ReapRecord, TracingReapLog};
pub use schedule::{Schedule, Ticker};
pub use sort::{sort_pods, SortStrategy};
pub use store::{InMemoryPodStore, PodStore, ReapAction, TerminationCall};
pub use worker::{ReapWorker, RunSummary};
