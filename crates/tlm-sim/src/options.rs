//! Run options: thread count, scheduling strategy and node logging.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// How the components of one stage are spread over threads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerStrategy {
    /// One thread, S → C → Q → N in declared order.
    #[default]
    Serial,
    /// Components dealt round-robin to threads once per run.
    StaticPartition,
    /// Per-thread queues; idle threads steal from the back of a neighbour's.
    WorkStealing,
    /// Each stage handed to a rayon pool.
    TaskPool,
}

impl SchedulerStrategy {
    pub const ALL: [SchedulerStrategy; 4] = [
        SchedulerStrategy::Serial,
        SchedulerStrategy::StaticPartition,
        SchedulerStrategy::WorkStealing,
        SchedulerStrategy::TaskPool,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SchedulerStrategy::Serial => "serial",
            SchedulerStrategy::StaticPartition => "static_partition",
            SchedulerStrategy::WorkStealing => "work_stealing",
            SchedulerStrategy::TaskPool => "task_pool",
        }
    }

    pub fn is_parallel(self) -> bool {
        !matches!(self, SchedulerStrategy::Serial)
    }
}

impl fmt::Display for SchedulerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SchedulerStrategy {
    type Err = SimError;

    fn from_str(s: &str) -> SimResult<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.label() == normalized)
            .ok_or(SimError::InvalidArg {
                what: "unknown scheduler strategy",
            })
    }
}

/// Options for simulation runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimOptions {
    /// Worker threads; 0 picks `available_parallelism`.
    pub threads: usize,
    /// Scheduling strategy
    pub strategy: SchedulerStrategy,
    /// Record node values every step
    pub log_samples: bool,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            threads: 0,
            strategy: SchedulerStrategy::default(),
            log_samples: true,
        }
    }
}

impl SimOptions {
    pub fn serial() -> Self {
        Self::default()
    }

    pub fn parallel(strategy: SchedulerStrategy, threads: usize) -> Self {
        Self {
            threads,
            strategy,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> SimResult<()> {
        if self.threads > MAX_THREADS {
            return Err(SimError::InvalidArg {
                what: "thread count is unreasonably large",
            });
        }
        Ok(())
    }

    /// Threads a run will use: the explicit request, or the detected core
    /// count for 0. Serial runs always use one.
    pub fn effective_threads(&self) -> usize {
        if !self.strategy.is_parallel() {
            return 1;
        }
        match self.threads {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n,
        }
    }
}

const MAX_THREADS: usize = 4096;
