//! Application state shared across handlers.

use std::time::SystemTime;

use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

use crate::config::{LlmConfig, ServerConfig};

/// State behind the HTTP surface: configuration plus the registry of runs
/// currently in flight.
pub struct AppState {
    pub config: ServerConfig,
    pub llm: LlmConfig,
    runs: DashMap<Uuid, RunInfo>,
}

#[derive(Debug, Clone)]
pub struct RunInfo {
    pub url: String,
    pub is_live: bool,
    pub started_at: SystemTime,
}

/// One row of the `/streams` listing.
#[derive(Debug, Serialize)]
pub struct ActiveRunInfo {
    pub run_id: String,
    pub url: String,
    pub is_live: bool,
    pub running_secs: u64,
}

impl AppState {
    pub fn new(config: ServerConfig, llm: LlmConfig) -> Self {
        Self {
            config,
            llm,
            runs: DashMap::new(),
        }
    }

    /// Register a run and get its id back, or `None` when the server is at
    /// its concurrent-run capacity.
    pub fn try_register_run(&self, url: &str, is_live: bool) -> Option<Uuid> {
        // DashMap has no compare-and-insert across the whole map, so the
        // check is racy under simultaneous connects; the limit is a soft
        // overload guard, not a hard invariant.
        if self.runs.len() >= self.config.max_concurrent_runs {
            return None;
        }
        let run_id = Uuid::new_v4();
        self.runs.insert(
            run_id,
            RunInfo {
                url: url.to_string(),
                is_live,
                started_at: SystemTime::now(),
            },
        );
        Some(run_id)
    }

    pub fn remove_run(&self, run_id: Uuid) {
        self.runs.remove(&run_id);
    }

    pub fn active_run_count(&self) -> usize {
        self.runs.len()
    }

    pub fn active_runs(&self) -> Vec<ActiveRunInfo> {
        self.runs
            .iter()
            .map(|entry| ActiveRunInfo {
                run_id: entry.key().to_string(),
                url: entry.value().url.clone(),
                is_live: entry.value().is_live,
                running_secs: entry
                    .value()
                    .started_at
                    .elapsed()
                    .map(|d| d.as_secs())
                    .unwrap_or(0),
            })
            .collect()
    }
}
