//! Per-request shared state.
//!
//! One `SharedState` exists per request and is dropped with it. Every field
//! sits behind its own lock so sibling tasks in a parallel layer only contend
//! on what they actually touch.

use crate::aggregate::Decision;
use crate::core::{Report, TaskId};
use crate::error::{Error, Result};
use crate::workflow::{DebateRole, MAX_DEBATE_ROUNDS};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use super::DebateRecord;

/// Thread-safe state threaded through one request.
pub struct SharedState {
    reports: RwLock<HashMap<String, Report>>,
    tool_calls: Mutex<HashMap<TaskId, u32>>,
    source_health: RwLock<BTreeMap<String, bool>>,
    debate: Mutex<DebateRecord>,
    debate_round: Mutex<u32>,
    max_rounds: u32,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    decision: Mutex<Option<Decision>>,
}

impl SharedState {
    /// Fresh state for a request with `max_rounds` debate rounds.
    pub fn new(max_rounds: u32) -> Self {
        let max_rounds = max_rounds.min(MAX_DEBATE_ROUNDS);
        Self {
            reports: RwLock::new(HashMap::new()),
            tool_calls: Mutex::new(HashMap::new()),
            source_health: RwLock::new(BTreeMap::new()),
            debate: Mutex::new(DebateRecord::new(max_rounds)),
            debate_round: Mutex::new(0),
            max_rounds,
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            decision: Mutex::new(None),
        }
    }

    // ========== Reports ==========

    pub fn get_report(&self, key: &str) -> Option<Report> {
        self.reports.read().get(key).cloned()
    }

    /// Write the report for `key`. Each key is written exactly once.
    pub fn put_report(&self, key: &str, report: Report) -> Result<()> {
        let mut reports = self.reports.write();
        if reports.contains_key(key) {
            return Err(Error::DuplicateReport(key.to_string()));
        }
        reports.insert(key.to_string(), report);
        Ok(())
    }

    pub fn has_report(&self, key: &str) -> bool {
        self.reports.read().contains_key(key)
    }

    /// Snapshot of every report written so far.
    pub fn reports(&self) -> BTreeMap<String, Report> {
        self.reports
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    // ========== Tool-call counters ==========

    /// Increment the counter for `task` and return the new count.
    ///
    /// This is the only mutator; counters never decrease.
    pub fn increment_tool_calls(&self, task: &TaskId) -> u32 {
        let mut calls = self.tool_calls.lock();
        let count = calls.entry(task.clone()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Whether `task` has used its allowance of `limit` calls.
    pub fn is_over_limit(&self, task: &TaskId, limit: u32) -> bool {
        self.tool_calls(task) >= limit
    }

    pub fn tool_calls(&self, task: &TaskId) -> u32 {
        self.tool_calls.lock().get(task).copied().unwrap_or(0)
    }

    pub fn all_tool_calls(&self) -> BTreeMap<String, u32> {
        self.tool_calls
            .lock()
            .iter()
            .map(|(id, n)| (id.to_string(), *n))
            .collect()
    }

    // ========== Source health ==========

    pub fn set_source_health(&self, source: &str, healthy: bool) {
        self.source_health.write().insert(source.to_string(), healthy);
    }

    /// Health flag for `source`. Sources never probed count as healthy.
    pub fn is_source_healthy(&self, source: &str) -> bool {
        self.source_health.read().get(source).copied().unwrap_or(true)
    }

    pub fn source_health(&self) -> BTreeMap<String, bool> {
        self.source_health.read().clone()
    }

    // ========== Debate ==========

    /// Enter the next debate round and return its number.
    pub fn advance_debate_round(&self) -> Result<u32> {
        let mut round = self.debate_round.lock();
        if *round >= self.max_rounds {
            return Err(Error::Validation(format!(
                "debate round {} exceeds maximum of {}",
                *round + 1,
                self.max_rounds
            )));
        }
        *round += 1;
        Ok(*round)
    }

    pub fn debate_round(&self) -> u32 {
        *self.debate_round.lock()
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    pub fn append_debate(&self, round: u32, role: DebateRole, report: Report) -> Result<()> {
        self.debate.lock().append(round, role, report)
    }

    /// Rendered transcript of the debate so far.
    pub fn debate_transcript(&self) -> String {
        self.debate.lock().transcript()
    }

    pub fn debate_len(&self) -> usize {
        self.debate.lock().len()
    }

    /// Remove and return the debate record, leaving an empty one behind.
    pub fn take_debate(&self) -> DebateRecord {
        let mut debate = self.debate.lock();
        std::mem::replace(&mut *debate, DebateRecord::new(self.max_rounds))
    }

    // ========== Cache accounting ==========

    pub fn record_cache_lookup(&self, hit: bool) {
        let counter = if hit {
            &self.cache_hits
        } else {
            &self.cache_misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    // ========== Decision ==========

    pub fn set_decision(&self, decision: Decision) {
        *self.decision.lock() = Some(decision);
    }

    pub fn take_decision(&self) -> Option<Decision> {
        self.decision.lock().take()
    }
}

impl std::fmt::Debug for SharedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedState")
            .field("reports", &self.reports.read().len())
            .field("debate_round", &self.debate_round())
            .field("max_rounds", &self.max_rounds)
            .finish()
    }
}
