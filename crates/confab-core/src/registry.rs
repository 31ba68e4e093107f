//! IV uniqueness registry.
//!
//! One registry backs both directions of a session: sealing consults it to
//! avoid reusing an IV, opening consults it to reject replays. Entries are
//! never removed individually.
//!
//! # Capacity
//!
//! An unbounded registry grows by one entry per recipient per sealed message
//! and one per opened message for the lifetime of the session. A capacity
//! limit evicts the oldest IVs first; an evicted IV is no longer recognized as
//! a replay, so the limit should cover the traffic a session can plausibly
//! see.

use std::{
    collections::{HashSet, VecDeque},
    num::NonZeroUsize,
    sync::{Mutex, PoisonError},
};

/// Set of IV encodings already used or seen.
///
/// Thread-safe. [`add`](Self::add) is an atomic check-and-insert.
#[derive(Debug, Default)]
pub struct IvRegistry {
    state: Mutex<RegistryState>,
    limit: Option<NonZeroUsize>,
}

#[derive(Debug, Default)]
struct RegistryState {
    seen: HashSet<String>,
    /// Insertion order, tracked only when a limit is set
    order: VecDeque<String>,
}

impl IvRegistry {
    /// Create an unbounded registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry that keeps at most `limit` IVs, evicting the oldest.
    pub fn with_capacity_limit(limit: NonZeroUsize) -> Self {
        Self { state: Mutex::default(), limit: Some(limit) }
    }

    /// Configured limit, if any.
    pub fn capacity_limit(&self) -> Option<NonZeroUsize> {
        self.limit
    }

    /// Check if `iv` has been recorded.
    pub fn contains(&self, iv: &str) -> bool {
        self.lock().seen.contains(iv)
    }

    /// Record `iv`.
    ///
    /// Returns `true` if the IV was new, `false` if it was already present.
    /// The check and the insert happen under one lock, so two concurrent
    /// callers can never both observe the same IV as new.
    pub fn add(&self, iv: &str) -> bool {
        let mut state = self.lock();
        if state.seen.contains(iv) {
            return false;
        }

        state.seen.insert(iv.to_string());

        if let Some(limit) = self.limit {
            state.order.push_back(iv.to_string());
            while state.order.len() > limit.get() {
                if let Some(evicted) = state.order.pop_front() {
                    state.seen.remove(&evicted);
                }
            }
        }

        true
    }

    /// Number of recorded IVs.
    pub fn len(&self) -> usize {
        self.lock().seen.len()
    }

    /// Check if no IV has been recorded.
    pub fn is_empty(&self) -> bool {
        self.lock().seen.is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryState> {
        // Every mutation leaves the set consistent, so a poisoned lock is
        // still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
