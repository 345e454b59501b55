// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Registry counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counters updated by both registry contexts
#[derive(Debug, Default)]
pub struct RegistryStats {
    admitted: AtomicU64,
    bypassed: AtomicU64,
    redirects_reused: AtomicU64,
    decisions_delivered: AtomicU64,
    decisions_rejected: AtomicU64,
    jobs_finished: AtomicU64,
}

/// Point-in-time copy of [`RegistryStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsReport {
    /// Requests handed to a job
    pub admitted: u64,
    /// Requests that proceeded un-intercepted
    pub bypassed: u64,
    /// Admissions that reused an id from a redirect
    pub redirects_reused: u64,
    /// Decisions handed to a job
    pub decisions_delivered: u64,
    /// Decisions refused (malformed or unknown id)
    pub decisions_rejected: u64,
    /// Ids retired
    pub jobs_finished: u64,
}

impl RegistryStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_admitted(&self, is_redirect: bool) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
        if is_redirect {
            self.redirects_reused.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_bypassed(&self) {
        self.bypassed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decision(&self, delivered: bool) {
        if delivered {
            self.decisions_delivered.fetch_add(1, Ordering::Relaxed);
        } else {
            self.decisions_rejected.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_job_finished(&self) {
        self.jobs_finished.fetch_add(1, Ordering::Relaxed);
    }

    pub fn report(&self) -> StatsReport {
        StatsReport {
            admitted: self.admitted.load(Ordering::Relaxed),
            bypassed: self.bypassed.load(Ordering::Relaxed),
            redirects_reused: self.redirects_reused.load(Ordering::Relaxed),
            decisions_delivered: self.decisions_delivered.load(Ordering::Relaxed),
            decisions_rejected: self.decisions_rejected.load(Ordering::Relaxed),
            jobs_finished: self.jobs_finished.load(Ordering::Relaxed),
        }
    }
}

impl StatsReport {
    /// Ids admitted but not yet retired
    pub fn in_flight(&self) -> u64 {
        (self.admitted - self.redirects_reused).saturating_sub(self.jobs_finished)
    }
}
