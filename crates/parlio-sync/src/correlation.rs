// SPDX-FileCopyrightText: 2026 Parlio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job-to-thread correlation.
//!
//! A generation job is ephemeral: it exists from launch until its stream ends,
//! and lives only in this registry -- never in the store. Lookup is
//! best-effort by contract: an event referencing an unknown job is dropped by
//! the processor, not treated as a fault.

use dashmap::DashMap;
use parlio_core::{JobId, ThreadId};
use tracing::debug;

/// Tracks which thread each live generation job belongs to.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: DashMap<JobId, ThreadId>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `job` generates into `thread`. Called at launch time.
    pub fn register(&self, job: JobId, thread: ThreadId) {
        debug!(job_id = %job, thread_id = %thread, "job registered");
        self.jobs.insert(job, thread);
    }

    /// Resolves the owning thread, if the job is tracked.
    pub fn resolve(&self, job: &JobId) -> Option<ThreadId> {
        self.jobs.get(job).map(|entry| entry.value().clone())
    }

    /// Forgets a finished job.
    pub fn release(&self, job: &JobId) {
        if self.jobs.remove(job).is_some() {
            debug!(job_id = %job, "job released");
        }
    }

    /// Drops every tracked job. Called at session teardown.
    pub fn clear(&self) {
        self.jobs.clear();
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
