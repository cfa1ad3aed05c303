use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::scheduler::spoke::SpokeBound;

/// Where an object sits relative to a given wall-clock instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalState {
    Past,
    Current,
    Future,
}

impl std::fmt::Display for TemporalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemporalState::Past => write!(f, "past"),
            TemporalState::Current => write!(f, "current"),
            TemporalState::Future => write!(f, "future"),
        }
    }
}

/// A unit of delayed work: an opaque id, the instant it becomes deliverable,
/// and an opaque body the broker never inspects.
///
/// `priority` and `ttr` are advisory; ordering is by trigger time only.
/// Immutable once inserted into a spoke or the reservation table.
#[derive(Debug, Clone)]
pub struct Job {
    id: String,
    trigger_at: DateTime<Utc>,
    body: Vec<u8>,
    priority: i32,
    ttr: Duration,
}

impl Job {
    pub fn new(id: String, trigger_at: DateTime<Utc>, body: Vec<u8>) -> Self {
        Self {
            id,
            trigger_at,
            body,
            priority: 0,
            ttr: Duration::ZERO,
        }
    }

    /// Construct with a generated universally unique id.
    pub fn new_auto_id(trigger_at: DateTime<Utc>, body: Vec<u8>) -> Self {
        Self::new(Uuid::new_v4().to_string(), trigger_at, body)
    }

    /// Set the advisory fields. Only legal before the job has been inserted
    /// into any container.
    pub fn set_opts(&mut self, priority: i32, ttr: Duration) {
        self.priority = priority;
        self.ttr = ttr;
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn trigger_at(&self) -> DateTime<Utc> {
        self.trigger_at
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn ttr(&self) -> Duration {
        self.ttr
    }

    /// A job is `Past` (deliverable) once its trigger time has arrived;
    /// otherwise it is `Future`. Jobs are never `Current`.
    pub fn temporal_state(&self, now: DateTime<Utc>) -> TemporalState {
        if self.trigger_at <= now {
            TemporalState::Past
        } else {
            TemporalState::Future
        }
    }

    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.temporal_state(now) == TemporalState::Past
    }

    /// The unique spoke bound of width `span` containing this job's trigger
    /// time. Bounds are anchored at the Unix epoch so that every process
    /// maps the same trigger time to the same bound.
    pub fn as_bound(&self, span: Duration) -> SpokeBound {
        SpokeBound::containing(self.trigger_at, span)
    }
}
