use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::{Result, SpindleError};
use crate::scheduler::heap::TimeQueue;
use crate::scheduler::job::{Job, TemporalState};

/// The half-open interval `[start, end)` that identifies a spoke.
///
/// Two trigger times share a bound iff they fall into the same
/// `spoke_span`-wide slot counted from the Unix epoch, which makes the
/// mapping from a trigger time to its bound deterministic and O(1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpokeBound {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl SpokeBound {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        debug_assert!(start < end, "spoke bound must have start < end");
        Self { start, end }
    }

    /// The unique bound of width `span` containing `at`, anchored at the
    /// Unix epoch. `div_euclid` keeps the floor correct for pre-epoch
    /// instants.
    pub fn containing(at: DateTime<Utc>, span: Duration) -> Self {
        let span_ms = (span.as_millis() as i64).max(1);
        let start_ms = at.timestamp_millis().div_euclid(span_ms) * span_ms;
        let start = DateTime::from_timestamp_millis(start_ms).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let end = DateTime::from_timestamp_millis(start_ms + span_ms)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self { start, end }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

impl std::fmt::Display for SpokeBound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// A bounded time window holding a min-heap of jobs due within that window,
/// keyed by trigger time.
///
/// The heap is guarded by the spoke's own lock; the hub takes it after its
/// own lock, never the other way around.
#[derive(Debug)]
pub struct Spoke {
    id: Uuid,
    bound: SpokeBound,
    jobs: Mutex<TimeQueue<Job>>,
}

impl Spoke {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self::from_bound(SpokeBound::new(start, end))
    }

    pub fn from_bound(bound: SpokeBound) -> Self {
        Self {
            id: Uuid::new_v4(),
            bound,
            jobs: Mutex::new(TimeQueue::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn bound(&self) -> SpokeBound {
        self.bound
    }

    /// Accepts the job iff its trigger time falls within this spoke's bound.
    pub fn add_job(&self, job: Job) -> Result<()> {
        if !self.bound.contains(job.trigger_at()) {
            return Err(SpindleError::WrongBound {
                job_id: job.id().to_string(),
                bound: self.bound.to_string(),
            });
        }
        let mut jobs = self.jobs.lock();
        jobs.push(job.trigger_at(), job);
        Ok(())
    }

    /// Pops and returns the head job if its trigger time has arrived.
    /// Returns `None` without mutating the heap otherwise. A returned job is
    /// owned by the caller.
    pub fn next(&self) -> Option<Job> {
        let now = Utc::now();
        let mut jobs = self.jobs.lock();
        if jobs.peek()?.at() > now {
            return None;
        }
        jobs.pop()
    }

    /// Removes the job with the given id, head or not.
    pub fn cancel_job(&self, id: &str) -> Result<()> {
        let mut jobs = self.jobs.lock();
        jobs.remove_first(|job| job.id() == id)
            .map(|_| ())
            .ok_or_else(|| SpindleError::JobNotFound(id.to_string()))
    }

    pub fn owns_job(&self, id: &str) -> bool {
        self.jobs.lock().iter().any(|item| item.value().id() == id)
    }

    pub fn pending_jobs_len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn temporal_state(&self, now: DateTime<Utc>) -> TemporalState {
        if self.bound.end <= now {
            TemporalState::Past
        } else if self.bound.start <= now {
            TemporalState::Current
        } else {
            TemporalState::Future
        }
    }

    /// An expired spoke no longer covers any future instant; once it is also
    /// empty it is eligible for pruning.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.temporal_state(now) == TemporalState::Past
    }
}
