use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::{Result, SpindleError};
use crate::scheduler::heap::TimeQueue;
use crate::scheduler::job::{Job, TemporalState};
use crate::scheduler::spoke::{Spoke, SpokeBound};

const HUNDRED_YEARS_DAYS: i64 = 365 * 100;

/// Hub state guarded by the single coarse hub lock.
#[derive(Debug)]
struct HubInner {
    /// O(1) routing from a bound to its spoke. Holds every live spoke except
    /// the past spoke; the current spoke stays reachable under its bound key
    /// until it is drained and pruned.
    spoke_map: HashMap<SpokeBound, Arc<Spoke>>,
    /// Future/current spokes keyed by bound start, earliest first. The
    /// current spoke is popped out of here while consumers drain it.
    spokes: TimeQueue<Arc<Spoke>>,
    /// The spoke consumers are currently draining, if any.
    current_spoke: Option<Arc<Spoke>>,
    /// Jobs handed out by `next()` and not yet deleted.
    reserved_jobs: HashMap<String, Job>,
    removed_jobs_count: u64,
}

/// A time-ordered collection of spokes.
///
/// The hub partitions the future timeline into `spoke_span`-wide buckets so
/// that insertions and cancellations touch a single bucket and readiness
/// checks touch only the head bucket. Overdue jobs land in a permanent
/// hundred-year-wide past spoke that always has delivery priority.
#[derive(Debug)]
pub struct Hub {
    spoke_span: Duration,
    /// Permanently pinned to the past; never present in `spoke_map` or
    /// `spokes`.
    past_spoke: Arc<Spoke>,
    inner: Mutex<HubInner>,
}

impl Hub {
    /// Creates a hub whose adjacent spokes lie at `spoke_span` boundaries.
    pub fn new(spoke_span: Duration) -> Self {
        let now = Utc::now();
        let hundred_years = TimeDelta::days(HUNDRED_YEARS_DAYS);
        let past_spoke = Arc::new(Spoke::new(now - hundred_years, now + hundred_years));

        tracing::debug!(
            start = %past_spoke.bound().start(),
            end = %past_spoke.bound().end(),
            "created hub with past spoke"
        );

        Self {
            spoke_span,
            past_spoke,
            inner: Mutex::new(HubInner {
                spoke_map: HashMap::new(),
                spokes: TimeQueue::new(),
                current_spoke: None,
                reserved_jobs: HashMap::new(),
                removed_jobs_count: 0,
            }),
        }
    }

    pub fn spoke_span(&self) -> Duration {
        self.spoke_span
    }

    /// Adds a job to this hub. The hub never rejects a job for capacity
    /// reasons; a spoke refusing a routed job aborts the process.
    pub fn add_job(&self, job: Job) -> Result<()> {
        // Hub lock on both paths keeps every hub mutation behind one lock
        // and preserves the hub -> spoke lock order.
        let mut inner = self.inner.lock();

        match job.temporal_state(Utc::now()) {
            TemporalState::Past | TemporalState::Current => {
                tracing::debug!(job_id = %job.id(), "adding job to past spoke");
                self.checked_insert(&self.past_spoke, job);
            }
            TemporalState::Future => {
                if let Some(current) = inner.current_spoke.clone() {
                    if current.bound().contains(job.trigger_at()) {
                        self.checked_insert(&current, job);
                        return Ok(());
                    }
                }

                let bound = job.as_bound(self.spoke_span);
                if let Some(candidate) = inner.spoke_map.get(&bound).cloned() {
                    self.checked_insert(&candidate, job);
                    return Ok(());
                }

                // No spoke covers this bound yet; create and register one.
                let spoke = Arc::new(Spoke::from_bound(bound));
                self.checked_insert(&spoke, job);
                inner.spoke_map.insert(bound, Arc::clone(&spoke));
                inner.spokes.push(bound.start(), spoke);
            }
        }
        Ok(())
    }

    /// Routing always hands a spoke a job inside its bound, so a rejection
    /// means the hub's ordering state is corrupt. Crash fast rather than
    /// keep scheduling on top of it; a panic in a connection task would not
    /// take the process down.
    fn checked_insert(&self, spoke: &Spoke, job: Job) {
        if let Err(err) = spoke.add_job(job) {
            tracing::error!(error = %err, "spoke rejected a routed job, aborting");
            std::process::abort();
        }
    }

    /// Returns the next ready job, or `None` if nothing is deliverable yet.
    /// A returned job is recorded as reserved until it is cancelled.
    pub fn next(&self) -> Option<Job> {
        let mut inner = self.inner.lock();

        // Anything in the past spoke is overdue and goes out first.
        if let Some(job) = self.past_spoke.next() {
            tracing::debug!(job_id = %job.id(), "delivering job from past spoke");
            return Some(Self::reserve(&mut inner, job));
        }

        let now = Utc::now();

        // A drained, expired current spoke is pruned lazily on the consumer
        // path before a replacement is promoted.
        if let Some(current) = &inner.current_spoke {
            if current.pending_jobs_len() == 0 && current.temporal_state(now) == TemporalState::Past
            {
                tracing::debug!(bound = %current.bound(), "pruning drained current spoke");
                let bound = current.bound();
                inner.spoke_map.remove(&bound);
                inner.current_spoke = None;
            }
        }

        if inner.current_spoke.is_none() {
            let head_state = match inner.spokes.peek() {
                None => return None,
                Some(head) => head.value().temporal_state(now),
            };
            match head_state {
                // The earliest spoke hasn't opened yet; nothing is ready.
                TemporalState::Future => return None,
                TemporalState::Past | TemporalState::Current => {
                    inner.current_spoke = inner.spokes.pop();
                }
            }
        }

        let current = match inner.current_spoke.clone() {
            Some(current) => current,
            // The promotion above either returned or installed a spoke.
            None => panic!("hub has no current spoke after candidate promotion"),
        };

        let job = current.next()?;
        tracing::debug!(job_id = %job.id(), "reserving job");
        Some(Self::reserve(&mut inner, job))
    }

    fn reserve(inner: &mut HubInner, job: Job) -> Job {
        let previous = inner.reserved_jobs.insert(job.id().to_string(), job.clone());
        if previous.is_some() {
            // Reservation is the only delivery gate; a duplicate means two
            // containers held the same id. Crash fast rather than redeliver.
            tracing::error!(job_id = %job.id(), "job already reserved, aborting");
            std::process::abort();
        }
        job
    }

    /// Cancels a job, reserved or queued. Fails with `JobNotFound` for
    /// unknown ids.
    pub fn cancel_job(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.lock();

        if inner.reserved_jobs.remove(id).is_some() {
            tracing::debug!(job_id = id, "cancelled reserved job");
            inner.removed_jobs_count += 1;
            return Ok(());
        }

        let owner = Self::find_owner_spoke(&inner, &self.past_spoke, id)
            .ok_or_else(|| SpindleError::JobNotFound(id.to_string()))?;
        owner.cancel_job(id)?;
        tracing::debug!(job_id = id, bound = %owner.bound(), "cancelled queued job");
        inner.removed_jobs_count += 1;
        Ok(())
    }

    /// The spoke currently owning `id`: past spoke, then current spoke, then
    /// the routing map. Runs under the hub lock so the map cannot be mutated
    /// mid-scan.
    fn find_owner_spoke(inner: &HubInner, past_spoke: &Arc<Spoke>, id: &str) -> Option<Arc<Spoke>> {
        if past_spoke.owns_job(id) {
            return Some(Arc::clone(past_spoke));
        }
        if let Some(current) = &inner.current_spoke {
            if current.owns_job(id) {
                return Some(Arc::clone(current));
            }
        }
        inner
            .spoke_map
            .values()
            .find(|spoke| spoke.owns_job(id))
            .cloned()
    }

    /// The number of jobs queued for delivery. Excludes reserved jobs.
    pub fn pending_jobs_count(&self) -> usize {
        let inner = self.inner.lock();
        let mut count = self.past_spoke.pending_jobs_len();
        count += inner
            .spoke_map
            .values()
            .map(|spoke| spoke.pending_jobs_len())
            .sum::<usize>();
        count
    }

    /// Drops every spoke that is both expired and empty, from the routing
    /// map and the spoke queue alike. Returns the number of spokes removed.
    pub fn prune(&self) -> usize {
        let mut inner = self.inner.lock();
        let now = Utc::now();

        let HubInner {
            spoke_map, spokes, ..
        } = &mut *inner;

        let before = spoke_map.len();
        spoke_map.retain(|_, spoke| !(spoke.is_expired(now) && spoke.pending_jobs_len() == 0));
        let removed = before - spoke_map.len();
        if removed > 0 {
            spokes.retain(|spoke| spoke_map.contains_key(&spoke.bound()));
        }
        removed
    }

    pub fn reserved_jobs_count(&self) -> usize {
        self.inner.lock().reserved_jobs.len()
    }

    pub fn removed_jobs_count(&self) -> u64 {
        self.inner.lock().removed_jobs_count
    }

    /// Number of spokes in the routing map (the past spoke is not counted).
    pub fn spoke_count(&self) -> usize {
        self.inner.lock().spoke_map.len()
    }

    pub fn has_current_spoke(&self) -> bool {
        self.inner.lock().current_spoke.is_some()
    }

    /// A point-in-time snapshot of hub counters, taken under one short hold
    /// of the hub lock.
    pub fn status(&self) -> HubStatus {
        let inner = self.inner.lock();
        let spoke_depths: Vec<SpokeDepth> = inner
            .spoke_map
            .values()
            .map(|spoke| SpokeDepth {
                id: spoke.id().to_string(),
                start: spoke.bound().start().to_rfc3339(),
                end: spoke.bound().end().to_rfc3339(),
                pending_jobs: spoke.pending_jobs_len(),
            })
            .collect();

        let past_spoke_pending = self.past_spoke.pending_jobs_len();
        let pending_jobs = past_spoke_pending
            + spoke_depths
                .iter()
                .map(|depth| depth.pending_jobs)
                .sum::<usize>();

        HubStatus {
            spoke_count: inner.spoke_map.len(),
            pending_jobs,
            reserved_jobs: inner.reserved_jobs.len(),
            removed_jobs: inner.removed_jobs_count,
            past_spoke_pending,
            spoke_depths,
        }
    }
}

/// Counts-only view of the hub for the status loop and the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct HubStatus {
    pub spoke_count: usize,
    pub pending_jobs: usize,
    pub reserved_jobs: usize,
    pub removed_jobs: u64,
    pub past_spoke_pending: usize,
    pub spoke_depths: Vec<SpokeDepth>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpokeDepth {
    pub id: String,
    pub start: String,
    pub end: String,
    pub pending_jobs: usize,
}
