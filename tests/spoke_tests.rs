use std::time::Duration;

use chrono::{TimeDelta, Utc};

use spindle::error::SpindleError;
use spindle::scheduler::{Job, Spoke, SpokeBound, TemporalState};

#[test]
fn test_empty_spoke() {
    let now = Utc::now();
    let spoke = Spoke::new(now, now + TimeDelta::seconds(10));

    assert_eq!(spoke.pending_jobs_len(), 0);
    assert!(spoke.next().is_none());
}

#[test]
fn test_accepts_jobs_within_bound() {
    let now = Utc::now();
    let spoke = Spoke::new(now, now + TimeDelta::seconds(20));

    spoke
        .add_job(Job::new_auto_id(now + TimeDelta::seconds(7), Vec::new()))
        .expect("in-bound job should be accepted");
    spoke
        .add_job(Job::new_auto_id(now + TimeDelta::seconds(11), Vec::new()))
        .expect("in-bound job should be accepted");

    assert_eq!(spoke.pending_jobs_len(), 2);
}

#[test]
fn test_rejects_jobs_outside_bound() {
    let now = Utc::now();
    let spoke = Spoke::new(now, now + TimeDelta::seconds(20));

    let late = spoke.add_job(Job::new_auto_id(now + TimeDelta::seconds(44), Vec::new()));
    assert!(matches!(late, Err(SpindleError::WrongBound { .. })));

    let early = spoke.add_job(Job::new_auto_id(now - TimeDelta::seconds(2), Vec::new()));
    assert!(matches!(early, Err(SpindleError::WrongBound { .. })));

    assert_eq!(spoke.pending_jobs_len(), 0);
}

#[test]
fn test_next_holds_back_future_jobs() {
    let now = Utc::now();
    let spoke = Spoke::new(now, now + TimeDelta::seconds(10));
    spoke
        .add_job(Job::new_auto_id(now + TimeDelta::seconds(5), Vec::new()))
        .unwrap();

    // Head exists but its trigger time has not arrived.
    assert!(spoke.next().is_none());
    assert_eq!(spoke.pending_jobs_len(), 1);
}

#[test]
fn test_next_drains_ready_jobs_in_trigger_order() {
    let now = Utc::now();
    let spoke = Spoke::new(now - TimeDelta::seconds(10), now + TimeDelta::seconds(10));

    let first = Job::new_auto_id(now - TimeDelta::seconds(3), Vec::new());
    let second = Job::new_auto_id(now - TimeDelta::seconds(1), Vec::new());
    let first_id = first.id().to_string();
    let second_id = second.id().to_string();

    spoke.add_job(second).unwrap();
    spoke.add_job(first).unwrap();

    assert_eq!(spoke.next().map(|j| j.id().to_string()), Some(first_id));
    assert_eq!(spoke.next().map(|j| j.id().to_string()), Some(second_id));
    // Drained; further calls return nothing.
    assert!(spoke.next().is_none());
}

#[test]
fn test_cancel_removes_a_non_head_job() {
    let now = Utc::now();
    let spoke = Spoke::new(now, now + TimeDelta::seconds(10));

    let head = Job::new_auto_id(now + TimeDelta::seconds(2), Vec::new());
    let tail = Job::new_auto_id(now + TimeDelta::seconds(8), Vec::new());
    let tail_id = tail.id().to_string();
    spoke.add_job(head).unwrap();
    spoke.add_job(tail).unwrap();

    spoke.cancel_job(&tail_id).expect("cancel should succeed");
    assert_eq!(spoke.pending_jobs_len(), 1);
    assert!(!spoke.owns_job(&tail_id));
}

#[test]
fn test_cancel_unknown_job_fails() {
    let now = Utc::now();
    let spoke = Spoke::new(now, now + TimeDelta::seconds(10));

    let result = spoke.cancel_job("zzz");
    assert!(matches!(result, Err(SpindleError::JobNotFound(_))));
}

#[test]
fn test_owns_job() {
    let now = Utc::now();
    let spoke = Spoke::new(now, now + TimeDelta::seconds(10));
    let job = Job::new_auto_id(now + TimeDelta::seconds(1), Vec::new());
    let id = job.id().to_string();
    spoke.add_job(job).unwrap();

    assert!(spoke.owns_job(&id));
    assert!(!spoke.owns_job("other"));
}

#[test]
fn test_temporal_state() {
    let now = Utc::now();

    let past = Spoke::new(now - TimeDelta::seconds(20), now - TimeDelta::seconds(10));
    assert_eq!(past.temporal_state(now), TemporalState::Past);
    assert!(past.is_expired(now));

    let current = Spoke::new(now - TimeDelta::seconds(5), now + TimeDelta::seconds(5));
    assert_eq!(current.temporal_state(now), TemporalState::Current);
    assert!(!current.is_expired(now));

    let future = Spoke::new(now + TimeDelta::seconds(10), now + TimeDelta::seconds(20));
    assert_eq!(future.temporal_state(now), TemporalState::Future);
}

#[test]
fn test_wide_spoke_absorbs_any_overdue_job() {
    // The hub's past spoke is built exactly like this: a bound so wide that
    // no overdue trigger time can fall outside it.
    let now = Utc::now();
    let hundred_years = TimeDelta::days(365 * 100);
    let spoke = Spoke::new(now - hundred_years, now + hundred_years);

    spoke
        .add_job(Job::new_auto_id(now - TimeDelta::days(400), Vec::new()))
        .expect("wide spoke should absorb any overdue job");
    spoke
        .add_job(Job::new_auto_id(now - TimeDelta::milliseconds(1), Vec::new()))
        .expect("wide spoke should absorb any overdue job");

    assert_eq!(spoke.pending_jobs_len(), 2);
}

#[test]
fn test_bound_from_slot_constructor_matches_spoke() {
    let span = Duration::from_secs(5);
    let bound = SpokeBound::containing(Utc::now() + TimeDelta::seconds(30), span);
    let spoke = Spoke::from_bound(bound);

    assert_eq!(spoke.bound(), bound);
    assert!(spoke
        .add_job(Job::new_auto_id(bound.start(), Vec::new()))
        .is_ok());
    // End is exclusive.
    assert!(spoke
        .add_job(Job::new_auto_id(bound.end(), Vec::new()))
        .is_err());
}
