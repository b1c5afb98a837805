//! Due-date policy: how priority and overdue status follow from a deadline.
//!
//! These are pure functions; the reconciler, the create handler and the store
//! all go through them so they never disagree on a bucket.

use chrono::{DateTime, Utc};

use super::model::Priority;

/// At or below this many whole days remaining a task is `High`.
pub const HIGH_MAX_DAYS: i64 = 2;
/// At or below this many whole days remaining (and above `HIGH_MAX_DAYS`) a task is `Medium`.
pub const MEDIUM_MAX_DAYS: i64 = 5;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Whole days from `now` until `due`, floored.
///
/// A deadline 12 hours away gives 0, a deadline 1 millisecond in the past gives -1.
pub fn days_remaining(due: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (due - now).num_milliseconds().div_euclid(MILLIS_PER_DAY)
}

/// Map a day count onto a priority tier.
pub fn priority_for_days(days: i64) -> Priority {
    if days <= HIGH_MAX_DAYS {
        Priority::High
    } else if days <= MEDIUM_MAX_DAYS {
        Priority::Medium
    } else {
        Priority::Low
    }
}

/// Derived `(priority, is_overdue)` for a task due at `due`.
pub fn derive_state(due: DateTime<Utc>, now: DateTime<Utc>) -> (Priority, bool) {
    (priority_for_days(days_remaining(due, now)), due < now)
}

/// `(priority, is_overdue)` to store when a user creates or edits a task.
///
/// Without a due date a task is always `Low` and never overdue. With one, the
/// requested priority is kept until the next reconciliation pass and the
/// overdue flag follows the new deadline immediately.
pub fn state_on_edit(
    requested: Priority,
    due: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> (Priority, bool) {
    match due {
        None => (Priority::Low, false),
        Some(due) => (requested, due < now),
    }
}
