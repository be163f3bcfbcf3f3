// libs/appointment-cell/src/services/lifecycle.rs
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::models::{AppointmentError, AppointmentStatus};

/// An operation the lifecycle endpoints may apply to an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Approve,
    Reject,
    Cancel,
    Complete,
}

/// Outcome of applying an action: either a new status, or nothing. Attempts
/// that the state machine does not admit are silent no-ops, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Changed(AppointmentStatus),
    Unchanged,
}

pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// The status state machine:
    ///
    /// ```text
    /// requested --approve--> scheduled
    /// requested --reject-->  cancelled
    /// requested --cancel-->  cancelled
    /// scheduled --cancel-->  cancelled
    /// scheduled --complete--> completed
    /// ```
    ///
    /// `completed` and `cancelled` are terminal.
    pub fn transition(
        &self,
        current_status: &AppointmentStatus,
        action: LifecycleAction,
    ) -> Transition {
        use AppointmentStatus::*;

        let next = match (current_status, action) {
            (Requested, LifecycleAction::Approve) => Some(Scheduled),
            (Requested, LifecycleAction::Reject) => Some(Cancelled),
            (Requested, LifecycleAction::Cancel) => Some(Cancelled),
            (Scheduled, LifecycleAction::Cancel) => Some(Cancelled),
            (Scheduled, LifecycleAction::Complete) => Some(Completed),
            _ => None,
        };

        match next {
            Some(status) => {
                debug!("Status transition {} -> {}", current_status, status);
                Transition::Changed(status)
            }
            None => Transition::Unchanged,
        }
    }

    /// `start_time < end_time` must hold before any overlap check or write.
    pub fn validate_interval(
        &self,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<(), AppointmentError> {
        if start_time >= end_time {
            return Err(AppointmentError::InvalidInterval);
        }
        Ok(())
    }

    /// The cancellation window is closed once less than `notice_hours` remain
    /// before the scheduled start. Exactly `notice_hours` of lead time is
    /// still open.
    pub fn cancellation_window_closed(
        &self,
        start_time: DateTime<Utc>,
        current_time: DateTime<Utc>,
        notice_hours: i64,
    ) -> bool {
        current_time + Duration::hours(notice_hours) > start_time
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}
