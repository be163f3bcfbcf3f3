// libs/appointment-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;
use uuid::Uuid;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    /// Assigned by storage on first save; `None` marks a not-yet-created record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub user_id: Uuid,
    pub service_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub status: AppointmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    #[default]
    Requested,
    Scheduled,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Requested => write!(f, "requested"),
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// Explicit field-by-field patch: only `Some` fields are applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentPatch {
    pub user_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: Option<AppointmentStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentSearchQuery {
    pub user_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlapCheckResponse {
    pub has_overlap: bool,
    pub conflicting_appointments: Vec<Appointment>,
}

// ==============================================================================
// SCHEDULING POLICY
// ==============================================================================

/// Whether overlap detection is confined to the candidate's service or spans
/// every booking in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapScope {
    Service,
    Global,
}

impl OverlapScope {
    pub fn parse(value: &str) -> Self {
        match value {
            "service" => OverlapScope::Service,
            "global" => OverlapScope::Global,
            other => {
                warn!("Unknown overlap scope '{}', falling back to service scope", other);
                OverlapScope::Service
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulingRules {
    pub min_cancellation_notice_hours: i64,
}

impl Default for SchedulingRules {
    fn default() -> Self {
        Self {
            min_cancellation_notice_hours: 24,
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Invalid appointment interval: start time must be before end time")]
    InvalidInterval,

    #[error("Appointment conflicts with an existing booking")]
    SchedulingConflict,

    #[error("Status changes must be performed through the lifecycle endpoints")]
    RestrictedTransition,

    #[error("Cannot cancel appointments less than {0} hours before the scheduled time")]
    CancellationWindowExpired(i64),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
