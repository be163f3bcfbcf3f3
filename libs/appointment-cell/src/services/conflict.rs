// libs/appointment-cell/src/services/conflict.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, OverlapScope};
use crate::store::AppointmentStore;

pub struct ConflictDetectionService {
    store: Arc<dyn AppointmentStore>,
    scope: OverlapScope,
}

impl ConflictDetectionService {
    pub fn new(store: Arc<dyn AppointmentStore>, scope: OverlapScope) -> Self {
        Self { store, scope }
    }

    /// Check whether the candidate interval collides with an existing
    /// non-cancelled booking. Read-only; a malformed interval is an error,
    /// never "no overlap".
    pub async fn has_overlap(
        &self,
        service_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        exclude_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<bool, AppointmentError> {
        let conflicts = self
            .find_conflicts(service_id, start_time, end_time, exclude_id, auth_token)
            .await?;

        Ok(!conflicts.is_empty())
    }

    /// Like `has_overlap`, but returns the colliding records.
    pub async fn find_conflicts(
        &self,
        service_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        exclude_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        if start_time >= end_time {
            return Err(AppointmentError::InvalidInterval);
        }

        debug!(
            "Checking conflicts for service {} from {} to {}",
            service_id, start_time, end_time
        );

        let scope_filter = match self.scope {
            OverlapScope::Service => Some(service_id),
            OverlapScope::Global => None,
        };

        let candidates = self
            .store
            .find_overlapping(scope_filter, start_time, end_time, exclude_id, auth_token)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        // The storage query already filters; re-apply the predicate in code so
        // the detector's semantics do not depend on the backend's.
        let conflicts: Vec<Appointment> = candidates
            .into_iter()
            .filter(|existing| existing.status != AppointmentStatus::Cancelled)
            .filter(|existing| exclude_id.map_or(true, |excluded| existing.id != Some(excluded)))
            .filter(|existing| {
                Self::intervals_overlap(
                    existing.start_time,
                    existing.end_time,
                    start_time,
                    end_time,
                )
            })
            .collect();

        if !conflicts.is_empty() {
            warn!(
                "Conflict detected for service {}: {} overlapping appointments",
                service_id,
                conflicts.len()
            );
        }

        Ok(conflicts)
    }

    /// Half-open interval intersection: `[s1, e1)` and `[s2, e2)` overlap iff
    /// s1 < e2 AND s2 < e1. Touching endpoints do not overlap.
    fn intervals_overlap(
        start1: DateTime<Utc>,
        end1: DateTime<Utc>,
        start2: DateTime<Utc>,
        end2: DateTime<Utc>,
    ) -> bool {
        start1 < end2 && start2 < end1
    }
}
