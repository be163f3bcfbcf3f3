// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    Appointment, AppointmentError, AppointmentPatch, AppointmentSearchQuery, AppointmentStatus,
    OverlapCheckResponse, OverlapScope, SchedulingRules,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::lifecycle::{AppointmentLifecycleService, LifecycleAction, Transition};
use crate::services::notify::{AppointmentNotifier, EmailNotifier};
use crate::store::{AppointmentStore, StoreError, SupabaseAppointmentStore};

/// The sole mutation surface for appointments. Every time-affecting change
/// runs the conflict check before the write; the storage layer's exclusion
/// constraint backstops the check-then-write race and surfaces here as a
/// scheduling conflict.
pub struct AppointmentBookingService {
    store: Arc<dyn AppointmentStore>,
    conflict_service: ConflictDetectionService,
    lifecycle_service: AppointmentLifecycleService,
    notifier: Arc<dyn AppointmentNotifier>,
    rules: SchedulingRules,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        let store: Arc<dyn AppointmentStore> = Arc::new(SupabaseAppointmentStore::new(supabase));
        let notifier: Arc<dyn AppointmentNotifier> = Arc::new(EmailNotifier::new(config));

        Self::with_parts(
            store,
            notifier,
            SchedulingRules::default(),
            OverlapScope::parse(&config.overlap_scope),
        )
    }

    pub fn with_parts(
        store: Arc<dyn AppointmentStore>,
        notifier: Arc<dyn AppointmentNotifier>,
        rules: SchedulingRules,
        scope: OverlapScope,
    ) -> Self {
        let conflict_service = ConflictDetectionService::new(Arc::clone(&store), scope);

        Self {
            store,
            conflict_service,
            lifecycle_service: AppointmentLifecycleService::new(),
            notifier,
            rules,
        }
    }

    /// Create an appointment. A record without an id always enters the
    /// pipeline as `requested`, whatever status the caller supplied.
    pub async fn create_appointment(
        &self,
        mut appointment: Appointment,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Request to create appointment for user {}", appointment.user_id);

        if appointment.id.is_none() {
            appointment.status = AppointmentStatus::Requested;
        }

        self.lifecycle_service
            .validate_interval(appointment.start_time, appointment.end_time)?;

        let has_overlap = self
            .conflict_service
            .has_overlap(
                appointment.service_id,
                appointment.start_time,
                appointment.end_time,
                appointment.id,
                auth_token,
            )
            .await?;

        if has_overlap {
            return Err(AppointmentError::SchedulingConflict);
        }

        let stored = self
            .store
            .save(&appointment, auth_token)
            .await
            .map_err(Self::map_store_error)?;

        info!(
            "Appointment {:?} created for user {} with status {}",
            stored.id, stored.user_id, stored.status
        );

        Ok(stored)
    }

    /// Full update. Status is not a generic field edit: a status differing
    /// from the stored one is rejected, the lifecycle endpoints own those.
    pub async fn update_appointment(
        &self,
        appointment: Appointment,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let id = appointment.id.ok_or(AppointmentError::NotFound)?;
        debug!("Request to update appointment {}", id);

        let current = self.load(id, auth_token).await?;

        if appointment.status != current.status {
            return Err(AppointmentError::RestrictedTransition);
        }

        self.lifecycle_service
            .validate_interval(appointment.start_time, appointment.end_time)?;

        let times_changed = appointment.start_time != current.start_time
            || appointment.end_time != current.end_time;

        if times_changed {
            let has_overlap = self
                .conflict_service
                .has_overlap(
                    appointment.service_id,
                    appointment.start_time,
                    appointment.end_time,
                    Some(id),
                    auth_token,
                )
                .await?;

            if has_overlap {
                return Err(AppointmentError::SchedulingConflict);
            }
        }

        let record = Appointment {
            created_at: current.created_at,
            ..appointment
        };

        self.store
            .save(&record, auth_token)
            .await
            .map_err(Self::map_store_error)
    }

    /// Apply only the supplied fields; unset patch fields leave the stored
    /// value untouched. Same status and overlap rules as a full update.
    pub async fn partial_update_appointment(
        &self,
        id: Uuid,
        patch: AppointmentPatch,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Request to partially update appointment {}", id);

        let current = self.load(id, auth_token).await?;

        if let Some(status) = patch.status {
            if status != current.status {
                return Err(AppointmentError::RestrictedTransition);
            }
        }

        let mut updated = current.clone();
        if let Some(user_id) = patch.user_id {
            updated.user_id = user_id;
        }
        if let Some(service_id) = patch.service_id {
            updated.service_id = service_id;
        }
        if let Some(start_time) = patch.start_time {
            updated.start_time = start_time;
        }
        if let Some(end_time) = patch.end_time {
            updated.end_time = end_time;
        }

        let times_changed =
            updated.start_time != current.start_time || updated.end_time != current.end_time;

        if times_changed {
            self.lifecycle_service
                .validate_interval(updated.start_time, updated.end_time)?;

            let has_overlap = self
                .conflict_service
                .has_overlap(
                    updated.service_id,
                    updated.start_time,
                    updated.end_time,
                    Some(id),
                    auth_token,
                )
                .await?;

            if has_overlap {
                return Err(AppointmentError::SchedulingConflict);
            }
        }

        self.store
            .save(&updated, auth_token)
            .await
            .map_err(Self::map_store_error)
    }

    /// Approve a requested appointment, scheduling it and notifying the
    /// owner. Any other status is a logged no-op returning the record as-is.
    pub async fn approve_appointment(
        &self,
        id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Request to approve appointment {}", id);

        let current = self.load(id, auth_token).await?;

        match self
            .lifecycle_service
            .transition(&current.status, LifecycleAction::Approve)
        {
            Transition::Changed(status) => {
                let stored = self.persist_status(current, status, auth_token).await?;
                info!("Appointment {} approved", id);
                self.notifier.notify_confirmed(stored.user_id, &stored).await;
                Ok(stored)
            }
            Transition::Unchanged => {
                warn!("Cannot approve appointment with status: {}", current.status);
                Ok(current)
            }
        }
    }

    /// Reject a requested appointment, cancelling it and notifying the owner.
    pub async fn reject_appointment(
        &self,
        id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Request to reject appointment {}", id);

        let current = self.load(id, auth_token).await?;

        match self
            .lifecycle_service
            .transition(&current.status, LifecycleAction::Reject)
        {
            Transition::Changed(status) => {
                let stored = self.persist_status(current, status, auth_token).await?;
                info!("Appointment {} rejected", id);
                self.notifier.notify_cancelled(stored.user_id, &stored).await;
                Ok(stored)
            }
            Transition::Unchanged => {
                warn!("Cannot reject appointment with status: {}", current.status);
                Ok(current)
            }
        }
    }

    /// Cancel an appointment. The 24-hour window is checked before anything
    /// else: inside it the call fails without touching the record, whatever
    /// its status.
    pub async fn cancel_appointment(
        &self,
        id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Request to cancel appointment {}", id);

        let current = self.load(id, auth_token).await?;

        if self.lifecycle_service.cancellation_window_closed(
            current.start_time,
            Utc::now(),
            self.rules.min_cancellation_notice_hours,
        ) {
            return Err(AppointmentError::CancellationWindowExpired(
                self.rules.min_cancellation_notice_hours,
            ));
        }

        match self
            .lifecycle_service
            .transition(&current.status, LifecycleAction::Cancel)
        {
            Transition::Changed(status) => {
                let stored = self.persist_status(current, status, auth_token).await?;
                info!("Appointment {} cancelled", id);
                self.notifier.notify_cancelled(stored.user_id, &stored).await;
                Ok(stored)
            }
            Transition::Unchanged => {
                warn!("Cannot cancel appointment with status: {}", current.status);
                Ok(current)
            }
        }
    }

    /// Mark a scheduled appointment as completed. No notification.
    pub async fn complete_appointment(
        &self,
        id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Request to complete appointment {}", id);

        let current = self.load(id, auth_token).await?;

        match self
            .lifecycle_service
            .transition(&current.status, LifecycleAction::Complete)
        {
            Transition::Changed(status) => {
                let stored = self.persist_status(current, status, auth_token).await?;
                info!("Appointment {} completed", id);
                Ok(stored)
            }
            Transition::Unchanged => {
                warn!(
                    "Cannot mark as completed an appointment with status: {}",
                    current.status
                );
                Ok(current)
            }
        }
    }

    /// Physically remove an appointment. Removing a scheduled one counts as a
    /// late cancellation, so the window applies and the owner is notified
    /// before the record disappears.
    pub async fn delete_appointment(
        &self,
        id: Uuid,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        debug!("Request to delete appointment {}", id);

        let current = self.load(id, auth_token).await?;

        if current.status == AppointmentStatus::Scheduled {
            if self.lifecycle_service.cancellation_window_closed(
                current.start_time,
                Utc::now(),
                self.rules.min_cancellation_notice_hours,
            ) {
                return Err(AppointmentError::CancellationWindowExpired(
                    self.rules.min_cancellation_notice_hours,
                ));
            }

            self.notifier.notify_cancelled(current.user_id, &current).await;
        }

        self.store
            .delete(id, auth_token)
            .await
            .map_err(Self::map_store_error)?;

        info!("Appointment {} deleted", id);
        Ok(())
    }

    pub async fn get_appointment(
        &self,
        id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        self.load(id, auth_token).await
    }

    pub async fn search_appointments(
        &self,
        query: &AppointmentSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.store
            .find_all(query, auth_token)
            .await
            .map_err(Self::map_store_error)
    }

    /// Read-only overlap probe backing the conflicts endpoint.
    pub async fn check_overlap(
        &self,
        service_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        exclude_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<OverlapCheckResponse, AppointmentError> {
        let conflicting_appointments = self
            .conflict_service
            .find_conflicts(service_id, start_time, end_time, exclude_id, auth_token)
            .await?;

        Ok(OverlapCheckResponse {
            has_overlap: !conflicting_appointments.is_empty(),
            conflicting_appointments,
        })
    }

    async fn load(&self, id: Uuid, auth_token: &str) -> Result<Appointment, AppointmentError> {
        self.store
            .load(id, auth_token)
            .await
            .map_err(Self::map_store_error)?
            .ok_or(AppointmentError::NotFound)
    }

    async fn persist_status(
        &self,
        current: Appointment,
        status: AppointmentStatus,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let record = Appointment { status, ..current };

        self.store
            .save(&record, auth_token)
            .await
            .map_err(Self::map_store_error)
    }

    fn map_store_error(e: StoreError) -> AppointmentError {
        match e {
            StoreError::Missing => AppointmentError::NotFound,
            StoreError::Conflict(msg) => {
                warn!("Storage rejected conflicting write: {}", msg);
                AppointmentError::SchedulingConflict
            }
            StoreError::Database(msg) => AppointmentError::DatabaseError(msg),
        }
    }
}
