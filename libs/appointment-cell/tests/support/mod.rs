// libs/appointment-cell/tests/support/mod.rs
//
// Shared doubles for exercising the scheduling services without a database.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use appointment_cell::models::{
    Appointment, AppointmentSearchQuery, AppointmentStatus, OverlapScope, SchedulingRules,
};
use appointment_cell::services::booking::AppointmentBookingService;
use appointment_cell::services::notify::AppointmentNotifier;
use appointment_cell::store::{AppointmentStore, StoreError};

pub const AUTH_TOKEN: &str = "test_token";

// ==============================================================================
// IN-MEMORY STORE
// ==============================================================================

/// HashMap-backed store. `save` enforces the same non-cancelled range
/// exclusion the production schema carries, so the storage backstop path is
/// exercised too.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    records: Mutex<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record directly, bypassing every service-level check.
    pub fn seed(&self, mut appointment: Appointment) -> Appointment {
        let id = appointment.id.unwrap_or_else(Uuid::new_v4);
        appointment.id = Some(id);
        appointment.created_at.get_or_insert_with(Utc::now);
        appointment.updated_at = Some(Utc::now());

        self.records
            .lock()
            .unwrap()
            .insert(id, appointment.clone());
        appointment
    }

    pub fn get(&self, id: Uuid) -> Option<Appointment> {
        self.records.lock().unwrap().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn all(&self) -> Vec<Appointment> {
        self.records.lock().unwrap().values().cloned().collect()
    }
}

fn intersects(a: &Appointment, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    a.start_time < end && a.end_time > start
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn load(&self, id: Uuid, _auth_token: &str) -> Result<Option<Appointment>, StoreError> {
        Ok(self.records.lock().unwrap().get(&id).cloned())
    }

    async fn find_overlapping(
        &self,
        service_id: Option<Uuid>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        exclude_id: Option<Uuid>,
        _auth_token: &str,
    ) -> Result<Vec<Appointment>, StoreError> {
        let records = self.records.lock().unwrap();

        let mut rows: Vec<Appointment> = records
            .values()
            .filter(|a| a.status != AppointmentStatus::Cancelled)
            .filter(|a| service_id.map_or(true, |sid| a.service_id == sid))
            .filter(|a| exclude_id.map_or(true, |ex| a.id != Some(ex)))
            .filter(|a| intersects(a, start_time, end_time))
            .cloned()
            .collect();

        rows.sort_by_key(|a| a.start_time);
        Ok(rows)
    }

    async fn save(
        &self,
        appointment: &Appointment,
        _auth_token: &str,
    ) -> Result<Appointment, StoreError> {
        let mut records = self.records.lock().unwrap();

        if let Some(id) = appointment.id {
            if !records.contains_key(&id) {
                return Err(StoreError::Missing);
            }
        }

        // Exclusion-constraint backstop: non-cancelled rows of one service
        // must not overlap.
        if appointment.status != AppointmentStatus::Cancelled {
            let collision = records.values().any(|existing| {
                existing.id != appointment.id
                    && existing.service_id == appointment.service_id
                    && existing.status != AppointmentStatus::Cancelled
                    && intersects(existing, appointment.start_time, appointment.end_time)
            });

            if collision {
                return Err(StoreError::Conflict(
                    "exclusion constraint \"appointments_no_overlap\" violated".to_string(),
                ));
            }
        }

        let mut stored = appointment.clone();
        let id = stored.id.unwrap_or_else(Uuid::new_v4);
        stored.id = Some(id);
        stored.created_at.get_or_insert_with(Utc::now);
        stored.updated_at = Some(Utc::now());

        records.insert(id, stored.clone());
        Ok(stored)
    }

    async fn delete(&self, id: Uuid, _auth_token: &str) -> Result<(), StoreError> {
        self.records.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn find_all(
        &self,
        query: &AppointmentSearchQuery,
        _auth_token: &str,
    ) -> Result<Vec<Appointment>, StoreError> {
        let records = self.records.lock().unwrap();

        let mut rows: Vec<Appointment> = records
            .values()
            .filter(|a| query.user_id.map_or(true, |uid| a.user_id == uid))
            .filter(|a| query.service_id.map_or(true, |sid| a.service_id == sid))
            .filter(|a| query.status.map_or(true, |status| a.status == status))
            .filter(|a| query.from_date.map_or(true, |from| a.start_time >= from))
            .filter(|a| query.to_date.map_or(true, |to| a.start_time <= to))
            .cloned()
            .collect();

        rows.sort_by_key(|a| a.start_time);

        let offset = query.offset.unwrap_or(0) as usize;
        let limit = query.limit.unwrap_or(20) as usize;
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }
}

// ==============================================================================
// RECORDING NOTIFIER
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    Confirmed { user_id: Uuid, appointment_id: Option<Uuid> },
    Cancelled { user_id: Uuid, appointment_id: Option<Uuid> },
}

#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<NotificationEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn confirmed_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, NotificationEvent::Confirmed { .. }))
            .count()
    }

    pub fn cancelled_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, NotificationEvent::Cancelled { .. }))
            .count()
    }
}

#[async_trait]
impl AppointmentNotifier for RecordingNotifier {
    async fn notify_confirmed(&self, user_id: Uuid, appointment: &Appointment) {
        self.events.lock().unwrap().push(NotificationEvent::Confirmed {
            user_id,
            appointment_id: appointment.id,
        });
    }

    async fn notify_cancelled(&self, user_id: Uuid, appointment: &Appointment) {
        self.events.lock().unwrap().push(NotificationEvent::Cancelled {
            user_id,
            appointment_id: appointment.id,
        });
    }
}

// ==============================================================================
// FIXTURES
// ==============================================================================

/// New (id-less) appointment for `service_id`, starting `start_offset_hours`
/// from now and lasting one hour.
pub fn new_appointment(service_id: Uuid, start_offset_hours: i64) -> Appointment {
    let start_time = Utc::now() + Duration::hours(start_offset_hours);

    Appointment {
        id: None,
        user_id: Uuid::new_v4(),
        service_id,
        start_time,
        end_time: start_time + Duration::hours(1),
        status: AppointmentStatus::Requested,
        created_at: None,
        updated_at: None,
    }
}

pub fn booking_service(
    store: Arc<InMemoryAppointmentStore>,
    notifier: Arc<RecordingNotifier>,
) -> AppointmentBookingService {
    AppointmentBookingService::with_parts(
        store,
        notifier,
        SchedulingRules::default(),
        OverlapScope::Service,
    )
}

/// The core scheduling invariant: non-cancelled appointments never overlap
/// pairwise.
pub fn assert_no_double_booking(appointments: &[Appointment]) {
    for (i, a) in appointments.iter().enumerate() {
        for b in appointments.iter().skip(i + 1) {
            if a.status == AppointmentStatus::Cancelled || b.status == AppointmentStatus::Cancelled {
                continue;
            }
            if a.service_id != b.service_id {
                continue;
            }
            assert!(
                !(a.start_time < b.end_time && a.end_time > b.start_time),
                "appointments {:?} and {:?} overlap",
                a.id,
                b.id
            );
        }
    }
}
