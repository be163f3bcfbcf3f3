// libs/appointment-cell/tests/conflict_test.rs

mod support;

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use appointment_cell::models::{Appointment, AppointmentError, AppointmentStatus, OverlapScope};
use appointment_cell::services::conflict::ConflictDetectionService;

use support::{InMemoryAppointmentStore, AUTH_TOKEN};

fn at_hour(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 20, hour, 0, 0).unwrap()
}

fn seeded(service_id: Uuid, start_hour: u32, end_hour: u32) -> Appointment {
    Appointment {
        id: None,
        user_id: Uuid::new_v4(),
        service_id,
        start_time: at_hour(start_hour),
        end_time: at_hour(end_hour),
        status: AppointmentStatus::Scheduled,
        created_at: None,
        updated_at: None,
    }
}

fn detector(store: Arc<InMemoryAppointmentStore>, scope: OverlapScope) -> ConflictDetectionService {
    ConflictDetectionService::new(store, scope)
}

#[tokio::test]
async fn detects_an_overlapping_booking() {
    let store = Arc::new(InMemoryAppointmentStore::new());
    let service_id = Uuid::new_v4();
    store.seed(seeded(service_id, 10, 11));

    let conflict = detector(Arc::clone(&store), OverlapScope::Service);

    let overlapping = conflict
        .has_overlap(service_id, at_hour(10) + Duration::minutes(30), at_hour(12), None, AUTH_TOKEN)
        .await
        .unwrap();

    assert!(overlapping);
}

#[tokio::test]
async fn touching_intervals_do_not_overlap() {
    let store = Arc::new(InMemoryAppointmentStore::new());
    let service_id = Uuid::new_v4();
    store.seed(seeded(service_id, 10, 11));

    let conflict = detector(Arc::clone(&store), OverlapScope::Service);

    // [10:00, 11:00) then [11:00, 12:00): endpoints touch, no conflict
    let before = conflict
        .has_overlap(service_id, at_hour(11), at_hour(12), None, AUTH_TOKEN)
        .await
        .unwrap();
    assert!(!before);

    // [09:00, 10:00) against [10:00, 11:00)
    let after = conflict
        .has_overlap(service_id, at_hour(9), at_hour(10), None, AUTH_TOKEN)
        .await
        .unwrap();
    assert!(!after);
}

#[tokio::test]
async fn cancelled_bookings_never_conflict() {
    let store = Arc::new(InMemoryAppointmentStore::new());
    let service_id = Uuid::new_v4();

    let mut cancelled = seeded(service_id, 10, 11);
    cancelled.status = AppointmentStatus::Cancelled;
    store.seed(cancelled);

    let conflict = detector(Arc::clone(&store), OverlapScope::Service);

    let overlapping = conflict
        .has_overlap(service_id, at_hour(10), at_hour(11), None, AUTH_TOKEN)
        .await
        .unwrap();

    assert!(!overlapping);
}

#[tokio::test]
async fn excluded_id_never_conflicts_with_itself() {
    let store = Arc::new(InMemoryAppointmentStore::new());
    let service_id = Uuid::new_v4();
    let existing = store.seed(seeded(service_id, 10, 11));

    let conflict = detector(Arc::clone(&store), OverlapScope::Service);

    let against_self = conflict
        .has_overlap(
            service_id,
            at_hour(10),
            at_hour(11),
            existing.id,
            AUTH_TOKEN,
        )
        .await
        .unwrap();
    assert!(!against_self);

    let without_exclusion = conflict
        .has_overlap(service_id, at_hour(10), at_hour(11), None, AUTH_TOKEN)
        .await
        .unwrap();
    assert!(without_exclusion);
}

#[tokio::test]
async fn malformed_interval_is_an_error() {
    let store = Arc::new(InMemoryAppointmentStore::new());
    let conflict = detector(Arc::clone(&store), OverlapScope::Service);

    let result = conflict
        .has_overlap(Uuid::new_v4(), at_hour(12), at_hour(10), None, AUTH_TOKEN)
        .await;
    assert_matches!(result, Err(AppointmentError::InvalidInterval));

    let degenerate = conflict
        .has_overlap(Uuid::new_v4(), at_hour(12), at_hour(12), None, AUTH_TOKEN)
        .await;
    assert_matches!(degenerate, Err(AppointmentError::InvalidInterval));
}

#[tokio::test]
async fn service_scope_ignores_other_services() {
    let store = Arc::new(InMemoryAppointmentStore::new());
    let booked_service = Uuid::new_v4();
    let other_service = Uuid::new_v4();
    store.seed(seeded(booked_service, 10, 11));

    let conflict = detector(Arc::clone(&store), OverlapScope::Service);

    let overlapping = conflict
        .has_overlap(other_service, at_hour(10), at_hour(11), None, AUTH_TOKEN)
        .await
        .unwrap();

    assert!(!overlapping);
}

#[tokio::test]
async fn global_scope_spans_all_services() {
    let store = Arc::new(InMemoryAppointmentStore::new());
    let booked_service = Uuid::new_v4();
    let other_service = Uuid::new_v4();
    store.seed(seeded(booked_service, 10, 11));

    let conflict = detector(Arc::clone(&store), OverlapScope::Global);

    let overlapping = conflict
        .has_overlap(other_service, at_hour(10), at_hour(11), None, AUTH_TOKEN)
        .await
        .unwrap();

    assert!(overlapping);
}

#[tokio::test]
async fn find_conflicts_returns_the_colliding_records() {
    let store = Arc::new(InMemoryAppointmentStore::new());
    let service_id = Uuid::new_v4();
    let first = store.seed(seeded(service_id, 10, 11));
    let second = store.seed(seeded(service_id, 12, 13));

    let conflict = detector(Arc::clone(&store), OverlapScope::Service);

    let conflicts = conflict
        .find_conflicts(service_id, at_hour(10), at_hour(13), None, AUTH_TOKEN)
        .await
        .unwrap();

    let ids: Vec<_> = conflicts.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);
}
