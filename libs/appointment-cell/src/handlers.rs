// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::{DateTime, Utc};
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    Appointment, AppointmentError, AppointmentPatch, AppointmentSearchQuery, AppointmentStatus,
};
use crate::services::booking::AppointmentBookingService;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct AppointmentQueryParams {
    pub user_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

impl AppointmentQueryParams {
    fn into_search_query(self) -> AppointmentSearchQuery {
        AppointmentSearchQuery {
            user_id: self.user_id,
            service_id: self.service_id,
            status: self.status,
            from_date: self.from_date,
            to_date: self.to_date,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OverlapCheckQuery {
    pub service_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub exclude_appointment_id: Option<Uuid>,
}

// ==============================================================================
// APPOINTMENT CRUD HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<Appointment>,
) -> Result<Json<Value>, AppError> {
    if request.id.is_some() {
        return Err(AppError::BadRequest(
            "A new appointment cannot already have an ID".to_string(),
        ));
    }

    ensure_owner_or_admin(&user, request.user_id)?;

    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service
        .create_appointment(request, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment requested successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_all_appointments(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<AppointmentQueryParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);

    let appointments = booking_service
        .search_appointments(&params.into_search_query(), auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "count": appointments.len(),
        "appointments": appointments
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service
        .get_appointment(appointment_id, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<Appointment>,
) -> Result<Json<Value>, AppError> {
    let body_id = request
        .id
        .ok_or_else(|| AppError::BadRequest("Invalid id".to_string()))?;

    if body_id != appointment_id {
        return Err(AppError::BadRequest("Invalid ID".to_string()));
    }

    ensure_owner_or_admin(&user, request.user_id)?;

    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service
        .update_appointment(request, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn partial_update_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(patch): Json<AppointmentPatch>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);

    let current = booking_service
        .get_appointment(appointment_id, auth.token())
        .await
        .map_err(map_appointment_error)?;

    ensure_owner_or_admin(&user, current.user_id)?;

    let appointment = booking_service
        .partial_update_appointment(appointment_id, patch, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);

    let current = booking_service
        .get_appointment(appointment_id, auth.token())
        .await
        .map_err(map_appointment_error)?;

    ensure_owner_or_admin(&user, current.user_id)?;

    booking_service
        .delete_appointment(appointment_id, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment deleted successfully"
    })))
}

// ==============================================================================
// LIFECYCLE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn approve_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    ensure_admin(&user)?;

    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service
        .approve_appointment(appointment_id, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment approved"
    })))
}

#[axum::debug_handler]
pub async fn reject_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    ensure_admin(&user)?;

    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service
        .reject_appointment(appointment_id, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment rejected"
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);

    let current = booking_service
        .get_appointment(appointment_id, auth.token())
        .await
        .map_err(map_appointment_error)?;

    ensure_owner_or_admin(&user, current.user_id)?;

    let appointment = booking_service
        .cancel_appointment(appointment_id, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled"
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    ensure_admin(&user)?;

    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service
        .complete_appointment(appointment_id, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment completed"
    })))
}

// ==============================================================================
// UTILITY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn check_appointment_conflicts(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<OverlapCheckQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);

    let response = booking_service
        .check_overlap(
            query.service_id,
            query.start_time,
            query.end_time,
            query.exclude_appointment_id,
            auth.token(),
        )
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "has_overlap": response.has_overlap,
        "conflicting_appointments": response.conflicting_appointments
    })))
}

// ==============================================================================
// HELPERS
// ==============================================================================

fn ensure_owner_or_admin(user: &User, owner_id: Uuid) -> Result<(), AppError> {
    let is_owner = owner_id.to_string() == user.id;

    if !is_owner && !user.is_admin() {
        return Err(AppError::Auth(
            "Not authorized to manage appointments for this user".to_string(),
        ));
    }

    Ok(())
}

fn ensure_admin(user: &User) -> Result<(), AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Administrator role required".to_string(),
        ));
    }

    Ok(())
}

fn map_appointment_error(e: AppointmentError) -> AppError {
    match &e {
        AppointmentError::NotFound => AppError::NotFound(e.to_string()),
        AppointmentError::InvalidInterval
        | AppointmentError::RestrictedTransition
        | AppointmentError::CancellationWindowExpired(_) => AppError::BadRequest(e.to_string()),
        AppointmentError::SchedulingConflict => AppError::Conflict(e.to_string()),
        AppointmentError::DatabaseError(msg) => AppError::Database(msg.clone()),
    }
}
