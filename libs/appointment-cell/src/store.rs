// libs/appointment-cell/src/store.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::{SupabaseClient, SupabaseError};

use crate::models::{Appointment, AppointmentSearchQuery};

const APPOINTMENTS_TABLE: &str = "/rest/v1/appointments";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("appointment does not exist")]
    Missing,

    #[error("storage rejected conflicting write: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(String),
}

impl From<SupabaseError> for StoreError {
    fn from(e: SupabaseError) -> Self {
        match e {
            SupabaseError::Conflict(msg) => StoreError::Conflict(msg),
            SupabaseError::NotFound(_) => StoreError::Missing,
            other => StoreError::Database(other.to_string()),
        }
    }
}

/// Persistence seam consumed by the scheduling services. The caller's bearer
/// token travels with every call so row-level security stays in effect.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn load(&self, id: Uuid, auth_token: &str) -> Result<Option<Appointment>, StoreError>;

    /// Non-cancelled appointments whose `[start_time, end_time)` range
    /// intersects the given one, optionally confined to a service and
    /// excluding one appointment id.
    async fn find_overlapping(
        &self,
        service_id: Option<Uuid>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        exclude_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Insert when `id` is unset (storage assigns one), update otherwise.
    async fn save(&self, appointment: &Appointment, auth_token: &str)
        -> Result<Appointment, StoreError>;

    async fn delete(&self, id: Uuid, auth_token: &str) -> Result<(), StoreError>;

    async fn find_all(
        &self,
        query: &AppointmentSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, StoreError>;
}

pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    fn encode_instant(instant: DateTime<Utc>) -> String {
        urlencoding::encode(&instant.to_rfc3339()).into_owned()
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn load(&self, id: Uuid, auth_token: &str) -> Result<Option<Appointment>, StoreError> {
        let path = format!("{}?id=eq.{}&limit=1", APPOINTMENTS_TABLE, id);

        let rows: Vec<Appointment> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        Ok(rows.into_iter().next())
    }

    async fn find_overlapping(
        &self,
        service_id: Option<Uuid>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        exclude_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, StoreError> {
        // Half-open intersection: start_time < candidate end AND end_time >
        // candidate start; touching endpoints never match.
        let mut query_parts = vec![
            "status=neq.cancelled".to_string(),
            format!("start_time=lt.{}", Self::encode_instant(end_time)),
            format!("end_time=gt.{}", Self::encode_instant(start_time)),
        ];

        if let Some(service_id) = service_id {
            query_parts.push(format!("service_id=eq.{}", service_id));
        }

        if let Some(exclude_id) = exclude_id {
            query_parts.push(format!("id=neq.{}", exclude_id));
        }

        let path = format!(
            "{}?{}&order=start_time.asc",
            APPOINTMENTS_TABLE,
            query_parts.join("&")
        );

        debug!("Querying overlapping appointments: {}", path);

        let rows: Vec<Appointment> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        Ok(rows)
    }

    async fn save(
        &self,
        appointment: &Appointment,
        auth_token: &str,
    ) -> Result<Appointment, StoreError> {
        let body = serde_json::to_value(appointment)
            .map_err(|e| StoreError::Database(format!("Failed to serialize appointment: {}", e)))?;

        let rows: Vec<Appointment> = match appointment.id {
            Some(id) => {
                let path = format!("{}?id=eq.{}", APPOINTMENTS_TABLE, id);
                self.supabase
                    .write(Method::PATCH, &path, Some(auth_token), body)
                    .await?
            }
            None => {
                self.supabase
                    .write(Method::POST, APPOINTMENTS_TABLE, Some(auth_token), body)
                    .await?
            }
        };

        rows.into_iter().next().ok_or(StoreError::Missing)
    }

    async fn delete(&self, id: Uuid, auth_token: &str) -> Result<(), StoreError> {
        let path = format!("{}?id=eq.{}", APPOINTMENTS_TABLE, id);

        self.supabase
            .execute(Method::DELETE, &path, Some(auth_token))
            .await?;

        Ok(())
    }

    async fn find_all(
        &self,
        query: &AppointmentSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut query_parts = Vec::new();

        if let Some(user_id) = query.user_id {
            query_parts.push(format!("user_id=eq.{}", user_id));
        }
        if let Some(service_id) = query.service_id {
            query_parts.push(format!("service_id=eq.{}", service_id));
        }
        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some(from_date) = query.from_date {
            query_parts.push(format!("start_time=gte.{}", Self::encode_instant(from_date)));
        }
        if let Some(to_date) = query.to_date {
            query_parts.push(format!("start_time=lte.{}", Self::encode_instant(to_date)));
        }

        query_parts.push(format!("limit={}", query.limit.unwrap_or(20)));
        query_parts.push(format!("offset={}", query.offset.unwrap_or(0)));

        let path = format!(
            "{}?{}&order=start_time.asc",
            APPOINTMENTS_TABLE,
            query_parts.join("&")
        );

        let rows: Vec<Appointment> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        Ok(rows)
    }
}
