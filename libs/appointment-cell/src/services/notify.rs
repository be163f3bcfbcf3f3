// libs/appointment-cell/src/services/notify.rs
use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::Appointment;

/// Outbound notification seam. Best-effort by contract: implementations never
/// return errors to the caller, and delivery failures stay inside the
/// implementation.
#[async_trait]
pub trait AppointmentNotifier: Send + Sync {
    async fn notify_confirmed(&self, user_id: Uuid, appointment: &Appointment);
    async fn notify_cancelled(&self, user_id: Uuid, appointment: &Appointment);
}

/// Posts confirmation/cancellation events to the mail webhook. The HTTP call
/// runs in a detached task so it cannot delay or fail the booking operation
/// that triggered it.
pub struct EmailNotifier {
    client: reqwest::Client,
    webhook_url: String,
}

impl EmailNotifier {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url: config.notification_webhook_url.clone(),
        }
    }

    fn dispatch(&self, event: &'static str, user_id: Uuid, appointment: &Appointment) {
        if self.webhook_url.is_empty() {
            debug!("Notification webhook not configured, skipping {} event", event);
            return;
        }

        let payload = json!({
            "event": event,
            "user_id": user_id,
            "appointment": appointment,
        });

        let client = self.client.clone();
        let url = self.webhook_url.clone();

        tokio::spawn(async move {
            match client.post(&url).json(&payload).send().await {
                Ok(response) if !response.status().is_success() => {
                    warn!(
                        "Notification webhook returned {} for {} event",
                        response.status(),
                        event
                    );
                }
                Ok(_) => debug!("Delivered {} notification", event),
                Err(e) => warn!("Failed to deliver {} notification: {}", event, e),
            }
        });
    }
}

#[async_trait]
impl AppointmentNotifier for EmailNotifier {
    async fn notify_confirmed(&self, user_id: Uuid, appointment: &Appointment) {
        self.dispatch("appointment_confirmed", user_id, appointment);
    }

    async fn notify_cancelled(&self, user_id: Uuid, appointment: &Appointment) {
        self.dispatch("appointment_cancelled", user_id, appointment);
    }
}
