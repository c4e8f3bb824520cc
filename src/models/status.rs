use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::models::log::NotificationStatus;

/// Payload POSTed to the external status subscriber on every terminal
/// outcome, delivered or failed.
#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdate {
    pub notification_id: String,
    pub status: NotificationStatus,
    pub timestamp: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusUpdate {
    pub fn new(notification_id: &str, status: NotificationStatus, error: Option<String>) -> Self {
        Self {
            notification_id: notification_id.to_string(),
            status,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            error,
        }
    }
}
