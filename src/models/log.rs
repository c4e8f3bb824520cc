use std::fmt::{Display, Formatter, Result};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Delivered,
    Failed,
}

impl NotificationStatus {
    pub fn from_string(s: &str) -> Self {
        match s {
            "delivered" => NotificationStatus::Delivered,
            "failed" => NotificationStatus::Failed,
            _ => NotificationStatus::Pending,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Delivered => "delivered",
            NotificationStatus::Failed => "failed",
        }
    }
}

impl Display for NotificationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", self.as_str())
    }
}

/// Durable delivery record, one per distinct `notification_id`.
///
/// `push_token` and `metadata` hold encrypted blobs, never plaintext.
#[derive(Debug, Clone)]
pub struct NotificationLog {
    pub id: Uuid,
    pub notification_id: String,
    pub notification_type: String,
    pub user_id: String,
    pub push_token: Option<String>,
    pub metadata: Option<String>,
    pub status: NotificationStatus,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotificationLog {
    pub notification_id: String,
    pub notification_type: String,
    pub user_id: String,
    pub push_token: Option<String>,
    pub metadata: Option<String>,
}
