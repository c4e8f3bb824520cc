use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Classified outcome of one push gateway call. The processor never needs to
/// interpret gateway errors beyond this three-way split.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayResult {
    Delivered { message_id: Option<String> },
    /// Reattempting the same call cannot succeed (bad message, dead token).
    Rejected { reason: String },
    /// Transient gateway or transport error; worth retrying.
    Unavailable { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct FcmRequest {
    pub message: FcmMessage,
}

#[derive(Debug, Clone, Serialize)]
pub struct FcmMessage {
    pub token: String,
    pub notification: FcmNotification,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FcmNotification {
    pub title: String,
    pub body: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FcmSendResponse {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FcmErrorBody {
    pub error: FcmErrorDetail,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FcmErrorDetail {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
}
