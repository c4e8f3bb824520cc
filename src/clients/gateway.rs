use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use reqwest::{Client, Response};
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use crate::{
    config::Config,
    models::{
        gateway::{FcmErrorBody, FcmMessage, FcmNotification, FcmRequest, FcmSendResponse, GatewayResult},
        message::NotificationRequest,
    },
};

/// Service name the circuit breaker tracks for the push gateway.
pub const PUSH_GATEWAY_SERVICE: &str = "push_gateway";

const FCM_ENDPOINT: &str = "https://fcm.googleapis.com";
const FCM_SCOPES: &[&str] = &["https://www.googleapis.com/auth/firebase.messaging"];
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Black-box delivery call: takes a rendered notification, returns one of
/// three classified outcomes. Classification happens inside the gateway so
/// the processor never inspects transport errors.
#[allow(async_fn_in_trait)]
pub trait PushGateway {
    async fn send(&self, request: &NotificationRequest) -> GatewayResult;
}

/// Firebase Cloud Messaging v1 over HTTP, authenticated per call through the
/// ambient Google credentials.
pub struct FcmClient {
    http_client: Client,
    project_id: String,
    endpoint: String,
}

impl FcmClient {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|_| anyhow!("Failed to create HTTP client"))?;

        info!(project_id = %config.fcm_project_id, "FCM client initialized");

        Ok(Self {
            http_client,
            project_id: config.fcm_project_id.clone(),
            endpoint: FCM_ENDPOINT.to_string(),
        })
    }

    async fn authorize(&self) -> Result<String, Error> {
        let provider = gcp_auth::provider().await?;
        let token = provider.token(FCM_SCOPES).await?;
        Ok(token.as_str().to_string())
    }

    fn build_request(&self, request: &NotificationRequest) -> FcmRequest {
        let mut data = HashMap::new();
        data.insert(
            "notification_id".to_string(),
            request.notification_id.clone(),
        );

        if let Some(link) = &request.link {
            data.insert("link".to_string(), link.clone());
        }

        // FCM data values must be strings; structured values are dropped.
        if let Some(extra) = &request.data {
            for (key, value) in extra {
                let rendered = match value {
                    JsonValue::String(s) => Some(s.clone()),
                    JsonValue::Number(n) => Some(n.to_string()),
                    JsonValue::Bool(b) => Some(b.to_string()),
                    _ => None,
                };

                if let Some(rendered) = rendered {
                    data.insert(key.clone(), rendered);
                }
            }
        }

        FcmRequest {
            message: FcmMessage {
                token: request.push_token.clone(),
                notification: FcmNotification {
                    title: request.title.clone(),
                    body: request.body.clone(),
                    image: request.image.clone(),
                },
                data: Some(data),
            },
        }
    }
}

impl PushGateway for FcmClient {
    async fn send(&self, request: &NotificationRequest) -> GatewayResult {
        debug!(
            notification_id = %request.notification_id,
            "Sending FCM push notification"
        );

        let token = match self.authorize().await {
            Ok(token) => token,
            Err(e) => {
                return GatewayResult::Unavailable {
                    reason: format!("FCM authentication failed: {}", e),
                };
            }
        };

        let url = format!(
            "{}/v1/projects/{}/messages:send",
            self.endpoint, self.project_id
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token)
            .json(&self.build_request(request))
            .send()
            .await;

        match response {
            Ok(response) => classify_response(response).await,
            Err(e) => GatewayResult::Unavailable {
                reason: format!("FCM request failed: {}", e),
            },
        }
    }
}

/// Map the FCM response onto the three outcome classes. Dead tokens and
/// malformed messages are permanent by the gateway's own judgment; anything
/// else is worth retrying.
async fn classify_response(response: Response) -> GatewayResult {
    let status = response.status();

    if status.is_success() {
        let message_id = response
            .json::<FcmSendResponse>()
            .await
            .ok()
            .and_then(|body| body.name);
        return GatewayResult::Delivered { message_id };
    }

    let body = response.text().await.unwrap_or_default();
    let error_status = serde_json::from_str::<FcmErrorBody>(&body)
        .map(|parsed| parsed.error.status)
        .unwrap_or_default();

    match (status.as_u16(), error_status.as_str()) {
        (404, _) | (_, "UNREGISTERED") | (_, "NOT_FOUND") => GatewayResult::Rejected {
            reason: "Push token not found or expired".to_string(),
        },
        (400, _) | (_, "INVALID_ARGUMENT") => GatewayResult::Rejected {
            reason: format!("Invalid message format: {}", error_status),
        },
        _ => GatewayResult::Unavailable {
            reason: format!("FCM request failed with status {}: {}", status, body),
        },
    }
}
