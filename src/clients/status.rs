use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use reqwest::Client;
use tracing::{debug, info};

use crate::models::status::StatusUpdate;

const CALLBACK_TIMEOUT: Duration = Duration::from_secs(5);

/// External status subscriber notified of every terminal delivery outcome.
#[allow(async_fn_in_trait)]
pub trait StatusPublisher {
    async fn publish(&self, update: &StatusUpdate) -> Result<(), Error>;
}

/// Best-effort HTTP POST to the API gateway's status endpoint.
pub struct HttpStatusPublisher {
    http_client: Client,
    endpoint: String,
}

impl HttpStatusPublisher {
    pub fn new(api_gateway_url: &str) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(CALLBACK_TIMEOUT)
            .build()
            .map_err(|_| anyhow!("Failed to create HTTP client"))?;

        let endpoint = format!(
            "{}/api/v1/push/status/",
            api_gateway_url.trim_end_matches('/')
        );

        info!(endpoint = %endpoint, "Status publisher initialized");

        Ok(Self {
            http_client,
            endpoint,
        })
    }
}

impl StatusPublisher for HttpStatusPublisher {
    async fn publish(&self, update: &StatusUpdate) -> Result<(), Error> {
        debug!(
            notification_id = %update.notification_id,
            status = %update.status,
            "Posting status update"
        );

        self.http_client
            .post(&self.endpoint)
            .json(update)
            .send()
            .await
            .map_err(|e| anyhow!("Status callback request failed: {}", e))?
            .error_for_status()
            .map_err(|e| anyhow!("Status callback rejected: {}", e))?;

        Ok(())
    }
}
