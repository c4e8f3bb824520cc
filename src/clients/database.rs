use anyhow::{Error, Result, anyhow};
use tokio_postgres::{NoTls, Row};
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    models::log::{NewNotificationLog, NotificationLog, NotificationStatus},
    stores::NotificationLogStore,
};

const LOG_COLUMNS: &str = "id, notification_id, notification_type, user_id, push_token, \
     metadata, status, error_message, retry_count, sent_at, delivered_at, created_at";

/// PostgreSQL-backed notification log. The unique constraint on
/// `notification_id` is what makes `create_pending` safe when multiple
/// consumers race on the same message.
pub struct PostgresLogStore {
    client: tokio_postgres::Client,
}

impl PostgresLogStore {
    pub async fn connect(database_url: &str) -> Result<Self, Error> {
        let (client, connection) = tokio_postgres::connect(database_url, NoTls)
            .await
            .map_err(|e| anyhow!("Failed to connect to database: {}", e))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "PostgreSQL connection error");
            }
        });

        info!("PostgreSQL connection established");

        Ok(Self { client })
    }

    pub async fn health_check(&self) -> Result<(), Error> {
        self.client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| anyhow!("Database health check failed: {}", e))?;

        Ok(())
    }

    fn row_to_log(row: &Row) -> NotificationLog {
        let status: String = row.get("status");
        let retry_count: i32 = row.get("retry_count");

        NotificationLog {
            id: row.get("id"),
            notification_id: row.get("notification_id"),
            notification_type: row.get("notification_type"),
            user_id: row.get("user_id"),
            push_token: row.get("push_token"),
            metadata: row.get("metadata"),
            status: NotificationStatus::from_string(&status),
            error_message: row.get("error_message"),
            retry_count: retry_count.max(0) as u32,
            sent_at: row.get("sent_at"),
            delivered_at: row.get("delivered_at"),
            created_at: row.get("created_at"),
        }
    }
}

impl NotificationLogStore for PostgresLogStore {
    async fn find(&self, notification_id: &str) -> Result<Option<NotificationLog>, Error> {
        let query = format!(
            "SELECT {} FROM notification_logs WHERE notification_id = $1",
            LOG_COLUMNS
        );

        let row = self
            .client
            .query_opt(&query, &[&notification_id])
            .await
            .map_err(|e| anyhow!("Notification log lookup failed: {}", e))?;

        Ok(row.as_ref().map(Self::row_to_log))
    }

    async fn create_pending(&self, new: NewNotificationLog) -> Result<NotificationLog, Error> {
        self.client
            .execute(
                "INSERT INTO notification_logs \
                     (id, notification_id, notification_type, user_id, push_token, metadata, status) \
                 VALUES ($1, $2, $3, $4, $5, $6, 'pending') \
                 ON CONFLICT (notification_id) DO NOTHING",
                &[
                    &Uuid::new_v4(),
                    &new.notification_id,
                    &new.notification_type,
                    &new.user_id,
                    &new.push_token,
                    &new.metadata,
                ],
            )
            .await
            .map_err(|e| anyhow!("Notification log insert failed: {}", e))?;

        self.find(&new.notification_id)
            .await?
            .ok_or_else(|| anyhow!("Notification log missing after insert: {}", new.notification_id))
    }

    async fn set_retry_count(&self, notification_id: &str, retry_count: u32) -> Result<(), Error> {
        self.client
            .execute(
                "UPDATE notification_logs \
                 SET retry_count = $2, updated_at = now() \
                 WHERE notification_id = $1",
                &[&notification_id, &(retry_count as i32)],
            )
            .await
            .map_err(|e| anyhow!("Retry count update failed: {}", e))?;

        Ok(())
    }

    async fn mark_delivered(&self, notification_id: &str, retry_count: u32) -> Result<(), Error> {
        self.client
            .execute(
                "UPDATE notification_logs \
                 SET status = 'delivered', retry_count = $2, sent_at = now(), \
                     delivered_at = now(), updated_at = now() \
                 WHERE notification_id = $1",
                &[&notification_id, &(retry_count as i32)],
            )
            .await
            .map_err(|e| anyhow!("Delivered status update failed: {}", e))?;

        Ok(())
    }

    async fn mark_failed(
        &self,
        notification_id: &str,
        error_message: &str,
        retry_count: u32,
    ) -> Result<(), Error> {
        self.client
            .execute(
                "UPDATE notification_logs \
                 SET status = 'failed', error_message = $2, retry_count = $3, updated_at = now() \
                 WHERE notification_id = $1",
                &[&notification_id, &error_message, &(retry_count as i32)],
            )
            .await
            .map_err(|e| anyhow!("Failed status update failed: {}", e))?;

        Ok(())
    }
}
