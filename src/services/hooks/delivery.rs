//! Outbox delivery worker.
//!
//! Polls committed outbox rows and POSTs them to their destination.
//! Failed attempts are retried with capped exponential backoff until
//! the attempt budget runs out, which makes delivery at-least-once for
//! rows that ever become deliverable.

use crate::{config::HookDeliveryConfig, database::entities::hook_events, utils::clock::now_milli};
use log::{debug, error, warn};
use sea_orm::DatabaseConnection;
use std::{sync::Arc, time::Duration};

/// Events fetched per polling pass
const BATCH_SIZE: u64 = 64;

pub struct HookDeliverer {
    db: DatabaseConnection,
    client: reqwest::Client,
    config: HookDeliveryConfig,
}

impl HookDeliverer {
    pub fn new(db: DatabaseConnection, config: HookDeliveryConfig) -> Arc<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout))
            .build()
            .expect("Failed to create hook delivery client");
        Arc::new(Self { db, client, config })
    }

    /// Delivery loop, spawned once at startup
    pub async fn process(self: Arc<Self>) {
        let interval = Duration::from_millis(self.config.poll_interval);
        loop {
            if let Err(err) = self.deliver_due().await {
                error!("Failed to poll hook outbox: {err:?}");
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Attempts delivery of every due pending event once
    async fn deliver_due(&self) -> Result<(), sea_orm::DbErr> {
        let due = hook_events::Model::due(&self.db, now_milli(), BATCH_SIZE).await?;
        for event in due {
            self.deliver(event).await?;
        }
        Ok(())
    }

    async fn deliver(&self, event: hook_events::Model) -> Result<(), sea_orm::DbErr> {
        let url = event.url.clone();
        let result = self
            .client
            .post(&url)
            .json(&event.payload.0)
            .send()
            .await
            .and_then(|response| response.error_for_status());

        match result {
            Ok(_) => {
                debug!("Delivered hook event {} to {}", event.id, url);
                event.mark_delivered(&self.db).await?;
            }
            Err(err) => {
                let id = event.id;
                let attempts = event.attempts + 1;
                let updated = event
                    .mark_failed(
                        &self.db,
                        err.to_string(),
                        self.config.backoff as i64,
                        self.config.max_attempts,
                    )
                    .await?;
                if updated.delivered_at < 0 {
                    error!("Giving up on hook event {id} after {attempts} attempts: {err}");
                } else {
                    warn!("Failed to deliver hook event {id} (attempt {attempts}): {err}");
                }
            }
        }
        Ok(())
    }
}
