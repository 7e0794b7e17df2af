//! Long-poll update intake
//!
//! Pulls the operator's update feed with a cursor-tracked long poll and
//! forwards decoded actions to the dispatch channel. Payloads are decoded
//! into typed structs right here at the boundary; nothing dictionary-shaped
//! crosses into the rest of the service.

use crate::config::IntakeConfig;
use crate::error::{OperatorError, OperatorResult};
use crate::service::IntakeTransport;
use crate::vault::VaultAction;

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// One update from the feed
#[derive(Debug, Clone, Deserialize)]
pub struct IntakeUpdate {
    pub update_id: u64,
    /// Present when the update requests an on-chain action
    #[serde(default)]
    pub action: Option<VaultAction>,
}

#[derive(Debug, Deserialize)]
struct UpdateBatch {
    ok: bool,
    #[serde(default)]
    updates: Vec<IntakeUpdate>,
    #[serde(default)]
    description: Option<String>,
}

/// Long-poll transport over the update feed
pub struct LongPollIntake {
    client: reqwest::Client,
    base_url: String,
    poll_timeout: Duration,
    /// Next update id to request; advances past everything delivered
    cursor: u64,
    sink: mpsc::Sender<IntakeUpdate>,
}

impl LongPollIntake {
    pub fn new(config: &IntakeConfig, sink: mpsc::Sender<IntakeUpdate>) -> OperatorResult<Self> {
        let poll_timeout = Duration::from_secs(config.poll_timeout_secs);

        // Client timeout must outlast the server's long-poll hold
        let client = reqwest::Client::builder()
            .timeout(poll_timeout + Duration::from_secs(10))
            .build()
            .map_err(|e| OperatorError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            poll_timeout,
            cursor: 0,
            sink,
        })
    }

    async fn poll_once(&mut self) -> OperatorResult<()> {
        let url = format!("{}/updates", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("offset", self.cursor.to_string()),
                ("timeout", self.poll_timeout.as_secs().to_string()),
            ])
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(OperatorError::IntakeProtocol(format!(
                "update feed returned HTTP {}",
                status
            )));
        }

        let batch: UpdateBatch = response
            .json()
            .await
            .map_err(|e| OperatorError::IntakeProtocol(format!("malformed update batch: {}", e)))?;

        if !batch.ok {
            return Err(OperatorError::IntakeProtocol(
                batch
                    .description
                    .unwrap_or_else(|| "update feed reported failure".to_string()),
            ));
        }

        self.cursor = next_cursor(self.cursor, &batch.updates);

        for update in batch.updates {
            debug!("Intake update {}", update.update_id);
            if self.sink.send(update).await.is_err() {
                // Dispatcher is gone; only happens during shutdown
                return Err(OperatorError::Interrupted);
            }
        }

        Ok(())
    }
}

#[async_trait]
impl IntakeTransport for LongPollIntake {
    async fn start(&mut self) -> OperatorResult<()> {
        info!("Intake connected to {} (cursor {})", self.base_url, self.cursor);
        loop {
            self.poll_once().await?;
        }
    }
}

/// Advance past every delivered update
fn next_cursor(current: u64, updates: &[IntakeUpdate]) -> u64 {
    updates
        .iter()
        .map(|u| u.update_id + 1)
        .fold(current, u64::max)
}

fn classify_transport_error(e: reqwest::Error) -> OperatorError {
    if e.is_timeout() || e.is_connect() {
        OperatorError::IntakeConnection(e.to_string())
    } else {
        OperatorError::IntakeProtocol(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;

    #[test]
    fn batches_decode_with_typed_actions() {
        let batch: UpdateBatch = serde_json::from_str(
            r#"{
                "ok": true,
                "updates": [
                    {"update_id": 3, "action": {"type": "pause"}},
                    {"update_id": 4}
                ]
            }"#,
        )
        .unwrap();

        assert!(batch.ok);
        assert_eq!(batch.updates.len(), 2);
        assert_eq!(batch.updates[0].action, Some(VaultAction::Pause));
        assert!(batch.updates[1].action.is_none());
    }

    #[test]
    fn failure_batches_decode_without_updates() {
        let batch: UpdateBatch =
            serde_json::from_str(r#"{"ok": false, "description": "conflict"}"#).unwrap();
        assert!(!batch.ok);
        assert_eq!(batch.description.as_deref(), Some("conflict"));
        assert!(batch.updates.is_empty());
    }

    #[test]
    fn cursor_advances_past_the_newest_update() {
        let updates: Vec<IntakeUpdate> = serde_json::from_str(
            r#"[{"update_id": 10}, {"update_id": 12}, {"update_id": 11}]"#,
        )
        .unwrap();
        assert_eq!(next_cursor(5, &updates), 13);
    }

    #[test]
    fn cursor_never_moves_backwards() {
        let updates: Vec<IntakeUpdate> = serde_json::from_str(r#"[{"update_id": 2}]"#).unwrap();
        assert_eq!(next_cursor(40, &updates), 40);
        assert_eq!(next_cursor(40, &[]), 40);
    }

    #[test]
    fn protocol_rejections_map_to_the_protocol_class() {
        let err = OperatorError::IntakeProtocol("update feed returned HTTP 409".into());
        assert_eq!(err.class(), ErrorClass::ProtocolFatalish);
    }
}
