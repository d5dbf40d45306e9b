use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use courier_client::ClientHandle;
use courier_core::config::DispatchConfig;
use courier_core::types::{Attachment, DispatchResult, DispatchSummary, Recipient};

/// Executes one dispatch batch: resolve → send → record, independently per
/// recipient, in the order supplied.
///
/// A fixed cooldown separates consecutive sends (longer when media is
/// attached) so the platform does not throttle the batch. When a job carries
/// several attachments they all travel in a single outgoing message per
/// recipient.
pub struct DispatchEngine {
    client: ClientHandle,
    text_cooldown: Duration,
    media_cooldown: Duration,
}

impl DispatchEngine {
    pub fn new(client: ClientHandle, config: &DispatchConfig) -> Self {
        Self {
            client,
            text_cooldown: Duration::from_millis(config.text_cooldown_ms),
            media_cooldown: Duration::from_millis(config.media_cooldown_ms),
        }
    }

    /// Send `body` (and `media`) from `account` to every recipient.
    ///
    /// Always returns exactly one [`DispatchResult`] per recipient, order
    /// preserved; a resolution or transport failure for one recipient never
    /// aborts the rest of the batch.
    pub async fn send(
        &self,
        account: &str,
        body: &str,
        recipients: &[Recipient],
        media: &[Attachment],
    ) -> DispatchSummary {
        let cooldown = if media.is_empty() {
            self.text_cooldown
        } else {
            self.media_cooldown
        };

        let mut results = Vec::with_capacity(recipients.len());
        for (i, recipient) in recipients.iter().enumerate() {
            let result = self.send_one(account, body, recipient, media).await;
            let more_to_go = i + 1 < recipients.len();
            let succeeded = result.success;
            results.push(result);

            if succeeded && more_to_go && !cooldown.is_zero() {
                sleep(cooldown).await;
            }
        }

        let summary = DispatchSummary::from_results(results);
        info!(
            account,
            sent = summary.sent_count,
            failed = summary.failed_count,
            "dispatch batch finished"
        );
        summary
    }

    async fn send_one(
        &self,
        account: &str,
        body: &str,
        recipient: &Recipient,
        media: &[Attachment],
    ) -> DispatchResult {
        let peer = match self.client.resolve(account, &recipient.identifier).await {
            Ok(peer) => peer,
            Err(e) => {
                warn!(
                    account,
                    identifier = %recipient.identifier,
                    error = %e,
                    "recipient resolution failed"
                );
                return DispatchResult::failed(recipient, e.to_string());
            }
        };

        match self
            .client
            .send(account, peer, body, media.to_vec())
            .await
        {
            Ok(()) => DispatchResult::ok(recipient),
            Err(e) => {
                warn!(
                    account,
                    identifier = %recipient.identifier,
                    error = %e,
                    "send failed"
                );
                DispatchResult::failed(recipient, e.to_string())
            }
        }
    }
}
