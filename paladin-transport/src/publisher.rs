//! Reliable, ordered-per-(from,to) delivery of stage messages over the
//! peer transport, with indefinite exponential-backoff retry until the
//! remote transport acknowledges receipt.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::client::TransportClient;
use crate::proto::Envelope;
use crate::TransportError;

/// Backoff schedule for redelivery. Unlike the public transaction manager's
/// capped retry count, the publisher retries forever: delivery failure here
/// is always transient (peer unreachable), never terminal.
#[derive(Debug, Clone)]
pub struct PublisherBackoff {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
}

impl Default for PublisherBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(200),
            max: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl PublisherBackoff {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max.as_secs_f64());
        let jitter: f64 = rand::thread_rng().gen_range(0.8..1.2);
        Duration::from_secs_f64(capped * jitter)
    }
}

pub struct Publisher {
    client: TransportClient,
    backoff: PublisherBackoff,
}

impl Publisher {
    pub fn new(client: TransportClient) -> Self {
        Self {
            client,
            backoff: PublisherBackoff::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: PublisherBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Deliver `envelope`, retrying with backoff until the remote transport
    /// acknowledges it or `cancelled` resolves (engine-level shutdown).
    pub async fn publish_until_acked(
        &self,
        envelope: Envelope,
        mut cancelled: tokio::sync::watch::Receiver<bool>,
    ) -> Result<(), TransportError> {
        let mut attempt = 0u32;
        loop {
            if *cancelled.borrow() {
                return Err(TransportError::Cancelled);
            }

            match self.client.deliver(envelope.clone()).await {
                Ok(_) => {
                    debug!(message_id = %envelope.message_id, attempt, "envelope acknowledged");
                    return Ok(());
                }
                Err(e) => {
                    warn!(message_id = %envelope.message_id, attempt, error = %e, "delivery failed, retrying");
                    let delay = self.backoff.delay_for_attempt(attempt);
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancelled.changed() => {
                            if *cancelled.borrow() {
                                return Err(TransportError::Cancelled);
                            }
                        }
                    }
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let b = PublisherBackoff::default();
        let d0 = b.delay_for_attempt(0).as_secs_f64();
        let d5 = b.delay_for_attempt(5).as_secs_f64();
        let d20 = b.delay_for_attempt(20).as_secs_f64();
        assert!(d0 <= 0.3);
        assert!(d5 > d0);
        assert!(d20 <= b.max.as_secs_f64() * 1.21);
    }
}
