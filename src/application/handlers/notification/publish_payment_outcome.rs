//! PublishPaymentOutcomeHandler - Command handler that announces a payment
//! outcome to the affected recipient's open streams.
//!
//! Called once per outcome by the payment webhook processing. Publishing is
//! fire-and-forget: the bus keeps nothing, so a recipient with no open
//! stream simply never sees the event.

use std::sync::Arc;

use thiserror::Error;

use crate::domain::foundation::UserId;
use crate::domain::notification::{Channel, PaymentEvent};
use crate::ports::{BrokerError, ChannelPublisher};

/// How a payment ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Succeeded {
        product_id: String,
        product_title: Option<String>,
    },
    Failed {
        product_id: Option<String>,
        product_title: Option<String>,
        message: String,
    },
}

impl From<PaymentOutcome> for PaymentEvent {
    fn from(outcome: PaymentOutcome) -> Self {
        match outcome {
            PaymentOutcome::Succeeded {
                product_id,
                product_title,
            } => PaymentEvent::PaymentSuccess {
                product_id,
                product_title,
            },
            PaymentOutcome::Failed {
                product_id,
                product_title,
                message,
            } => PaymentEvent::PaymentFailed {
                product_id,
                product_title,
                message,
            },
        }
    }
}

/// Command to publish a payment outcome.
#[derive(Debug, Clone)]
pub struct PublishPaymentOutcomeCommand {
    /// The user whose payment this was.
    pub recipient: UserId,
    pub outcome: PaymentOutcome,
}

/// Publishing failures.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to serialize payment event: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// Handler for publishing payment outcomes.
pub struct PublishPaymentOutcomeHandler {
    publisher: Arc<dyn ChannelPublisher>,
}

impl PublishPaymentOutcomeHandler {
    pub fn new(publisher: Arc<dyn ChannelPublisher>) -> Self {
        Self { publisher }
    }

    /// Publishes the outcome once. Returns how many subscribers the bus
    /// reported; zero is not an error.
    pub async fn handle(&self, cmd: PublishPaymentOutcomeCommand) -> Result<usize, PublishError> {
        let channel = Channel::for_recipient(&cmd.recipient);
        let event = PaymentEvent::from(cmd.outcome);
        let payload = event.to_json()?;

        let receivers = self.publisher.publish(&channel, &payload).await?;
        tracing::info!(
            channel = %channel,
            kind = event.kind(),
            receivers,
            "payment outcome published"
        );
        Ok(receivers)
    }
}
