//! Payment notification events as they travel over the wire.
//!
//! JSON shape: `{ "type": ..., "productId"?, "productTitle"?, "message"? }`.
//! Each variant carries only the fields that are meaningful for it.

use serde::{Deserialize, Serialize};

/// A notification delivered to a recipient's browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentEvent {
    /// Synthesized by the stream gateway once its subscription is live.
    /// Never published to the bus.
    Connected,

    /// The recipient's payment went through.
    PaymentSuccess {
        #[serde(rename = "productId")]
        product_id: String,
        #[serde(
            rename = "productTitle",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        product_title: Option<String>,
    },

    /// The recipient's payment was declined or errored.
    PaymentFailed {
        #[serde(rename = "productId", default, skip_serializing_if = "Option::is_none")]
        product_id: Option<String>,
        #[serde(
            rename = "productTitle",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        product_title: Option<String>,
        message: String,
    },
}

impl PaymentEvent {
    /// Wire discriminant of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            PaymentEvent::Connected => "connected",
            PaymentEvent::PaymentSuccess { .. } => "payment_success",
            PaymentEvent::PaymentFailed { .. } => "payment_failed",
        }
    }

    /// True for events that reach the display callback.
    pub fn is_notification(&self) -> bool {
        !matches!(self, PaymentEvent::Connected)
    }

    /// Serializes the event to its JSON wire form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses an event from its JSON wire form.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
