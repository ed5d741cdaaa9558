//! Notification handlers.

mod publish_payment_outcome;

pub use publish_payment_outcome::{
    PaymentOutcome, PublishError, PublishPaymentOutcomeCommand, PublishPaymentOutcomeHandler,
};
