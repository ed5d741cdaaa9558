//! Bus channel naming.

use std::fmt;

use crate::domain::foundation::UserId;

/// Prefix shared by every per-recipient payment channel.
pub const PAYMENT_CHANNEL_PREFIX: &str = "payment";

/// A named topic on the message bus.
///
/// Payment channels are derived deterministically from the recipient's
/// identity as `payment:<recipientId>`, so the publisher and every open
/// stream for that recipient agree without coordination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Channel(String);

impl Channel {
    /// Channel owned by the given recipient.
    pub fn for_recipient(recipient: &UserId) -> Self {
        Self(format!("{}:{}", PAYMENT_CHANNEL_PREFIX, recipient.as_str()))
    }

    /// Returns the channel name as sent to the bus.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Channel {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_is_prefixed_recipient_id() {
        let channel = Channel::for_recipient(&UserId::new("U1").unwrap());
        assert_eq!(channel.as_str(), "payment:U1");
    }

    #[test]
    fn same_recipient_yields_same_channel() {
        let a = Channel::for_recipient(&UserId::new("user-42").unwrap());
        let b = Channel::for_recipient(&UserId::new("user-42").unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn different_recipients_yield_different_channels() {
        let a = Channel::for_recipient(&UserId::new("U1").unwrap());
        let b = Channel::for_recipient(&UserId::new("U2").unwrap());
        assert_ne!(a, b);
    }
}
