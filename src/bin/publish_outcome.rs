//! Outcome publisher.
//!
//! Publishes one payment outcome to the recipient's channel through the
//! process-wide Redis publisher, then exits. Payment processing runs it once
//! per outcome; operators use it to check a live stream end to end.
//!
//! ```text
//! publish-outcome <recipient> success <product-id> [product-title]
//! publish-outcome <recipient> failed <message> [product-id] [product-title]
//! ```

use marketplace_relay::adapters::broker::RedisChannelPublisher;
use marketplace_relay::application::{
    PaymentOutcome, PublishPaymentOutcomeCommand, PublishPaymentOutcomeHandler,
};
use marketplace_relay::config::PublisherConfig;
use marketplace_relay::domain::foundation::UserId;
use marketplace_relay::telemetry::{self, LogFormat};

const USAGE: &str = "usage: publish-outcome <recipient> success <product-id> [product-title]\n       publish-outcome <recipient> failed <message> [product-id] [product-title]";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_command(&args).map_err(|e| format!("{e}\n{USAGE}"))?;

    let config = PublisherConfig::load()?;
    config.validate()?;
    telemetry::init(&config.log_level, LogFormat::Compact);

    let publisher = RedisChannelPublisher::global(&config.redis.url, config.redis.timeout())?;
    let handler = PublishPaymentOutcomeHandler::new(publisher);

    let recipient = command.recipient.clone();
    let receivers = handler.handle(command).await?;
    if receivers == 0 {
        tracing::warn!(%recipient, "no open stream for recipient; outcome dropped");
    }
    Ok(())
}

fn parse_command(args: &[String]) -> Result<PublishPaymentOutcomeCommand, String> {
    let mut args = args.iter().map(String::as_str);
    let recipient = args.next().ok_or("missing recipient")?;
    let recipient = UserId::new(recipient).map_err(|e| e.to_string())?;

    let outcome = match args.next() {
        Some("success") => PaymentOutcome::Succeeded {
            product_id: args.next().ok_or("missing product id")?.to_string(),
            product_title: args.next().map(str::to_string),
        },
        Some("failed") => PaymentOutcome::Failed {
            message: args.next().ok_or("missing failure message")?.to_string(),
            product_id: args.next().map(str::to_string),
            product_title: args.next().map(str::to_string),
        },
        Some(other) => return Err(format!("unknown outcome '{other}'")),
        None => return Err("missing outcome".to_string()),
    };
    if args.next().is_some() {
        return Err("too many arguments".to_string());
    }

    Ok(PublishPaymentOutcomeCommand { recipient, outcome })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn parses_success_with_title() {
        let command = parse_command(&args(&["U1", "success", "P1", "Widget"])).unwrap();
        assert_eq!(command.recipient.as_str(), "U1");
        assert_eq!(
            command.outcome,
            PaymentOutcome::Succeeded {
                product_id: "P1".to_string(),
                product_title: Some("Widget".to_string()),
            }
        );
    }

    #[test]
    fn parses_failure_with_message_only() {
        let command = parse_command(&args(&["U1", "failed", "Card declined"])).unwrap();
        assert_eq!(
            command.outcome,
            PaymentOutcome::Failed {
                product_id: None,
                product_title: None,
                message: "Card declined".to_string(),
            }
        );
    }

    #[test]
    fn rejects_incomplete_or_unknown_input() {
        assert!(parse_command(&args(&[])).is_err());
        assert!(parse_command(&args(&["U1"])).is_err());
        assert!(parse_command(&args(&["U1", "success"])).is_err());
        assert!(parse_command(&args(&["U1", "refunded", "P1"])).is_err());
        assert!(parse_command(&args(&["  ", "success", "P1"])).is_err());
        assert!(parse_command(&args(&["U1", "success", "P1", "T", "extra"])).is_err());
    }
}
