//! Message bus adapters.
//!
//! - `redis` - Redis pub/sub, one dedicated connection per open stream
//! - `in_memory` - In-process bus for tests and local development

mod in_memory;
mod redis;

pub use in_memory::{InMemoryBrokerClient, InMemoryMessageBus};
pub use self::redis::{RedisBrokerClient, RedisBrokerFactory, RedisChannelPublisher};
