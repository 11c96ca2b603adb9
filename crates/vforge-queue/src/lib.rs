//! Session progress broadcaster and distribution queue.
//!
//! - [`Broadcaster`]: in-process, per-session fan-out of progress and
//!   collaboration events to live connections
//! - [`RedisDistributionQueue`]: Redis Streams hand-off of finished videos
//!   to the downstream scheduler

pub mod broadcast;
pub mod distribution;
pub mod error;

pub use broadcast::{Broadcaster, BroadcasterConfig, SessionHandle, Subscriber};
pub use distribution::{DistributionQueue, QueueConfig, RedisDistributionQueue};
pub use error::{QueueError, QueueResult};
