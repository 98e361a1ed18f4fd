//! Message-queue listener wiring.
//!
//! - [`Broker`] - in-process topic transport with consumer groups, one
//!   `tokio::sync::mpsc` channel per group member.
//! - [`Queue`] - a [`Service`] that consumes one topic for one group and
//!   hands each message to a [`ConsumeHandler`].
//! - [`ServiceGroup`] - starts and stops a set of services together.
//! - [`listen::queue_services`] - the process-wide list of queue consumers.

pub mod broker;
pub mod config;
pub mod handlers;
pub mod listen;
pub mod queue;
pub mod service;

pub use broker::{Broker, QueueMessage};
pub use config::{MqConfig, QueueConf};
pub use queue::{ConsumeHandler, Queue};
pub use service::{Service, ServiceGroup};
