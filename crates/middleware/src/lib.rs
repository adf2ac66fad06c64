//! reverser-middleware: pluggable event-log abstractions
//!
//! Provides the `Publisher` capability the relay depends on, the `Transport`
//! and `Subscription` traits the consumer loop drives, an in-memory
//! implementation for testing and a NATS JetStream implementation.

pub mod error;
pub mod memory;
pub mod nats;
pub mod transport;

pub use error::TransportError;
pub use memory::InMemoryTransport;
pub use nats::NatsTransport;
pub use transport::{Publisher, Record, Subscription, Transport};
