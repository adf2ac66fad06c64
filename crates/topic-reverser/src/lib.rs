pub mod config;
pub mod consumer;
pub mod error;
pub mod message;
pub mod metrics;
pub mod relay;
pub mod server;
pub mod shutdown;
pub mod transform;

pub use config::Config;
pub use consumer::RelayConsumer;
pub use error::Error;
pub use message::Message;
pub use relay::{Relay, RelayConfig};
pub use transform::{Reverser, Transform};

pub type Result<T> = std::result::Result<T, Error>;
