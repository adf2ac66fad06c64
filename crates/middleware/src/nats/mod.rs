mod transport;

pub use transport::{NatsTransport, KEY_HEADER};
