pub mod btle;
pub mod config;
pub mod error;
pub mod logging;
pub mod mock;
pub mod record;
pub mod session;
pub mod sink;
pub mod transport;

pub use config::{Args, Endpoint, SessionConfig};
pub use error::LoggerError;
pub use record::NotificationRecord;
pub use session::{ConnectionState, LoggerSession, SessionOutcome, SessionReport};
pub use transport::{Connection, NotificationStream, Transport, TransportError};
