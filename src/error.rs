use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use crate::transport::TransportError;

/// Everything that can go wrong during a logging session.
#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("could not connect to {address}: {source}")]
    ConnectionFailed {
        address: String,
        #[source]
        source: TransportError,
    },

    #[error("could not subscribe to characteristic {characteristic}: {source}")]
    SubscriptionFailed {
        characteristic: Uuid,
        #[source]
        source: TransportError,
    },

    #[error("payload is not valid UTF-8: {0}")]
    Decode(#[from] std::str::Utf8Error),

    #[error("could not write to {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LoggerError {
    /// Decode failures only cost the one notification; everything else ends the run.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoggerError::Decode(_))
    }
}
