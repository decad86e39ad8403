//! Transport collaborator seam.
//!
//! The session only talks to these two traits. `btle` backs them with a
//! real adapter, `mock` with an in-memory script.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;
use uuid::Uuid;

/// Raw characteristic values, in arrival order.
pub type NotificationStream = BoxStream<'static, Vec<u8>>;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("no Bluetooth adapter found")]
    NoAdapter,

    #[error("device {0} not found")]
    DeviceNotFound(String),

    #[error("characteristic {0} not found")]
    CharacteristicNotFound(Uuid),

    #[error("characteristic {0} does not support notifications")]
    NotifyUnsupported(Uuid),

    #[error("not connected")]
    NotConnected,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Btleplug(#[from] btleplug::Error),
}

#[async_trait]
pub trait Transport: Send {
    type Connection: Connection;

    async fn connect(&mut self, address: &str) -> Result<Self::Connection, TransportError>;
}

#[async_trait]
pub trait Connection: Send + Sync {
    async fn subscribe(
        &mut self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<NotificationStream, TransportError>;

    async fn unsubscribe(&mut self, service: Uuid, characteristic: Uuid)
    -> Result<(), TransportError>;

    async fn disconnect(&mut self) -> Result<(), TransportError>;

    async fn is_connected(&self) -> bool;
}
