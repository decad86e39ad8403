use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::channel::mpsc::{TrySendError, UnboundedReceiver, UnboundedSender, unbounded};
use futures::stream::{self, StreamExt};
use uuid::Uuid;

use crate::transport::{Connection, NotificationStream, Transport, TransportError};

#[derive(Debug, Default)]
struct MockState {
    connected: AtomicBool,
    connect_calls: AtomicUsize,
    subscribe_calls: AtomicUsize,
    unsubscribe_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
}

/// Scripted peripheral. Values pushed through the paired [`MockController`]
/// arrive on the subscription stream in order.
#[derive(Debug)]
pub struct MockTransport {
    address: String,
    characteristic: Uuid,
    stall_connect: bool,
    stall_subscribe: bool,
    state: Arc<MockState>,
    notifications: Option<UnboundedReceiver<Vec<u8>>>,
}

#[derive(Debug, Clone)]
pub struct MockController {
    state: Arc<MockState>,
    sender: UnboundedSender<Vec<u8>>,
}

impl MockTransport {
    pub fn new(address: &str, characteristic: Uuid) -> (Self, MockController) {
        let state = Arc::new(MockState::default());
        let (sender, receiver) = unbounded();
        let transport = Self {
            address: address.to_string(),
            characteristic,
            stall_connect: false,
            stall_subscribe: false,
            state: state.clone(),
            notifications: Some(receiver),
        };
        (transport, MockController { state, sender })
    }

    /// `connect` never resolves, like a peripheral that stopped advertising mid-handshake.
    pub fn stalling(mut self) -> Self {
        self.stall_connect = true;
        self
    }

    /// Connects fine, but `subscribe` never resolves.
    pub fn stalling_subscribe(mut self) -> Self {
        self.stall_subscribe = true;
        self
    }
}

impl MockController {
    /// Fails once the stream has been closed.
    pub fn notify(&self, value: impl Into<Vec<u8>>) -> Result<(), TrySendError<Vec<u8>>> {
        self.sender.unbounded_send(value.into())
    }

    /// Simulate the link dropping; the next liveness check sees it.
    pub fn drop_link(&self) {
        self.state.connected.store(false, Ordering::SeqCst);
    }

    /// End the notification stream from the peripheral side.
    pub fn close_stream(&self) {
        self.sender.close_channel();
    }

    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }

    pub fn connect_calls(&self) -> usize {
        self.state.connect_calls.load(Ordering::SeqCst)
    }

    pub fn subscribe_calls(&self) -> usize {
        self.state.subscribe_calls.load(Ordering::SeqCst)
    }

    pub fn unsubscribe_calls(&self) -> usize {
        self.state.unsubscribe_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.state.disconnect_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Connection = MockConnection;

    async fn connect(&mut self, address: &str) -> Result<MockConnection, TransportError> {
        self.state.connect_calls.fetch_add(1, Ordering::SeqCst);
        if self.stall_connect {
            futures::future::pending::<()>().await;
        }
        if !address.eq_ignore_ascii_case(&self.address) {
            return Err(TransportError::DeviceNotFound(address.to_string()));
        }

        self.state.connected.store(true, Ordering::SeqCst);
        Ok(MockConnection {
            characteristic: self.characteristic,
            stall_subscribe: self.stall_subscribe,
            state: self.state.clone(),
            notifications: self.notifications.take(),
        })
    }
}

#[derive(Debug)]
pub struct MockConnection {
    characteristic: Uuid,
    stall_subscribe: bool,
    state: Arc<MockState>,
    notifications: Option<UnboundedReceiver<Vec<u8>>>,
}

#[async_trait]
impl Connection for MockConnection {
    async fn subscribe(
        &mut self,
        _service: Uuid,
        characteristic: Uuid,
    ) -> Result<NotificationStream, TransportError> {
        self.state.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        if self.stall_subscribe {
            futures::future::pending::<()>().await;
        }
        if !self.state.connected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        if characteristic != self.characteristic {
            return Err(TransportError::CharacteristicNotFound(characteristic));
        }

        Ok(match self.notifications.take() {
            Some(receiver) => receiver.boxed(),
            None => stream::empty().boxed(),
        })
    }

    async fn unsubscribe(
        &mut self,
        _service: Uuid,
        _characteristic: Uuid,
    ) -> Result<(), TransportError> {
        self.state.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
        if !self.state.connected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.state.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.state.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }
}
