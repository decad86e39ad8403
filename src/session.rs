//! Logger session: connect, subscribe, append every notification, clean up.
//!
//! ```text
//! Disconnected --connect ok--> Connected --subscribe ok--> Notifying
//!      |                           |                           |
//!   connect fail /           subscribe fail /      interrupt / link lost /
//!   interrupt                interrupt             stream closed / limit
//!      v                           v                           v
//!  Err(ConnectionFailed)     Disconnecting               Disconnecting
//!  or Ok(Interrupted)              v                           v
//!                        Err(SubscriptionFailed)         Ok(SessionReport)
//!                        or Ok(Interrupted)
//! ```

use std::future::Future;
use std::time::Duration;

use futures::stream::StreamExt;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::LoggerError;
use crate::record::NotificationRecord;
use crate::sink::LogSink;
use crate::transport::{Connection, NotificationStream, Transport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Notifying,
    Disconnecting,
}

/// Why the wait loop stopped. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Interrupted,
    Disconnected,
    StreamClosed,
    DurationElapsed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    pub records_written: u64,
    pub records_skipped: u64,
}

pub struct LoggerSession<T: Transport> {
    transport: T,
    config: SessionConfig,
    state: ConnectionState,
    records_written: u64,
    records_skipped: u64,
}

impl<T: Transport> LoggerSession<T> {
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Self {
            transport,
            config,
            state: ConnectionState::Disconnected,
            records_written: 0,
            records_skipped: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    fn transition(&mut self, next: ConnectionState) {
        debug!("Connection state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Run until `shutdown` resolves or the link goes away.
    ///
    /// `shutdown` is watched from the first connect attempt on. Once
    /// connected, `unsubscribe` (if the subscription was made) and
    /// `disconnect` are each called exactly once on every exit path.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<SessionReport, LoggerError>
    where
        F: Future<Output = ()>,
    {
        let endpoint = self.config.endpoint.clone();
        let timeout = self.config.connect_timeout;
        tokio::pin!(shutdown);

        info!("Connecting to {}...", endpoint.address);
        self.transition(ConnectionState::Connecting);
        let connected = tokio::select! {
            biased;
            _ = &mut shutdown => None,
            result = bounded(timeout, self.transport.connect(&endpoint.address)) => Some(result),
        };
        let mut connection = match connected {
            Some(Ok(connection)) => connection,
            Some(Err(source)) => {
                self.transition(ConnectionState::Disconnected);
                return Err(LoggerError::ConnectionFailed {
                    address: endpoint.address,
                    source,
                });
            }
            None => {
                info!("Interrupted while connecting");
                self.transition(ConnectionState::Disconnected);
                return Ok(self.report(SessionOutcome::Interrupted));
            }
        };
        self.transition(ConnectionState::Connected);
        info!("Connected to {}", endpoint.address);

        info!("Enabling notifications on {}...", endpoint.characteristic);
        let subscribed = tokio::select! {
            biased;
            _ = &mut shutdown => None,
            result = bounded(
                timeout,
                connection.subscribe(endpoint.service, endpoint.characteristic),
            ) => Some(result),
        };
        let notifications = match subscribed {
            Some(Ok(stream)) => stream,
            Some(Err(source)) => {
                self.transition(ConnectionState::Disconnecting);
                disconnect(&mut connection).await;
                self.transition(ConnectionState::Disconnected);
                return Err(LoggerError::SubscriptionFailed {
                    characteristic: endpoint.characteristic,
                    source,
                });
            }
            None => {
                info!("Interrupted while enabling notifications, disconnecting...");
                self.transition(ConnectionState::Disconnecting);
                disconnect(&mut connection).await;
                self.transition(ConnectionState::Disconnected);
                return Ok(self.report(SessionOutcome::Interrupted));
            }
        };
        self.transition(ConnectionState::Notifying);
        info!("Notifications enabled. Waiting for data (Ctrl+C to stop)...");

        let result = self.pump(&connection, notifications, &mut shutdown).await;

        self.transition(ConnectionState::Disconnecting);
        info!("Disabling notifications and disconnecting...");
        if let Err(e) = connection
            .unsubscribe(endpoint.service, endpoint.characteristic)
            .await
        {
            warn!("Failed to disable notifications: {}", e);
        }
        disconnect(&mut connection).await;
        self.transition(ConnectionState::Disconnected);

        let outcome = result?;
        Ok(self.report(outcome))
    }

    fn report(&self, outcome: SessionOutcome) -> SessionReport {
        SessionReport {
            outcome,
            records_written: self.records_written,
            records_skipped: self.records_skipped,
        }
    }

    async fn pump<S>(
        &mut self,
        connection: &T::Connection,
        mut notifications: NotificationStream,
        mut shutdown: S,
    ) -> Result<SessionOutcome, LoggerError>
    where
        S: Future<Output = ()> + Unpin,
    {
        let mut sink = LogSink::open(&self.config.log_path).await?;
        debug!("Appending to {}", sink.path().display());

        let period = self.config.liveness_interval;
        let mut liveness = tokio::time::interval_at(Instant::now() + period, period);
        liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let capture_limit = self.config.capture_limit;
        let deadline = async move {
            match capture_limit {
                Some(limit) => tokio::time::sleep(limit).await,
                None => futures::future::pending().await,
            }
        };
        tokio::pin!(deadline);

        // Liveness goes ahead of notifications so a backlog cannot hide a lost link.
        let outcome = loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break SessionOutcome::Interrupted,
                _ = &mut deadline => {
                    info!("Capture limit reached");
                    break SessionOutcome::DurationElapsed;
                }
                _ = liveness.tick() => {
                    if !connection.is_connected().await {
                        warn!("Connection lost");
                        break SessionOutcome::Disconnected;
                    }
                }
                next = notifications.next() => match next {
                    Some(value) => self.handle(&mut sink, &value).await?,
                    None => {
                        warn!("Notification stream closed by the transport");
                        break SessionOutcome::StreamClosed;
                    }
                },
            }
        };

        sink.close().await?;
        Ok(outcome)
    }

    async fn handle(&mut self, sink: &mut LogSink, value: &[u8]) -> Result<(), LoggerError> {
        match NotificationRecord::received_now(value) {
            Ok(record) => {
                info!("Received: {}", record);
                sink.append(&record).await?;
                self.records_written += 1;
            }
            Err(e) if !e.is_terminal() => {
                warn!("Skipping notification ({} bytes): {}", value.len(), e);
                self.records_skipped += 1;
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }
}

async fn disconnect<C: Connection>(connection: &mut C) {
    if let Err(e) = connection.disconnect().await {
        warn!("Failed to disconnect cleanly: {}", e);
    }
}

async fn bounded<T>(
    limit: Option<Duration>,
    op: impl Future<Output = Result<T, TransportError>>,
) -> Result<T, TransportError> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, op)
            .await
            .map_err(|_| TransportError::Timeout(limit))?,
        None => op.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Endpoint;
    use crate::mock::MockTransport;
    use std::path::PathBuf;

    fn config(log_path: PathBuf) -> SessionConfig {
        SessionConfig {
            endpoint: Endpoint::default(),
            log_path,
            liveness_interval: Duration::from_millis(10),
            connect_timeout: Some(Duration::from_millis(200)),
            capture_limit: None,
        }
    }

    fn scratch_path() -> PathBuf {
        std::env::temp_dir().join(format!("session-{}.csv", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_connect_timeout_maps_to_connection_failed() {
        let path = scratch_path();
        let endpoint = Endpoint::default();
        let (transport, controller) =
            MockTransport::new(&endpoint.address, endpoint.characteristic);
        let mut session = LoggerSession::new(transport.stalling(), config(path.clone()));

        let err = session.run(futures::future::pending()).await.unwrap_err();
        assert!(matches!(
            err,
            LoggerError::ConnectionFailed {
                source: TransportError::Timeout(_),
                ..
            }
        ));
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert_eq!(controller.disconnect_calls(), 0);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_capture_limit_ends_session() {
        let path = scratch_path();
        let endpoint = Endpoint::default();
        let (transport, controller) =
            MockTransport::new(&endpoint.address, endpoint.characteristic);
        let mut config = config(path.clone());
        config.capture_limit = Some(Duration::from_millis(30));
        let mut session = LoggerSession::new(transport, config);

        let report = session.run(futures::future::pending()).await.unwrap();
        assert_eq!(report.outcome, SessionOutcome::DurationElapsed);
        assert_eq!(report.records_written, 0);
        assert_eq!(controller.unsubscribe_calls(), 1);
        assert_eq!(controller.disconnect_calls(), 1);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_unwritable_log_is_terminal_after_cleanup() {
        let path = std::env::temp_dir()
            .join(uuid::Uuid::new_v4().to_string())
            .join("out.csv");
        let endpoint = Endpoint::default();
        let (transport, controller) =
            MockTransport::new(&endpoint.address, endpoint.characteristic);
        let mut session = LoggerSession::new(transport, config(path));

        let err = session.run(futures::future::pending()).await.unwrap_err();
        assert!(matches!(err, LoggerError::Io { .. }));
        assert_eq!(controller.unsubscribe_calls(), 1);
        assert_eq!(controller.disconnect_calls(), 1);
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }
}
