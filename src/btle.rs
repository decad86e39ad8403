//! btleplug-backed transport.

use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CharPropFlags, Characteristic, Manager as _, Peripheral as _, ScanFilter,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::StreamExt;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::transport::{Connection, NotificationStream, Transport, TransportError};

const SCAN_POLL: Duration = Duration::from_millis(500);

pub struct BtleTransport {
    adapter: Adapter,
    scan_timeout: Duration,
}

impl BtleTransport {
    /// Grab the first adapter the platform reports.
    pub async fn new(scan_timeout: Duration) -> Result<Self, TransportError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(TransportError::NoAdapter)?;

        if let Ok(info) = adapter.adapter_info().await {
            debug!("Using adapter {}", info);
        }

        Ok(Self {
            adapter,
            scan_timeout,
        })
    }

    async fn find_peripheral(&self, address: &str) -> Result<Peripheral, TransportError> {
        self.adapter.start_scan(ScanFilter::default()).await?;
        info!(
            "Scanning for {} (up to {}s)...",
            address,
            self.scan_timeout.as_secs()
        );

        let deadline = Instant::now() + self.scan_timeout;
        let found = loop {
            let peripherals = self.adapter.peripherals().await?;
            if let Some(p) = peripherals.into_iter().find(|p| matches_address(p, address)) {
                break Some(p);
            }
            if Instant::now() >= deadline {
                break None;
            }
            tokio::time::sleep(SCAN_POLL).await;
        };

        if let Err(e) = self.adapter.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }

        found.ok_or_else(|| TransportError::DeviceNotFound(address.to_string()))
    }
}

fn matches_address(peripheral: &Peripheral, address: &str) -> bool {
    peripheral.address().to_string().eq_ignore_ascii_case(address)
        || peripheral.id().to_string().eq_ignore_ascii_case(address)
}

#[async_trait]
impl Transport for BtleTransport {
    type Connection = BtleConnection;

    async fn connect(&mut self, address: &str) -> Result<BtleConnection, TransportError> {
        let peripheral = self.find_peripheral(address).await?;
        peripheral.connect().await?;
        peripheral.discover_services().await?;
        debug!(
            "Discovered {} characteristics on {}",
            peripheral.characteristics().len(),
            address
        );
        Ok(BtleConnection { peripheral })
    }
}

pub struct BtleConnection {
    peripheral: Peripheral,
}

impl BtleConnection {
    fn characteristic(&self, service: Uuid, uuid: Uuid) -> Result<Characteristic, TransportError> {
        let chars = self.peripheral.characteristics();
        chars
            .iter()
            .find(|c| c.uuid == uuid && c.service_uuid == service)
            .or_else(|| chars.iter().find(|c| c.uuid == uuid))
            .cloned()
            .ok_or(TransportError::CharacteristicNotFound(uuid))
    }
}

#[async_trait]
impl Connection for BtleConnection {
    async fn subscribe(
        &mut self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<NotificationStream, TransportError> {
        let target = self.characteristic(service, characteristic)?;
        if !target
            .properties
            .intersects(CharPropFlags::NOTIFY | CharPropFlags::INDICATE)
        {
            return Err(TransportError::NotifyUnsupported(characteristic));
        }

        // Take the stream before enabling the CCCD so the first value is not lost.
        let notifications = self.peripheral.notifications().await?;
        self.peripheral.subscribe(&target).await?;

        Ok(notifications
            .filter_map(move |n| async move { (n.uuid == characteristic).then_some(n.value) })
            .boxed())
    }

    async fn unsubscribe(
        &mut self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<(), TransportError> {
        let target = self.characteristic(service, characteristic)?;
        self.peripheral.unsubscribe(&target).await?;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.peripheral.disconnect().await?;
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }
}
