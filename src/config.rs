use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use uuid::Uuid;

pub const DEFAULT_ADDRESS: &str = "74:4D:BD:61:E5:30";
pub const DEFAULT_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000ff01_0000_1000_8000_00805f9b34fb);
pub const DEFAULT_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x0000ff01_0000_1000_8000_00805f9b34fb);
pub const DEFAULT_LOG_PATH: &str = "pot_data.csv";

/// The one peripheral this run talks to. Fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub address: String,
    pub service: Uuid,
    pub characteristic: Uuid,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            service: DEFAULT_SERVICE_UUID,
            characteristic: DEFAULT_CHARACTERISTIC_UUID,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub endpoint: Endpoint,
    pub log_path: PathBuf,
    /// How often the wait loop asks the transport whether the link is still up.
    pub liveness_interval: Duration,
    /// Upper bound on connect and on subscribe. `None` waits forever.
    pub connect_timeout: Option<Duration>,
    /// Stop after this long even if the link stays up.
    pub capture_limit: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
            liveness_interval: Duration::from_secs(1),
            connect_timeout: Some(Duration::from_secs(30)),
            capture_limit: None,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "ble-notify-logger",
    about = "Subscribe to one BLE characteristic and append every notification to a CSV file"
)]
pub struct Args {
    /// Peripheral hardware address (e.g. 74:4D:BD:61:E5:30)
    #[arg(long, env = "BLE_ADDRESS", default_value = DEFAULT_ADDRESS)]
    pub address: String,

    /// GATT service UUID
    #[arg(long, env = "BLE_SERVICE_UUID", default_value_t = DEFAULT_SERVICE_UUID)]
    pub service: Uuid,

    /// Characteristic UUID to subscribe to
    #[arg(long, env = "BLE_CHARACTERISTIC_UUID", default_value_t = DEFAULT_CHARACTERISTIC_UUID)]
    pub characteristic: Uuid,

    /// File that receives one line per notification
    #[arg(short, long, env = "BLE_LOG_PATH", default_value = DEFAULT_LOG_PATH)]
    pub output: PathBuf,

    /// How long to scan for the peripheral before giving up
    #[arg(long, default_value_t = 10)]
    pub scan_timeout_secs: u64,

    /// Bound on connect and subscribe; 0 waits indefinitely
    #[arg(long, default_value_t = 30)]
    pub connect_timeout_secs: u64,

    #[arg(long, default_value_t = 1000)]
    pub liveness_interval_ms: u64,

    /// Stop capturing after this many seconds
    #[arg(long)]
    pub duration_secs: Option<u64>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            endpoint: Endpoint {
                address: self.address.clone(),
                service: self.service,
                characteristic: self.characteristic,
            },
            log_path: self.output.clone(),
            liveness_interval: Duration::from_millis(self.liveness_interval_ms.max(1)),
            connect_timeout: (self.connect_timeout_secs > 0)
                .then(|| Duration::from_secs(self.connect_timeout_secs)),
            capture_limit: self.duration_secs.map(Duration::from_secs),
        }
    }
}
