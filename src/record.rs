use std::fmt;

use chrono::{DateTime, Local};

use crate::error::LoggerError;

/// Local-time layout of the first column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// One received value, stamped on arrival. Written once, then dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRecord {
    pub timestamp: DateTime<Local>,
    pub payload: String,
}

impl NotificationRecord {
    pub fn decode(value: &[u8], timestamp: DateTime<Local>) -> Result<Self, LoggerError> {
        let payload = std::str::from_utf8(value)?.to_string();
        Ok(Self { timestamp, payload })
    }

    pub fn received_now(value: &[u8]) -> Result<Self, LoggerError> {
        Self::decode(value, Local::now())
    }

    /// `<timestamp> <payload>\n`, payload untouched.
    pub fn to_line(&self) -> String {
        format!("{}\n", self)
    }
}

impl fmt::Display for NotificationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.payload
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32, micros: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2025, 3, 14, h, m, s)
            .single()
            .unwrap()
            + chrono::Duration::microseconds(micros as i64)
    }

    #[test]
    fn test_line_layout() {
        let record = NotificationRecord::decode(b"1.65 V", at(9, 5, 7, 42)).unwrap();
        assert_eq!(record.to_line(), "2025-03-14 09:05:07.000042 1.65 V\n");
    }

    #[test]
    fn test_payload_kept_verbatim() {
        let record = NotificationRecord::decode(b"a,b;\"c\"", at(0, 0, 0, 0)).unwrap();
        assert_eq!(record.payload, "a,b;\"c\"");
        assert!(record.to_line().ends_with(" a,b;\"c\"\n"));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let err = NotificationRecord::decode(&[0x35, 0xc3, 0x28], at(0, 0, 0, 0)).unwrap_err();
        assert!(matches!(err, LoggerError::Decode(_)));
    }

    #[test]
    fn test_multibyte_payload() {
        let record = NotificationRecord::received_now("3,3 V ±0,1".as_bytes()).unwrap();
        assert_eq!(record.payload, "3,3 V ±0,1");
    }
}
