//! `tokio-serial` connector for the scale.

use super::{SerialConnector, SerialStream};
use crate::error::AcquisitionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Parity modes for serial communication
#[derive(Clone, Debug, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerialParity {
    /// No parity bit
    #[default]
    None,
    /// Even parity
    Even,
    /// Odd parity
    Odd,
}

/// Line settings for the scale's serial port
#[derive(Clone, Debug, PartialEq)]
pub struct SerialSettings {
    /// Path to the serial device (e.g., "/dev/ttyUSB0", "COM4")
    pub path: String,
    /// Baud rate (9600, 115200, etc.)
    pub baud_rate: u32,
    /// Data bits (5-8)
    pub data_bits: u8,
    /// Stop bits (1 or 2)
    pub stop_bits: u8,
    /// Parity setting
    pub parity: SerialParity,
}

impl SerialSettings {
    /// 9600-8-N-1 on `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            baud_rate: 9600,
            data_bits: 8,
            stop_bits: 1,
            parity: SerialParity::None,
        }
    }
}

/// Serial adapter for the RS-232 scale
///
/// Opens the port through `tokio-serial` so reads suspend on the runtime instead of
/// blocking a thread. No flow control.
#[derive(Clone, Debug)]
pub struct SerialAdapter {
    settings: SerialSettings,
}

impl SerialAdapter {
    /// Create an adapter; the port is not touched until [`SerialConnector::open`].
    pub fn new(settings: SerialSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SerialConnector for SerialAdapter {
    fn port_name(&self) -> &str {
        &self.settings.path
    }

    #[cfg(feature = "serial")]
    async fn open(&self) -> Result<SerialStream, AcquisitionError> {
        use tokio_serial::SerialPortBuilderExt;

        let settings = &self.settings;
        let context = || {
            format!(
                "Failed to open serial port '{}' at {} baud",
                settings.path, settings.baud_rate
            )
        };

        let port = tokio_serial::new(settings.path.as_str(), settings.baud_rate)
            .data_bits(data_bits(settings.data_bits).map_err(|e| {
                AcquisitionError::connection(&context(), e)
            })?)
            .stop_bits(stop_bits(settings.stop_bits).map_err(|e| {
                AcquisitionError::connection(&context(), e)
            })?)
            .parity(parity(settings.parity))
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| AcquisitionError::connection(&context(), e))?;

        debug!(
            port = %settings.path,
            baud_rate = settings.baud_rate,
            "Serial port opened"
        );
        Ok(Box::new(port))
    }

    #[cfg(not(feature = "serial"))]
    async fn open(&self) -> Result<SerialStream, AcquisitionError> {
        debug!(port = %self.settings.path, "Serial feature disabled");
        Err(AcquisitionError::ConnectionError(
            "Serial support not enabled. Rebuild with --features serial".to_string(),
        ))
    }
}

#[cfg(feature = "serial")]
fn data_bits(bits: u8) -> Result<tokio_serial::DataBits, String> {
    match bits {
        5 => Ok(tokio_serial::DataBits::Five),
        6 => Ok(tokio_serial::DataBits::Six),
        7 => Ok(tokio_serial::DataBits::Seven),
        8 => Ok(tokio_serial::DataBits::Eight),
        other => Err(format!("unsupported data bits {}", other)),
    }
}

#[cfg(feature = "serial")]
fn stop_bits(bits: u8) -> Result<tokio_serial::StopBits, String> {
    match bits {
        1 => Ok(tokio_serial::StopBits::One),
        2 => Ok(tokio_serial::StopBits::Two),
        other => Err(format!("unsupported stop bits {}", other)),
    }
}

#[cfg(feature = "serial")]
fn parity(parity: SerialParity) -> tokio_serial::Parity {
    match parity {
        SerialParity::None => tokio_serial::Parity::None,
        SerialParity::Even => tokio_serial::Parity::Even,
        SerialParity::Odd => tokio_serial::Parity::Odd,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_adapter_creation() {
        let settings = SerialSettings::new("/dev/ttyUSB0");
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.data_bits, 8);
        assert_eq!(settings.stop_bits, 1);
        assert_eq!(settings.parity, SerialParity::None);

        let adapter = SerialAdapter::new(settings);
        assert_eq!(adapter.port_name(), "/dev/ttyUSB0");
    }

    #[tokio::test]
    async fn test_open_missing_port_is_connection_error() {
        let adapter = SerialAdapter::new(SerialSettings::new("/dev/lab-gateway-missing-port"));
        let err = adapter.open().await.err().unwrap();
        assert!(matches!(err, AcquisitionError::ConnectionError(_)));
    }

    #[cfg(feature = "serial")]
    #[test]
    fn test_framing_conversion() {
        assert_eq!(data_bits(7), Ok(tokio_serial::DataBits::Seven));
        assert!(data_bits(9).is_err());
        assert_eq!(stop_bits(2), Ok(tokio_serial::StopBits::Two));
        assert!(stop_bits(3).is_err());
        assert_eq!(parity(SerialParity::Odd), tokio_serial::Parity::Odd);
    }
}
