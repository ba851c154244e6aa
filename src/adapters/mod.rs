//! Serial port adapters
//!
//! The scale sampler never opens a port itself; it asks a [`SerialConnector`] for a fresh
//! byte stream. [`SerialAdapter`] opens real hardware through `tokio-serial`;
//! [`MockSerialConnector`] hands out scripted in-memory streams for tests.

pub mod mock;
pub mod serial_adapter;

pub use mock::MockSerialConnector;
pub use serial_adapter::{SerialAdapter, SerialParity, SerialSettings};

use crate::error::AcquisitionError;
use async_trait::async_trait;
use tokio::io::AsyncRead;

/// An open serial byte stream.
pub type SerialStream = Box<dyn AsyncRead + Send + Unpin>;

/// Opens the serial line on demand.
#[async_trait]
pub trait SerialConnector: Send + Sync {
    /// Port path, for logs and messages.
    fn port_name(&self) -> &str;

    /// Open the port. Each call yields an independent stream.
    async fn open(&self) -> Result<SerialStream, AcquisitionError>;
}
