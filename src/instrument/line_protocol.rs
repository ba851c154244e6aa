//! Line-oriented TCP instrument client (refractometer, polarimeter).
//!
//! Protocol: connect, send the command letter followed by CR LF, take the payload of the
//! first inbound read as the whole response, close. The instrument delivers its reading in
//! one segment, so no reassembly is attempted. Queueing, connect and response share one
//! deadline.

use crate::error::AcquisitionError;
use crate::measurement::{ParsedReading, RawSample, ResponseFormat};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Command terminator expected by the instruments.
pub const LINE_TERMINATOR: &str = "\r\n";
/// Read command understood by both optical instruments.
pub const DEFAULT_COMMAND: &str = "R";
/// Connect + response deadline.
pub const DEFAULT_TCP_TIMEOUT: Duration = Duration::from_secs(10);
/// Upper bound of a single response read.
pub const MAX_RESPONSE_BYTES: usize = 4096;

/// Where and how to reach one TCP instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentEndpoint {
    /// Human-readable name for logs.
    pub name: String,
    /// Host name or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Command sent before reading, without terminator.
    pub command: String,
    /// How the response is interpreted.
    pub format: ResponseFormat,
    /// Connect + response deadline.
    pub timeout: Duration,
}

impl InstrumentEndpoint {
    /// Endpoint with the default `R` command and 10 s deadline.
    pub fn new(name: &str, host: &str, port: u16, format: ResponseFormat) -> Self {
        Self {
            name: name.to_string(),
            host: host.to_string(),
            port,
            command: DEFAULT_COMMAND.to_string(),
            format,
            timeout: DEFAULT_TCP_TIMEOUT,
        }
    }

    /// Replace the command.
    pub fn with_command(mut self, command: &str) -> Self {
        self.command = command.to_string();
        self
    }

    /// Replace the deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Bytes put on the wire.
    pub fn wire_command(&self) -> String {
        format!("{}{}", self.command, LINE_TERMINATOR)
    }
}

/// One-shot request/response client for a line-oriented TCP instrument.
///
/// Every exchange uses a fresh connection. Exchanges with the same instrument are
/// serialized; different clients are independent.
#[derive(Debug)]
pub struct LineProtocolClient {
    endpoint: InstrumentEndpoint,
    in_flight: Mutex<()>,
}

impl LineProtocolClient {
    /// Create a client for `endpoint`.
    pub fn new(endpoint: InstrumentEndpoint) -> Self {
        Self {
            endpoint,
            in_flight: Mutex::new(()),
        }
    }

    /// The endpoint this client talks to.
    pub fn endpoint(&self) -> &InstrumentEndpoint {
        &self.endpoint
    }

    /// Perform one exchange and return the trimmed response text.
    ///
    /// The deadline covers waiting for an earlier exchange with the same instrument.
    #[tracing::instrument(
        skip(self),
        fields(instrument = %self.endpoint.name, address = %self.endpoint.address())
    )]
    pub async fn query(&self) -> Result<RawSample, AcquisitionError> {
        let turn = async {
            let _turn = self.in_flight.lock().await;
            self.exchange().await
        };

        match tokio::time::timeout(self.endpoint.timeout, turn).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout = ?self.endpoint.timeout, "No response before deadline");
                Err(AcquisitionError::AcquisitionTimeout(format!(
                    "No response from {} at {} within {:?}",
                    self.endpoint.name,
                    self.endpoint.address(),
                    self.endpoint.timeout
                )))
            }
        }
    }

    /// Perform one exchange and interpret the response.
    pub async fn read(&self) -> Result<ParsedReading, AcquisitionError> {
        let raw = self.query().await?;
        self.endpoint.format.parse(&raw.text)
    }

    async fn exchange(&self) -> Result<RawSample, AcquisitionError> {
        let address = self.endpoint.address();
        let mut stream = TcpStream::connect((self.endpoint.host.as_str(), self.endpoint.port))
            .await
            .map_err(|e| {
                AcquisitionError::connection(&format!("Failed to connect to {}", address), e)
            })?;
        debug!("Connected");

        stream
            .write_all(self.endpoint.wire_command().as_bytes())
            .await
            .map_err(|e| {
                AcquisitionError::connection(&format!("Failed to send to {}", address), e)
            })?;

        let mut buf = vec![0u8; MAX_RESPONSE_BYTES];
        let read = stream
            .read(&mut buf)
            .await
            .map_err(|e| {
                AcquisitionError::connection(&format!("Failed to read from {}", address), e)
            })?;
        if read == 0 {
            return Err(AcquisitionError::ConnectionError(format!(
                "{} closed the connection without a response",
                address
            )));
        }

        let sample = RawSample::new(&String::from_utf8_lossy(&buf[..read]));
        info!(response = %sample.text, "Reading received");
        // Dropping the stream closes the connection.
        Ok(sample)
    }
}
