//! Scripted serial connector for tests and bench work without a scale attached.
//!
//! Each call to [`SerialConnector::open`] consumes the next scripted port. A port delivers its
//! lines (CR/LF terminated) and then either stays silent, like a scale that stopped
//! streaming, or reports end-of-stream.

use super::{SerialConnector, SerialStream};
use crate::error::AcquisitionError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{AsyncWriteExt, DuplexStream};

const MOCK_BUFFER_BYTES: usize = 64 * 1024;

#[derive(Debug)]
enum MockPort {
    Lines { lines: Vec<String>, close: bool },
    FailOpen(String),
}

/// Serial connector that replays scripted ports.
#[derive(Debug)]
pub struct MockSerialConnector {
    port_name: String,
    scripts: Mutex<VecDeque<MockPort>>,
    // Writers of silent ports; held so readers pend instead of hitting EOF.
    idle_writers: Mutex<Vec<DuplexStream>>,
    open_count: AtomicUsize,
}

impl MockSerialConnector {
    /// Create a connector with nothing scripted.
    pub fn new(port_name: &str) -> Self {
        Self {
            port_name: port_name.to_string(),
            scripts: Mutex::new(VecDeque::new()),
            idle_writers: Mutex::new(Vec::new()),
            open_count: AtomicUsize::new(0),
        }
    }

    /// Next open yields a port that sends `lines` and then goes quiet.
    pub fn push_lines(&self, lines: &[&str]) -> &Self {
        self.push(MockPort::Lines {
            lines: lines.iter().map(|l| l.to_string()).collect(),
            close: false,
        })
    }

    /// Next open yields a port that sends `lines` and then closes.
    pub fn push_lines_then_close(&self, lines: &[&str]) -> &Self {
        self.push(MockPort::Lines {
            lines: lines.iter().map(|l| l.to_string()).collect(),
            close: true,
        })
    }

    /// Next open fails with a connection error carrying `message`.
    pub fn push_open_failure(&self, message: &str) -> &Self {
        self.push(MockPort::FailOpen(message.to_string()))
    }

    /// How many times the port has been opened.
    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }

    fn push(&self, port: MockPort) -> &Self {
        self.scripts.lock().push_back(port);
        self
    }
}

#[async_trait]
impl SerialConnector for MockSerialConnector {
    fn port_name(&self) -> &str {
        &self.port_name
    }

    async fn open(&self) -> Result<SerialStream, AcquisitionError> {
        self.open_count.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().pop_front();

        let (lines, close) = match script {
            Some(MockPort::Lines { lines, close }) => (lines, close),
            Some(MockPort::FailOpen(message)) => {
                return Err(AcquisitionError::connection(
                    &format!("Failed to open serial port '{}'", self.port_name),
                    message,
                ))
            }
            None => {
                return Err(AcquisitionError::ConnectionError(format!(
                    "No device scripted on '{}'",
                    self.port_name
                )))
            }
        };

        let (mut writer, reader) = tokio::io::duplex(MOCK_BUFFER_BYTES);
        for line in &lines {
            writer
                .write_all(format!("{}\r\n", line).as_bytes())
                .await
                .map_err(|e| AcquisitionError::connection("Mock serial write failed", e))?;
        }
        if !close {
            self.idle_writers.lock().push(writer);
        }

        Ok(Box::new(reader))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};

    #[tokio::test]
    async fn test_scripted_lines_then_eof() {
        let connector = MockSerialConnector::new("/dev/mock");
        connector.push_lines_then_close(&["1.0g", "2.0g"]);

        let mut reader = BufReader::new(connector.open().await.unwrap()).lines();
        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("1.0g"));
        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("2.0g"));
        assert_eq!(reader.next_line().await.unwrap(), None);
        assert_eq!(connector.open_count(), 1);
    }

    #[tokio::test]
    async fn test_unscripted_open_fails() {
        let connector = MockSerialConnector::new("/dev/mock");
        connector.push_open_failure("busy");

        let first = connector.open().await.err().unwrap();
        assert_eq!(
            first,
            AcquisitionError::ConnectionError(
                "Failed to open serial port '/dev/mock': busy".to_string()
            )
        );
        assert!(connector.open().await.is_err());
        assert_eq!(connector.open_count(), 2);
    }
}
