//! Shared helpers for integration tests.
//!
//! Fake TCP instruments on loopback and a ready-made acquisition service wired to them.

#![allow(dead_code)]

use lab_gateway::acquisition::AcquisitionService;
use lab_gateway::adapters::{MockSerialConnector, SerialConnector};
use lab_gateway::audit::AuditLogger;
use lab_gateway::instrument::{
    Instrument, InstrumentEndpoint, LineProtocolClient, SamplerSettings, SerialSampler,
};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Deadline used for TCP tests; loopback answers well within it.
pub const TCP_TIMEOUT: Duration = Duration::from_millis(500);

/// How a fake instrument answers a command.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Write this text, then close.
    Text(String),
    /// Read the command and never answer.
    Silent,
    /// Read the command and close without writing.
    Close,
}

impl Reply {
    pub fn text(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// A loopback TCP server standing in for a refractometer or polarimeter.
pub struct FakeInstrument {
    pub port: u16,
    received: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl FakeInstrument {
    /// Start a server answering every connection with `reply`.
    pub async fn spawn(reply: Reply) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let received = Arc::new(Mutex::new(Vec::new()));
        let log = received.clone();

        let handle = tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let reply = reply.clone();
                let log = log.clone();
                tokio::spawn(async move {
                    let mut command = Vec::new();
                    let mut buf = [0u8; 64];
                    while !command.ends_with(b"\n") {
                        match stream.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => command.extend_from_slice(&buf[..n]),
                        }
                    }
                    log.lock().push(String::from_utf8_lossy(&command).into_owned());

                    match reply {
                        Reply::Text(text) => {
                            let _ = stream.write_all(text.as_bytes()).await;
                        }
                        Reply::Silent => {
                            tokio::time::sleep(Duration::from_secs(30)).await;
                        }
                        Reply::Close => {}
                    }
                });
            }
        });

        Self {
            port,
            received,
            handle,
        }
    }

    /// Commands received so far, verbatim.
    pub fn received(&self) -> Vec<String> {
        self.received.lock().clone()
    }

    /// Endpoint pointing at this server.
    pub fn endpoint(&self, instrument: Instrument) -> InstrumentEndpoint {
        InstrumentEndpoint::new(
            instrument.tag(),
            "127.0.0.1",
            self.port,
            instrument.response_format(),
        )
        .with_timeout(TCP_TIMEOUT)
    }
}

impl Drop for FakeInstrument {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A loopback port with nothing listening on it.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Sampler over a scripted serial connector with default settings.
pub fn sampler(connector: Arc<MockSerialConnector>) -> SerialSampler {
    let connector: Arc<dyn SerialConnector> = connector;
    SerialSampler::new(connector, SamplerSettings::default())
}

/// Service wired to a scripted scale and two fake optical instruments.
pub fn service(
    connector: Arc<MockSerialConnector>,
    refractometer: &FakeInstrument,
    polarimeter: &FakeInstrument,
    audit_dir: &Path,
) -> AcquisitionService {
    AcquisitionService::new(
        sampler(connector),
        LineProtocolClient::new(refractometer.endpoint(Instrument::Refractometer)),
        LineProtocolClient::new(polarimeter.endpoint(Instrument::Polarimeter)),
        AuditLogger::new(audit_dir),
    )
}

/// Contents of one audit file, or empty when it was never written.
pub fn audit_lines(dir: &Path, instrument: Instrument) -> Vec<String> {
    let path = AuditLogger::new(dir).path_for(instrument);
    std::fs::read_to_string(path)
        .map(|content| content.lines().map(str::to_string).collect())
        .unwrap_or_default()
}
