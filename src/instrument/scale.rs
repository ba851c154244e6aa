//! Serial scale sampler.
//!
//! The scale streams weight lines continuously. One acquisition:
//!
//! 1. takes the sampler lock (only one acquisition may read the port at a time),
//! 2. opens the port if it is not already open,
//! 3. collects exactly `sample_count` newline-delimited lines, racing a deadline,
//! 4. stabilizes the burst (see [`crate::measurement::stabilization`]),
//! 5. closes the port and returns to [`SamplerState::Idle`].
//!
//! Steps 2–5 run inside a [`SerialSession`] guard, so the port is released on every exit
//! path: success, any error, timeout, or the caller dropping the future.

use crate::adapters::{SerialConnector, SerialStream};
use crate::error::AcquisitionError;
use crate::measurement::{stabilize, RawSample, StabilityCriteria, StabilizedWeight};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, trace, warn};

/// Default collection deadline.
pub const DEFAULT_SCALE_TIMEOUT: Duration = Duration::from_secs(5);

/// Phase of the sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    /// No acquisition in flight, port closed.
    Idle,
    /// Opening the serial port.
    Connecting,
    /// Waiting for sample lines.
    Collecting,
    /// Applying the stabilization rule.
    Evaluating,
}

/// Sampler tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerSettings {
    /// Deadline for collecting the whole burst.
    pub timeout: Duration,
    /// Stabilization thresholds.
    pub criteria: StabilityCriteria,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_SCALE_TIMEOUT,
            criteria: StabilityCriteria::default(),
        }
    }
}

/// Result of one acquisition together with the raw lines it saw.
#[derive(Debug, Clone)]
pub struct ScaleAcquisition {
    /// Lines received, in order; partial on timeout or disconnect.
    pub samples: Vec<RawSample>,
    /// Stabilized weight or the reason there is none.
    pub outcome: Result<StabilizedWeight, AcquisitionError>,
}

type PortSlot = Option<BufReader<SerialStream>>;

/// Owns the scale's serial connection and turns bursts into weights.
pub struct SerialSampler {
    connector: Arc<dyn SerialConnector>,
    settings: SamplerSettings,
    port: Mutex<PortSlot>,
    state: parking_lot::Mutex<SamplerState>,
}

impl SerialSampler {
    /// Create a sampler; the port is opened lazily by the first acquisition.
    pub fn new(connector: Arc<dyn SerialConnector>, settings: SamplerSettings) -> Self {
        Self {
            connector,
            settings,
            port: Mutex::new(None),
            state: parking_lot::Mutex::new(SamplerState::Idle),
        }
    }

    /// Current phase.
    pub fn state(&self) -> SamplerState {
        *self.state.lock()
    }

    /// Sampler tuning.
    pub fn settings(&self) -> &SamplerSettings {
        &self.settings
    }

    /// Port path of the underlying connector.
    pub fn port_name(&self) -> &str {
        self.connector.port_name()
    }

    /// Whether the port is open. An acquisition in flight counts as open.
    pub fn is_port_open(&self) -> bool {
        self.port.try_lock().map_or(true, |slot| slot.is_some())
    }

    /// Read one stabilized weight.
    ///
    /// Waits for any acquisition already in flight to finish first.
    #[tracing::instrument(skip(self), fields(port = %self.connector.port_name()))]
    pub async fn acquire(&self) -> ScaleAcquisition {
        let slot = self.port.lock().await;
        let mut session = SerialSession {
            slot,
            state: &self.state,
        };
        let mut samples = Vec::with_capacity(self.settings.criteria.sample_count);

        let outcome = self.run(&mut session, &mut samples).await;
        drop(session);

        match &outcome {
            Ok(weight) => info!(value = weight.value, unit = %weight.unit, "Stable weight"),
            Err(e) => warn!(error = %e, samples = samples.len(), "Scale acquisition failed"),
        }
        ScaleAcquisition { samples, outcome }
    }

    async fn run(
        &self,
        session: &mut SerialSession<'_>,
        samples: &mut Vec<RawSample>,
    ) -> Result<StabilizedWeight, AcquisitionError> {
        session.enter(SamplerState::Connecting);
        session.ensure_open(self.connector.as_ref()).await?;

        session.enter(SamplerState::Collecting);
        let wanted = self.settings.criteria.sample_count;
        let collected = tokio::time::timeout(
            self.settings.timeout,
            collect_lines(session.reader()?, samples, wanted),
        )
        .await;

        match collected {
            Ok(result) => result?,
            Err(_) => {
                return Err(AcquisitionError::AcquisitionTimeout(format!(
                    "Not enough data received within the time limit ({} of {} samples in {:?})",
                    samples.len(),
                    wanted,
                    self.settings.timeout
                )))
            }
        }

        session.enter(SamplerState::Evaluating);
        let lines: Vec<&str> = samples.iter().map(|s| s.text.as_str()).collect();
        stabilize(&lines, &self.settings.criteria)
    }

    /// Close the port if it is open. Waits for an in-flight acquisition.
    pub async fn close(&self) {
        let mut slot = self.port.lock().await;
        if slot.take().is_some() {
            info!(port = %self.connector.port_name(), "Serial port closed");
        }
    }
}

/// Exclusive use of the port for one acquisition; closes it when dropped.
struct SerialSession<'a> {
    slot: MutexGuard<'a, PortSlot>,
    state: &'a parking_lot::Mutex<SamplerState>,
}

impl SerialSession<'_> {
    fn enter(&self, state: SamplerState) {
        trace!(?state, "Sampler state");
        *self.state.lock() = state;
    }

    async fn ensure_open(
        &mut self,
        connector: &dyn SerialConnector,
    ) -> Result<(), AcquisitionError> {
        if self.slot.is_some() {
            debug!("Reusing open serial port");
            return Ok(());
        }
        let stream = connector.open().await?;
        *self.slot = Some(BufReader::new(stream));
        info!(port = %connector.port_name(), "Serial port opened for scale");
        Ok(())
    }

    fn reader(&mut self) -> Result<&mut BufReader<SerialStream>, AcquisitionError> {
        self.slot
            .as_mut()
            .ok_or_else(|| AcquisitionError::ConnectionError("Serial port is not open".to_string()))
    }
}

impl Drop for SerialSession<'_> {
    fn drop(&mut self) {
        if self.slot.take().is_some() {
            debug!("Serial port released");
        }
        *self.state.lock() = SamplerState::Idle;
    }
}

async fn collect_lines<R>(
    reader: &mut R,
    samples: &mut Vec<RawSample>,
    wanted: usize,
) -> Result<(), AcquisitionError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::with_capacity(64);
    while samples.len() < wanted {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| AcquisitionError::connection("Serial read failed", e))?;
        if read == 0 {
            return Err(AcquisitionError::ConnectionError(format!(
                "Serial port closed after {} of {} samples",
                samples.len(),
                wanted
            )));
        }

        let sample = RawSample::new(&String::from_utf8_lossy(&buf));
        trace!(line = %sample.text, "Scale sample");
        samples.push(sample);
    }
    Ok(())
}
