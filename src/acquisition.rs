//! Single entry point from the HTTP layer into the instruments.
//!
//! [`AcquisitionService::acquire`] maps an [`Instrument`] to its component, writes one audit
//! line for every attempt that produced device text, and hands the outcome back unchanged.
//! Nothing here retries.

use crate::adapters::{SerialAdapter, SerialConnector};
use crate::audit::AuditLogger;
use crate::config::GatewayConfig;
use crate::error::AcquisitionError;
use crate::instrument::{Instrument, LineProtocolClient, ScaleAcquisition, SerialSampler};
use crate::measurement::{ParsedReading, StabilizedWeight};
use std::sync::Arc;

/// Owns the three instrument components and the audit trail.
pub struct AcquisitionService {
    scale: SerialSampler,
    refractometer: LineProtocolClient,
    polarimeter: LineProtocolClient,
    audit: AuditLogger,
}

impl AcquisitionService {
    /// Assemble a service from its parts.
    pub fn new(
        scale: SerialSampler,
        refractometer: LineProtocolClient,
        polarimeter: LineProtocolClient,
        audit: AuditLogger,
    ) -> Self {
        Self {
            scale,
            refractometer,
            polarimeter,
            audit,
        }
    }

    /// Build the production service: a real serial port and the configured TCP endpoints.
    pub fn from_config(config: &GatewayConfig) -> Self {
        let connector: Arc<dyn SerialConnector> =
            Arc::new(SerialAdapter::new(config.scale.serial_settings()));
        Self::new(
            SerialSampler::new(connector, config.scale.sampler_settings()),
            LineProtocolClient::new(config.refractometer.endpoint(Instrument::Refractometer)),
            LineProtocolClient::new(config.polarimeter.endpoint(Instrument::Polarimeter)),
            AuditLogger::new(&config.audit.directory),
        )
    }

    /// The scale sampler.
    pub fn scale(&self) -> &SerialSampler {
        &self.scale
    }

    /// The TCP client for `instrument`, if it is one of the optical instruments.
    pub fn line_client(&self, instrument: Instrument) -> Option<&LineProtocolClient> {
        match instrument {
            Instrument::Scale => None,
            Instrument::Refractometer => Some(&self.refractometer),
            Instrument::Polarimeter => Some(&self.polarimeter),
        }
    }

    /// The audit trail.
    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    /// Read one value from `instrument`.
    #[tracing::instrument(skip(self))]
    pub async fn acquire(&self, instrument: Instrument) -> Result<ParsedReading, AcquisitionError> {
        match self.line_client(instrument) {
            None => {
                let weight = self.acquire_weight().await?;
                ParsedReading::new(weight.value, Some(weight.unit)).ok_or_else(|| {
                    AcquisitionError::ParseError(format!("non-finite weight {}", weight.value))
                })
            }
            Some(client) => {
                let raw = client.query().await?;
                let format = client.endpoint().format;
                self.audit
                    .record(instrument, format.significant_text(&raw.text))
                    .await;
                format.parse(&raw.text)
            }
        }
    }

    /// Read one stabilized weight with the samples behind it.
    pub async fn acquire_weight(&self) -> Result<StabilizedWeight, AcquisitionError> {
        let ScaleAcquisition { samples, outcome } = self.scale.acquire().await;
        if !samples.is_empty() {
            let lines: Vec<&str> = samples.iter().map(|s| s.text.as_str()).collect();
            let text = match &outcome {
                Ok(weight) => format!("{:.2} {}", weight.value, weight.unit),
                Err(e) => format!("{} [{}]", e, lines.join(" | ")),
            };
            self.audit.record(Instrument::Scale, &text).await;
        }
        outcome
    }

    /// Release the serial port. Called on process shutdown.
    pub async fn shutdown(&self) {
        self.scale.close().await;
    }
}
