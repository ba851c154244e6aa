//! Gateway configuration using Figment
//!
//! Configuration is layered, highest precedence last:
//! 1. Built-in defaults (the laboratory's fixed instrument addresses)
//! 2. `config/gateway.toml` (optional)
//! 3. Environment variables prefixed with `LAB_GATEWAY_`, `__` separating sections
//!
//! # Environment Variable Overrides
//!
//! ```text
//! LAB_GATEWAY_SERVER__PORT=8080
//! LAB_GATEWAY_SCALE__PATH=/dev/ttyS0
//! LAB_GATEWAY_POLARIMETER__HOST=10.0.0.42
//! LAB_GATEWAY_LOGGING__LEVEL=debug
//! ```
//!
//! # Example
//!
//! ```no_run
//! use lab_gateway::config::GatewayConfig;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GatewayConfig::load()?;
//!     println!("Scale on {}", config.scale.path);
//!     println!("Listening on {}:{}", config.server.host, config.server.port);
//!     Ok(())
//! }
//! ```

use crate::adapters::{SerialParity, SerialSettings};
use crate::error::{AppResult, GatewayError};
use crate::instrument::{Instrument, InstrumentEndpoint, SamplerSettings};
use crate::measurement::StabilityCriteria;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/gateway.toml";
/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "LAB_GATEWAY_";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP listener
    pub server: ServerConfig,
    /// Console logging
    pub logging: LoggingConfig,
    /// Audit trail
    pub audit: AuditConfig,
    /// Serial scale
    pub scale: ScaleConfig,
    /// Refractometer TCP endpoint
    pub refractometer: TcpInstrumentConfig,
    /// Polarimeter TCP endpoint
    pub polarimeter: TcpInstrumentConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Allow cross-origin requests from any origin
    pub cors: bool,
    /// Directory served for paths that match no route
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3004,
            cors: true,
            static_dir: None,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error); `RUST_LOG` takes precedence
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Audit trail settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Directory holding `balanza.txt`, `refractometro.txt` and `polarimetro.txt`
    pub directory: PathBuf,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
        }
    }
}

/// Serial scale settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleConfig {
    /// Serial device path
    pub path: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits
    pub data_bits: u8,
    /// Stop bits
    pub stop_bits: u8,
    /// Parity
    pub parity: SerialParity,
    /// Deadline for collecting one burst, in milliseconds
    pub timeout_ms: u64,
    /// Lines per burst
    pub sample_count: usize,
    /// Lines that must agree with the first one
    pub min_agreeing: usize,
    /// Relative agreement band (0.01 = ±1%)
    pub tolerance: f64,
    /// Lower plausible weight, exclusive
    pub min_grams: f64,
    /// Upper plausible weight, inclusive
    pub max_grams: f64,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        let criteria = StabilityCriteria::default();
        Self {
            path: default_scale_path().to_string(),
            baud_rate: 9600,
            data_bits: 8,
            stop_bits: 1,
            parity: SerialParity::None,
            timeout_ms: 5000,
            sample_count: criteria.sample_count,
            min_agreeing: criteria.min_agreeing,
            tolerance: criteria.tolerance,
            min_grams: criteria.min_exclusive,
            max_grams: criteria.max_inclusive,
        }
    }
}

fn default_scale_path() -> &'static str {
    if cfg!(windows) {
        "COM4"
    } else {
        "/dev/ttyUSB0"
    }
}

impl ScaleConfig {
    /// Line settings for the serial adapter.
    pub fn serial_settings(&self) -> SerialSettings {
        SerialSettings {
            path: self.path.clone(),
            baud_rate: self.baud_rate,
            data_bits: self.data_bits,
            stop_bits: self.stop_bits,
            parity: self.parity,
        }
    }

    /// Deadline and stabilization thresholds for the sampler.
    pub fn sampler_settings(&self) -> SamplerSettings {
        SamplerSettings {
            timeout: Duration::from_millis(self.timeout_ms),
            criteria: StabilityCriteria {
                sample_count: self.sample_count,
                min_agreeing: self.min_agreeing,
                tolerance: self.tolerance,
                min_exclusive: self.min_grams,
                max_inclusive: self.max_grams,
            },
        }
    }
}

/// TCP instrument settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpInstrumentConfig {
    /// Host name or IP address
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Read command, without CR LF
    pub command: String,
    /// Connect + response deadline, in milliseconds
    pub timeout_ms: u64,
}

impl Default for TcpInstrumentConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 23,
            command: "R".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl TcpInstrumentConfig {
    fn at(host: &str) -> Self {
        Self {
            host: host.to_string(),
            ..Self::default()
        }
    }

    /// Endpoint for `instrument`, parsed with that instrument's format.
    pub fn endpoint(&self, instrument: Instrument) -> InstrumentEndpoint {
        InstrumentEndpoint::new(
            instrument.tag(),
            &self.host,
            self.port,
            instrument.response_format(),
        )
        .with_command(&self.command)
        .with_timeout(Duration::from_millis(self.timeout_ms))
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            audit: AuditConfig::default(),
            scale: ScaleConfig::default(),
            refractometer: TcpInstrumentConfig::at("192.168.102.230"),
            polarimeter: TcpInstrumentConfig::at("192.168.102.229"),
        }
    }
}

impl GatewayConfig {
    /// Load from [`DEFAULT_CONFIG_PATH`] and the environment.
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from a specific file and the environment, then validate.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config: Self = Self::figment(path.as_ref()).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// The provider stack used by [`GatewayConfig::load_from`].
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Configuration`] describing the first invalid value.
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(invalid(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            )));
        }

        self.validate_scale()?;
        validate_tcp("refractometer", &self.refractometer)?;
        validate_tcp("polarimeter", &self.polarimeter)?;
        Ok(())
    }

    fn validate_scale(&self) -> AppResult<()> {
        let scale = &self.scale;
        if scale.path.trim().is_empty() {
            return Err(invalid("Scale 'path' cannot be empty".to_string()));
        }
        if scale.baud_rate == 0 {
            return Err(invalid("Scale 'baud_rate' must be positive".to_string()));
        }
        if !(5..=8).contains(&scale.data_bits) {
            return Err(invalid(format!(
                "Scale 'data_bits' {} invalid. Must be 5-8",
                scale.data_bits
            )));
        }
        if !matches!(scale.stop_bits, 1 | 2) {
            return Err(invalid(format!(
                "Scale 'stop_bits' {} invalid. Must be 1 or 2",
                scale.stop_bits
            )));
        }
        if !(3000..=5000).contains(&scale.timeout_ms) {
            return Err(invalid(format!(
                "Scale 'timeout_ms' {} invalid. Must be 3000-5000",
                scale.timeout_ms
            )));
        }
        if scale.sample_count == 0 {
            return Err(invalid("Scale 'sample_count' must be positive".to_string()));
        }
        if scale.min_agreeing == 0 || scale.min_agreeing > scale.sample_count {
            return Err(invalid(format!(
                "Scale 'min_agreeing' {} invalid. Must be 1-{}",
                scale.min_agreeing, scale.sample_count
            )));
        }
        if !(scale.tolerance > 0.0 && scale.tolerance < 1.0) {
            return Err(invalid(format!(
                "Scale 'tolerance' {} invalid. Must be between 0 and 1",
                scale.tolerance
            )));
        }
        if scale.min_grams.is_nan() || scale.min_grams < 0.0 {
            return Err(invalid(format!(
                "Scale 'min_grams' {} invalid. Must be 0 or greater",
                scale.min_grams
            )));
        }
        if scale.max_grams.is_nan() || scale.min_grams >= scale.max_grams {
            return Err(invalid(format!(
                "Scale range ({}, {}] is empty",
                scale.min_grams, scale.max_grams
            )));
        }
        Ok(())
    }
}

fn validate_tcp(name: &str, config: &TcpInstrumentConfig) -> AppResult<()> {
    if config.host.trim().is_empty() {
        return Err(invalid(format!("{} 'host' cannot be empty", name)));
    }
    if config.port == 0 {
        return Err(invalid(format!("{} 'port' must be positive", name)));
    }
    if config.timeout_ms == 0 {
        return Err(invalid(format!("{} 'timeout_ms' must be positive", name)));
    }
    if config.command.is_empty() || config.command.contains(['\r', '\n']) {
        return Err(invalid(format!(
            "{} 'command' must be non-empty and must not contain CR or LF",
            name
        )));
    }
    Ok(())
}

fn invalid(message: String) -> GatewayError {
    GatewayError::Configuration(message)
}
