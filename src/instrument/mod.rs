//! Instrument identities and the device-facing acquisition components.
//!
//! - [`scale::SerialSampler`] reads bursts from the scale's serial line and stabilizes them.
//! - [`line_protocol::LineProtocolClient`] performs one request/response exchange with a
//!   line-oriented TCP instrument (refractometer, polarimeter).

pub mod line_protocol;
pub mod scale;

pub use line_protocol::{InstrumentEndpoint, LineProtocolClient};
pub use scale::{SamplerSettings, SamplerState, ScaleAcquisition, SerialSampler};

use crate::measurement::ResponseFormat;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// The instruments exposed by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Instrument {
    /// Digital scale on a serial line.
    Scale,
    /// Refractometer on a TCP socket.
    Refractometer,
    /// Polarimeter on a TCP socket.
    Polarimeter,
}

impl Instrument {
    /// Every instrument, in route order.
    pub const ALL: [Instrument; 3] = [Self::Scale, Self::Refractometer, Self::Polarimeter];

    /// Tag used for routes and audit file names.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Scale => "balanza",
            Self::Refractometer => "refractometro",
            Self::Polarimeter => "polarimetro",
        }
    }

    /// How this instrument's responses are parsed.
    pub fn response_format(self) -> ResponseFormat {
        match self {
            Self::Scale => ResponseFormat::Scale,
            Self::Refractometer => ResponseFormat::Refractometer,
            Self::Polarimeter => ResponseFormat::Polarimeter,
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Instrument {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|instrument| instrument.tag() == s)
            .ok_or_else(|| format!("Unknown instrument '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_round_trip() {
        for instrument in Instrument::ALL {
            assert_eq!(instrument.tag().parse::<Instrument>(), Ok(instrument));
        }
        assert!("scale".parse::<Instrument>().is_err());
    }

    #[test]
    fn test_formats_follow_instrument() {
        assert_eq!(Instrument::Scale.response_format(), ResponseFormat::Scale);
        assert_eq!(
            Instrument::Polarimeter.response_format(),
            ResponseFormat::Polarimeter
        );
    }
}
