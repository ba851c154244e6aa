//! Raw device text and the parsers that turn it into numbers.
//!
//! The scale, the refractometer and the polarimeter all answer with "one line in, one float
//! out", but they disagree on delimiters and on how an operator cancellation is reported.
//! [`ResponseFormat`] is the strategy table: one variant per instrument, one `parse` entry
//! point.
//!
//! Numeric extraction uses leading-float semantics: leading whitespace is skipped and the
//! longest numeric prefix is parsed, so `"1.3330 nD"` reads as `1.333`.

use crate::error::AcquisitionError;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Marker an optical instrument puts in its reply when the operator aborted the read.
pub const CANCELLED_MARKER: &str = "Cancelled";

/// Unit reported for scale readings that carry none.
pub const DEFAULT_SCALE_UNIT: &str = "g";

/// One trimmed line of device text and when it was captured.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    /// Trimmed text as received.
    pub text: String,
    /// Capture time.
    pub received_at: DateTime<Utc>,
}

impl RawSample {
    /// Capture `text` now, trimming surrounding whitespace (including CR/LF).
    pub fn new(text: &str) -> Self {
        Self {
            text: text.trim().to_string(),
            received_at: Utc::now(),
        }
    }
}

/// A validated numeric reading. The value is always finite.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedReading {
    value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit: Option<String>,
}

impl ParsedReading {
    /// Build a reading, rejecting NaN and infinities.
    pub fn new(value: f64, unit: Option<String>) -> Option<Self> {
        value.is_finite().then_some(Self { value, unit })
    }

    /// The numeric value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// The device-reported unit, if any.
    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }
}

/// Per-instrument response interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// Free-form weight text with an optional unit suffix (`"+ 100.01 g"`).
    Scale,
    /// A bare number (`"1.3330"`).
    Refractometer,
    /// First non-blank line; third comma-separated field when the line has commas.
    Polarimeter,
}

impl ResponseFormat {
    /// Parse one device response.
    pub fn parse(self, raw: &str) -> Result<ParsedReading, AcquisitionError> {
        match self {
            Self::Scale => parse_scale(raw),
            Self::Refractometer => parse_refractometer(raw),
            Self::Polarimeter => parse_polarimeter(raw),
        }
    }

    /// The part of a response worth keeping in the audit trail.
    ///
    /// The polarimeter may send trailing lines after the reading; only the first non-blank one
    /// is significant. The other formats keep the whole trimmed text.
    pub fn significant_text(self, raw: &str) -> &str {
        match self {
            Self::Polarimeter => first_significant_line(raw.trim()),
            Self::Scale | Self::Refractometer => raw.trim(),
        }
    }
}

fn parse_scale(raw: &str) -> Result<ParsedReading, AcquisitionError> {
    let trimmed = raw.trim();
    // Thousands separators, signs glued to units and stray symbols all go.
    let numeric: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    let unit = trailing_alphabetic_run(trimmed).unwrap_or(DEFAULT_SCALE_UNIT);

    leading_float(&numeric)
        .and_then(|value| ParsedReading::new(value, Some(unit.to_string())))
        .ok_or_else(|| AcquisitionError::ParseError(trimmed.to_string()))
}

fn parse_refractometer(raw: &str) -> Result<ParsedReading, AcquisitionError> {
    let trimmed = raw.trim();
    if trimmed.contains(CANCELLED_MARKER) {
        return Err(AcquisitionError::CancelledByUser);
    }

    leading_float(trimmed)
        .and_then(|value| ParsedReading::new(value, None))
        .ok_or_else(|| AcquisitionError::ParseError(trimmed.to_string()))
}

fn parse_polarimeter(raw: &str) -> Result<ParsedReading, AcquisitionError> {
    let trimmed = raw.trim();
    if trimmed.contains(CANCELLED_MARKER) {
        return Err(AcquisitionError::CancelledByUser);
    }

    let line = first_significant_line(trimmed);
    let field = if line.contains(',') {
        line.split(',').nth(2).unwrap_or_default()
    } else {
        line
    };

    leading_float(field)
        .and_then(|value| ParsedReading::new(value, None))
        .ok_or_else(|| AcquisitionError::ParseError(line.to_string()))
}

fn first_significant_line(text: &str) -> &str {
    text.split(['\r', '\n'])
        .find(|line| !line.trim().is_empty())
        .unwrap_or(text)
}

fn trailing_alphabetic_run(text: &str) -> Option<&str> {
    let end = text.rfind(|c: char| c.is_ascii_alphabetic())? + 1;
    let start = text[..end]
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_alphabetic())
        .last()
        .map(|(idx, _)| idx)?;
    Some(&text[start..end])
}

/// Parse the longest numeric prefix of `text`.
///
/// Accepts `[+-]?digits[.digits][(e|E)[+-]?digits]` after leading whitespace. Returns `None`
/// when the prefix has no digits or the value is not finite.
pub fn leading_float(text: &str) -> Option<f64> {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let digits_from = |mut idx: usize| {
        while idx < bytes.len() && bytes[idx].is_ascii_digit() {
            idx += 1;
        }
        idx
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_end = digits_from(end);
    let mut digits = int_end - end;
    end = int_end;

    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        let frac = frac_end - (end + 1);
        if digits + frac > 0 {
            digits += frac;
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}
