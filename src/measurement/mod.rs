//! Pure measurement logic: parsing device text and stabilizing scale bursts. No I/O.

pub mod reading;
pub mod stabilization;

pub use reading::{ParsedReading, RawSample, ResponseFormat};
pub use stabilization::{stabilize, StabilityCriteria, StabilizedWeight};
