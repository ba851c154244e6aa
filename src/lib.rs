//! Core library for the lab reading gateway.
//!
//! Exposes a serial scale, a refractometer and a polarimeter as HTTP-queryable sensors. The
//! scale streams continuously and its bursts are stabilized before a weight is accepted; the
//! optical instruments answer a single command over TCP.
//!
//! Layers, bottom up:
//! - [`adapters`]: serial port access (real and scripted).
//! - [`measurement`]: response parsing and scale stabilization.
//! - [`instrument`]: the scale sampler and the TCP line-protocol client.
//! - [`acquisition`]: one entry point per instrument plus the [`audit`] trail.
//! - [`gateway`]: the axum router.

pub mod acquisition;
pub mod adapters;
pub mod audit;
pub mod config;
pub mod error;
pub mod gateway;
pub mod instrument;
pub mod logging;
pub mod measurement;
