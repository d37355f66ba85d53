//! High-speed waveform streaming client for Tektronix oscilloscopes.
//!
//! [`Client`] connects to an instrument over a [`Transport`], continuously
//! streams every active symbol's waveform on a background pipeline thread,
//! and hands foreground callers a coherent, internally-consistent
//! [`AcquisitionBundle`] through [`Client::access_data`].
//!
//! The wire transport itself (gRPC, or anything else) is out of scope:
//! implement [`Transport`] and [`WaveformStream`] against your own RPC
//! client, or use [`testing::ScriptedTransport`] for deterministic tests.

pub mod bundle;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod pipeline;
pub mod protocol;
pub mod session;
pub mod symbols;
pub mod testing;
pub mod waveform;

pub use bundle::{AcquisitionBundle, BundleEntry, PreviousHeaders};
pub use client::Client;
pub use config::{Config, ConfigError};
pub use coordinator::{AccessScope, AcquisitionCallback, WaitMode};
pub use error::{HsiError, Result};
pub use filter::FilterFn;
pub use protocol::{Transport, WaveformStream};
pub use session::SessionState;
pub use waveform::{AnalogWaveform, Complex, DigitalWaveform, IqWaveform, SampleBuffer, TypedWaveform};
