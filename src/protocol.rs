//! The RPC surface the core requires of an instrument connection.
//!
//! Everything in this module is the boundary described in the design notes:
//! a real deployment plugs a generated gRPC client in behind [`Transport`];
//! this crate ships only [`crate::testing::ScriptedTransport`], an in-memory
//! stand-in used by the test suite.

use std::fmt;

/// Outcome of a `Connect`/`Disconnect`/`KeepAlive` unary RPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStatus {
    Unspecified,
    Success,
    InUse,
    NotConnected,
    OutsideSequence,
    Timeout,
    Unknown,
}

/// Per-message status on a waveform stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WfmReplyStatus {
    Unspecified,
    Success,
    NoConnection,
    OutsideSequence,
    SourceNameMissing,
    TypeMismatch,
}

/// The kind of waveform a header describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WfmType {
    Unspecified,
    Analog8,
    Analog16,
    AnalogFloat,
    Analog16IQ,
    Analog32IQ,
    Digital8,
    Digital16,
}

impl WfmType {
    pub fn is_iq(self) -> bool {
        matches!(self, WfmType::Analog16IQ | WfmType::Analog32IQ)
    }

    pub fn is_digital(self) -> bool {
        matches!(self, WfmType::Digital8 | WfmType::Digital16)
    }
}

/// Whether a header's samples are interleaved I/Q pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WfmPairType {
    Unspecified,
    None,
    Pair,
}

/// Horizontal (time) scaling for a waveform.
#[derive(Debug, Clone, PartialEq)]
pub struct HorizontalScale {
    pub spacing: f64,
    pub zero_index: i64,
    pub fractional_zero_index: f64,
    pub sample_count: u64,
    pub units: String,
}

/// Vertical scaling for a waveform.
#[derive(Debug, Clone, PartialEq)]
pub struct VerticalScale {
    pub spacing: f64,
    pub offset: f64,
    pub units: String,
}

/// Spectral parameters carried by IQ headers; never evaluated by this crate
/// (see the Non-goals around sample-level DSP).
#[derive(Debug, Clone, PartialEq)]
pub struct IqInfo {
    pub center_frequency: f64,
    pub fft_length: u32,
    pub rbw: f64,
    pub span: f64,
    pub window: String,
}

/// Per-symbol metadata for a single acquisition.
///
/// Invariant: within one acquisition, every header fetched shares the same
/// `trans_id` (enforced by the pipeline's coherence check, not by this type).
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformHeader {
    pub source_name: String,
    pub source_width: u32,
    pub data_id: u64,
    pub trans_id: u64,
    pub horizontal: HorizontalScale,
    pub vertical: VerticalScale,
    pub wfm_type: WfmType,
    pub bitmask: u8,
    pub pair_type: WfmPairType,
    pub iq: Option<IqInfo>,
    pub chunk_size: u32,
    pub has_data: bool,
}

/// The number of bytes one sample (or sample pair, for IQ) occupies.
///
/// Derived from `wfm_type`, `source_width`, and `pair_type`: IQ doubles the
/// per-sample element size, since each sample is two interleaved lanes.
pub fn element_size(header: &WaveformHeader) -> usize {
    let lane = header.source_width as usize;
    match header.pair_type {
        WfmPairType::Pair => lane * 2,
        _ => lane,
    }
}

/// One chunk payload, in whichever encoding the caller requested.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkPayload {
    Raw(Vec<u8>),
    Normalized(Vec<f32>),
}

/// One message of a waveform stream: the mandatory leading header, or a
/// sample chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    Header(WaveformHeader),
    Chunk(ChunkPayload),
}

/// Transport-level failure, raised either by a unary RPC or by a message on
/// a waveform stream.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("connect/disconnect/keepalive failed: {0:?}")]
    Connect(ConnectStatus),
    #[error("waveform stream failed: {0:?}")]
    Wfm(WfmReplyStatus),
    #[error("transport io error: {0}")]
    Io(String),
}

/// A server-streaming waveform response: one mandatory header followed by
/// zero or more chunks.
pub trait WaveformStream: Send {
    /// Returns the next message, or `Ok(None)` at end of stream.
    fn recv(&mut self) -> Result<Option<StreamMessage>, TransportError>;
}

/// The RPC surface the core requires of a connected instrument.
///
/// Out of scope for this crate: generating this trait's implementation from
/// a `.proto` file and driving the actual network transport. Implementors
/// are expected to translate per-message/per-call status codes into
/// [`TransportError`] themselves.
pub trait Transport: Send + Sync {
    fn connect(&self, client_name: &str) -> Result<ConnectStatus, TransportError>;
    fn disconnect(&self) -> Result<ConnectStatus, TransportError>;
    fn keep_alive(&self) -> Result<ConnectStatus, TransportError>;
    fn available_names(&self) -> Result<Vec<String>, TransportError>;
    fn get_waveform(
        &self,
        source_name: &str,
        chunk_size: u32,
        raw: bool,
    ) -> Result<Box<dyn WaveformStream>, TransportError>;
}

impl fmt::Display for WfmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
