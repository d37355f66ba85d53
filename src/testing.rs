//! An in-memory, scripted [`Transport`] used by this crate's own test
//! suite (and available to downstream consumers for theirs). No network
//! activity of any kind happens here.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::protocol::{
    ChunkPayload, ConnectStatus, StreamMessage, Transport, TransportError, WaveformHeader, WaveformStream,
};

/// One scripted response to a `get_waveform` call: a header plus the raw
/// byte chunks the stream will emit after it, in order.
#[derive(Clone)]
pub struct ScriptedWaveform {
    pub header: WaveformHeader,
    pub raw_chunks: Vec<Vec<u8>>,
}

struct ScriptedStream {
    messages: VecDeque<StreamMessage>,
}

impl WaveformStream for ScriptedStream {
    fn recv(&mut self) -> Result<Option<StreamMessage>, TransportError> {
        Ok(self.messages.pop_front())
    }
}

/// A scriptable, deterministic stand-in for a real instrument connection.
///
/// Scripts are queued per symbol with [`ScriptedTransport::push_waveform`];
/// each `get_waveform` call consumes the next queued entry for that symbol,
/// repeating the last one once the queue is exhausted.
pub struct ScriptedTransport {
    names: Mutex<Vec<String>>,
    scripts: Mutex<HashMap<String, Vec<ScriptedWaveform>>>,
    cursor: Mutex<HashMap<String, usize>>,
    connect_status: Mutex<ConnectStatus>,
    keepalive_fails: Mutex<bool>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            names: Mutex::new(Vec::new()),
            scripts: Mutex::new(HashMap::new()),
            cursor: Mutex::new(HashMap::new()),
            connect_status: Mutex::new(ConnectStatus::Success),
            keepalive_fails: Mutex::new(false),
        }
    }

    pub fn set_available_names(&self, names: Vec<String>) {
        *self.names.lock().unwrap() = names;
    }

    pub fn push_waveform(&self, source_name: &str, waveform: ScriptedWaveform) {
        self.scripts
            .lock()
            .unwrap()
            .entry(source_name.to_string())
            .or_default()
            .push(waveform);
    }

    pub fn set_connect_status(&self, status: ConnectStatus) {
        *self.connect_status.lock().unwrap() = status;
    }

    /// Make every subsequent `keep_alive()` call report a non-success
    /// status, simulating a dead heartbeat.
    pub fn fail_keepalive(&self) {
        *self.keepalive_fails.lock().unwrap() = true;
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for ScriptedTransport {
    fn connect(&self, _client_name: &str) -> Result<ConnectStatus, TransportError> {
        Ok(*self.connect_status.lock().unwrap())
    }

    fn disconnect(&self) -> Result<ConnectStatus, TransportError> {
        Ok(ConnectStatus::Success)
    }

    fn keep_alive(&self) -> Result<ConnectStatus, TransportError> {
        if *self.keepalive_fails.lock().unwrap() {
            Ok(ConnectStatus::Timeout)
        } else {
            Ok(ConnectStatus::Success)
        }
    }

    fn available_names(&self) -> Result<Vec<String>, TransportError> {
        Ok(self.names.lock().unwrap().clone())
    }

    fn get_waveform(
        &self,
        source_name: &str,
        _chunk_size: u32,
        raw: bool,
    ) -> Result<Box<dyn WaveformStream>, TransportError> {
        let scripts = self.scripts.lock().unwrap();
        let Some(entries) = scripts.get(source_name) else {
            return Err(TransportError::Wfm(crate::protocol::WfmReplyStatus::SourceNameMissing));
        };
        let mut cursor = self.cursor.lock().unwrap();
        let idx = cursor.entry(source_name.to_string()).or_insert(0);
        let entry = &entries[(*idx).min(entries.len() - 1)];
        if *idx + 1 < entries.len() {
            *idx += 1;
        }

        let mut messages = VecDeque::new();
        messages.push_back(StreamMessage::Header(entry.header.clone()));
        if entry.header.has_data {
            for chunk in &entry.raw_chunks {
                let payload = if raw {
                    ChunkPayload::Raw(chunk.clone())
                } else {
                    ChunkPayload::Normalized(chunk_to_normalized(&entry.header, chunk))
                };
                messages.push_back(StreamMessage::Chunk(payload));
            }
        }
        Ok(Box::new(ScriptedStream { messages }))
    }
}

fn chunk_to_normalized(header: &WaveformHeader, raw: &[u8]) -> Vec<f32> {
    let lane = header.source_width as usize;
    if lane == 0 {
        return Vec::new();
    }
    let count = raw.len() / lane;
    (0..count)
        .map(|i| {
            let offset = i * lane;
            let value = match lane {
                1 => raw[offset] as i8 as f64,
                2 => i16::from_le_bytes([raw[offset], raw[offset + 1]]) as f64,
                4 => f32::from_le_bytes([raw[offset], raw[offset + 1], raw[offset + 2], raw[offset + 3]]) as f64,
                _ => 0.0,
            };
            (value * header.vertical.spacing + header.vertical.offset) as f32
        })
        .collect()
}
