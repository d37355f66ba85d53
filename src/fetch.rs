//! Per-symbol fetch: drives one `Transport::get_waveform` stream to
//! completion and assembles its chunks into a single sample buffer.

use crate::error::{HsiError, Result};
use crate::protocol::{element_size, ChunkPayload, StreamMessage, Transport, WaveformHeader};
use crate::waveform::{build_typed_waveform, SampleBuffer, TypedWaveform};

/// A fully assembled waveform for one symbol, still carrying its header
/// separately since the bundle builder needs it before typing.
pub struct FetchedWaveform {
    pub header: WaveformHeader,
    pub waveform: TypedWaveform,
}

/// Fetch one symbol's waveform: open the stream, read the header, then
/// read chunks until the header's declared sample count is satisfied.
pub fn fetch_symbol(
    transport: &dyn Transport,
    source_name: &str,
    chunk_size: u32,
    raw: bool,
) -> Result<FetchedWaveform> {
    let mut stream = transport.get_waveform(source_name, chunk_size, raw)?;

    let header = match stream.recv()? {
        Some(StreamMessage::Header(h)) => h,
        Some(StreamMessage::Chunk(_)) => {
            return Err(HsiError::Protocol(format!(
                "{source_name}: stream sent a chunk before its header"
            )))
        }
        None => {
            return Err(HsiError::Protocol(format!(
                "{source_name}: stream closed before sending a header"
            )))
        }
    };

    if !header.has_data {
        let waveform = build_typed_waveform(
            header.clone(),
            if raw {
                SampleBuffer::Raw(Vec::new())
            } else {
                SampleBuffer::Normalized(Vec::new())
            },
        )?;
        return Ok(FetchedWaveform { header, waveform });
    }

    let expected_len = header.horizontal.sample_count as usize * element_size(&header);
    let mut raw_bytes: Vec<u8> = Vec::new();
    let mut normalized: Vec<f32> = Vec::new();

    loop {
        match stream.recv()? {
            Some(StreamMessage::Header(_)) => {
                return Err(HsiError::Protocol(format!(
                    "{source_name}: stream sent a second header"
                )))
            }
            Some(StreamMessage::Chunk(ChunkPayload::Raw(bytes))) => raw_bytes.extend(bytes),
            Some(StreamMessage::Chunk(ChunkPayload::Normalized(values))) => normalized.extend(values),
            None => break,
        }
    }

    let samples = if raw {
        if raw_bytes.len() != expected_len {
            return Err(HsiError::Protocol(format!(
                "{source_name}: expected {expected_len} bytes, assembled {}",
                raw_bytes.len()
            )));
        }
        SampleBuffer::Raw(raw_bytes)
    } else {
        let expected_samples = header.horizontal.sample_count as usize
            * if header.pair_type == crate::protocol::WfmPairType::Pair {
                2
            } else {
                1
            };
        if normalized.len() != expected_samples {
            return Err(HsiError::Protocol(format!(
                "{source_name}: expected {expected_samples} normalized samples, assembled {}",
                normalized.len()
            )));
        }
        SampleBuffer::Normalized(normalized)
    };

    let waveform = build_typed_waveform(header.clone(), samples)?;
    Ok(FetchedWaveform { header, waveform })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ConnectStatus, HorizontalScale, TransportError, VerticalScale, WaveformStream, WfmPairType, WfmType};
    use std::sync::Mutex;

    struct FakeStream {
        messages: Mutex<Vec<StreamMessage>>,
    }

    impl WaveformStream for FakeStream {
        fn recv(&mut self) -> std::result::Result<Option<StreamMessage>, TransportError> {
            let mut msgs = self.messages.lock().unwrap();
            if msgs.is_empty() {
                Ok(None)
            } else {
                Ok(Some(msgs.remove(0)))
            }
        }
    }

    struct FakeTransport {
        messages: Vec<StreamMessage>,
    }

    impl Transport for FakeTransport {
        fn connect(&self, _client_name: &str) -> std::result::Result<ConnectStatus, TransportError> {
            Ok(ConnectStatus::Success)
        }
        fn disconnect(&self) -> std::result::Result<ConnectStatus, TransportError> {
            Ok(ConnectStatus::Success)
        }
        fn keep_alive(&self) -> std::result::Result<ConnectStatus, TransportError> {
            Ok(ConnectStatus::Success)
        }
        fn available_names(&self) -> std::result::Result<Vec<String>, TransportError> {
            Ok(vec![])
        }
        fn get_waveform(
            &self,
            _source_name: &str,
            _chunk_size: u32,
            _raw: bool,
        ) -> std::result::Result<Box<dyn WaveformStream>, TransportError> {
            Ok(Box::new(FakeStream {
                messages: Mutex::new(self.messages.clone()),
            }))
        }
    }

    fn header(sample_count: u64) -> WaveformHeader {
        WaveformHeader {
            source_name: "ch1".to_string(),
            source_width: 2,
            data_id: 1,
            trans_id: 1,
            horizontal: HorizontalScale {
                spacing: 1.0,
                zero_index: 0,
                fractional_zero_index: 0.0,
                sample_count,
                units: "s".to_string(),
            },
            vertical: VerticalScale {
                spacing: 1.0,
                offset: 0.0,
                units: "V".to_string(),
            },
            wfm_type: WfmType::Analog16,
            bitmask: 0,
            pair_type: WfmPairType::None,
            iq: None,
            chunk_size: 8192,
            has_data: true,
        }
    }

    #[test]
    fn assembles_multiple_chunks_into_one_buffer() {
        let messages = vec![
            StreamMessage::Header(header(4)),
            StreamMessage::Chunk(ChunkPayload::Raw(vec![1, 0, 2, 0])),
            StreamMessage::Chunk(ChunkPayload::Raw(vec![3, 0, 4, 0])),
        ];
        let transport = FakeTransport { messages };
        let fetched = fetch_symbol(&transport, "ch1", 8192, true).unwrap();
        assert_eq!(fetched.waveform.as_analog().unwrap().len(), 4);
    }

    #[test]
    fn rejects_short_assembly() {
        let messages = vec![
            StreamMessage::Header(header(4)),
            StreamMessage::Chunk(ChunkPayload::Raw(vec![1, 0])),
        ];
        let transport = FakeTransport { messages };
        let err = fetch_symbol(&transport, "ch1", 8192, true).unwrap_err();
        assert!(matches!(err, HsiError::Protocol(_)));
    }

    #[test]
    fn empty_header_with_no_data_yields_empty_waveform() {
        let mut h = header(0);
        h.has_data = false;
        let messages = vec![StreamMessage::Header(h)];
        let transport = FakeTransport { messages };
        let fetched = fetch_symbol(&transport, "ch1", 8192, true).unwrap();
        assert!(fetched.waveform.as_analog().unwrap().is_empty());
    }

    #[test]
    fn chunk_before_header_is_rejected() {
        let messages = vec![StreamMessage::Chunk(ChunkPayload::Raw(vec![1, 0]))];
        let transport = FakeTransport { messages };
        let err = fetch_symbol(&transport, "ch1", 8192, true).unwrap_err();
        assert!(matches!(err, HsiError::Protocol(_)));
    }
}
