//! Typed-waveform builder: turns an assembled sample buffer plus its header
//! into the tagged `TypedWaveform` value the consumer sees.

use crate::error::{HsiError, Result};
use crate::protocol::{WaveformHeader, WfmPairType, WfmType};

/// The assembled samples for one header, in whichever encoding the fetcher
/// used.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleBuffer {
    Raw(Vec<u8>),
    Normalized(Vec<f32>),
}

impl SampleBuffer {
    pub fn is_empty(&self) -> bool {
        match self {
            SampleBuffer::Raw(b) => b.is_empty(),
            SampleBuffer::Normalized(v) => v.is_empty(),
        }
    }
}

/// A point in the complex plane, for IQ samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

/// A single-channel analog waveform.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalogWaveform {
    pub header: WaveformHeader,
    samples: SampleBuffer,
}

impl AnalogWaveform {
    pub fn len(&self) -> usize {
        self.header.horizontal.sample_count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The de-normalized vertical value at index `i`, in the header's
    /// vertical units.
    ///
    /// For normalized samples the value is already in vertical units. For
    /// raw samples, `value * spacing + offset` is applied lazily.
    pub fn vertical_value(&self, i: usize) -> f64 {
        match &self.samples {
            SampleBuffer::Normalized(v) => v[i] as f64,
            SampleBuffer::Raw(bytes) => {
                let raw = read_signed_lane(bytes, i, self.header.source_width as usize);
                raw * self.header.vertical.spacing + self.header.vertical.offset
            }
        }
    }

    /// The horizontal-axis value at index `i`, computed lazily from
    /// `(spacing, zero_index, fractional_zero_index)` rather than
    /// materialized.
    pub fn time_value(&self, i: usize) -> f64 {
        time_axis_value(&self.header, i)
    }

    /// A lazy iterator over every horizontal-axis value, computed on
    /// demand rather than materialized into a `Vec`.
    pub fn time_axis(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.len()).map(move |i| self.time_value(i))
    }

    /// Alias for [`AnalogWaveform::time_axis`], matching the name used for
    /// the horizontal axis elsewhere in this crate's public surface.
    pub fn x_axis(&self) -> impl Iterator<Item = f64> + '_ {
        self.time_axis()
    }

    pub fn to_vertical_values(&self) -> Vec<f64> {
        (0..self.len()).map(|i| self.vertical_value(i)).collect()
    }
}

/// An IQ (in-phase/quadrature) waveform.
#[derive(Debug, Clone, PartialEq)]
pub struct IqWaveform {
    pub header: WaveformHeader,
    samples: SampleBuffer,
}

impl IqWaveform {
    pub fn len(&self) -> usize {
        self.header.horizontal.sample_count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sample(&self, i: usize) -> Complex {
        match &self.samples {
            SampleBuffer::Normalized(v) => Complex {
                re: v[2 * i] as f64,
                im: v[2 * i + 1] as f64,
            },
            SampleBuffer::Raw(bytes) => {
                let lane = self.header.source_width as usize;
                Complex {
                    re: read_signed_lane(bytes, 2 * i, lane),
                    im: read_signed_lane(bytes, 2 * i + 1, lane),
                }
            }
        }
    }

    pub fn samples(&self) -> Vec<Complex> {
        (0..self.len()).map(|i| self.sample(i)).collect()
    }
}

/// A digital waveform: raw bytes plus a bitmask of meaningful bits.
#[derive(Debug, Clone, PartialEq)]
pub struct DigitalWaveform {
    pub header: WaveformHeader,
    pub bytes: Vec<u8>,
}

/// The value produced for the consumer: a tagged variant over the three
/// waveform kinds, carrying the header and assembled samples.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedWaveform {
    Analog(AnalogWaveform),
    Iq(IqWaveform),
    Digital(DigitalWaveform),
}

impl TypedWaveform {
    pub fn header(&self) -> &WaveformHeader {
        match self {
            TypedWaveform::Analog(w) => &w.header,
            TypedWaveform::Iq(w) => &w.header,
            TypedWaveform::Digital(w) => &w.header,
        }
    }

    /// The horizontal-axis values for analog waveforms, computed lazily.
    /// Empty for IQ and digital waveforms, which have no single per-sample
    /// time axis in this model.
    pub fn time_axis(&self) -> Box<dyn Iterator<Item = f64> + '_> {
        match self.as_analog() {
            Some(w) => Box::new(w.time_axis()),
            None => Box::new(std::iter::empty()),
        }
    }

    /// Alias for [`TypedWaveform::time_axis`].
    pub fn x_axis(&self) -> Box<dyn Iterator<Item = f64> + '_> {
        self.time_axis()
    }

    pub fn as_analog(&self) -> Option<&AnalogWaveform> {
        match self {
            TypedWaveform::Analog(w) => Some(w),
            _ => None,
        }
    }

    pub fn as_iq(&self) -> Option<&IqWaveform> {
        match self {
            TypedWaveform::Iq(w) => Some(w),
            _ => None,
        }
    }

    pub fn as_digital(&self) -> Option<&DigitalWaveform> {
        match self {
            TypedWaveform::Digital(w) => Some(w),
            _ => None,
        }
    }
}

/// Build a `TypedWaveform` from a header and its assembled samples.
pub fn build_typed_waveform(header: WaveformHeader, samples: SampleBuffer) -> Result<TypedWaveform> {
    if header.wfm_type.is_digital() {
        let bytes = match samples {
            SampleBuffer::Raw(b) => b,
            SampleBuffer::Normalized(_) => {
                return Err(HsiError::Protocol(
                    "digital waveform cannot use normalized encoding".to_string(),
                ))
            }
        };
        return Ok(TypedWaveform::Digital(DigitalWaveform { header, bytes }));
    }
    if header.wfm_type.is_iq() || header.pair_type == WfmPairType::Pair {
        return Ok(TypedWaveform::Iq(IqWaveform { header, samples }));
    }
    match header.wfm_type {
        WfmType::Analog8 | WfmType::Analog16 | WfmType::AnalogFloat => {
            Ok(TypedWaveform::Analog(AnalogWaveform { header, samples }))
        }
        WfmType::Unspecified => Err(HsiError::Protocol(
            "header carries no waveform type".to_string(),
        )),
        other => Err(HsiError::Protocol(format!(
            "unsupported combination of wfm_type {other:?} and pair_type {:?}",
            header.pair_type
        ))),
    }
}

fn time_axis_value(header: &WaveformHeader, i: usize) -> f64 {
    let h = &header.horizontal;
    (i as f64 - h.zero_index as f64 - h.fractional_zero_index) * h.spacing
}

/// Read the `i`th signed integer lane (1, 2, or 4 bytes wide) from `bytes`
/// as an `f64`. Widths other than 1/2/4 read as zero (the instrument never
/// advertises them, but this keeps the reader infallible).
fn read_signed_lane(bytes: &[u8], i: usize, lane_width: usize) -> f64 {
    let offset = i * lane_width;
    match lane_width {
        1 => bytes.get(offset).map(|b| *b as i8 as f64).unwrap_or(0.0),
        2 => bytes
            .get(offset..offset + 2)
            .map(|s| i16::from_le_bytes([s[0], s[1]]) as f64)
            .unwrap_or(0.0),
        4 => bytes
            .get(offset..offset + 4)
            .map(|s| f32::from_le_bytes([s[0], s[1], s[2], s[3]]) as f64)
            .unwrap_or(0.0),
        _ => 0.0,
    }
}
