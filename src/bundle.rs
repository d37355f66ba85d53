//! The committed result of one acquisition: every active symbol's waveform,
//! indexed for case-insensitive lookup, plus the header snapshot carried
//! forward into the next iteration's acceptance check.

use std::collections::HashMap;

use crate::protocol::WaveformHeader;
use crate::symbols::normalize;
use crate::waveform::TypedWaveform;

/// One symbol's waveform within a committed bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleEntry {
    pub source_name: String,
    pub waveform: TypedWaveform,
}

/// The header seen for each active symbol on the previous acquisition,
/// keyed by normalized name. Fed into the acceptance filter as `previous`.
pub type PreviousHeaders = HashMap<String, WaveformHeader>;

/// A fully assembled, internally coherent set of waveforms for one
/// acquisition (shared `trans_id`/`data_id` across every entry).
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionBundle {
    pub trans_id: u64,
    pub data_id: u64,
    entries: Vec<BundleEntry>,
    index: HashMap<String, usize>,
}

impl AcquisitionBundle {
    pub fn new(trans_id: u64, data_id: u64, entries: Vec<BundleEntry>) -> Self {
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (normalize(&e.source_name), i))
            .collect();
        Self {
            trans_id,
            data_id,
            entries,
            index,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.source_name.as_str())
    }

    /// Case-insensitive lookup of a symbol's waveform.
    pub fn get(&self, name: &str) -> Option<&TypedWaveform> {
        self.index
            .get(&normalize(name))
            .map(|&i| &self.entries[i].waveform)
    }

    pub fn entries(&self) -> &[BundleEntry] {
        &self.entries
    }

    /// The header snapshot to carry into the next iteration's acceptance
    /// check, keyed by normalized symbol name.
    pub fn header_snapshot(&self) -> PreviousHeaders {
        self.entries
            .iter()
            .map(|e| (normalize(&e.source_name), e.waveform.header().clone()))
            .collect()
    }
}
