//! Acceptance filters: the pure predicate the pipeline runs over a
//! candidate bundle's headers before committing it.
//!
//! A filter panic is treated as a reject rather than propagated, since a
//! caller-supplied closure shouldn't be able to take down the pipeline
//! thread.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::bundle::PreviousHeaders;
use crate::protocol::WaveformHeader;

/// A boxed acceptance filter: given the previous iteration's header
/// snapshot and the candidate bundle's headers, decide whether to commit.
pub type FilterFn = Arc<dyn Fn(&PreviousHeaders, &[WaveformHeader]) -> bool + Send + Sync>;

/// Accept unconditionally. The default filter.
pub fn any_acq() -> FilterFn {
    Arc::new(|_previous, _current| true)
}

/// Accept only when at least one active symbol's `data_id` differs from its
/// previous value (or the symbol is new).
pub fn new_data() -> FilterFn {
    Arc::new(|previous, current| {
        current.iter().any(|h| {
            previous
                .get(&crate::symbols::normalize(&h.source_name))
                .map(|prev| prev.data_id != h.data_id)
                .unwrap_or(true)
        })
    })
}

/// Accept only when any active symbol's vertical scale changed.
pub fn any_vertical_change() -> FilterFn {
    Arc::new(|previous, current| {
        current.iter().any(|h| {
            previous
                .get(&crate::symbols::normalize(&h.source_name))
                .map(|prev| prev.vertical != h.vertical)
                .unwrap_or(true)
        })
    })
}

/// Accept only when any active symbol's horizontal scale changed.
pub fn any_horizontal_change() -> FilterFn {
    Arc::new(|previous, current| {
        current.iter().any(|h| {
            previous
                .get(&crate::symbols::normalize(&h.source_name))
                .map(|prev| prev.horizontal != h.horizontal)
                .unwrap_or(true)
        })
    })
}

/// Run `filter` against `previous`/`current`, treating a panic as a reject.
pub fn evaluate(filter: &FilterFn, previous: &PreviousHeaders, current: &[WaveformHeader]) -> bool {
    let filter = AssertUnwindSafe(filter);
    let previous = AssertUnwindSafe(previous);
    let current = AssertUnwindSafe(current);
    panic::catch_unwind(move || (filter.0)(previous.0, current.0)).unwrap_or_else(|_| {
        tracing::warn!("acceptance filter panicked; treating acquisition as rejected");
        false
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{HorizontalScale, VerticalScale, WfmPairType, WfmType};

    fn header(name: &str, data_id: u64) -> WaveformHeader {
        WaveformHeader {
            source_name: name.to_string(),
            source_width: 2,
            data_id,
            trans_id: 1,
            horizontal: HorizontalScale {
                spacing: 1.0,
                zero_index: 0,
                fractional_zero_index: 0.0,
                sample_count: 1,
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
    fn any_acq_always_accepts() {
        let f = any_acq();
        assert!(evaluate(&f, &PreviousHeaders::new(), &[header("ch1", 1)]));
    }

    #[test]
    fn new_data_requires_changed_data_id() {
        let f = new_data();
        let mut prev = PreviousHeaders::new();
        prev.insert("ch1".to_string(), header("ch1", 1));
        assert!(!evaluate(&f, &prev, &[header("ch1", 1)]));
        assert!(evaluate(&f, &prev, &[header("ch1", 2)]));
    }

    #[test]
    fn panicking_filter_is_treated_as_reject() {
        let f: FilterFn = Arc::new(|_, _| panic!("boom"));
        assert!(!evaluate(&f, &PreviousHeaders::new(), &[header("ch1", 1)]));
    }
}
