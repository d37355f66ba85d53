//! End-to-end scenarios exercising the public [`tekhsi::Client`] API
//! against the in-memory scripted transport.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tekhsi::config::Config;
use tekhsi::coordinator::WaitMode;
use tekhsi::filter;
use tekhsi::protocol::{HorizontalScale, VerticalScale, WaveformHeader, WfmPairType, WfmType};
use tekhsi::testing::{ScriptedTransport, ScriptedWaveform};
use tekhsi::Client;

fn analog_header(name: &str, trans_id: u64, sample_count: u64, source_width: u32) -> WaveformHeader {
    WaveformHeader {
        source_name: name.to_string(),
        source_width,
        data_id: trans_id,
        trans_id,
        horizontal: HorizontalScale {
            spacing: 1e-9,
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
fn s1_simple_analog_fetch() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.set_available_names(vec!["ch1".to_string()]);
    transport.push_waveform(
        "ch1",
        ScriptedWaveform {
            header: analog_header("ch1", 1, 10, 2),
            raw_chunks: vec![vec![0; 20]],
        },
    );

    let client = Client::connect(transport, "s1", Config::default()).unwrap();
    let scope = client.access_data(WaitMode::AnyAcq, Some(Duration::from_secs(2))).unwrap();
    let waveform = scope.get_data("ch1").unwrap();
    assert_eq!(waveform.as_analog().unwrap().len(), 10);
    drop(scope);
    client.close();
}

#[test]
fn s2_coherent_two_channel_acquisition() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.set_available_names(vec!["ch1".to_string(), "ch3".to_string()]);
    transport.push_waveform(
        "ch1",
        ScriptedWaveform {
            header: analog_header("ch1", 7, 2, 2),
            raw_chunks: vec![vec![0; 4]],
        },
    );
    transport.push_waveform(
        "ch3",
        ScriptedWaveform {
            header: analog_header("ch3", 7, 2, 2),
            raw_chunks: vec![vec![0; 4]],
        },
    );

    let client = Client::connect(transport, "s2", Config::default()).unwrap();
    let scope = client.access_data(WaitMode::AnyAcq, Some(Duration::from_secs(2))).unwrap();
    assert_eq!(scope.get_data("ch1").unwrap().header().trans_id, 7);
    assert_eq!(scope.get_data("ch3").unwrap().header().trans_id, 7);
    drop(scope);
    client.close();
}

#[test]
fn s3_mid_acquisition_race_is_discarded_and_retried() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.set_available_names(vec!["ch1".to_string(), "ch3".to_string()]);
    // First attempt: ch1 reports trans_id 9, ch3 has already moved to 10.
    transport.push_waveform(
        "ch1",
        ScriptedWaveform {
            header: analog_header("ch1", 9, 1, 2),
            raw_chunks: vec![vec![0; 2]],
        },
    );
    transport.push_waveform(
        "ch3",
        ScriptedWaveform {
            header: analog_header("ch3", 10, 1, 2),
            raw_chunks: vec![vec![0; 2]],
        },
    );
    // Retry: both converge on trans_id 11.
    transport.push_waveform(
        "ch1",
        ScriptedWaveform {
            header: analog_header("ch1", 11, 1, 2),
            raw_chunks: vec![vec![0; 2]],
        },
    );
    transport.push_waveform(
        "ch3",
        ScriptedWaveform {
            header: analog_header("ch3", 11, 1, 2),
            raw_chunks: vec![vec![0; 2]],
        },
    );

    let client = Client::connect(transport, "s3", Config::default()).unwrap();
    let scope = client.access_data(WaitMode::AnyAcq, Some(Duration::from_secs(2))).unwrap();
    assert_eq!(scope.get_data("ch1").unwrap().header().trans_id, 11);
    assert_eq!(scope.get_data("ch3").unwrap().header().trans_id, 11);
    drop(scope);
    client.close();
}

#[test]
fn s4_horizontal_change_filter_commits_only_on_change() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.set_available_names(vec!["ch1".to_string()]);
    for trans_id in 1..=3 {
        transport.push_waveform(
            "ch1",
            ScriptedWaveform {
                header: analog_header("ch1", trans_id, 4, 2),
                raw_chunks: vec![vec![0; 8]],
            },
        );
    }
    transport.push_waveform(
        "ch1",
        ScriptedWaveform {
            header: analog_header("ch1", 4, 8, 2),
            raw_chunks: vec![vec![0; 16]],
        },
    );

    let client = Client::connect(transport, "s4", Config::default()).unwrap();
    client.set_acq_filter(filter::any_horizontal_change());

    let commits = Arc::new(AtomicUsize::new(0));
    let c2 = Arc::clone(&commits);
    client.set_callback(Some(Arc::new(move |_bundle| {
        c2.fetch_add(1, Ordering::SeqCst);
    })));

    let scope = client
        .access_data(WaitMode::AnyAcq, Some(Duration::from_secs(2)))
        .unwrap();
    assert_eq!(scope.get_data("ch1").unwrap().header().trans_id, 4);
    assert_eq!(commits.load(Ordering::SeqCst), 1);
    drop(scope);
    client.close();
}

#[test]
fn s5_next_acq_blocks_for_the_following_commit() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.set_available_names(vec!["ch1".to_string()]);
    transport.push_waveform(
        "ch1",
        ScriptedWaveform {
            header: analog_header("ch1", 1, 1, 2),
            raw_chunks: vec![vec![0; 2]],
        },
    );
    transport.push_waveform(
        "ch1",
        ScriptedWaveform {
            header: analog_header("ch1", 2, 1, 2),
            raw_chunks: vec![vec![0; 2]],
        },
    );

    let client = Client::connect(transport, "s5", Config::default()).unwrap();
    let first = client.access_data(WaitMode::AnyAcq, Some(Duration::from_secs(2))).unwrap();
    assert_eq!(first.get_data("ch1").unwrap().header().trans_id, 1);
    drop(first);

    let second = client.access_data(WaitMode::NextAcq, Some(Duration::from_secs(2))).unwrap();
    assert_eq!(second.get_data("ch1").unwrap().header().trans_id, 2);
    drop(second);
    client.close();
}

#[test]
fn s6_iq_pairing_yields_complex_samples() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.set_available_names(vec!["ch1".to_string()]);
    let mut header = analog_header("ch1", 1, 4, 2);
    header.wfm_type = WfmType::Analog16IQ;
    header.pair_type = WfmPairType::Pair;
    transport.push_waveform(
        "ch1",
        ScriptedWaveform {
            header,
            raw_chunks: vec![(0..16u8).collect()],
        },
    );

    let client = Client::connect(transport, "s6", Config::default()).unwrap();
    let scope = client.access_data(WaitMode::AnyAcq, Some(Duration::from_secs(2))).unwrap();
    let iq = scope.get_data("ch1").unwrap().as_iq().unwrap();
    assert_eq!(iq.len(), 4);
    assert_eq!(iq.samples().len(), 4);
    drop(scope);
    client.close();
}

#[test]
fn constant_false_filter_blocks_every_commit() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.set_available_names(vec!["ch1".to_string()]);
    transport.push_waveform(
        "ch1",
        ScriptedWaveform {
            header: analog_header("ch1", 1, 1, 2),
            raw_chunks: vec![vec![0; 2]],
        },
    );

    let client = Client::connect(transport, "false-filter", Config::default()).unwrap();
    client.set_acq_filter(Arc::new(|_previous, _current| false));
    let err = client
        .access_data(WaitMode::AnyAcq, Some(Duration::from_millis(100)))
        .unwrap_err();
    assert!(matches!(err, tekhsi::HsiError::Timeout));
    client.close();
}

#[test]
fn close_after_open_scope_completes_the_scope_normally() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.set_available_names(vec!["ch1".to_string()]);
    transport.push_waveform(
        "ch1",
        ScriptedWaveform {
            header: analog_header("ch1", 1, 1, 2),
            raw_chunks: vec![vec![0; 2]],
        },
    );

    let client = Client::connect(transport, "close-scope", Config::default()).unwrap();
    let scope = client.access_data(WaitMode::AnyAcq, Some(Duration::from_secs(2))).unwrap();
    client.close();
    assert!(scope.get_data("ch1").is_ok());
    drop(scope);
}
