//! Minimal demonstration: connect against an in-memory scripted
//! instrument, wait for one acquisition, and print the channel it carries.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tekhsi::config::Config;
use tekhsi::coordinator::WaitMode;
use tekhsi::protocol::{HorizontalScale, VerticalScale, WaveformHeader, WfmPairType, WfmType};
use tekhsi::testing::{ScriptedTransport, ScriptedWaveform};
use tekhsi::Client;

#[derive(Parser)]
struct Args {
    /// Symbol name to request from the scripted instrument.
    #[arg(long, default_value = "ch1")]
    symbol: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let transport = Arc::new(ScriptedTransport::new());
    transport.set_available_names(vec![args.symbol.clone()]);
    transport.push_waveform(
        &args.symbol,
        ScriptedWaveform {
            header: WaveformHeader {
                source_name: args.symbol.clone(),
                source_width: 2,
                data_id: 1,
                trans_id: 1,
                horizontal: HorizontalScale {
                    spacing: 1e-9,
                    zero_index: 0,
                    fractional_zero_index: 0.0,
                    sample_count: 4,
                    units: "s".to_string(),
                },
                vertical: VerticalScale {
                    spacing: 0.01,
                    offset: 0.0,
                    units: "V".to_string(),
                },
                wfm_type: WfmType::Analog16,
                bitmask: 0,
                pair_type: WfmPairType::None,
                iq: None,
                chunk_size: 8192,
                has_data: true,
            },
            raw_chunks: vec![vec![10, 0, 20, 0, 30, 0, 40, 0]],
        },
    );

    let client = Client::connect(transport, "hsi-demo", Config::default())?;
    let scope = client.access_data(WaitMode::AnyAcq, Some(Duration::from_secs(2)))?;
    let waveform = scope.get_data(&args.symbol)?;
    if let Some(analog) = waveform.as_analog() {
        println!("{}: {:?}", args.symbol, analog.to_vertical_values());
    }
    drop(scope);
    client.close();
    Ok(())
}
