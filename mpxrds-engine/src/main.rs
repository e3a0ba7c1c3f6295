//! `mpxrds-engine`: the FM MPX/RDS signal synthesis daemon.
//!
//! Captures stereo program audio, synthesizes the composite MPX baseband
//! (pilot, stereo subcarrier, RDS subcarrier), and fans the result out to
//! the sound card, a named FIFO, and (when configured) an RTP sink, while
//! serving a local HTTP control API for live tuning.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use mpxrds_core::rds::{Producer, Rotator};
use mpxrds_engine::api::{self, ApiState};
use mpxrds_engine::audio::{AudioInput, AudioOutput, FifoWriter};
use mpxrds_engine::config::{Config, Overrides};
use mpxrds_engine::engine::MpxEngine;
use mpxrds_engine::rtp::RtpSinkHandle;
use mpxrds_engine::sse::SseEventData;
use mpxrds_engine::SharedState;

#[derive(Parser, Debug)]
#[command(name = "mpxrds-engine")]
#[command(about = "FM MPX/RDS composite baseband synthesis daemon")]
#[command(version)]
struct Args {
    /// Path to the TOML bootstrap configuration file.
    #[arg(short, long, default_value = "mpxrds.toml")]
    config: PathBuf,

    /// Capture device name (overrides config file; default device if unset).
    #[arg(long)]
    input_device: Option<String>,

    /// Playback device name (overrides config file; default device if unset).
    #[arg(long)]
    output_device: Option<String>,

    /// Control API bind address, e.g. 127.0.0.1:8080.
    #[arg(long)]
    bind_address: Option<String>,

    /// Named-FIFO path for the downsampled MPX composite.
    #[arg(long)]
    fifo_path: Option<PathBuf>,
}

/// Samples of output-ring-buffer headroom, in multiples of one downsampled
/// block, before the audio-output callback starts seeing underruns.
const OUTPUT_RING_BLOCKS: usize = 8;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "mpxrds_engine=info,tower_http=info".into()))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let args = Args::parse();
    let config = Config::load(
        &args.config,
        Overrides {
            input_device: args.input_device,
            output_device: args.output_device,
            bind_address: args.bind_address,
            fifo_path: args.fifo_path,
        },
    )?;
    info!(?config, "loaded configuration");

    let shared_state = Arc::new(SharedState::new());

    let rds_producer = Producer::spawn(Arc::clone(&shared_state.rds), config.oscillator_rate, mpxrds_core::rds::producer::DEFAULT_CHUNK_GROUPS)?;
    match rds_producer.wait_until_running(Duration::from_secs(5)) {
        mpxrds_core::rds::producer::Status::Running => info!("RDS producer running"),
        status => warn!(?status, "RDS producer did not reach Running within startup timeout"),
    }
    shared_state.events.broadcast_lossy(mpxrds_engine::sse::SseEvent::new("rds_producer_status", SseEventData::rds_producer_status("running")));
    let rds_consumer = rds_producer.consumer();

    // Dynamic PS/RadioText rotators fall back to whatever static value the
    // control plane already holds when no file-backed payload is active.
    let mut rotators: Vec<Rotator> = Vec::new();
    if let Some(path) = &config.dynamic_ps_path {
        let fixed = {
            let st = shared_state.rds.lock().unwrap();
            ascii_field(&st.ps)
        };
        rotators.push(Rotator::watch_ps(path, fixed, Arc::clone(&shared_state.rds))?);
        info!(path = %path.display(), "watching dynamic PS file");
    }
    if let Some(path) = &config.dynamic_rt_path {
        let fixed = {
            let st = shared_state.rds.lock().unwrap();
            ascii_field(&st.rt)
        };
        rotators.push(Rotator::watch_radiotext(path, fixed, Arc::clone(&shared_state.rds))?);
        info!(path = %path.display(), "watching dynamic RadioText file");
    }

    let rtp_sink = RtpSinkHandle::default();

    let fifo = FifoWriter::new(&config.fifo_path)?;

    let mut audio_input = AudioInput::new(config.input_device.as_deref(), config.input_sample_rate, config.block_size)?;
    let input_rate = audio_input.sample_rate();

    let mut audio_output = AudioOutput::new(config.output_device.as_deref(), config.output_sample_rate, config.block_size)?;

    let downsampled_estimate = ((config.block_size as u64 * config.oscillator_rate as u64 + input_rate as u64 - 1) / input_rate as u64) as usize;
    let ring_capacity = downsampled_estimate.max(config.block_size) * OUTPUT_RING_BLOCKS;
    let (output_tx, output_rx) = ringbuf::HeapRb::<f32>::new(ring_capacity).split();
    audio_output.start(output_rx)?;

    let mut engine = MpxEngine::new(&config, input_rate, Arc::clone(&shared_state), rds_consumer, fifo, rtp_sink.clone(), output_tx)?;

    audio_input.start(move |left, right| {
        engine.process_block(left, right);
    })?;

    let api_state = ApiState { shared: Arc::clone(&shared_state), rtp_sink };
    let bind_address = config.bind_address.clone();
    let api_handle = tokio::spawn(async move {
        if let Err(e) = api::run(&bind_address, api_state).await {
            error!(error = %e, "control API server exited with an error");
        }
    });

    let peak_ticker_state = Arc::clone(&shared_state);
    let peak_ticker = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(250));
        loop {
            interval.tick().await;
            let peak = peak_ticker_state.take_peak();
            peak_ticker_state
                .events
                .broadcast_lossy(mpxrds_engine::sse::SseEvent::new("peak_meters", SseEventData::peak_meters(peak.left, peak.right, peak.mpx)));
        }
    });

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, stopping");

    peak_ticker.abort();
    api_handle.abort();
    drop(rotators);
    drop(rds_producer);
    drop(audio_input);
    drop(audio_output);

    Ok(())
}

fn ascii_field(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim_end().to_string()
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut sigquit = signal(SignalKind::quit()).expect("failed to install SIGQUIT handler");
    let mut sighup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigint.recv() => info!("received SIGINT"),
        _ = sigquit.recv() => info!("received SIGQUIT"),
        _ = sighup.recv() => info!("received SIGHUP"),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
