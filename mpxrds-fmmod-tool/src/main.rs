//! `fmmod_tool`: a thin HTTP client over the engine's `/fmmod/*` control
//! API. Each flag is one request; `-g` dumps the current state. Replaces
//! the original tool's direct shared-memory writes with POSTs against the
//! daemon's control plane.

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::{json, Value};

#[derive(Parser, Debug)]
#[command(name = "fmmod_tool")]
#[command(about = "Query and tune the FM modulator's gains, stereo mode, LPF, and pre-emphasis")]
struct Args {
    /// Base URL of the running engine's control API.
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    host: String,

    /// Dump the current fmmod state as JSON.
    #[arg(short = 'g', long)]
    dump: bool,

    /// Audio gain, percent in [0, 100].
    #[arg(short = 'a', long)]
    audio: Option<i32>,

    /// MPX (overall) gain, percent in [0, 100].
    #[arg(short = 'm', long)]
    mpx: Option<i32>,

    /// Pilot tone gain, percent in [0, 100].
    #[arg(short = 'p', long)]
    pilot: Option<i32>,

    /// RDS subcarrier gain, percent in [0, 100].
    #[arg(short = 'r', long)]
    rds: Option<i32>,

    /// Stereo (38 kHz) carrier gain, percent in [0, 100].
    #[arg(short = 'c', long)]
    stereo_carrier: Option<i32>,

    /// Stereo-encoder selector: 0=DSB, 1=SSB-Hartley, 2=SSB-LPF, 3=Mono.
    #[arg(short = 's', long)]
    stereo_mode: Option<u8>,

    /// Audio protective low-pass: 1 to enable, 0 to disable.
    #[arg(short = 'f', long)]
    lpf: Option<u8>,

    /// Pre-emphasis selector: 0=50us, 1=75us, 2=disabled.
    #[arg(short = 'e', long)]
    preemphasis: Option<u8>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();
    let args = Args::parse();
    let client = reqwest::Client::new();
    let mut did_something = false;

    if let Some(percent) = args.audio {
        did_something = true;
        post_gain(&client, &args.host, "audio", percent).await?;
    }
    if let Some(percent) = args.mpx {
        did_something = true;
        post_gain(&client, &args.host, "mpx", percent).await?;
    }
    if let Some(percent) = args.pilot {
        did_something = true;
        post_gain(&client, &args.host, "pilot", percent).await?;
    }
    if let Some(percent) = args.rds {
        did_something = true;
        post_gain(&client, &args.host, "rds", percent).await?;
    }
    if let Some(percent) = args.stereo_carrier {
        did_something = true;
        post_gain(&client, &args.host, "stereo_carrier", percent).await?;
    }
    if let Some(selector) = args.stereo_mode {
        did_something = true;
        post(&client, &args.host, "/fmmod/stereo_mode", json!({"selector": selector})).await?;
    }
    if let Some(enabled) = args.lpf {
        did_something = true;
        post(&client, &args.host, "/fmmod/lpf", json!({"enabled": enabled != 0})).await?;
    }
    if let Some(selector) = args.preemphasis {
        did_something = true;
        post(&client, &args.host, "/fmmod/preemphasis", json!({"selector": selector})).await?;
    }

    if args.dump || !did_something {
        let resp: Value = client.get(format!("{}/fmmod", args.host)).send().await?.error_for_status()?.json().await?;
        println!("{}", serde_json::to_string_pretty(&resp)?);
    }

    Ok(())
}

async fn post_gain(client: &reqwest::Client, host: &str, channel: &str, percent: i32) -> Result<()> {
    post(client, host, "/fmmod/gain", json!({"channel": channel, "percent": percent})).await
}

async fn post(client: &reqwest::Client, host: &str, path: &str, body: Value) -> Result<()> {
    let resp = client.post(format!("{host}{path}")).json(&body).send().await.with_context(|| format!("request to {path} failed"))?;
    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        bail!("{path} returned {status}: {text}");
    }
    Ok(())
}
