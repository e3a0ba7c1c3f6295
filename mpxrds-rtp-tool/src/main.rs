//! `rtp_tool`: a thin HTTP client over the engine's `/rtp*` control API.
//! Replaces the original tool's `sigqueue()` to the service PID (which
//! packed a receiver IPv4 address into the signal's `sival_int`) with a
//! POST to `/rtp/receivers`.

use std::net::Ipv4Addr;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::{json, Value};

#[derive(Parser, Debug)]
#[command(name = "rtp_tool")]
#[command(about = "Query and manage the RTP sink's receiver list")]
struct Args {
    /// Base URL of the running engine's control API.
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    host: String,

    /// Dump the current RTP sink state as JSON.
    #[arg(short = 'g', long)]
    dump: bool,

    /// Add a unicast receiver by IPv4 address.
    #[arg(short = 'a', long)]
    add: Option<Ipv4Addr>,

    /// Remove a unicast receiver by IPv4 address.
    #[arg(short = 'r', long)]
    remove: Option<Ipv4Addr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();
    let args = Args::parse();
    let client = reqwest::Client::new();
    let mut did_something = false;

    if let Some(addr) = args.add {
        did_something = true;
        post(&client, &args.host, json!({"action": "add", "addr": addr})).await?;
    }
    if let Some(addr) = args.remove {
        did_something = true;
        post(&client, &args.host, json!({"action": "remove", "addr": addr})).await?;
    }

    if args.dump || !did_something {
        let resp: Value = client.get(format!("{}/rtp", args.host)).send().await?.error_for_status()?.json().await?;
        println!("{}", serde_json::to_string_pretty(&resp)?);
    }

    Ok(())
}

async fn post(client: &reqwest::Client, host: &str, body: Value) -> Result<()> {
    let path = "/rtp/receivers";
    let resp = client.post(format!("{host}{path}")).json(&body).send().await.with_context(|| format!("request to {path} failed"))?;
    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        bail!("{path} returned {status}: {text}");
    }
    Ok(())
}
