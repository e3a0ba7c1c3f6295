//! `rds_tool`: a thin HTTP client over the engine's `/rds/*` control API.
//! Each flag is one request; `-g` dumps the current RDS encoder state.
//! Replaces the original tool's direct shared-memory writes with POSTs
//! against the daemon's control plane.

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::{json, Value};

#[derive(Parser, Debug)]
#[command(name = "rds_tool")]
#[command(about = "Query and tune the RDS encoder's PI, PTY, PS, RadioText, ECC, and LIC")]
struct Args {
    /// Base URL of the running engine's control API.
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    host: String,

    /// Dump the current RDS state as JSON.
    #[arg(short = 'g', long)]
    dump: bool,

    /// Enable the RDS subcarrier.
    #[arg(short = 'e', long)]
    enable: bool,

    /// Disable the RDS subcarrier.
    #[arg(short = 'd', long)]
    disable: bool,

    /// RadioText, up to 64 characters.
    #[arg(long = "rt")]
    radiotext: Option<String>,

    /// Program Service name, up to 8 characters.
    #[arg(long = "ps")]
    ps: Option<String>,

    /// Program Identification code, hex (e.g. 1000).
    #[arg(short = 'p', long = "pi")]
    pi: Option<String>,

    /// Program Type code, 0-31.
    #[arg(long = "pty")]
    pty: Option<u8>,

    /// Programme Type Name, up to 8 characters.
    #[arg(long = "ptyn")]
    ptyn: Option<String>,

    /// Extended Country Code, hex.
    #[arg(long = "ecc")]
    ecc: Option<String>,

    /// Language Identification Code, hex.
    #[arg(long = "lic")]
    lic: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();
    let args = Args::parse();
    let client = reqwest::Client::new();
    let mut did_something = false;

    if args.enable && args.disable {
        bail!("-e/--enable and -d/--disable are mutually exclusive");
    }
    if args.enable {
        did_something = true;
        post(&client, &args.host, "/rds/enabled", json!({"enabled": true})).await?;
    }
    if args.disable {
        did_something = true;
        post(&client, &args.host, "/rds/enabled", json!({"enabled": false})).await?;
    }
    if let Some(hex) = &args.pi {
        did_something = true;
        let pi = parse_hex_u16(hex).context("invalid -p/--pi value")?;
        post(&client, &args.host, "/rds/pi", json!({"pi": pi})).await?;
    }
    if let Some(pty) = args.pty {
        did_something = true;
        post(&client, &args.host, "/rds/pty", json!({"pty": pty})).await?;
    }
    if let Some(ps) = &args.ps {
        did_something = true;
        post(&client, &args.host, "/rds/ps", json!({"text": ps})).await?;
    }
    if let Some(ptyn) = &args.ptyn {
        did_something = true;
        post(&client, &args.host, "/rds/ptyn", json!({"text": ptyn})).await?;
    }
    if let Some(rt) = &args.radiotext {
        did_something = true;
        post(&client, &args.host, "/rds/rt", json!({"text": rt})).await?;
    }
    if let Some(hex) = &args.ecc {
        did_something = true;
        let ecc = parse_hex_u16(hex).context("invalid --ecc value")?;
        post(&client, &args.host, "/rds/ecc", json!({"ecc": ecc as u8})).await?;
    }
    if let Some(hex) = &args.lic {
        did_something = true;
        let lic = parse_hex_u16(hex).context("invalid --lic value")?;
        post(&client, &args.host, "/rds/lic", json!({"lic": lic})).await?;
    }

    if args.dump || !did_something {
        let resp: Value = client.get(format!("{}/rds", args.host)).send().await?.error_for_status()?.json().await?;
        println!("{}", serde_json::to_string_pretty(&resp)?);
    }

    Ok(())
}

fn parse_hex_u16(s: &str) -> Result<u16> {
    let s = s.trim().trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(s, 16).with_context(|| format!("{s} is not valid hex"))
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
