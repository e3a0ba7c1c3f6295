//! Route handlers. Each one locks exactly one control region for the
//! duration of its read or write and never touches the audio thread's
//! locks out of order, so a slow HTTP client can never stall synthesis.

use std::net::Ipv4Addr;

use axum::extract::State;
use axum::response::sse::Sse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use mpxrds_core::control::PreEmphasis;
use mpxrds_core::mpx::StereoMode;
use mpxrds_core::control::FmModControl;

use crate::error::Result;

use super::server::ApiState;

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "git_hash": env!("GIT_HASH"),
        "build_timestamp": env!("BUILD_TIMESTAMP"),
        "build_profile": env!("BUILD_PROFILE"),
    }))
}

pub async fn events(State(state): State<ApiState>) -> Sse<impl futures::Stream<Item = Result<axum::response::sse::Event, std::convert::Infallible>>> {
    state.shared.events.handle_sse_connection()
}

fn stereo_mode_label(mode: StereoMode) -> &'static str {
    match mode {
        StereoMode::Dsb => "dsb",
        StereoMode::SsbHartley => "ssb_hartley",
        StereoMode::SsbLpf => "ssb_lpf",
        StereoMode::Mono => "mono",
        StereoMode::SsbWeaver => "ssb_weaver",
    }
}

fn preemphasis_label(pe: PreEmphasis) -> &'static str {
    match pe {
        PreEmphasis::Us50 => "50us",
        PreEmphasis::Us75 => "75us",
        PreEmphasis::Disabled => "disabled",
    }
}

pub async fn fmmod_dump(State(state): State<ApiState>) -> Json<Value> {
    let ctl = state.shared.fmmod.lock().unwrap();
    Json(json!({
        "gain_audio_percent": (ctl.gain_audio * 100.0).round() as i32,
        "gain_pilot_percent": (ctl.gain_pilot * 100.0).round() as i32,
        "gain_stereo_carrier_percent": (ctl.gain_stereo_carrier * 100.0).round() as i32,
        "gain_rds_percent": (ctl.gain_rds * 100.0).round() as i32,
        "gain_mpx_percent": (ctl.gain_mpx * 100.0).round() as i32,
        "stereo_mode": stereo_mode_label(ctl.stereo_mode),
        "lpf_enabled": ctl.lpf_enabled,
        "preemphasis": preemphasis_label(ctl.preemphasis),
        "peak_left": ctl.peak.left,
        "peak_right": ctl.peak.right,
        "peak_mpx": ctl.peak.mpx,
        "audio_sample_rate": ctl.audio_sample_rate,
        "block_size": ctl.block_size,
    }))
}

#[derive(Debug, Deserialize)]
pub struct GainRequest {
    pub channel: GainChannel,
    pub percent: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GainChannel {
    Audio,
    Pilot,
    StereoCarrier,
    Rds,
    Mpx,
}

pub async fn fmmod_set_gain(State(state): State<ApiState>, Json(req): Json<GainRequest>) -> Result<Json<Value>> {
    let mut ctl = state.shared.fmmod.lock().unwrap();
    let target = match req.channel {
        GainChannel::Audio => &mut ctl.gain_audio,
        GainChannel::Pilot => &mut ctl.gain_pilot,
        GainChannel::StereoCarrier => &mut ctl.gain_stereo_carrier,
        GainChannel::Rds => &mut ctl.gain_rds,
        GainChannel::Mpx => &mut ctl.gain_mpx,
    };
    FmModControl::set_gain_percent(target, req.percent)?;
    Ok(Json(json!({"ok": true})))
}

#[derive(Debug, Deserialize)]
pub struct StereoModeRequest {
    pub selector: u8,
}

pub async fn fmmod_set_stereo_mode(State(state): State<ApiState>, Json(req): Json<StereoModeRequest>) -> Result<Json<Value>> {
    let mode = StereoMode::from_cli(req.selector)?;
    state.shared.fmmod.lock().unwrap().stereo_mode = mode;
    Ok(Json(json!({"ok": true, "stereo_mode": stereo_mode_label(mode)})))
}

#[derive(Debug, Deserialize)]
pub struct LpfRequest {
    pub enabled: bool,
}

pub async fn fmmod_set_lpf(State(state): State<ApiState>, Json(req): Json<LpfRequest>) -> Result<Json<Value>> {
    state.shared.fmmod.lock().unwrap().lpf_enabled = req.enabled;
    Ok(Json(json!({"ok": true})))
}

#[derive(Debug, Deserialize)]
pub struct PreEmphasisRequest {
    pub selector: u8,
}

pub async fn fmmod_set_preemphasis(State(state): State<ApiState>, Json(req): Json<PreEmphasisRequest>) -> Result<Json<Value>> {
    let pe = PreEmphasis::from_cli(req.selector)?;
    state.shared.fmmod.lock().unwrap().preemphasis = pe;
    Ok(Json(json!({"ok": true, "preemphasis": preemphasis_label(pe)})))
}

fn ascii_field(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim_end().to_string()
}

pub async fn rds_dump(State(state): State<ApiState>) -> Json<Value> {
    let st = state.shared.rds.lock().unwrap();
    Json(json!({
        "enabled": st.enabled,
        "pi": format!("{:04X}", st.pi),
        "tp": st.tp,
        "pty": st.pty,
        "ta": st.ta,
        "ms": st.ms,
        "di": st.di,
        "ecc": format!("{:02X}", st.ecc),
        "ecc_set": st.ecc_set,
        "lic": format!("{:03X}", st.lic),
        "lic_set": st.lic_set,
        "ps": ascii_field(&st.ps),
        "ps_set": st.ps_set,
        "ptyn": ascii_field(&st.ptyn),
        "ptyn_set": st.ptyn_set,
        "rt": ascii_field(&st.rt),
        "rt_set": st.rt_set,
    }))
}

#[derive(Debug, Deserialize)]
pub struct EnabledRequest {
    pub enabled: bool,
}

pub async fn rds_set_enabled(State(state): State<ApiState>, Json(req): Json<EnabledRequest>) -> Json<Value> {
    state.shared.rds.lock().unwrap().enabled = req.enabled;
    Json(json!({"ok": true}))
}

#[derive(Debug, Deserialize)]
pub struct PiRequest {
    pub pi: u16,
}

pub async fn rds_set_pi(State(state): State<ApiState>, Json(req): Json<PiRequest>) -> Json<Value> {
    state.shared.rds.lock().unwrap().set_pi(req.pi);
    Json(json!({"ok": true}))
}

#[derive(Debug, Deserialize)]
pub struct PtyRequest {
    pub pty: u8,
}

pub async fn rds_set_pty(State(state): State<ApiState>, Json(req): Json<PtyRequest>) -> Result<Json<Value>> {
    state.shared.rds.lock().unwrap().set_pty(req.pty)?;
    Ok(Json(json!({"ok": true})))
}

#[derive(Debug, Deserialize)]
pub struct TextRequest {
    pub text: String,
}

pub async fn rds_set_ps(State(state): State<ApiState>, Json(req): Json<TextRequest>) -> Result<Json<Value>> {
    let changed = state.shared.rds.lock().unwrap().set_ps(&req.text)?;
    Ok(Json(json!({"ok": true, "changed": changed})))
}

pub async fn rds_set_ptyn(State(state): State<ApiState>, Json(req): Json<TextRequest>) -> Result<Json<Value>> {
    let changed = state.shared.rds.lock().unwrap().set_ptyn(&req.text)?;
    Ok(Json(json!({"ok": true, "changed": changed})))
}

pub async fn rds_set_rt(State(state): State<ApiState>, Json(req): Json<TextRequest>) -> Result<Json<Value>> {
    let changed = state.shared.rds.lock().unwrap().set_rt(&req.text)?;
    Ok(Json(json!({"ok": true, "changed": changed})))
}

#[derive(Debug, Deserialize)]
pub struct EccRequest {
    pub ecc: u8,
}

pub async fn rds_set_ecc(State(state): State<ApiState>, Json(req): Json<EccRequest>) -> Json<Value> {
    state.shared.rds.lock().unwrap().set_ecc(req.ecc);
    Json(json!({"ok": true}))
}

#[derive(Debug, Deserialize)]
pub struct LicRequest {
    pub lic: u16,
}

pub async fn rds_set_lic(State(state): State<ApiState>, Json(req): Json<LicRequest>) -> Json<Value> {
    state.shared.rds.lock().unwrap().set_lic(req.lic);
    Json(json!({"ok": true}))
}

pub async fn rtp_dump(State(state): State<ApiState>) -> Json<Value> {
    let ctl = state.shared.rtp.lock().unwrap();
    Json(json!({
        "pid": ctl.pid,
        "rtp_bytes": ctl.rtp_bytes,
        "rtcp_bytes": ctl.rtcp_bytes,
        "receivers": ctl.receivers.iter().map(|a| a.to_string()).collect::<Vec<_>>(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum ReceiverRequest {
    Add { addr: Ipv4Addr },
    Remove { addr: Ipv4Addr },
}

#[derive(Debug, Serialize)]
pub struct ReceiverResponse {
    pub ok: bool,
}

pub async fn rtp_receivers(State(state): State<ApiState>, Json(req): Json<ReceiverRequest>) -> Result<Json<Value>> {
    match req {
        ReceiverRequest::Add { addr } => {
            state.shared.rtp.lock().unwrap().add_receiver(addr)?;
            state.rtp_sink.add_receiver(addr);
        }
        ReceiverRequest::Remove { addr } => {
            state.shared.rtp.lock().unwrap().remove_receiver(addr);
            state.rtp_sink.remove_receiver(addr);
        }
    }
    Ok(Json(json!({"ok": true})))
}
