//! Audio input using cpal: a stereo capture stream that deinterleaves each
//! callback's buffer and hands the two channels to a caller-supplied
//! closure. The synthesis pipeline (see [`crate::engine::MpxEngine`]) runs
//! directly inside that closure, driven by the capture device's own
//! callback cadence rather than a separate worker thread.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleFormat, Stream, StreamConfig};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

pub struct AudioInput {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    stream: Option<Stream>,
}

impl AudioInput {
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices: Vec<String> = host
            .input_devices()
            .map_err(|e| Error::Audio(format!("failed to enumerate input devices: {e}")))?
            .filter_map(|d| d.name().ok())
            .collect();
        Ok(devices)
    }

    pub fn new(device_name: Option<&str>, sample_rate: u32, block_size: usize) -> Result<Self> {
        let host = cpal::default_host();
        let device = match device_name {
            Some(name) => host
                .input_devices()
                .map_err(|e| Error::Audio(format!("failed to enumerate input devices: {e}")))?
                .find(|d| d.name().ok().as_deref() == Some(name))
                .ok_or_else(|| Error::Audio(format!("input device '{name}' not found")))?,
            None => host.default_input_device().ok_or_else(|| Error::Audio("no default input device".to_string()))?,
        };

        info!(device = %device.name().unwrap_or_default(), "opened audio input device");

        let sample_format = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(format!("failed to query input configs: {e}")))?
            .find(|c| c.channels() == 2 && c.min_sample_rate().0 <= sample_rate && c.max_sample_rate().0 >= sample_rate)
            .map(|c| c.sample_format())
            .unwrap_or(SampleFormat::F32);

        let config = StreamConfig {
            channels: 2,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: BufferSize::Fixed(block_size as u32),
        };

        debug!(?config, ?sample_format, "negotiated input stream config");

        Ok(Self { device, config, sample_format, stream: None })
    }

    /// Starts capture. `on_block(left, right)` is called once per callback
    /// with the deinterleaved channels; it owns its own scratch buffers so
    /// this stream never allocates once running.
    pub fn start<F>(&mut self, mut on_block: F) -> Result<()>
    where
        F: FnMut(&[f32], &[f32]) + Send + 'static,
    {
        let err_fn = |e| warn!(error = %e, "audio input stream error");
        let mut left_scratch: Vec<f32> = Vec::with_capacity(8192);
        let mut right_scratch: Vec<f32> = Vec::with_capacity(8192);

        let stream = match self.sample_format {
            SampleFormat::F32 => self
                .device
                .build_input_stream(
                    &self.config,
                    move |data: &[f32], _| {
                        left_scratch.clear();
                        right_scratch.clear();
                        for frame in data.chunks_exact(2) {
                            left_scratch.push(frame[0]);
                            right_scratch.push(frame[1]);
                        }
                        on_block(&left_scratch, &right_scratch);
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| Error::Audio(format!("failed to build input stream: {e}")))?,
            other => return Err(Error::Audio(format!("unsupported input sample format: {other:?}"))),
        };

        stream.play().map_err(|e| Error::Audio(format!("failed to start input stream: {e}")))?;
        self.stream = Some(stream);
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.pause();
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }
}

impl Drop for AudioInput {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_devices_does_not_panic() {
        let result = AudioInput::list_devices();
        assert!(result.is_ok() || result.is_err());
    }
}
