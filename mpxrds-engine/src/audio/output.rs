//! Audio output using cpal: a single-channel stream that drains a
//! preallocated ring buffer of already-synthesized MPX composite samples.
//!
//! Synthesis happens on the input callback (see [`super::input`]), not
//! here; this stream only plays back what has already been produced, so
//! its callback never touches a lock and never allocates.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleFormat, Stream, StreamConfig};
use ringbuf::HeapConsumer;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

pub struct AudioOutput {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    stream: Option<Stream>,
}

impl AudioOutput {
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::Audio(format!("failed to enumerate output devices: {e}")))?
            .filter_map(|d| d.name().ok())
            .collect();
        Ok(devices)
    }

    /// Opens the output device and negotiates a single-channel stream at
    /// `sample_rate`, with a fixed buffer size of `block_size` frames when
    /// the backend honors it.
    pub fn new(device_name: Option<&str>, sample_rate: u32, block_size: usize) -> Result<Self> {
        let host = cpal::default_host();
        let device = match device_name {
            Some(name) => host
                .output_devices()
                .map_err(|e| Error::Audio(format!("failed to enumerate output devices: {e}")))?
                .find(|d| d.name().ok().as_deref() == Some(name))
                .ok_or_else(|| Error::Audio(format!("output device '{name}' not found")))?,
            None => host.default_output_device().ok_or_else(|| Error::Audio("no default output device".to_string()))?,
        };

        info!(device = %device.name().unwrap_or_default(), "opened MPX output device");

        let sample_format = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(format!("failed to query output configs: {e}")))?
            .find(|c| c.channels() == 1 && c.min_sample_rate().0 <= sample_rate && c.max_sample_rate().0 >= sample_rate)
            .map(|c| c.sample_format())
            .unwrap_or(SampleFormat::F32);

        let config = StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: BufferSize::Fixed(block_size as u32),
        };

        debug!(?config, ?sample_format, "negotiated output stream config");

        Ok(Self { device, config, sample_format, stream: None })
    }

    /// Starts the stream, draining `consumer` for every sample the backend
    /// asks for and writing silence on underrun.
    pub fn start(&mut self, mut consumer: HeapConsumer<f32>) -> Result<()> {
        let err_fn = |e| warn!(error = %e, "MPX output stream error");

        let stream = match self.sample_format {
            SampleFormat::F32 => self
                .device
                .build_output_stream(
                    &self.config,
                    move |data: &mut [f32], _| {
                        for sample in data.iter_mut() {
                            *sample = consumer.pop().unwrap_or(0.0);
                        }
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| Error::Audio(format!("failed to build output stream: {e}")))?,
            other => return Err(Error::Audio(format!("unsupported output sample format: {other:?}"))),
        };

        stream.play().map_err(|e| Error::Audio(format!("failed to start output stream: {e}")))?;
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

impl Drop for AudioOutput {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_devices_does_not_panic() {
        let result = AudioOutput::list_devices();
        assert!(result.is_ok() || result.is_err());
    }
}
