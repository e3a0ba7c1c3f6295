//! FFT overlap-add low-pass, used by the SSB-LPF stereo-encoder variant to
//! suppress the upper sideband of the 38 kHz DSB product.
//!
//! The windowed-sinc FIR in [`crate::filters::FirLowPass`] is a sample-at-a-time
//! filter sized for the audio band; the SSB-LPF path instead needs a sharp
//! stopband right above the 38 kHz carrier applied to a much higher-rate
//! signal, which is cheaper as block convolution. `realfft`/`rustfft` are
//! pulled in for this (no crate in the reference pack performs FFT
//! convolution directly; this choice is grounded on the spectral/DSP
//! example's dependency stack instead, see DESIGN.md).

use crate::error::{LpfError, Result};
use realfft::RealFftPlanner;
use realfft::num_complex::Complex32;

/// Block-convolution low-pass filter using overlap-add.
///
/// `block_len` input samples are processed per call; the filter keeps the
/// tail of each output block and adds it into the head of the next one, so
/// callers can feed it a steady stream of fixed-size blocks.
pub struct OverlapAddLowPass {
    block_len: usize,
    fft_len: usize,
    kernel_freq: Vec<Complex32>,
    overlap: Vec<f32>,
    input_buf: Vec<f32>,
    spectrum_buf: Vec<Complex32>,
    output_buf: Vec<f32>,
    r2c: std::sync::Arc<dyn realfft::RealToComplex<f32>>,
    c2r: std::sync::Arc<dyn realfft::ComplexToReal<f32>>,
}

impl OverlapAddLowPass {
    /// `kernel`: a windowed-sinc low-pass impulse response (odd length,
    /// already normalized for unity DC gain). `block_len`: number of new
    /// input samples processed per [`Self::process_block`] call.
    pub fn new(kernel: &[f32], block_len: usize) -> Result<Self> {
        if kernel.len() % 2 == 0 {
            return Err(LpfError::EvenSize(kernel.len()).into());
        }
        let fft_len = (kernel.len() + block_len - 1).next_power_of_two();

        let mut planner = RealFftPlanner::<f32>::new();
        let r2c = planner.plan_fft_forward(fft_len);
        let c2r = planner.plan_fft_inverse(fft_len);

        let mut kernel_padded = vec![0.0f32; fft_len];
        kernel_padded[..kernel.len()].copy_from_slice(kernel);
        let mut kernel_freq = r2c.make_output_vec();
        r2c.process(&mut kernel_padded, &mut kernel_freq)
            .map_err(|e| LpfError::FftInit(e.to_string()))?;

        Ok(Self {
            block_len,
            fft_len,
            kernel_freq,
            overlap: vec![0.0; fft_len - block_len],
            input_buf: vec![0.0; fft_len],
            spectrum_buf: r2c.make_output_vec(),
            output_buf: vec![0.0; fft_len],
            r2c,
            c2r,
        })
    }

    /// Filter exactly `block_len` samples, returning `block_len` filtered
    /// samples with the FFT/IFFT scale factor already divided out.
    pub fn process_block(&mut self, input: &[f32], out: &mut [f32]) -> Result<()> {
        debug_assert_eq!(input.len(), self.block_len);
        debug_assert_eq!(out.len(), self.block_len);

        self.input_buf[..self.block_len].copy_from_slice(input);
        for v in &mut self.input_buf[self.block_len..] {
            *v = 0.0;
        }

        self.r2c
            .process(&mut self.input_buf, &mut self.spectrum_buf)
            .map_err(|e| LpfError::FftInit(e.to_string()))?;

        for (s, k) in self.spectrum_buf.iter_mut().zip(self.kernel_freq.iter()) {
            *s *= k;
        }

        self.c2r
            .process(&mut self.spectrum_buf, &mut self.output_buf)
            .map_err(|e| LpfError::FftInit(e.to_string()))?;

        let scale = 1.0 / self.fft_len as f32;
        let overlap_len = self.overlap.len();
        for i in 0..self.block_len {
            let mut v = self.output_buf[i] * scale;
            if i < overlap_len {
                v += self.overlap[i];
            }
            out[i] = v;
        }
        for i in 0..overlap_len {
            self.overlap[i] = self.output_buf[self.block_len + i] * scale;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sinc_lowpass_kernel(len: usize, cutoff_fraction: f64) -> Vec<f32> {
        let half = (len / 2) as isize;
        let mut kernel: Vec<f64> = (-half..=half)
            .map(|n| {
                if n == 0 {
                    2.0 * cutoff_fraction
                } else {
                    (2.0 * std::f64::consts::PI * cutoff_fraction * n as f64).sin()
                        / (std::f64::consts::PI * n as f64)
                }
            })
            .collect();
        let sum: f64 = kernel.iter().sum();
        for v in kernel.iter_mut() {
            *v /= sum;
        }
        kernel.into_iter().map(|v| v as f32).collect()
    }

    #[test]
    fn passes_dc_at_unity_gain() {
        let kernel = sinc_lowpass_kernel(129, 0.05);
        let mut lpf = OverlapAddLowPass::new(&kernel, 256).unwrap();
        let input = vec![1.0f32; 256];
        let mut out = vec![0.0f32; 256];
        for _ in 0..10 {
            lpf.process_block(&input, &mut out).unwrap();
        }
        let last = *out.last().unwrap();
        assert!((last - 1.0).abs() < 0.05, "last={last}");
    }

    #[test]
    fn rejects_even_length_kernel() {
        let kernel = vec![0.0f32; 8];
        assert!(OverlapAddLowPass::new(&kernel, 256).is_err());
    }
}
