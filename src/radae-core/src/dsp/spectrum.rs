// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Spectrum probe shared by the RX and TX pipelines.
//!
//! Windows the most recent [`FFT_SIZE`] samples of the 8 kHz stream with a
//! Hann window, runs a forward FFT and publishes [`SPECTRUM_BINS`] dB-scale
//! magnitudes under a mutex for the polling display thread.

use std::f32::consts::PI;
use std::sync::{Arc, Mutex};

use rustfft::num_complex::Complex as FftComplex;
use rustfft::{Fft, FftPlanner};

pub const FFT_SIZE: usize = 512;
pub const SPECTRUM_BINS: usize = FFT_SIZE / 2;

/// Display range consumers are expected to clamp the published dB values
/// to.  The buffer itself carries raw values down to -200 dB.
pub const DB_FLOOR: f32 = -80.0;
pub const DB_CEIL: f32 = 0.0;

/// Magnitude below which a bin is reported as -200 dB.
const MAG_FLOOR: f32 = 1e-10;

/// Reader side of the spectrum buffer.
///
/// Empty until the first publish; afterwards always exactly
/// [`SPECTRUM_BINS`] dB values.
#[derive(Clone, Default)]
pub struct SpectrumHandle(Arc<Mutex<Vec<f32>>>);

impl SpectrumHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy up to `out.len()` bins; returns the number copied (0 before the
    /// first publish).
    pub fn copy_into(&self, out: &mut [f32]) -> usize {
        let bins = self.0.lock().expect("spectrum mutex poisoned");
        let n = bins.len().min(out.len());
        out[..n].copy_from_slice(&bins[..n]);
        n
    }

    /// Drop the published snapshot; reads return nothing until the next
    /// publish.  Called when a pipeline re-opens.
    pub fn clear(&self) {
        self.0.lock().expect("spectrum mutex poisoned").clear();
    }
}

/// Writer side, owned by the pipeline worker.
pub struct SpectrumSnapshotter {
    window: [f32; FFT_SIZE],
    fft: Arc<dyn Fft<f32>>,
    scratch: Vec<FftComplex<f32>>,
    handle: SpectrumHandle,
}

impl SpectrumSnapshotter {
    pub fn new(handle: SpectrumHandle) -> Self {
        let mut window = [0.0f32; FFT_SIZE];
        for (i, w) in window.iter_mut().enumerate() {
            *w = 0.5 * (1.0 - (2.0 * PI * i as f32 / (FFT_SIZE - 1) as f32).cos());
        }

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);

        Self {
            window,
            fft,
            scratch: vec![FftComplex::new(0.0, 0.0); FFT_SIZE],
            handle,
        }
    }

    /// Publish a snapshot of the last [`FFT_SIZE`] samples of `samples`.
    /// A shorter buffer is ignored.
    pub fn publish(&mut self, samples: &[f32]) {
        if samples.len() < FFT_SIZE {
            return;
        }

        let tail = &samples[samples.len() - FFT_SIZE..];
        for (slot, (&s, &w)) in self.scratch.iter_mut().zip(tail.iter().zip(&self.window)) {
            *slot = FftComplex::new(s * w, 0.0);
        }
        self.fft.process(&mut self.scratch);

        let mut bins = [0.0f32; SPECTRUM_BINS];
        for (bin, value) in bins.iter_mut().zip(&self.scratch[..SPECTRUM_BINS]) {
            let mag = (value.re * value.re + value.im * value.im).sqrt()
                / (FFT_SIZE as f32 * 0.5);
            *bin = if mag > MAG_FLOOR {
                20.0 * mag.log10()
            } else {
                -200.0
            };
        }

        let mut guard = self.handle.0.lock().expect("spectrum mutex poisoned");
        if guard.is_empty() {
            guard.extend_from_slice(&bins);
        } else {
            guard.copy_from_slice(&bins);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publish_sine(bin: usize, amplitude: f32) -> Vec<f32> {
        let freq = bin as f32 * 8000.0 / FFT_SIZE as f32;
        let samples: Vec<f32> = (0..FFT_SIZE)
            .map(|i| amplitude * (2.0 * PI * freq * i as f32 / 8000.0).sin())
            .collect();
        let handle = SpectrumHandle::new();
        let mut probe = SpectrumSnapshotter::new(handle.clone());
        probe.publish(&samples);
        let mut out = vec![0.0; SPECTRUM_BINS];
        assert_eq!(handle.copy_into(&mut out), SPECTRUM_BINS);
        out
    }

    #[test]
    fn empty_until_first_publish() {
        let handle = SpectrumHandle::new();
        let mut probe = SpectrumSnapshotter::new(handle.clone());
        let mut out = vec![0.0; SPECTRUM_BINS];
        assert_eq!(handle.copy_into(&mut out), 0);

        // Shorter-than-FFT input must not publish either.
        probe.publish(&vec![0.5; FFT_SIZE - 1]);
        assert_eq!(handle.copy_into(&mut out), 0);
    }

    #[test]
    fn full_scale_sine_peaks_at_hann_coherent_gain() {
        let bin = 88;
        let out = publish_sine(bin, 1.0);

        // Unit sine through a Hann window: peak at 20·log10(0.5) ≈ -6 dB.
        assert!(
            (out[bin] + 6.02).abs() < 0.5,
            "peak bin {} at {} dB",
            bin,
            out[bin]
        );

        // Leakage outside the 3-bin Hann kernel stays far below the peak.
        for (j, &db) in out.iter().enumerate() {
            if j.abs_diff(bin) > 3 {
                assert!(db < -40.0, "bin {j} at {db} dB");
            }
        }
    }

    #[test]
    fn silence_reports_floor() {
        let handle = SpectrumHandle::new();
        let mut probe = SpectrumSnapshotter::new(handle.clone());
        probe.publish(&vec![0.0; FFT_SIZE]);
        let mut out = vec![0.0; SPECTRUM_BINS];
        handle.copy_into(&mut out);
        for &db in &out {
            assert_eq!(db, -200.0);
        }
    }

    #[test]
    fn uses_the_tail_of_a_longer_buffer() {
        // Head is loud noise, tail is silence; the probe must see silence.
        let mut samples = vec![0.9; FFT_SIZE];
        samples.extend(std::iter::repeat(0.0).take(FFT_SIZE));
        let handle = SpectrumHandle::new();
        let mut probe = SpectrumSnapshotter::new(handle.clone());
        probe.publish(&samples);
        let mut out = vec![0.0; SPECTRUM_BINS];
        handle.copy_into(&mut out);
        assert!(out.iter().all(|&db| db == -200.0));
    }

    #[test]
    fn readers_may_request_fewer_bins() {
        let handle = SpectrumHandle::new();
        let mut probe = SpectrumSnapshotter::new(handle.clone());
        probe.publish(&vec![0.0; FFT_SIZE]);
        let mut short = vec![f32::NAN; 64];
        assert_eq!(handle.copy_into(&mut short), 64);
        assert!(short.iter().all(|&db| db == -200.0));
    }
}
