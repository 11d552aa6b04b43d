// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Streaming Hilbert transform with a matched-delay real branch.
//!
//! Turns the real 8 kHz modem signal into an analytic IQ stream: the
//! imaginary part is the 127-tap Hamming-windowed ideal-Hilbert FIR output,
//! the real part is the input delayed by the FIR's 63-sample group delay so
//! both branches stay phase-aligned.

use std::f32::consts::PI;

use crate::codec::Iq;

pub const HILBERT_NTAPS: usize = 127;
pub const HILBERT_DELAY: usize = (HILBERT_NTAPS - 1) / 2;

fn hilbert_coeffs() -> [f32; HILBERT_NTAPS] {
    let mut coeffs = [0.0f32; HILBERT_NTAPS];
    for (i, coeff) in coeffs.iter_mut().enumerate() {
        let n = i as i32 - HILBERT_DELAY as i32;
        if n == 0 || n % 2 == 0 {
            continue;
        }
        let h = 2.0 / (PI * n as f32);
        let w = 0.54 - 0.46 * (2.0 * PI * i as f32 / (HILBERT_NTAPS - 1) as f32).cos();
        *coeff = h * w;
    }
    coeffs
}

/// Streaming real→analytic converter.
///
/// Two parallel 127-element rings with independent write indices: `hist`
/// feeds the FIR convolution, `delay` taps the real branch 63 samples back.
pub struct Hilbert {
    coeffs: [f32; HILBERT_NTAPS],
    hist: [f32; HILBERT_NTAPS],
    pos: usize,
    delay: [f32; HILBERT_NTAPS],
    dpos: usize,
}

impl Default for Hilbert {
    fn default() -> Self {
        Self::new()
    }
}

impl Hilbert {
    pub fn new() -> Self {
        Self {
            coeffs: hilbert_coeffs(),
            hist: [0.0; HILBERT_NTAPS],
            pos: 0,
            delay: [0.0; HILBERT_NTAPS],
            dpos: 0,
        }
    }

    pub fn reset(&mut self) {
        self.hist = [0.0; HILBERT_NTAPS];
        self.pos = 0;
        self.delay = [0.0; HILBERT_NTAPS];
        self.dpos = 0;
    }

    /// Convert `input` into IQ samples, one per input sample.
    ///
    /// `output` must be at least as long as `input`; the state advances by
    /// exactly `input.len()` taps.
    pub fn process_into(&mut self, input: &[f32], output: &mut [Iq]) {
        for (&sample, out) in input.iter().zip(output.iter_mut()) {
            self.hist[self.pos] = sample;

            let mut imag = 0.0f32;
            for (k, &coeff) in self.coeffs.iter().enumerate() {
                let idx = (self.pos + HILBERT_NTAPS - k) % HILBERT_NTAPS;
                imag += coeff * self.hist[idx];
            }

            self.delay[self.dpos] = sample;
            let read = (self.dpos + HILBERT_NTAPS - HILBERT_DELAY) % HILBERT_NTAPS;
            *out = Iq::new(self.delay[read], imag);

            self.pos = (self.pos + 1) % HILBERT_NTAPS;
            self.dpos = (self.dpos + 1) % HILBERT_NTAPS;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coefficients_are_antisymmetric_with_zero_even_taps() {
        let coeffs = hilbert_coeffs();
        assert_eq!(coeffs[HILBERT_DELAY], 0.0);
        for k in 0..HILBERT_DELAY {
            let lo = coeffs[HILBERT_DELAY - 1 - k];
            let hi = coeffs[HILBERT_DELAY + 1 + k];
            assert!(
                (lo + hi).abs() < 1e-6,
                "taps ±{} not antisymmetric: {lo} vs {hi}",
                k + 1
            );
        }
        for (i, &c) in coeffs.iter().enumerate() {
            let n = i as i32 - HILBERT_DELAY as i32;
            if n % 2 == 0 {
                assert_eq!(c, 0.0, "even offset tap {i} must be zero");
            }
        }
    }

    #[test]
    fn sine_input_yields_unit_magnitude_analytic_signal() {
        let fs = 8000.0f32;
        for freq in [500.0f32, 1000.0, 1600.0, 2300.0, 3200.0] {
            let input: Vec<f32> = (0..4000)
                .map(|i| (2.0 * PI * freq * i as f32 / fs).sin())
                .collect();
            let mut out = vec![Iq::default(); input.len()];
            let mut h = Hilbert::new();
            h.process_into(&input, &mut out);

            // Skip the FIR settle; then every sample of the analytic signal
            // must sit on the unit circle.
            let mut sum = 0.0f64;
            let mut n = 0usize;
            for iq in &out[2 * HILBERT_NTAPS..] {
                let mag = (iq.re * iq.re + iq.im * iq.im).sqrt();
                assert!(
                    (mag - 1.0).abs() < 0.05,
                    "magnitude {mag} off at {freq} Hz"
                );
                sum += f64::from(mag);
                n += 1;
            }
            let mean = sum / n as f64;
            assert!((mean - 1.0).abs() < 0.01, "mean magnitude {mean} at {freq} Hz");
        }
    }

    #[test]
    fn real_branch_is_pure_delay() {
        let input: Vec<f32> = (0..500).map(|i| ((i * 37) % 101) as f32 * 0.007).collect();
        let mut out = vec![Iq::default(); input.len()];
        let mut h = Hilbert::new();
        h.process_into(&input, &mut out);
        for i in HILBERT_DELAY..input.len() {
            assert_eq!(out[i].re, input[i - HILBERT_DELAY]);
        }
    }

    #[test]
    fn chunked_processing_matches_single_call() {
        let input: Vec<f32> = (0..1000)
            .map(|i| (2.0 * PI * 700.0 * i as f32 / 8000.0).sin())
            .collect();

        let mut whole = vec![Iq::default(); input.len()];
        Hilbert::new().process_into(&input, &mut whole);

        let mut h = Hilbert::new();
        let mut chunked = Vec::new();
        for chunk in input.chunks(97) {
            let mut out = vec![Iq::default(); chunk.len()];
            h.process_into(chunk, &mut out);
            chunked.extend(out);
        }

        for (a, b) in whole.iter().zip(&chunked) {
            assert_eq!(a.re.to_bits(), b.re.to_bits());
            assert_eq!(a.im.to_bits(), b.im.to_bits());
        }
    }
}
