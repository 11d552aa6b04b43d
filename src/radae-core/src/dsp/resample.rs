// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Linear-interpolation resampling between a device rate and the fixed
//! codec rates.
//!
//! [`StreamResampler`] carries the fractional read position and the last
//! input sample across calls, so feeding a long signal in arbitrary chunks
//! produces the same output as a single call.  [`resample_batch`] is the
//! one-shot variant used when a whole file is converted in memory.

/// Streaming linear resampler state for one channel/direction.
#[derive(Debug, Default)]
pub struct StreamResampler {
    /// Fractional read position into the current input block.  May be
    /// slightly negative after a capacity-limited call; it then tracks the
    /// shortfall into the next block.
    frac: f64,
    /// Last sample of the previous block, interpolation anchor at `idx == 0`.
    prev: f32,
}

impl StreamResampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.frac = 0.0;
        self.prev = 0.0;
    }

    /// Resample `input` from `rate_in` to `rate_out` into `output`,
    /// returning the number of samples written.
    ///
    /// Equal rates degenerate to a copy of `min(input.len(), output.len())`
    /// samples.  Otherwise the output capacity bounds the amount of input
    /// consumed; leftover position is carried in `frac`.
    pub fn resample(
        &mut self,
        input: &[f32],
        output: &mut [f32],
        rate_in: u32,
        rate_out: u32,
    ) -> usize {
        let n_in = input.len();

        if rate_in == rate_out {
            let n = n_in.min(output.len());
            output[..n].copy_from_slice(&input[..n]);
            if let Some(&last) = input.last() {
                self.prev = last;
            }
            return n;
        }

        let step = f64::from(rate_in) / f64::from(rate_out);
        let mut n_out = 0;

        while n_out < output.len() {
            let idx = self.frac as i64;
            if idx >= n_in as i64 {
                break;
            }

            let f = (self.frac - idx as f64) as f32;
            let i = idx.max(0) as usize;
            let s0 = if idx <= 0 { self.prev } else { input[i - 1] };
            let s1 = input[i];
            output[n_out] = s0 + f * (s1 - s0);
            n_out += 1;

            self.frac += step;
        }

        if let Some(&last) = input.last() {
            self.prev = last;
        }
        self.frac -= n_in as f64;

        n_out
    }
}

/// One-shot linear resample of a complete buffer.
///
/// Returns an empty vector when the input is too short to interpolate.
pub fn resample_batch(input: &[f32], rate_in: u32, rate_out: u32) -> Vec<f32> {
    if rate_in == rate_out {
        return input.to_vec();
    }

    let n_in = input.len();
    if n_in < 2 {
        return Vec::new();
    }

    let n_out = (n_in as u64 * u64::from(rate_out) / u64::from(rate_in)) as usize;
    let step = f64::from(rate_in) / f64::from(rate_out);

    let mut out = Vec::with_capacity(n_out);
    for i in 0..n_out {
        let pos = i as f64 * step;
        let mut idx = pos as usize;
        let mut frac = (pos - idx as f64) as f32;
        if idx + 1 >= n_in {
            idx = n_in - 2;
            frac = 1.0;
        }
        out.push(input[idx] + frac * (input[idx + 1] - input[idx]));
    }
    out
}
