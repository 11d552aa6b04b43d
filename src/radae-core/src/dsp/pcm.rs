// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! S16 ↔ f32 sample conversion and level measurement.
//!
//! The two S16 converters differ on purpose: the RX speech path rounds
//! half-away-from-zero (`floor(0.5 + v)`), the TX modem path truncates.
//! Both clip symmetrically at ±32767.

/// Convert S16 capture samples to unit-range floats.
pub fn s16_to_f32(input: &[i16], output: &mut [f32]) {
    for (out, &s) in output.iter_mut().zip(input) {
        *out = f32::from(s) / 32768.0;
    }
}

/// Unit-range float → S16 with `floor(0.5 + v)` rounding (RX output path).
pub fn f32_to_s16_round(sample: f32) -> i16 {
    let v = (sample * 32768.0).clamp(-32767.0, 32767.0);
    (0.5 + f64::from(v)).floor() as i16
}

/// Unit-range float → S16 with truncation (TX LPCNet input path).
pub fn f32_to_s16_trunc(sample: f32) -> i16 {
    let v = (sample * 32768.0).clamp(-32767.0, 32767.0);
    v as i16
}

/// Modem-domain float → S16: scale, clip, truncate (TX output path).
pub fn scale_to_s16_trunc(sample: f32, scale: f32) -> i16 {
    let v = (sample * scale).clamp(-32767.0, 32767.0);
    v as i16
}

/// Root-mean-square of a block, accumulated in f64 as the level meters do.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum2: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    (sum2 / samples.len() as f64).sqrt() as f32
}
