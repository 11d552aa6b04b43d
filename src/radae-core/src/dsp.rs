// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Sample-domain DSP primitives: streaming resampler, Hilbert transformer
//! and the spectrum probe.

pub mod hilbert;
pub mod pcm;
pub mod resample;
pub mod spectrum;

pub use hilbert::Hilbert;
pub use resample::{resample_batch, StreamResampler};
pub use spectrum::{SpectrumHandle, SpectrumSnapshotter, FFT_SIZE, SPECTRUM_BINS};
