// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Capability traits and fixed constants of the external neural codec.
//!
//! The RADE modem, the LPCNet feature extractor and the FARGAN vocoder are
//! consumed as opaque collaborators.  The traits below mirror the upstream
//! C API one call per method; `radae-rade` implements them over the real
//! library, test code substitutes deterministic mocks.

use num_complex::Complex32;

/// Complex baseband sample, `{ re, im }` as two consecutive `f32`s
/// (the upstream `RADE_COMP` layout).
pub type Iq = Complex32;

/// Modem sample rate in Hz.
pub const FS_MODEM: u32 = 8000;
/// Speech sample rate in Hz.
pub const FS_SPEECH: u32 = 16000;

/// Samples per speech frame (10 ms at 16 kHz).
pub const SPEECH_FRAME: usize = 160;
/// Floats per LPCNet feature vector.
pub const NB_TOTAL_FEATURES: usize = 36;
/// Leading features consumed by the FARGAN continuation primer.
pub const NB_FEATURES: usize = 20;
/// Feature frames per modem frame.
pub const FEATURES_PER_MODEM_FRAME: usize = 12;
/// Floats exchanged with the modem per modem frame (12 × 36).
pub const FEATURES_SIZE: usize = FEATURES_PER_MODEM_FRAME * NB_TOTAL_FEATURES;
/// Modem frame length in samples (120 ms at 8 kHz).
pub const MODEM_FRAME_SAMPLES: usize = 960;
/// End-of-over frame length in samples.
pub const EOO_FRAME_SAMPLES: usize = 1152;

/// Feature frames buffered before the vocoder is primed.
pub const FARGAN_WARMUP_FRAMES: usize = 5;
/// Zero samples handed to the FARGAN continuation primer.
pub const FARGAN_CONT_SAMPLES: usize = 320;

/// TX band-pass filter: tap count, centre and bandwidth in Hz.
pub const BPF_NTAPS: usize = 101;
pub const BPF_CENTRE_HZ: f32 = 1600.0;
pub const BPF_BANDWIDTH_HZ: f32 = 1500.0;

/// Default TX output scale (S16 full-scale factor with 6 dB headroom).
pub const DEFAULT_TX_SCALE: f32 = 16384.0;
/// Default microphone gain.
pub const DEFAULT_MIC_GAIN: f32 = 1.0;

/// Result of one receiver call.
#[derive(Debug, Clone, Copy, Default)]
pub struct RxOutput {
    /// Feature floats produced (a multiple of [`NB_TOTAL_FEATURES`], or 0).
    pub n_features: usize,
    /// An end-of-over frame was detected; the EOO symbol buffer is valid.
    pub eoo_detected: bool,
}

/// The RADE receiver (`rade_open` in RX use, `rade_rx` and the status
/// queries).
pub trait RadeRx: Send {
    /// Samples the receiver wants on the next [`RadeRx::rx`] call.
    fn nin(&self) -> usize;
    /// Upper bound of [`RadeRx::nin`] over the lifetime of the handle.
    fn nin_max(&self) -> usize;
    /// Capacity required of the feature output buffer (432).
    fn n_features_out(&self) -> usize;
    /// Length of the EOO symbol buffer in floats.
    fn n_eoo_bits(&self) -> usize;

    /// Run the receiver over `iq` (exactly [`RadeRx::nin`] samples).
    fn rx(&mut self, features: &mut [f32], eoo_syms: &mut [f32], iq: &[Iq]) -> RxOutput;

    /// Pilot sync state after the last [`RadeRx::rx`] call.
    fn synced(&self) -> bool;
    /// SNR estimate in dB, valid while synced.
    fn snr_db(&self) -> f32;
    /// Frequency offset estimate in Hz, valid while synced.
    fn freq_offset(&self) -> f32;
}

/// The RADE transmitter (`rade_tx`, `rade_tx_eoo`, `rade_tx_set_eoo_bits`).
pub trait RadeTx: Send {
    /// Feature floats consumed per modem frame (432).
    fn n_features_in(&self) -> usize;
    /// IQ samples produced per modem frame (960).
    fn n_tx_out(&self) -> usize;
    /// IQ samples produced by the end-of-over frame (1152).
    fn n_tx_eoo_out(&self) -> usize;
    /// Length of the EOO symbol buffer in floats.
    fn n_eoo_bits(&self) -> usize;

    /// Encode one modem frame; returns the number of IQ samples written.
    fn tx(&mut self, iq_out: &mut [Iq], features: &[f32]) -> usize;
    /// Produce the end-of-over frame; returns the number of IQ samples.
    fn tx_eoo(&mut self, iq_out: &mut [Iq]) -> usize;
    /// Install the EOO payload symbols sent by the next [`RadeTx::tx_eoo`].
    fn set_eoo_bits(&mut self, syms: &[f32]);
}

/// LPCNet feature extraction
/// (`lpcnet_compute_single_frame_features`).
pub trait FeatureExtractor: Send {
    /// Compute one 36-float feature vector from a 160-sample S16 frame.
    fn compute_frame(&mut self, pcm: &[i16; SPEECH_FRAME], out: &mut [f32; NB_TOTAL_FEATURES]);
}

/// The FARGAN vocoder (`fargan_init`, `fargan_cont`, `fargan_synthesize`).
pub trait Vocoder: Send {
    /// Re-initialise all internal state (`fargan_init`).
    fn reset(&mut self);

    /// Prime the vocoder with [`FARGAN_WARMUP_FRAMES`] packed feature
    /// frames, [`NB_FEATURES`] floats each, alongside
    /// [`FARGAN_CONT_SAMPLES`] zero continuation samples (`fargan_cont`).
    fn warm_start(&mut self, packed_features: &[f32]);

    /// Synthesise one 10 ms speech frame at 16 kHz.
    fn synthesize(&mut self, pcm: &mut [f32; SPEECH_FRAME], features: &[f32]);
}

/// TX output band-pass filter (`rade_bpf_process`, in-place safe).
pub trait TxBandpass: Send {
    fn process(&mut self, iq: &mut [Iq]);
}
