// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::ptr::NonNull;
use std::sync::Once;

use libc::{c_char, c_float, c_int, c_void};

use radae_core::codec::{
    FeatureExtractor, Iq, RadeRx, RadeTx, RxOutput, TxBandpass, Vocoder, BPF_BANDWIDTH_HZ,
    BPF_CENTRE_HZ, BPF_NTAPS, FARGAN_CONT_SAMPLES, NB_TOTAL_FEATURES, SPEECH_FRAME,
};

const RADE_VERBOSE_0: c_int = 0;

#[allow(non_snake_case)]
extern "C" {
    fn rade_initialize() -> c_int;

    fn rade_open(model_file: *const c_char, flags: c_int) -> *mut c_void;
    fn rade_close(rade: *mut c_void);

    fn rade_nin(rade: *const c_void) -> c_int;
    fn rade_nin_max(rade: *const c_void) -> c_int;
    fn rade_n_features_in_out(rade: *const c_void) -> c_int;
    fn rade_n_tx_out(rade: *const c_void) -> c_int;
    fn rade_n_tx_eoo_out(rade: *const c_void) -> c_int;
    fn rade_n_eoo_bits(rade: *const c_void) -> c_int;

    fn rade_rx(
        rade: *mut c_void,
        features_out: *mut c_float,
        has_eoo_out: *mut c_int,
        eoo_out: *mut c_float,
        rx_in: *const Iq,
    ) -> c_int;
    fn rade_sync(rade: *const c_void) -> c_int;
    fn rade_snrdB_3k_est(rade: *const c_void) -> c_float;
    fn rade_freq_offset(rade: *const c_void) -> c_float;

    fn rade_tx(rade: *mut c_void, tx_out: *mut Iq, features_in: *const c_float) -> c_int;
    fn rade_tx_eoo(rade: *mut c_void, tx_eoo_out: *mut Iq) -> c_int;
    fn rade_tx_set_eoo_bits(rade: *mut c_void, eoo_bits: *const c_float);

    fn lpcnet_encoder_create() -> *mut c_void;
    fn lpcnet_encoder_destroy(st: *mut c_void);
    fn lpcnet_compute_single_frame_features(
        st: *mut c_void,
        pcm: *const i16,
        features: *mut c_float,
        arch: c_int,
    ) -> c_int;
    fn opus_select_arch() -> c_int;

    fn rade_shim_fargan_create() -> *mut c_void;
    fn rade_shim_fargan_destroy(st: *mut c_void);
    fn rade_shim_fargan_reset(st: *mut c_void);
    fn rade_shim_fargan_cont(st: *mut c_void, pcm0: *const c_float, features: *const c_float);
    fn rade_shim_fargan_synthesize(st: *mut c_void, pcm: *mut c_float, features: *const c_float);

    fn rade_shim_bpf_create(
        ntaps: c_int,
        fs: c_float,
        centre: c_float,
        width: c_float,
        n_iq: c_int,
    ) -> *mut c_void;
    fn rade_shim_bpf_destroy(bpf: *mut c_void);
    fn rade_shim_bpf_process(bpf: *mut c_void, input: *const Iq, output: *mut Iq, n_iq: c_int);
}

fn ensure_initialized() {
    static INIT: Once = Once::new();
    INIT.call_once(|| unsafe {
        rade_initialize();
    });
}

/// A RADE modem handle.  One per pipeline; implements both the receiver
/// and transmitter traits, matching the upstream single `struct rade`.
pub struct Rade {
    inner: NonNull<c_void>,
}

// The handle is only ever driven from the worker thread that owns it.
unsafe impl Send for Rade {}

impl Rade {
    pub fn open() -> Result<Self, String> {
        ensure_initialized();
        let ptr = unsafe { rade_open(std::ptr::null(), RADE_VERBOSE_0) };
        NonNull::new(ptr)
            .map(|inner| Self { inner })
            .ok_or_else(|| "rade_open failed".to_string())
    }
}

impl Drop for Rade {
    fn drop(&mut self) {
        unsafe { rade_close(self.inner.as_ptr()) };
    }
}

impl RadeRx for Rade {
    fn nin(&self) -> usize {
        unsafe { rade_nin(self.inner.as_ptr()).max(0) as usize }
    }

    fn nin_max(&self) -> usize {
        unsafe { rade_nin_max(self.inner.as_ptr()).max(0) as usize }
    }

    fn n_features_out(&self) -> usize {
        unsafe { rade_n_features_in_out(self.inner.as_ptr()).max(0) as usize }
    }

    fn n_eoo_bits(&self) -> usize {
        unsafe { rade_n_eoo_bits(self.inner.as_ptr()).max(0) as usize }
    }

    fn rx(&mut self, features: &mut [f32], eoo_syms: &mut [f32], iq: &[Iq]) -> RxOutput {
        debug_assert!(features.len() >= self.n_features_out());
        debug_assert!(eoo_syms.len() >= self.n_eoo_bits());
        let mut has_eoo: c_int = 0;
        let n = unsafe {
            rade_rx(
                self.inner.as_ptr(),
                features.as_mut_ptr(),
                &mut has_eoo,
                eoo_syms.as_mut_ptr(),
                iq.as_ptr(),
            )
        };
        RxOutput {
            n_features: n.max(0) as usize,
            eoo_detected: has_eoo != 0,
        }
    }

    fn synced(&self) -> bool {
        unsafe { rade_sync(self.inner.as_ptr()) != 0 }
    }

    fn snr_db(&self) -> f32 {
        unsafe { rade_snrdB_3k_est(self.inner.as_ptr()) }
    }

    fn freq_offset(&self) -> f32 {
        unsafe { rade_freq_offset(self.inner.as_ptr()) }
    }
}

impl RadeTx for Rade {
    fn n_features_in(&self) -> usize {
        unsafe { rade_n_features_in_out(self.inner.as_ptr()).max(0) as usize }
    }

    fn n_tx_out(&self) -> usize {
        unsafe { rade_n_tx_out(self.inner.as_ptr()).max(0) as usize }
    }

    fn n_tx_eoo_out(&self) -> usize {
        unsafe { rade_n_tx_eoo_out(self.inner.as_ptr()).max(0) as usize }
    }

    fn n_eoo_bits(&self) -> usize {
        unsafe { rade_n_eoo_bits(self.inner.as_ptr()).max(0) as usize }
    }

    fn tx(&mut self, iq_out: &mut [Iq], features: &[f32]) -> usize {
        debug_assert!(iq_out.len() >= self.n_tx_out());
        debug_assert!(features.len() >= self.n_features_in());
        unsafe { rade_tx(self.inner.as_ptr(), iq_out.as_mut_ptr(), features.as_ptr()).max(0) as usize }
    }

    fn tx_eoo(&mut self, iq_out: &mut [Iq]) -> usize {
        debug_assert!(iq_out.len() >= self.n_tx_eoo_out());
        unsafe { rade_tx_eoo(self.inner.as_ptr(), iq_out.as_mut_ptr()).max(0) as usize }
    }

    fn set_eoo_bits(&mut self, syms: &[f32]) {
        debug_assert!(syms.len() >= self.n_eoo_bits());
        unsafe { rade_tx_set_eoo_bits(self.inner.as_ptr(), syms.as_ptr()) };
    }
}

/// LPCNet feature extractor state.
pub struct LpcnetEncoder {
    inner: NonNull<c_void>,
    arch: c_int,
}

unsafe impl Send for LpcnetEncoder {}

impl LpcnetEncoder {
    pub fn create() -> Result<Self, String> {
        let ptr = unsafe { lpcnet_encoder_create() };
        let arch = unsafe { opus_select_arch() };
        NonNull::new(ptr)
            .map(|inner| Self { inner, arch })
            .ok_or_else(|| "lpcnet_encoder_create failed".to_string())
    }
}

impl Drop for LpcnetEncoder {
    fn drop(&mut self) {
        unsafe { lpcnet_encoder_destroy(self.inner.as_ptr()) };
    }
}

impl FeatureExtractor for LpcnetEncoder {
    fn compute_frame(&mut self, pcm: &[i16; SPEECH_FRAME], out: &mut [f32; NB_TOTAL_FEATURES]) {
        unsafe {
            lpcnet_compute_single_frame_features(
                self.inner.as_ptr(),
                pcm.as_ptr(),
                out.as_mut_ptr(),
                self.arch,
            );
        }
    }
}

/// FARGAN vocoder state.
pub struct Fargan {
    inner: NonNull<c_void>,
}

unsafe impl Send for Fargan {}

impl Fargan {
    pub fn create() -> Result<Self, String> {
        let ptr = unsafe { rade_shim_fargan_create() };
        NonNull::new(ptr)
            .map(|inner| Self { inner })
            .ok_or_else(|| "FARGAN allocation failed".to_string())
    }
}

impl Drop for Fargan {
    fn drop(&mut self) {
        unsafe { rade_shim_fargan_destroy(self.inner.as_ptr()) };
    }
}

impl Vocoder for Fargan {
    fn reset(&mut self) {
        unsafe { rade_shim_fargan_reset(self.inner.as_ptr()) };
    }

    fn warm_start(&mut self, packed_features: &[f32]) {
        let zeros = [0.0f32; FARGAN_CONT_SAMPLES];
        unsafe {
            rade_shim_fargan_cont(
                self.inner.as_ptr(),
                zeros.as_ptr(),
                packed_features.as_ptr(),
            );
        }
    }

    fn synthesize(&mut self, pcm: &mut [f32; SPEECH_FRAME], features: &[f32]) {
        unsafe {
            rade_shim_fargan_synthesize(self.inner.as_ptr(), pcm.as_mut_ptr(), features.as_ptr());
        }
    }
}

/// TX output band-pass filter (700–2300 Hz).
pub struct RadeBpf {
    inner: NonNull<c_void>,
}

unsafe impl Send for RadeBpf {}

impl RadeBpf {
    /// `n_iq` is the block size the filter is prepared for; modem frames
    /// pass 960, the EOO frame 1152.
    pub fn create(n_iq: usize) -> Result<Self, String> {
        let ptr = unsafe {
            rade_shim_bpf_create(
                BPF_NTAPS as c_int,
                8000.0,
                BPF_CENTRE_HZ,
                BPF_BANDWIDTH_HZ,
                n_iq as c_int,
            )
        };
        NonNull::new(ptr)
            .map(|inner| Self { inner })
            .ok_or_else(|| "BPF allocation failed".to_string())
    }
}

impl Drop for RadeBpf {
    fn drop(&mut self) {
        unsafe { rade_shim_bpf_destroy(self.inner.as_ptr()) };
    }
}

impl TxBandpass for RadeBpf {
    fn process(&mut self, iq: &mut [Iq]) {
        // In-place is supported by the upstream filter.
        unsafe {
            rade_shim_bpf_process(
                self.inner.as_ptr(),
                iq.as_ptr(),
                iq.as_mut_ptr(),
                iq.len() as c_int,
            );
        }
    }
}
