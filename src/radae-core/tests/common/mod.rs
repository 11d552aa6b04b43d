// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Deterministic codec mocks and transports for the pipeline tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use radae_core::audio::{AbortHandle, AudioStream, ReadStatus};
use radae_core::callsign::{CallsignDecoder, CallsignEncoder};
use radae_core::codec::{
    FeatureExtractor, Iq, RadeRx, RadeTx, RxOutput, TxBandpass, Vocoder, EOO_FRAME_SAMPLES,
    FEATURES_SIZE, MODEM_FRAME_SAMPLES, NB_FEATURES, NB_TOTAL_FEATURES, SPEECH_FRAME,
};
use radae_core::error::AudioError;

pub const MOCK_NIN: usize = 960;
pub const MOCK_N_EOO_BITS: usize = 144;

/// Poll `cond` every couple of milliseconds until it holds or `timeout`
/// elapses.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

// ---------------------------------------------------------------------------
// Receiver mock
// ---------------------------------------------------------------------------

/// One scripted receiver iteration.
#[derive(Debug, Clone, Copy)]
pub struct RxStep {
    pub synced: bool,
    pub feature_frames: usize,
    pub eoo: bool,
}

impl RxStep {
    pub fn synced(feature_frames: usize) -> Self {
        Self {
            synced: true,
            feature_frames,
            eoo: false,
        }
    }

    pub fn unsynced() -> Self {
        Self {
            synced: false,
            feature_frames: 0,
            eoo: false,
        }
    }
}

#[derive(Default)]
pub struct RxCounters {
    pub calls: AtomicUsize,
    pub total_iq: AtomicUsize,
}

/// Receiver that replays a fixed script, then stays unsynced and silent.
pub struct MockRx {
    script: Vec<RxStep>,
    step: usize,
    now_synced: bool,
    counters: Arc<RxCounters>,
}

impl MockRx {
    pub fn new(script: Vec<RxStep>) -> (Self, Arc<RxCounters>) {
        let counters = Arc::new(RxCounters::default());
        (
            Self {
                script,
                step: 0,
                now_synced: false,
                counters: Arc::clone(&counters),
            },
            counters,
        )
    }
}

impl RadeRx for MockRx {
    fn nin(&self) -> usize {
        MOCK_NIN
    }

    fn nin_max(&self) -> usize {
        MOCK_NIN
    }

    fn n_features_out(&self) -> usize {
        FEATURES_SIZE
    }

    fn n_eoo_bits(&self) -> usize {
        MOCK_N_EOO_BITS
    }

    fn rx(&mut self, features: &mut [f32], eoo_syms: &mut [f32], iq: &[Iq]) -> RxOutput {
        self.counters.calls.fetch_add(1, Ordering::Relaxed);
        self.counters.total_iq.fetch_add(iq.len(), Ordering::Relaxed);

        let step = self
            .script
            .get(self.step)
            .copied()
            .unwrap_or_else(RxStep::unsynced);
        self.step += 1;
        self.now_synced = step.synced;

        let n_features = step.feature_frames * NB_TOTAL_FEATURES;
        for (i, f) in features[..n_features].iter_mut().enumerate() {
            *f = (i % NB_TOTAL_FEATURES) as f32 * 0.01;
        }
        if step.eoo {
            eoo_syms[0] = 1.0;
        }
        RxOutput {
            n_features,
            eoo_detected: step.eoo,
        }
    }

    fn synced(&self) -> bool {
        self.now_synced
    }

    fn snr_db(&self) -> f32 {
        12.0
    }

    fn freq_offset(&self) -> f32 {
        2.5
    }
}

// ---------------------------------------------------------------------------
// Vocoder mock
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct VocoderCounters {
    pub resets: AtomicUsize,
    pub warm_starts: AtomicUsize,
    pub frames: AtomicUsize,
}

/// Vocoder that emits a constant 0.5 so output samples are recognisable
/// (16384 after S16 conversion).
pub struct MockVocoder {
    counters: Arc<VocoderCounters>,
}

impl MockVocoder {
    pub fn new() -> (Self, Arc<VocoderCounters>) {
        let counters = Arc::new(VocoderCounters::default());
        (
            Self {
                counters: Arc::clone(&counters),
            },
            counters,
        )
    }
}

impl Vocoder for MockVocoder {
    fn reset(&mut self) {
        self.counters.resets.fetch_add(1, Ordering::Relaxed);
    }

    fn warm_start(&mut self, packed_features: &[f32]) {
        assert_eq!(packed_features.len(), 5 * NB_FEATURES);
        self.counters.warm_starts.fetch_add(1, Ordering::Relaxed);
    }

    fn synthesize(&mut self, pcm: &mut [f32; SPEECH_FRAME], features: &[f32]) {
        assert!(features.len() >= NB_TOTAL_FEATURES);
        self.counters.frames.fetch_add(1, Ordering::Relaxed);
        pcm.fill(0.5);
    }
}

// ---------------------------------------------------------------------------
// Transmitter mock
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct TxCounters {
    pub tx_calls: AtomicUsize,
    pub eoo_calls: AtomicUsize,
    pub eoo_bits_sets: AtomicUsize,
    pub last_eoo_syms: Mutex<Vec<f32>>,
}

/// Transmitter emitting constant IQ: modem frames at re = 0.5, the EOO
/// frame at re = 0.25.
pub struct MockTx {
    counters: Arc<TxCounters>,
}

impl MockTx {
    pub fn new() -> (Self, Arc<TxCounters>) {
        let counters = Arc::new(TxCounters::default());
        (
            Self {
                counters: Arc::clone(&counters),
            },
            counters,
        )
    }
}

impl RadeTx for MockTx {
    fn n_features_in(&self) -> usize {
        FEATURES_SIZE
    }

    fn n_tx_out(&self) -> usize {
        MODEM_FRAME_SAMPLES
    }

    fn n_tx_eoo_out(&self) -> usize {
        EOO_FRAME_SAMPLES
    }

    fn n_eoo_bits(&self) -> usize {
        MOCK_N_EOO_BITS
    }

    fn tx(&mut self, iq_out: &mut [Iq], features: &[f32]) -> usize {
        assert!(features.len() >= FEATURES_SIZE);
        self.counters.tx_calls.fetch_add(1, Ordering::Relaxed);
        for iq in iq_out[..MODEM_FRAME_SAMPLES].iter_mut() {
            *iq = Iq::new(0.5, -0.5);
        }
        MODEM_FRAME_SAMPLES
    }

    fn tx_eoo(&mut self, iq_out: &mut [Iq]) -> usize {
        self.counters.eoo_calls.fetch_add(1, Ordering::Relaxed);
        for iq in iq_out[..EOO_FRAME_SAMPLES].iter_mut() {
            *iq = Iq::new(0.25, 0.0);
        }
        EOO_FRAME_SAMPLES
    }

    fn set_eoo_bits(&mut self, syms: &[f32]) {
        self.counters.eoo_bits_sets.fetch_add(1, Ordering::Relaxed);
        *self.counters.last_eoo_syms.lock().unwrap() = syms.to_vec();
    }
}

// ---------------------------------------------------------------------------
// Feature extractor, BPF, callsign mocks
// ---------------------------------------------------------------------------

pub struct MockFeatures {
    calls: Arc<AtomicUsize>,
}

impl MockFeatures {
    pub fn new() -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

impl FeatureExtractor for MockFeatures {
    fn compute_frame(&mut self, _pcm: &[i16; SPEECH_FRAME], out: &mut [f32; NB_TOTAL_FEATURES]) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        out.fill(0.0);
        out[0] = 1.0;
    }
}

pub struct MockBpf {
    lens: Arc<Mutex<Vec<usize>>>,
}

impl MockBpf {
    pub fn new() -> (Self, Arc<Mutex<Vec<usize>>>) {
        let lens = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                lens: Arc::clone(&lens),
            },
            lens,
        )
    }
}

impl TxBandpass for MockBpf {
    fn process(&mut self, iq: &mut [Iq]) {
        self.lens.lock().unwrap().push(iq.len());
    }
}

/// Encoder writing the callsign bytes into the leading symbol floats.
pub struct MockCallsignEncoder;

impl CallsignEncoder for MockCallsignEncoder {
    fn encode(&self, callsign: &str, eoo_syms: &mut [f32]) {
        assert_eq!(eoo_syms.len(), MOCK_N_EOO_BITS);
        eoo_syms.fill(0.0);
        for (slot, b) in eoo_syms.iter_mut().zip(callsign.bytes()) {
            *slot = f32::from(b);
        }
    }
}

/// Decoder accepting only the marker the [`MockRx`] writes on EOO.
pub struct MockCallsignDecoder;

impl CallsignDecoder for MockCallsignDecoder {
    fn decode(&self, eoo_syms: &[f32]) -> Option<String> {
        (eoo_syms[0] == 1.0).then(|| "W1AW".to_string())
    }
}

// ---------------------------------------------------------------------------
// Channel-fed capture stream (blocks until the test sends samples)
// ---------------------------------------------------------------------------

pub struct ChannelSource {
    rx: mpsc::Receiver<Vec<i16>>,
    pending: VecDeque<i16>,
    sample_rate: u32,
    aborted: Arc<AtomicBool>,
}

pub fn channel_source(sample_rate: u32) -> (mpsc::Sender<Vec<i16>>, ChannelSource) {
    let (tx, rx) = mpsc::channel();
    (
        tx,
        ChannelSource {
            rx,
            pending: VecDeque::new(),
            sample_rate,
            aborted: Arc::new(AtomicBool::new(false)),
        },
    )
}

impl AudioStream for ChannelSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, buf: &mut [i16]) -> Result<ReadStatus, AudioError> {
        let mut filled = 0;
        while filled < buf.len() {
            if let Some(s) = self.pending.pop_front() {
                buf[filled] = s;
                filled += 1;
                continue;
            }
            if self.aborted.load(Ordering::Relaxed) {
                return Err(AudioError::Aborted);
            }
            match self.rx.recv_timeout(Duration::from_millis(10)) {
                Ok(chunk) => self.pending.extend(chunk),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Err(AudioError::Closed),
            }
        }
        Ok(ReadStatus::Ok)
    }

    fn write(&mut self, _buf: &[i16]) -> Result<(), AudioError> {
        Err(AudioError::Device("capture stream is read-only".into()))
    }

    fn start(&mut self) {
        self.aborted.store(false, Ordering::Relaxed);
    }

    fn abort_handle(&self) -> AbortHandle {
        let aborted = Arc::clone(&self.aborted);
        AbortHandle::new(move || aborted.store(true, Ordering::Relaxed))
    }
}
