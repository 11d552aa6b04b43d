// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Real-time RADAE transmit pipeline.
//!
//! Microphone → resample to 16 kHz → LPCNet features (12 per modem frame)
//! → RADE transmitter → optional band-pass → real part → resample to the
//! radio rate → scale, clip, write.  The worker pre-rolls two modem frames
//! of silence at start and flushes an end-of-over frame after the loop
//! exits, while the output stream is still writable.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::{error, info, warn};

use crate::audio::{AbortHandle, AudioStream, ReadStatus};
use crate::callsign::{sanitize_callsign, CallsignEncoder};
use crate::codec::{
    FeatureExtractor, Iq, RadeTx, TxBandpass, DEFAULT_MIC_GAIN, DEFAULT_TX_SCALE, FS_MODEM,
    FS_SPEECH, MODEM_FRAME_SAMPLES, NB_TOTAL_FEATURES, SPEECH_FRAME,
};
use crate::dsp::pcm::{f32_to_s16_trunc, rms, scale_to_s16_trunc};
use crate::dsp::{SpectrumHandle, SpectrumSnapshotter, StreamResampler};
use crate::error::{AudioError, PipelineError};
use crate::recorder::WavRecorder;
use crate::telemetry::AtomicF32;

/// Microphone read size in frames, one 10 ms speech frame.
pub const READ_FRAMES: usize = 160;

/// The transmitter side of the neural codec, bundled for
/// [`RadaeEncoder::open`].
pub struct TxCodec {
    pub tx: Box<dyn RadeTx>,
    pub features: Box<dyn FeatureExtractor>,
    /// Optional TX output band-pass; required when `bpf_enabled` is set.
    pub bpf: Option<Box<dyn TxBandpass>>,
    /// Optional EOO callsign encoder; without it the EOO frame carries the
    /// codec's default payload.
    pub callsign: Option<Box<dyn CallsignEncoder>>,
}

struct EncoderShared {
    running: AtomicBool,
    input_level: AtomicF32,
    output_level: AtomicF32,
    tx_scale: AtomicF32,
    mic_gain: AtomicF32,
    bpf_enabled: AtomicBool,
    spectrum: SpectrumHandle,
    recorder: Mutex<Option<Arc<WavRecorder>>>,
    /// Encoded EOO symbols waiting to be installed by the worker; written
    /// by the controller while the worker owns the transmitter handle.
    pending_eoo: Mutex<Option<Vec<f32>>>,
    /// EOO symbol buffer length, published once the transmitter is opened.
    n_eoo_bits: AtomicUsize,
}

impl Default for EncoderShared {
    fn default() -> Self {
        Self {
            running: AtomicBool::new(false),
            input_level: AtomicF32::default(),
            output_level: AtomicF32::default(),
            tx_scale: AtomicF32::new(DEFAULT_TX_SCALE),
            mic_gain: AtomicF32::new(DEFAULT_MIC_GAIN),
            bpf_enabled: AtomicBool::new(false),
            spectrum: SpectrumHandle::new(),
            recorder: Mutex::new(None),
            pending_eoo: Mutex::new(None),
            n_eoo_bits: AtomicUsize::new(0),
        }
    }
}

struct EncoderCtx {
    input: Box<dyn AudioStream>,
    output: Box<dyn AudioStream>,
    rate_in: u32,
    rate_out: u32,
    tx: Box<dyn RadeTx>,
    features: Box<dyn FeatureExtractor>,
    bpf: Option<Box<dyn TxBandpass>>,
    resamp_in: StreamResampler,
    resamp_out: StreamResampler,
    spectrum: SpectrumSnapshotter,
    shared: Arc<EncoderShared>,
}

/// TX pipeline controller: `Idle → Opened → Running → Opened → Closed`.
pub struct RadaeEncoder {
    shared: Arc<EncoderShared>,
    ctx: Option<EncoderCtx>,
    worker: Option<JoinHandle<EncoderCtx>>,
    abort: AbortHandle,
    callsign_enc: Option<Box<dyn CallsignEncoder>>,
    callsign: String,
}

impl Default for RadaeEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RadaeEncoder {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(EncoderShared::default()),
            ctx: None,
            worker: None,
            abort: AbortHandle::noop(),
            callsign_enc: None,
            callsign: String::new(),
        }
    }

    /// Open the pipeline on a microphone/radio stream pair.  Any previous
    /// pipeline is torn down first.  A cached callsign is applied to the
    /// fresh transmitter handle immediately.
    pub fn open(
        &mut self,
        mut codec: TxCodec,
        input: Box<dyn AudioStream>,
        output: Box<dyn AudioStream>,
    ) -> Result<(), PipelineError> {
        self.close();
        self.abort = input.abort_handle();
        self.callsign_enc = codec.callsign.take();
        self.shared.spectrum.clear();
        self.shared
            .n_eoo_bits
            .store(codec.tx.n_eoo_bits(), Ordering::Relaxed);

        self.ctx = Some(EncoderCtx {
            rate_in: input.sample_rate(),
            rate_out: output.sample_rate(),
            input,
            output,
            tx: codec.tx,
            features: codec.features,
            bpf: codec.bpf,
            resamp_in: StreamResampler::new(),
            resamp_out: StreamResampler::new(),
            spectrum: SpectrumSnapshotter::new(self.shared.spectrum.clone()),
            shared: Arc::clone(&self.shared),
        });

        if !self.callsign.is_empty() {
            let callsign = self.callsign.clone();
            self.apply_callsign(&callsign);
        }
        Ok(())
    }

    /// Spawn the worker thread.  No-op when already running.
    pub fn start(&mut self) -> Result<(), PipelineError> {
        if self.worker.is_some() {
            return Ok(());
        }
        let mut ctx = self.ctx.take().ok_or(PipelineError::NotOpen)?;
        self.shared.running.store(true, Ordering::Relaxed);
        match std::thread::Builder::new().name("radae-tx".into()).spawn(move || {
            encode_loop(&mut ctx);
            ctx
        }) {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::Relaxed);
                Err(PipelineError::Spawn(e))
            }
        }
    }

    /// Stop the worker.  The end-of-over frame is flushed by the worker
    /// between leaving its loop and being joined here.
    pub fn stop(&mut self) {
        self.shared.running.store(false, Ordering::Relaxed);
        self.abort.abort();
        if let Some(handle) = self.worker.take() {
            match handle.join() {
                Ok(ctx) => self.ctx = Some(ctx),
                Err(_) => error!("TX worker panicked"),
            }
        }
        self.shared.input_level.store(0.0);
        self.shared.output_level.store(0.0);
    }

    /// Stop and drop streams and codec handles.
    pub fn close(&mut self) {
        self.stop();
        self.ctx = None;
        self.abort = AbortHandle::noop();
        self.callsign_enc = None;
        self.shared.n_eoo_bits.store(0, Ordering::Relaxed);
        *self
            .shared
            .pending_eoo
            .lock()
            .expect("eoo mailbox poisoned") = None;
    }

    pub fn is_open(&self) -> bool {
        self.ctx.is_some() || self.worker.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Relaxed)
    }

    pub fn input_level(&self) -> f32 {
        self.shared.input_level.load()
    }

    pub fn output_level(&self) -> f32 {
        self.shared.output_level.load()
    }

    pub fn set_tx_scale(&self, scale: f32) {
        self.shared.tx_scale.store(scale);
    }

    pub fn tx_scale(&self) -> f32 {
        self.shared.tx_scale.load()
    }

    /// Applied inside the capture loop at 160-sample granularity; changes
    /// mid-frame take effect on the next frame, unsmoothed.
    pub fn set_mic_gain(&self, gain: f32) {
        self.shared.mic_gain.store(gain);
    }

    pub fn mic_gain(&self) -> f32 {
        self.shared.mic_gain.load()
    }

    pub fn set_bpf_enabled(&self, enabled: bool) {
        self.shared.bpf_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn bpf_enabled(&self) -> bool {
        self.shared.bpf_enabled.load(Ordering::Relaxed)
    }

    /// Copy up to `out.len()` spectrum bins of the transmitted signal.
    pub fn spectrum(&self, out: &mut [f32]) -> usize {
        self.shared.spectrum.copy_into(out)
    }

    pub fn spectrum_sample_rate(&self) -> f32 {
        FS_MODEM as f32
    }

    /// Set the callsign carried in the end-of-over frame.  Takes effect
    /// immediately when the pipeline is open, otherwise on the next open.
    pub fn set_callsign(&mut self, raw: &str) {
        let callsign = sanitize_callsign(raw);
        self.callsign = callsign.clone();
        self.apply_callsign(&callsign);
    }

    pub fn callsign(&self) -> &str {
        &self.callsign
    }

    fn apply_callsign(&mut self, callsign: &str) {
        let Some(encoder) = &self.callsign_enc else {
            return;
        };
        if let Some(ctx) = &mut self.ctx {
            let mut syms = vec![0.0f32; ctx.tx.n_eoo_bits()];
            encoder.encode(callsign, &mut syms);
            ctx.tx.set_eoo_bits(&syms);
        } else if self.worker.is_some() {
            // The worker owns the transmitter; leave the symbols in the
            // mailbox it drains before each encode.
            let n = self.shared.n_eoo_bits.load(Ordering::Relaxed);
            if n > 0 {
                let mut syms = vec![0.0f32; n];
                encoder.encode(callsign, &mut syms);
                *self
                    .shared
                    .pending_eoo
                    .lock()
                    .expect("eoo mailbox poisoned") = Some(syms);
            }
        }
    }

    /// Attach a recorder; the worker taps the S16 samples written to the
    /// radio, including the EOO flush.
    pub fn set_recorder(&self, recorder: Arc<WavRecorder>) {
        *self.shared.recorder.lock().expect("recorder mutex poisoned") = Some(recorder);
    }

    /// Detach the recorder.  Call after `stop` so the EOO flush is still
    /// recorded, and before closing the recorder itself.
    pub fn detach_recorder(&self) -> Option<Arc<WavRecorder>> {
        self.shared
            .recorder
            .lock()
            .expect("recorder mutex poisoned")
            .take()
    }
}

impl Drop for RadaeEncoder {
    fn drop(&mut self) {
        self.close();
    }
}

/// Resample the real part of an encoded frame to the device rate, scale,
/// clip and write it out; publishes the TX spectrum and output level.
fn write_real_frame(
    iq: &[Iq],
    ctx_output: &mut dyn AudioStream,
    rate_out: u32,
    resamp_out: &mut StreamResampler,
    spectrum: &mut SpectrumSnapshotter,
    shared: &EncoderShared,
    real: &mut Vec<f32>,
    out_f: &mut Vec<f32>,
    out_pcm: &mut Vec<i16>,
) {
    real.clear();
    real.extend(iq.iter().map(|c| c.re));

    spectrum.publish(real);
    shared.output_level.store(rms(real));

    let cap = real.len() * rate_out as usize / FS_MODEM as usize + 4;
    out_f.resize(cap, 0.0);
    let got = resamp_out.resample(real, out_f, FS_MODEM, rate_out);

    let scale = shared.tx_scale.load();
    out_pcm.clear();
    out_pcm.extend(out_f[..got].iter().map(|&v| scale_to_s16_trunc(v, scale)));

    if let Err(e) = ctx_output.write(out_pcm) {
        warn!("radio write failed: {e}");
        return;
    }

    let recorder = shared
        .recorder
        .lock()
        .expect("recorder mutex poisoned")
        .clone();
    if let Some(rec) = recorder {
        rec.write(out_pcm);
    }
}

fn encode_loop(ctx: &mut EncoderCtx) {
    let shared = Arc::clone(&ctx.shared);
    let running = |s: &EncoderShared| s.running.load(Ordering::Relaxed);

    let n_features_in = ctx.tx.n_features_in();
    let n_tx_out = ctx.tx.n_tx_out();
    let n_eoo_out = ctx.tx.n_tx_eoo_out();
    let frames_per_modem = n_features_in / NB_TOTAL_FEATURES;

    let mut features = vec![0.0f32; n_features_in];
    let mut tx_iq = vec![Iq::default(); n_tx_out];
    let mut eoo_iq = vec![Iq::default(); n_eoo_out];
    let mut feat_count = 0usize;

    let mut capture = vec![0i16; READ_FRAMES];
    let mut f_in = vec![0.0f32; READ_FRAMES];
    let mut acc_16k: Vec<f32> = Vec::with_capacity(1024);

    let resamp_cap =
        READ_FRAMES.max(READ_FRAMES * FS_SPEECH as usize / ctx.rate_in.max(1) as usize) + 4;
    let mut resamp_tmp = vec![0.0f32; resamp_cap];

    let mut real = Vec::with_capacity(n_eoo_out);
    let mut out_f: Vec<f32> = Vec::new();
    let mut out_pcm: Vec<i16> = Vec::new();

    info!(
        "TX worker up: mic {} Hz, radio {} Hz",
        ctx.rate_in, ctx.rate_out
    );

    ctx.input.start();

    // Pre-roll two modem frames of silence: rade_tx produces nothing until
    // twelve feature frames (120 ms) have been captured, and the playback
    // buffer must survive that gap.
    {
        let prefill = 2 * MODEM_FRAME_SAMPLES * ctx.rate_out as usize / FS_MODEM as usize;
        let silence = vec![0i16; prefill];
        if let Err(e) = ctx.output.write(&silence) {
            warn!("pre-roll write failed: {e}");
        }
    }

    while running(&shared) {
        // Accumulate one speech frame at 16 kHz.
        while acc_16k.len() < SPEECH_FRAME && running(&shared) {
            match ctx.input.read(&mut capture) {
                Ok(ReadStatus::Ok) | Ok(ReadStatus::Overflow) => {}
                Err(AudioError::Aborted) => break,
                Err(e) => {
                    if running(&shared) {
                        error!("mic read failed, stopping TX: {e}");
                        shared.running.store(false, Ordering::Relaxed);
                    }
                    break;
                }
            }

            let gain = shared.mic_gain.load();
            for (dst, &s) in f_in.iter_mut().zip(&capture) {
                *dst = f32::from(s) / 32768.0 * gain;
            }
            let got = ctx
                .resamp_in
                .resample(&f_in, &mut resamp_tmp, ctx.rate_in, FS_SPEECH);
            acc_16k.extend_from_slice(&resamp_tmp[..got]);
        }

        if !running(&shared) {
            break;
        }

        while acc_16k.len() >= SPEECH_FRAME {
            shared.input_level.store(rms(&acc_16k[..SPEECH_FRAME]));

            let mut pcm_frame = [0i16; SPEECH_FRAME];
            for (dst, &s) in pcm_frame.iter_mut().zip(&acc_16k) {
                *dst = f32_to_s16_trunc(s);
            }

            let mut frame_features = [0.0f32; NB_TOTAL_FEATURES];
            ctx.features.compute_frame(&pcm_frame, &mut frame_features);
            features[feat_count * NB_TOTAL_FEATURES..][..NB_TOTAL_FEATURES]
                .copy_from_slice(&frame_features);
            feat_count += 1;

            acc_16k.drain(..SPEECH_FRAME);

            if feat_count >= frames_per_modem {
                if let Some(syms) = shared
                    .pending_eoo
                    .lock()
                    .expect("eoo mailbox poisoned")
                    .take()
                {
                    ctx.tx.set_eoo_bits(&syms);
                }

                let n_out = ctx.tx.tx(&mut tx_iq, &features);
                let iq = &mut tx_iq[..n_out];
                if shared.bpf_enabled.load(Ordering::Relaxed) {
                    if let Some(bpf) = ctx.bpf.as_mut() {
                        bpf.process(iq);
                    }
                }
                write_real_frame(
                    iq,
                    ctx.output.as_mut(),
                    ctx.rate_out,
                    &mut ctx.resamp_out,
                    &mut ctx.spectrum,
                    &shared,
                    &mut real,
                    &mut out_f,
                    &mut out_pcm,
                );
                feat_count = 0;
            }
        }
    }

    // End-of-over: one terminating frame through the same output path,
    // while the stream is still writable, then drain.
    if let Some(syms) = shared
        .pending_eoo
        .lock()
        .expect("eoo mailbox poisoned")
        .take()
    {
        ctx.tx.set_eoo_bits(&syms);
    }
    let n_out = ctx.tx.tx_eoo(&mut eoo_iq);
    let iq = &mut eoo_iq[..n_out];
    if shared.bpf_enabled.load(Ordering::Relaxed) {
        if let Some(bpf) = ctx.bpf.as_mut() {
            bpf.process(iq);
        }
    }
    write_real_frame(
        iq,
        ctx.output.as_mut(),
        ctx.rate_out,
        &mut ctx.resamp_out,
        &mut ctx.spectrum,
        &shared,
        &mut real,
        &mut out_f,
        &mut out_pcm,
    );
    ctx.output.drain();

    info!("TX worker down");
}
