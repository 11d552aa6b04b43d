// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Real-time RADAE receive pipeline.
//!
//! Capture (or file replay) → resample to 8 kHz → spectrum probe → Hilbert
//! → RADE receiver → FARGAN warm-up/synthesis → resample to the device
//! rate → playback.  Everything runs on one dedicated worker thread;
//! status is exposed through relaxed atomics polled by the UI thread.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::{error, info, warn};

use crate::audio::{AbortHandle, AudioStream, ReadStatus};
use crate::callsign::CallsignDecoder;
use crate::codec::{
    Iq, RadeRx, Vocoder, FARGAN_WARMUP_FRAMES, FEATURES_PER_MODEM_FRAME, FS_MODEM, FS_SPEECH,
    NB_FEATURES, NB_TOTAL_FEATURES, SPEECH_FRAME,
};
use crate::dsp::pcm::{f32_to_s16_round, f32_to_s16_trunc, rms, s16_to_f32};
use crate::dsp::{Hilbert, SpectrumHandle, SpectrumSnapshotter, StreamResampler, FFT_SIZE};
use crate::error::{AudioError, PipelineError};
use crate::recorder::WavRecorder;
use crate::telemetry::AtomicF32;
use crate::wav::load_wav_8k;

/// Capture read size in frames; small enough to keep the spectrum lively.
pub const READ_FRAMES: usize = 512;

/// Decay applied to the output level on iterations without decoded audio.
const OUTPUT_LEVEL_DECAY: f32 = 0.9;

/// The receiver side of the neural codec, bundled for [`RadaeDecoder::open`].
pub struct RxCodec {
    pub rx: Box<dyn RadeRx>,
    pub vocoder: Box<dyn Vocoder>,
    /// Optional EOO callsign decoder; without it EOO frames are ignored.
    pub callsign: Option<Box<dyn CallsignDecoder>>,
}

/// FARGAN warm-up: the first five feature frames after each sync are
/// buffered and fed to the continuation primer instead of being synthesised.
struct FarganWarmup {
    ready: bool,
    count: usize,
    buf: [f32; FARGAN_WARMUP_FRAMES * NB_TOTAL_FEATURES],
}

impl FarganWarmup {
    fn new() -> Self {
        Self {
            ready: false,
            count: 0,
            buf: [0.0; FARGAN_WARMUP_FRAMES * NB_TOTAL_FEATURES],
        }
    }

    fn reset(&mut self) {
        self.ready = false;
        self.count = 0;
    }

    /// Store one 36-float frame; returns `true` on the frame that completes
    /// the warm-up.
    fn push(&mut self, frame: &[f32]) -> bool {
        self.buf[self.count * NB_TOTAL_FEATURES..][..NB_TOTAL_FEATURES]
            .copy_from_slice(&frame[..NB_TOTAL_FEATURES]);
        self.count += 1;
        if self.count >= FARGAN_WARMUP_FRAMES {
            self.ready = true;
        }
        self.ready
    }

    /// The five buffered frames repacked at [`NB_FEATURES`] stride for the
    /// continuation primer.
    fn packed(&self) -> [f32; FARGAN_WARMUP_FRAMES * NB_FEATURES] {
        let mut packed = [0.0; FARGAN_WARMUP_FRAMES * NB_FEATURES];
        for i in 0..FARGAN_WARMUP_FRAMES {
            packed[i * NB_FEATURES..][..NB_FEATURES]
                .copy_from_slice(&self.buf[i * NB_TOTAL_FEATURES..][..NB_FEATURES]);
        }
        packed
    }
}

enum RxSource {
    Stream(Box<dyn AudioStream>),
    File { audio_8k: Vec<f32>, pos: usize },
}

struct DecoderShared {
    running: AtomicBool,
    synced: AtomicBool,
    snr_db: AtomicF32,
    freq_offset: AtomicF32,
    input_level: AtomicF32,
    output_level: AtomicF32,
    spectrum: SpectrumHandle,
    last_callsign: Mutex<String>,
    recorder: Mutex<Option<Arc<WavRecorder>>>,
}

impl Default for DecoderShared {
    fn default() -> Self {
        Self {
            running: AtomicBool::new(false),
            synced: AtomicBool::new(false),
            snr_db: AtomicF32::default(),
            freq_offset: AtomicF32::default(),
            input_level: AtomicF32::default(),
            output_level: AtomicF32::default(),
            spectrum: SpectrumHandle::new(),
            last_callsign: Mutex::new(String::new()),
            recorder: Mutex::new(None),
        }
    }
}

struct DecoderCtx {
    source: RxSource,
    output: Box<dyn AudioStream>,
    rate_in: u32,
    rate_out: u32,
    codec: RxCodec,
    hilbert: Hilbert,
    resamp_in: StreamResampler,
    resamp_out: StreamResampler,
    spectrum: SpectrumSnapshotter,
    warmup: FarganWarmup,
    shared: Arc<DecoderShared>,
}

/// RX pipeline controller: `Idle → Opened → Running → Opened → Closed`.
pub struct RadaeDecoder {
    shared: Arc<DecoderShared>,
    ctx: Option<DecoderCtx>,
    worker: Option<JoinHandle<DecoderCtx>>,
    abort: AbortHandle,
}

impl Default for RadaeDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RadaeDecoder {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(DecoderShared::default()),
            ctx: None,
            worker: None,
            abort: AbortHandle::noop(),
        }
    }

    /// Open the live pipeline on a capture/playback stream pair.
    /// Any previous pipeline is torn down first.
    pub fn open(
        &mut self,
        codec: RxCodec,
        input: Box<dyn AudioStream>,
        output: Box<dyn AudioStream>,
    ) -> Result<(), PipelineError> {
        self.close();
        self.abort = input.abort_handle();
        self.install(codec, RxSource::Stream(input), output);
        Ok(())
    }

    /// Open in file-playback mode: `path` is decoded and resampled to
    /// 8 kHz up front, then replayed as the input stream.
    pub fn open_file(
        &mut self,
        path: &Path,
        codec: RxCodec,
        output: Box<dyn AudioStream>,
    ) -> Result<(), PipelineError> {
        self.close();
        let audio_8k = load_wav_8k(path)?;
        info!(
            "file mode: {} ({:.1} s at 8 kHz)",
            path.display(),
            audio_8k.len() as f32 / FS_MODEM as f32
        );
        self.abort = AbortHandle::noop();
        self.install(codec, RxSource::File { audio_8k, pos: 0 }, output);
        Ok(())
    }

    fn install(&mut self, codec: RxCodec, source: RxSource, output: Box<dyn AudioStream>) {
        let rate_in = match &source {
            RxSource::Stream(s) => s.sample_rate(),
            RxSource::File { .. } => FS_MODEM,
        };
        self.shared.spectrum.clear();
        self.ctx = Some(DecoderCtx {
            rate_in,
            rate_out: output.sample_rate(),
            source,
            output,
            codec,
            hilbert: Hilbert::new(),
            resamp_in: StreamResampler::new(),
            resamp_out: StreamResampler::new(),
            spectrum: SpectrumSnapshotter::new(self.shared.spectrum.clone()),
            warmup: FarganWarmup::new(),
            shared: Arc::clone(&self.shared),
        });
    }

    /// Spawn the worker thread.  No-op when already running.
    pub fn start(&mut self) -> Result<(), PipelineError> {
        if self.worker.is_some() {
            return Ok(());
        }
        let mut ctx = self.ctx.take().ok_or(PipelineError::NotOpen)?;
        self.shared.running.store(true, Ordering::Relaxed);
        match std::thread::Builder::new().name("radae-rx".into()).spawn(move || {
            decode_loop(&mut ctx);
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

    /// Stop the worker: clear `running`, abort a pending capture read,
    /// join, zero the level meters.
    pub fn stop(&mut self) {
        self.shared.running.store(false, Ordering::Relaxed);
        self.abort.abort();
        if let Some(handle) = self.worker.take() {
            match handle.join() {
                Ok(ctx) => self.ctx = Some(ctx),
                Err(_) => error!("RX worker panicked"),
            }
        }
        self.shared.input_level.store(0.0);
        self.shared.output_level.store(0.0);
        self.shared.synced.store(false, Ordering::Relaxed);
    }

    /// Stop and drop streams and codec handles.  No telemetry is updated
    /// after this returns.
    pub fn close(&mut self) {
        self.stop();
        self.ctx = None;
        self.abort = AbortHandle::noop();
        self.shared.snr_db.store(0.0);
        self.shared.freq_offset.store(0.0);
    }

    pub fn is_open(&self) -> bool {
        self.ctx.is_some() || self.worker.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Relaxed)
    }

    pub fn is_synced(&self) -> bool {
        self.shared.synced.load(Ordering::Relaxed)
    }

    pub fn snr_db(&self) -> f32 {
        self.shared.snr_db.load()
    }

    pub fn freq_offset(&self) -> f32 {
        self.shared.freq_offset.load()
    }

    pub fn input_level(&self) -> f32 {
        self.shared.input_level.load()
    }

    pub fn output_level(&self) -> f32 {
        self.shared.output_level.load()
    }

    /// Copy up to `out.len()` spectrum bins; see
    /// [`crate::dsp::SPECTRUM_BINS`].
    pub fn spectrum(&self, out: &mut [f32]) -> usize {
        self.shared.spectrum.copy_into(out)
    }

    /// The probe always runs at the modem rate, whatever the device rate.
    pub fn spectrum_sample_rate(&self) -> f32 {
        FS_MODEM as f32
    }

    /// Latest callsign accepted from an end-of-over frame.
    pub fn last_callsign(&self) -> String {
        self.shared
            .last_callsign
            .lock()
            .expect("callsign mutex poisoned")
            .clone()
    }

    /// Attach a recorder; the worker taps the resampled 8 kHz input.
    pub fn set_recorder(&self, recorder: Arc<WavRecorder>) {
        *self.shared.recorder.lock().expect("recorder mutex poisoned") = Some(recorder);
    }

    /// Detach the recorder.  Must be called before the recorder is closed;
    /// the worker never holds it across device I/O.
    pub fn detach_recorder(&self) -> Option<Arc<WavRecorder>> {
        self.shared
            .recorder
            .lock()
            .expect("recorder mutex poisoned")
            .take()
    }
}

impl Drop for RadaeDecoder {
    fn drop(&mut self) {
        self.close();
    }
}

fn decode_loop(ctx: &mut DecoderCtx) {
    let shared = Arc::clone(&ctx.shared);
    let running = |s: &DecoderShared| s.running.load(Ordering::Relaxed);

    let nin_max = ctx.codec.rx.nin_max();
    let n_features_out = ctx.codec.rx.n_features_out();
    let n_eoo_bits = ctx.codec.rx.n_eoo_bits();

    let mut rx_iq = vec![Iq::default(); nin_max];
    let mut feat_buf = vec![0.0f32; n_features_out];
    let mut eoo_buf = vec![0.0f32; n_eoo_bits];

    let mut acc_8k: Vec<f32> = Vec::with_capacity(nin_max * 2);
    let mut capture = vec![0i16; READ_FRAMES];
    let mut f_in = vec![0.0f32; READ_FRAMES];

    let resamp_cap =
        READ_FRAMES.max(READ_FRAMES * FS_MODEM as usize / ctx.rate_in.max(1) as usize) + 4;
    let mut resamp_tmp = vec![0.0f32; resamp_cap];
    let mut rec_tmp: Vec<i16> = Vec::with_capacity(resamp_cap);

    let out_cap = SPEECH_FRAME * ctx.rate_out as usize / FS_SPEECH as usize + 4;
    let mut out_f = vec![0.0f32; out_cap];
    let mut out_pcm: Vec<i16> = Vec::with_capacity(out_cap);
    let mut speech = [0.0f32; SPEECH_FRAME];

    let mut was_synced = false;
    let mut output_primed = false;

    info!(
        "RX worker up: device {} Hz in, {} Hz out",
        ctx.rate_in, ctx.rate_out
    );

    if let RxSource::Stream(stream) = &mut ctx.source {
        stream.start();
    }

    while running(&shared) {
        let nin = ctx.codec.rx.nin();

        // Accumulate enough 8 kHz samples for this iteration.
        while acc_8k.len() < nin && running(&shared) {
            match &mut ctx.source {
                RxSource::File { audio_8k, pos } => {
                    let remaining = audio_8k.len() - *pos;
                    if remaining == 0 {
                        shared.running.store(false, Ordering::Relaxed);
                        break;
                    }
                    let chunk = remaining.min(nin - acc_8k.len());
                    acc_8k.extend_from_slice(&audio_8k[*pos..*pos + chunk]);
                    *pos += chunk;
                }
                RxSource::Stream(stream) => {
                    match stream.read(&mut capture) {
                        Ok(ReadStatus::Ok) => {}
                        Ok(ReadStatus::Overflow) => {
                            // Non-fatal; the delivered samples are valid.
                        }
                        Err(AudioError::Aborted) => break,
                        Err(e) => {
                            if !running(&shared) {
                                break;
                            }
                            // Transient on the RX side: re-sync and carry on.
                            warn!("capture read failed: {e}");
                            stream.recover();
                            continue;
                        }
                    }
                    s16_to_f32(&capture, &mut f_in);
                    let got =
                        ctx.resamp_in
                            .resample(&f_in, &mut resamp_tmp, ctx.rate_in, FS_MODEM);

                    let recorder = shared
                        .recorder
                        .lock()
                        .expect("recorder mutex poisoned")
                        .clone();
                    if let Some(rec) = recorder {
                        rec_tmp.clear();
                        rec_tmp.extend(resamp_tmp[..got].iter().map(|&v| f32_to_s16_trunc(v)));
                        rec.write(&rec_tmp);
                    }

                    acc_8k.extend_from_slice(&resamp_tmp[..got]);
                }
            }
        }

        if !running(&shared) {
            break;
        }
        if acc_8k.len() < nin {
            continue;
        }

        if acc_8k.len() >= FFT_SIZE {
            ctx.spectrum.publish(&acc_8k);
        }

        shared.input_level.store(rms(&acc_8k[..nin]));

        // Hilbert first, erase second: the transform state must advance by
        // exactly nin taps.
        ctx.hilbert.process_into(&acc_8k[..nin], &mut rx_iq[..nin]);
        acc_8k.drain(..nin);

        let out = ctx
            .codec
            .rx
            .rx(&mut feat_buf, &mut eoo_buf, &rx_iq[..nin]);

        let now_synced = ctx.codec.rx.synced();
        shared.synced.store(now_synced, Ordering::Relaxed);
        if now_synced {
            shared.snr_db.store(ctx.codec.rx.snr_db());
            shared.freq_offset.store(ctx.codec.rx.freq_offset());
        }

        if was_synced && !now_synced {
            // Lost sync: discard stale vocoder state before the next lock-on.
            info!("sync lost, resetting vocoder");
            ctx.codec.vocoder.reset();
            ctx.warmup.reset();
            output_primed = false;
        }
        was_synced = now_synced;

        if out.n_features > 0 {
            let n_frames = out.n_features / NB_TOTAL_FEATURES;
            let mut rms_sum = 0.0f64;
            let mut rms_n = 0usize;

            for fi in 0..n_frames {
                let feat = &feat_buf[fi * NB_TOTAL_FEATURES..(fi + 1) * NB_TOTAL_FEATURES];

                if !ctx.warmup.ready {
                    if ctx.warmup.push(feat) {
                        ctx.codec.vocoder.warm_start(&ctx.warmup.packed());
                        info!("vocoder warm-up complete");

                        if !output_primed {
                            // Pre-roll ~240 ms of silence so the playback
                            // buffer survives the codec's bursty writes.
                            let prefill = 2
                                * FEATURES_PER_MODEM_FRAME
                                * SPEECH_FRAME
                                * ctx.rate_out as usize
                                / FS_SPEECH as usize;
                            let silence = vec![0i16; prefill];
                            if let Err(e) = ctx.output.write(&silence) {
                                warn!("pre-roll write failed: {e}");
                            }
                            output_primed = true;
                        }
                    }
                    continue; // warm-up frames are not synthesised
                }

                ctx.codec.vocoder.synthesize(&mut speech, feat);
                for &s in &speech {
                    rms_sum += f64::from(s) * f64::from(s);
                }
                rms_n += SPEECH_FRAME;

                let got =
                    ctx.resamp_out
                        .resample(&speech, &mut out_f, FS_SPEECH, ctx.rate_out);
                out_pcm.clear();
                out_pcm.extend(out_f[..got].iter().map(|&v| f32_to_s16_round(v)));
                if let Err(e) = ctx.output.write(&out_pcm) {
                    warn!("playback write failed: {e}");
                }
            }

            if rms_n > 0 {
                shared
                    .output_level
                    .store((rms_sum / rms_n as f64).sqrt() as f32);
            }
        } else {
            // Nothing decoded this iteration; let the meter fall gracefully.
            let level = shared.output_level.load();
            shared.output_level.store(level * OUTPUT_LEVEL_DECAY);
        }

        if out.eoo_detected {
            if let Some(decoder) = &ctx.codec.callsign {
                if let Some(callsign) = decoder.decode(&eoo_buf) {
                    info!("EOO callsign: {callsign}");
                    *shared
                        .last_callsign
                        .lock()
                        .expect("callsign mutex poisoned") = callsign;
                }
            }
        }
    }

    info!("RX worker down");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warmup_completes_on_fifth_frame_and_packs_leading_features() {
        let mut w = FarganWarmup::new();
        for frame_no in 0..FARGAN_WARMUP_FRAMES {
            let frame: Vec<f32> = (0..NB_TOTAL_FEATURES)
                .map(|i| (frame_no * 100 + i) as f32)
                .collect();
            let done = w.push(&frame);
            assert_eq!(done, frame_no == FARGAN_WARMUP_FRAMES - 1);
        }
        assert!(w.ready);

        let packed = w.packed();
        assert_eq!(packed.len(), FARGAN_WARMUP_FRAMES * NB_FEATURES);
        // Frame 3, feature 7 lives at stride NB_FEATURES in the packed buffer.
        assert_eq!(packed[3 * NB_FEATURES + 7], 307.0);
        // Features past NB_FEATURES are not packed.
        assert!(!packed.contains(&(NB_FEATURES as f32)));
    }

    #[test]
    fn warmup_reset_starts_over() {
        let mut w = FarganWarmup::new();
        let frame = vec![1.0f32; NB_TOTAL_FEATURES];
        for _ in 0..FARGAN_WARMUP_FRAMES {
            w.push(&frame);
        }
        assert!(w.ready);
        w.reset();
        assert!(!w.ready);
        assert!(!w.push(&frame));
    }
}
