// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Thread-safe WAV recording sink.
//!
//! A pipeline worker appends S16 samples while the controller owns the
//! handle; `close` finalises the header (RIFF and data sizes are patched by
//! `hound`) and is idempotent.  Writes after close, and write failures, are
//! silently dropped so a dying disk never takes the audio path down.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Mutex;

use tracing::{info, warn};

use crate::error::WavError;

type Writer = hound::WavWriter<BufWriter<File>>;

pub struct WavRecorder {
    writer: Mutex<Option<Writer>>,
    sample_rate: u32,
    channels: u16,
}

impl WavRecorder {
    /// Create a new recording, replacing any file at `path`.
    pub fn create(path: &Path, sample_rate: u32, channels: u16) -> Result<Self, WavError> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(path, spec).map_err(|source| WavError::Create {
            path: path.to_path_buf(),
            source,
        })?;
        info!("recording to {} at {} Hz", path.display(), sample_rate);
        Ok(Self {
            writer: Mutex::new(Some(writer)),
            sample_rate,
            channels,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn is_open(&self) -> bool {
        self.writer.lock().expect("recorder mutex poisoned").is_some()
    }

    /// Append interleaved S16 samples.  No-op once closed.
    pub fn write(&self, samples: &[i16]) {
        let mut guard = self.writer.lock().expect("recorder mutex poisoned");
        if let Some(writer) = guard.as_mut() {
            for &s in samples {
                if let Err(e) = writer.write_sample(s) {
                    warn!("recorder write failed, dropping samples: {e}");
                    return;
                }
            }
        }
    }

    /// Finalise the header and close the file.  Safe to call repeatedly.
    pub fn close(&self) {
        let mut guard = self.writer.lock().expect("recorder mutex poisoned");
        if let Some(writer) = guard.take() {
            if let Err(e) = writer.finalize() {
                warn!("recorder finalise failed: {e}");
            }
        }
    }
}

impl Drop for WavRecorder {
    fn drop(&mut self) {
        self.close();
    }
}
