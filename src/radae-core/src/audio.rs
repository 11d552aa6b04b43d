// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Blocking mono S16 audio transport abstraction.
//!
//! The pipelines only ever need a callback-free blocking read/write pair;
//! which backend provides it is interchangeable.  [`BufferSource`] and
//! [`BufferSink`] are the in-memory transports used by tests and
//! file-driven flows; the `cpal-backend` feature adds real capture and
//! playback devices.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::AudioError;

#[cfg(feature = "cpal-backend")]
pub mod cpal_backend;

/// Outcome of a successful blocking read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    Ok,
    /// The backend dropped samples before this read; the delivered buffer
    /// is still valid.  Non-fatal.
    Overflow,
}

/// A blocking mono S16 stream, one direction per instance.
///
/// `read` fills the whole buffer or fails; `write` accepts the whole buffer
/// or fails.  Backpressure comes from the device: a full playback buffer
/// blocks `write`, an empty capture buffer blocks `read`.
pub trait AudioStream: Send {
    fn sample_rate(&self) -> u32;

    fn read(&mut self, buf: &mut [i16]) -> Result<ReadStatus, AudioError>;

    fn write(&mut self, buf: &[i16]) -> Result<(), AudioError>;

    /// Restart a stopped stream.  Default no-op (PulseAudio-style backends
    /// resume on the next read/write).
    fn start(&mut self) {}

    /// Stop and discard buffered data.  Default no-op.
    fn stop(&mut self) {}

    /// Re-sync the transport after a transient I/O failure (the ALSA
    /// `snd_pcm_recover` shape).  Default no-op.
    fn recover(&mut self) {}

    /// Block until pending playback data has been played out.
    fn drain(&mut self) {}

    /// Handle that unblocks a pending `read` from another thread.
    fn abort_handle(&self) -> AbortHandle {
        AbortHandle::noop()
    }
}

/// Cancellation handle for a blocking capture read.
#[derive(Clone)]
pub struct AbortHandle(Arc<dyn Fn() + Send + Sync>);

impl AbortHandle {
    pub fn new(f: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn noop() -> Self {
        Self(Arc::new(|| {}))
    }

    pub fn abort(&self) {
        (self.0)();
    }
}

/// What a [`BufferSource`] does once its samples run out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndBehavior {
    /// Keep delivering zero frames forever.
    Silence,
    /// Fail the read with [`AudioError::Closed`].
    Stop,
}

/// Capture stream backed by a prefilled buffer.
pub struct BufferSource {
    samples: Vec<i16>,
    pos: usize,
    sample_rate: u32,
    end: EndBehavior,
    aborted: Arc<AtomicBool>,
}

impl BufferSource {
    pub fn new(samples: Vec<i16>, sample_rate: u32, end: EndBehavior) -> Self {
        Self {
            samples,
            pos: 0,
            sample_rate,
            end,
            aborted: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl AudioStream for BufferSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, buf: &mut [i16]) -> Result<ReadStatus, AudioError> {
        if self.aborted.load(Ordering::Relaxed) {
            return Err(AudioError::Aborted);
        }

        let available = self.samples.len() - self.pos;
        if available == 0 && self.end == EndBehavior::Stop {
            return Err(AudioError::Closed);
        }

        let n = available.min(buf.len());
        buf[..n].copy_from_slice(&self.samples[self.pos..self.pos + n]);
        buf[n..].fill(0);
        self.pos += n;
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

/// Playback stream collecting everything written into a shared buffer.
pub struct BufferSink {
    data: Arc<Mutex<Vec<i16>>>,
    sample_rate: u32,
}

impl BufferSink {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            data: Arc::new(Mutex::new(Vec::new())),
            sample_rate,
        }
    }

    /// Shared handle to the collected samples.
    pub fn collected(&self) -> Arc<Mutex<Vec<i16>>> {
        Arc::clone(&self.data)
    }
}

impl AudioStream for BufferSink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, _buf: &mut [i16]) -> Result<ReadStatus, AudioError> {
        Err(AudioError::Device("playback stream is write-only".into()))
    }

    fn write(&mut self, buf: &[i16]) -> Result<(), AudioError> {
        self.data
            .lock()
            .expect("sink mutex poisoned")
            .extend_from_slice(buf);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_source_delivers_then_pads_with_silence() {
        let mut src = BufferSource::new(vec![1, 2, 3], 8000, EndBehavior::Silence);
        let mut buf = [9i16; 5];
        assert!(matches!(src.read(&mut buf), Ok(ReadStatus::Ok)));
        assert_eq!(buf, [1, 2, 3, 0, 0]);
        assert!(matches!(src.read(&mut buf), Ok(ReadStatus::Ok)));
        assert_eq!(buf, [0; 5]);
    }

    #[test]
    fn buffer_source_stop_behaviour_fails_after_exhaustion() {
        let mut src = BufferSource::new(vec![1, 2], 8000, EndBehavior::Stop);
        let mut buf = [0i16; 2];
        assert!(src.read(&mut buf).is_ok());
        assert!(matches!(src.read(&mut buf), Err(AudioError::Closed)));
    }

    #[test]
    fn abort_unblocks_reads() {
        let mut src = BufferSource::new(vec![0; 1024], 8000, EndBehavior::Silence);
        let abort = src.abort_handle();
        abort.abort();
        let mut buf = [0i16; 16];
        assert!(matches!(src.read(&mut buf), Err(AudioError::Aborted)));
    }

    #[test]
    fn buffer_sink_collects_writes() {
        let mut sink = BufferSink::new(8000);
        let collected = sink.collected();
        sink.write(&[1, 2]).unwrap();
        sink.write(&[3]).unwrap();
        assert_eq!(*collected.lock().unwrap(), vec![1, 2, 3]);
    }
}
