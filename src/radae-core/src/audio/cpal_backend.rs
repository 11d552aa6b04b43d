// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Blocking capture/playback streams over cpal.
//!
//! cpal delivers audio through callbacks and its `Stream` handle is not
//! `Send`, so each stream lives on a dedicated backend thread and the
//! blocking [`AudioStream`] façade talks to it through a bounded channel
//! (capture) or a ring buffer with a condition variable (playback).  The
//! bounded capture channel doubles as the `fragsize` override: data arrives
//! in `frames_per_buffer`-sized chunks instead of multi-second fragments.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, TrySendError};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info, warn};

use super::{AbortHandle, AudioStream, ReadStatus};
use crate::error::AudioError;

const CHANNEL_CHUNKS: usize = 32;
const WAKE_INTERVAL: Duration = Duration::from_millis(50);

fn find_device(
    host: &cpal::Host,
    name: Option<&str>,
    input: bool,
) -> Result<cpal::Device, AudioError> {
    match name {
        Some(wanted) => {
            let mut devices = if input {
                host.input_devices()
            } else {
                host.output_devices()
            }
            .map_err(|e| AudioError::Device(e.to_string()))?;
            devices
                .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
                .ok_or_else(|| AudioError::Device(format!("audio device '{wanted}' not found")))
        }
        None => {
            let device = if input {
                host.default_input_device()
            } else {
                host.default_output_device()
            };
            device.ok_or_else(|| AudioError::Device("no default audio device".into()))
        }
    }
}

/// Blocking mono S16 capture stream.
pub struct CpalCapture {
    sample_rate: u32,
    rx: mpsc::Receiver<Vec<i16>>,
    pending: VecDeque<i16>,
    overflow: Arc<AtomicBool>,
    aborted: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CpalCapture {
    pub fn open(
        device_name: Option<&str>,
        sample_rate: u32,
        frames_per_buffer: usize,
    ) -> Result<Self, AudioError> {
        let (tx, rx) = mpsc::sync_channel::<Vec<i16>>(CHANNEL_CHUNKS);
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), AudioError>>();
        let overflow = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(AtomicBool::new(false));

        let name = device_name.map(str::to_owned);
        let overflow_cb = Arc::clone(&overflow);
        let stop_thread = Arc::clone(&stop);

        let thread = std::thread::Builder::new()
            .name("radae-capture".into())
            .spawn(move || {
                let host = cpal::default_host();
                let device = match find_device(&host, name.as_deref(), true) {
                    Ok(d) => d,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                info!(
                    "capture device '{}' at {} Hz",
                    device.name().unwrap_or_else(|_| "unknown".into()),
                    sample_rate
                );

                let config = cpal::StreamConfig {
                    channels: 1,
                    sample_rate: cpal::SampleRate(sample_rate),
                    buffer_size: cpal::BufferSize::Default,
                };

                let mut chunk: Vec<i16> = Vec::with_capacity(frames_per_buffer);
                let stream = device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        for &s in data {
                            let v = (s.clamp(-1.0, 1.0) * 32767.0) as i16;
                            chunk.push(v);
                            if chunk.len() >= frames_per_buffer {
                                match tx.try_send(std::mem::take(&mut chunk)) {
                                    Ok(()) => {}
                                    Err(TrySendError::Full(_)) => {
                                        overflow_cb.store(true, Ordering::Relaxed);
                                    }
                                    Err(TrySendError::Disconnected(_)) => return,
                                }
                            }
                        }
                    },
                    |err| error!("capture stream error: {err}"),
                    None,
                );
                let stream = match stream {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = ready_tx.send(Err(AudioError::Device(e.to_string())));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(AudioError::Device(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                while !stop_thread.load(Ordering::Relaxed) {
                    std::thread::sleep(WAKE_INTERVAL);
                }
                // Stream drops here, ending the callbacks.
            })
            .map_err(|e| AudioError::Device(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                sample_rate,
                rx,
                pending: VecDeque::new(),
                overflow,
                aborted: Arc::new(AtomicBool::new(false)),
                stop,
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(AudioError::Device("capture backend thread died".into()))
            }
        }
    }
}

impl AudioStream for CpalCapture {
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
            match self.rx.recv_timeout(WAKE_INTERVAL) {
                Ok(chunk) => self.pending.extend(chunk),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Err(AudioError::Closed),
            }
        }
        if self.overflow.swap(false, Ordering::Relaxed) {
            warn!("capture overflow, samples dropped");
            Ok(ReadStatus::Overflow)
        } else {
            Ok(ReadStatus::Ok)
        }
    }

    fn write(&mut self, _buf: &[i16]) -> Result<(), AudioError> {
        Err(AudioError::Device("capture stream is read-only".into()))
    }

    fn start(&mut self) {
        self.aborted.store(false, Ordering::Relaxed);
    }

    fn stop(&mut self) {
        self.pending.clear();
        while self.rx.try_recv().is_ok() {}
    }

    fn abort_handle(&self) -> AbortHandle {
        let aborted = Arc::clone(&self.aborted);
        AbortHandle::new(move || aborted.store(true, Ordering::Relaxed))
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}

struct PlaybackRing {
    ring: Mutex<VecDeque<i16>>,
    cond: Condvar,
    shutdown: AtomicBool,
}

/// Blocking mono S16 playback stream.
pub struct CpalPlayback {
    sample_rate: u32,
    high_water: usize,
    shared: Arc<PlaybackRing>,
    thread: Option<JoinHandle<()>>,
}

impl CpalPlayback {
    pub fn open(
        device_name: Option<&str>,
        sample_rate: u32,
        frames_per_buffer: usize,
    ) -> Result<Self, AudioError> {
        let shared = Arc::new(PlaybackRing {
            ring: Mutex::new(VecDeque::new()),
            cond: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), AudioError>>();

        let name = device_name.map(str::to_owned);
        let shared_thread = Arc::clone(&shared);

        let thread = std::thread::Builder::new()
            .name("radae-playback".into())
            .spawn(move || {
                let host = cpal::default_host();
                let device = match find_device(&host, name.as_deref(), false) {
                    Ok(d) => d,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                info!(
                    "playback device '{}' at {} Hz",
                    device.name().unwrap_or_else(|_| "unknown".into()),
                    sample_rate
                );

                let config = cpal::StreamConfig {
                    channels: 1,
                    sample_rate: cpal::SampleRate(sample_rate),
                    buffer_size: cpal::BufferSize::Default,
                };

                let cb_shared = Arc::clone(&shared_thread);
                let stream = device.build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let mut ring = cb_shared.ring.lock().expect("playback ring poisoned");
                        for out in data.iter_mut() {
                            *out = ring
                                .pop_front()
                                .map(|s| f32::from(s) / 32768.0)
                                .unwrap_or(0.0);
                        }
                        cb_shared.cond.notify_all();
                    },
                    |err| error!("playback stream error: {err}"),
                    None,
                );
                let stream = match stream {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = ready_tx.send(Err(AudioError::Device(e.to_string())));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(AudioError::Device(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                while !shared_thread.shutdown.load(Ordering::Relaxed) {
                    std::thread::sleep(WAKE_INTERVAL);
                }
            })
            .map_err(|e| AudioError::Device(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                sample_rate,
                // Enough queued audio to ride out the codec's bursty writes
                // without letting latency grow unbounded.
                high_water: frames_per_buffer.max(256) * 16,
                shared,
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(AudioError::Device("playback backend thread died".into()))
            }
        }
    }
}

impl AudioStream for CpalPlayback {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, _buf: &mut [i16]) -> Result<ReadStatus, AudioError> {
        Err(AudioError::Device("playback stream is write-only".into()))
    }

    fn write(&mut self, buf: &[i16]) -> Result<(), AudioError> {
        let mut ring = self.shared.ring.lock().expect("playback ring poisoned");
        while ring.len() > self.high_water {
            if self.shared.shutdown.load(Ordering::Relaxed) {
                return Err(AudioError::Closed);
            }
            let (guard, _) = self
                .shared
                .cond
                .wait_timeout(ring, WAKE_INTERVAL)
                .expect("playback ring poisoned");
            ring = guard;
        }
        ring.extend(buf.iter().copied());
        Ok(())
    }

    fn stop(&mut self) {
        self.shared
            .ring
            .lock()
            .expect("playback ring poisoned")
            .clear();
    }

    fn drain(&mut self) {
        let mut ring = self.shared.ring.lock().expect("playback ring poisoned");
        while !ring.is_empty() {
            if self.shared.shutdown.load(Ordering::Relaxed) {
                return;
            }
            let (guard, _) = self
                .shared
                .cond
                .wait_timeout(ring, WAKE_INTERVAL)
                .expect("playback ring poisoned");
            ring = guard;
        }
    }
}

impl Drop for CpalPlayback {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Relaxed);
        self.shared.cond.notify_all();
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}
