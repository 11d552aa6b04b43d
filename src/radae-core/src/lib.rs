// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Real-time transceiver core for the RADAE narrow-band digital voice mode.
//!
//! The receive pipeline takes an 8 kHz real audio stream carrying the
//! ~1.3 kHz-wide OFDM waveform, converts it to an analytic IQ stream, runs
//! the neural receiver and synthesises 16 kHz speech.  The transmit pipeline
//! extracts LPCNet features from 16 kHz microphone audio, runs the neural
//! transmitter and drives a radio's audio input with the real part of the
//! 8 kHz complex baseband.
//!
//! The neural codec itself (RADE, LPCNet, FARGAN) is an external
//! collaborator reached through the capability traits in [`codec`]; the
//! `radae-rade` crate implements them over the upstream C library.

pub mod audio;
pub mod callsign;
pub mod codec;
pub mod config;
pub mod decoder;
pub mod dsp;
pub mod encoder;
pub mod error;
pub mod recorder;
pub mod telemetry;
pub mod wav;

pub use codec::{FS_MODEM, FS_SPEECH};
pub use decoder::{RadaeDecoder, RxCodec};
pub use encoder::{RadaeEncoder, TxCodec};
pub use error::{AudioError, PipelineError, WavError};
pub use recorder::WavRecorder;
