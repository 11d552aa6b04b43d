// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::path::PathBuf;

use thiserror::Error;

/// Audio transport failures.
///
/// [`AudioError::Aborted`] is returned by a blocking read that was unblocked
/// by the controller's abort handle; the worker treats it as a shutdown
/// signal rather than a device fault.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio stream closed")]
    Closed,
    #[error("audio read aborted")]
    Aborted,
    #[error("audio device error: {0}")]
    Device(String),
}

/// WAV file parsing and writing failures.
#[derive(Debug, Error)]
pub enum WavError {
    #[error("not a RIFF/WAVE file")]
    BadHeader,
    #[error("missing '{0}' chunk")]
    MissingChunk(&'static str),
    #[error("unsupported sample format: {bits}-bit (float: {is_float})")]
    UnsupportedFormat { bits: u16, is_float: bool },
    #[error("empty audio data")]
    Empty,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("cannot create '{}': {source}", path.display())]
    Create {
        path: PathBuf,
        source: hound::Error,
    },
}

/// Pipeline lifecycle failures surfaced by the controllers.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline is not open")]
    NotOpen,
    #[error("codec initialisation failed: {0}")]
    Codec(String),
    #[error("worker thread spawn failed: {0}")]
    Spawn(#[from] std::io::Error),
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error(transparent)]
    Wav(#[from] WavError),
}
