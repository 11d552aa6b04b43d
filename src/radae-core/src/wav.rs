// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Minimal RIFF/WAVE reader for the file-playback RX mode.
//!
//! Hand-parsed rather than delegated to `hound` because the file mode
//! accepts 64-bit-float data, which `hound` does not read.  Supported
//! formats: PCM 16/24/32-bit and IEEE float 32/64-bit, any channel count
//! (averaged to mono), any rate (resampled to 8 kHz in one pass).

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::codec::FS_MODEM;
use crate::dsp::resample_batch;
use crate::error::WavError;

const WAV_FMT_PCM: u16 = 1;
const WAV_FMT_FLOAT: u16 = 3;

#[derive(Debug, Clone, Copy)]
struct WavFormat {
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
    is_float: bool,
}

fn read_exact_or_header_err(r: &mut impl Read, buf: &mut [u8]) -> Result<(), WavError> {
    r.read_exact(buf).map_err(|_| WavError::BadHeader)
}

fn read_u32le(r: &mut impl Read) -> Result<u32, WavError> {
    let mut b = [0u8; 4];
    read_exact_or_header_err(r, &mut b)?;
    Ok(u32::from_le_bytes(b))
}

fn skip(r: &mut impl Read, n: u64) -> Result<(), WavError> {
    std::io::copy(&mut r.by_ref().take(n), &mut std::io::sink())?;
    Ok(())
}

/// Decode a WAV stream to mono f32 at its native rate.
///
/// Chunks may appear in any order; unknown chunks are skipped with 2-byte
/// alignment.  Parsing stops at the `data` chunk.
pub fn read_wav_mono(r: &mut impl Read) -> Result<(Vec<f32>, u32), WavError> {
    let mut tag = [0u8; 4];
    read_exact_or_header_err(r, &mut tag)?;
    if &tag != b"RIFF" {
        return Err(WavError::BadHeader);
    }
    let _riff_size = read_u32le(r)?;
    read_exact_or_header_err(r, &mut tag)?;
    if &tag != b"WAVE" {
        return Err(WavError::BadHeader);
    }

    let mut format: Option<WavFormat> = None;

    loop {
        let mut chunk_id = [0u8; 4];
        if r.read_exact(&mut chunk_id).is_err() {
            // Ran off the end without a data chunk.
            return Err(WavError::MissingChunk("data"));
        }
        let chunk_size = read_u32le(r)?;

        match &chunk_id {
            b"fmt " => {
                if chunk_size < 16 {
                    return Err(WavError::BadHeader);
                }
                let mut buf = [0u8; 16];
                read_exact_or_header_err(r, &mut buf)?;
                let audio_fmt = u16::from_le_bytes([buf[0], buf[1]]);
                let channels = u16::from_le_bytes([buf[2], buf[3]]);
                let sample_rate = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
                let bits = u16::from_le_bytes([buf[14], buf[15]]);
                format = Some(WavFormat {
                    sample_rate,
                    channels,
                    bits_per_sample: bits,
                    is_float: audio_fmt == WAV_FMT_FLOAT,
                });
                skip(r, u64::from(chunk_size) - 16)?;
            }
            b"data" => {
                let fmt = format.ok_or(WavError::MissingChunk("fmt "))?;
                let samples = decode_data(r, fmt, chunk_size)?;
                if samples.is_empty() {
                    return Err(WavError::Empty);
                }
                return Ok((samples, fmt.sample_rate));
            }
            _ => {
                skip(r, (u64::from(chunk_size) + 1) & !1)?;
            }
        }
    }
}

fn decode_data(r: &mut impl Read, fmt: WavFormat, data_size: u32) -> Result<Vec<f32>, WavError> {
    let bytes_per_sample = match (fmt.is_float, fmt.bits_per_sample) {
        (false, 16) => 2,
        (false, 24) => 3,
        (false, 32) => 4,
        (true, 32) => 4,
        (true, 64) => 8,
        _ => {
            return Err(WavError::UnsupportedFormat {
                bits: fmt.bits_per_sample,
                is_float: fmt.is_float,
            })
        }
    };

    let channels = fmt.channels.max(1) as usize;
    let total = data_size as usize / bytes_per_sample;
    let frames = total / channels;

    let mut data = vec![0u8; frames * channels * bytes_per_sample];
    r.read_exact(&mut data)?;

    let mut mono = Vec::with_capacity(frames);
    let mut cursor = data.chunks_exact(bytes_per_sample);
    for _ in 0..frames {
        let mut sum = 0.0f32;
        for _ in 0..channels {
            let b = cursor.next().expect("frame count precomputed");
            sum += match (fmt.is_float, fmt.bits_per_sample) {
                (false, 16) => f32::from(i16::from_le_bytes([b[0], b[1]])) / 32768.0,
                (false, 24) => {
                    let mut raw =
                        (i32::from(b[2]) << 16) | (i32::from(b[1]) << 8) | i32::from(b[0]);
                    if raw & 0x0080_0000 != 0 {
                        raw |= -0x0100_0000; // sign-extend
                    }
                    raw as f32 / 8_388_608.0
                }
                (false, 32) => {
                    i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32 / 2_147_483_648.0
                }
                (true, 32) => f32::from_le_bytes([b[0], b[1], b[2], b[3]]),
                (true, 64) => f64::from_le_bytes([
                    b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
                ]) as f32,
                _ => unreachable!(),
            };
        }
        mono.push(sum / channels as f32);
    }
    Ok(mono)
}

/// Load a WAV file and convert it to mono f32 at the 8 kHz modem rate.
pub fn load_wav_8k(path: &Path) -> Result<Vec<f32>, WavError> {
    let mut reader = BufReader::new(File::open(path)?);
    let (mono, rate) = read_wav_mono(&mut reader)?;
    let audio = if rate == FS_MODEM {
        mono
    } else {
        resample_batch(&mono, rate, FS_MODEM)
    };
    if audio.is_empty() {
        return Err(WavError::Empty);
    }
    Ok(audio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn wav_bytes(fmt_tag: u16, channels: u16, rate: u32, bits: u16, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36u32 + data.len() as u32).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&fmt_tag.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&rate.to_le_bytes());
        let block_align = channels * bits / 8;
        out.extend_from_slice(&(rate * u32::from(block_align)).to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&bits.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
        out
    }

    #[test]
    fn reads_16_bit_pcm_mono() {
        let mut data = Vec::new();
        for s in [0i16, 16384, -16384, 32767] {
            data.extend_from_slice(&s.to_le_bytes());
        }
        let bytes = wav_bytes(WAV_FMT_PCM, 1, 8000, 16, &data);
        let (mono, rate) = read_wav_mono(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(rate, 8000);
        assert_eq!(mono.len(), 4);
        assert!((mono[1] - 0.5).abs() < 1e-6);
        assert!((mono[2] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn averages_stereo_to_mono() {
        let mut data = Vec::new();
        for s in [8192i16, 24576, -8192, -24576] {
            data.extend_from_slice(&s.to_le_bytes());
        }
        let bytes = wav_bytes(WAV_FMT_PCM, 2, 8000, 16, &data);
        let (mono, _) = read_wav_mono(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.5).abs() < 1e-6);
        assert!((mono[1] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn sign_extends_24_bit_pcm() {
        // -4194304 = 0xC00000 → -0.5 full scale
        let data = [0x00u8, 0x00, 0xC0, 0x00, 0x00, 0x40];
        let bytes = wav_bytes(WAV_FMT_PCM, 1, 8000, 24, &data);
        let (mono, _) = read_wav_mono(&mut Cursor::new(bytes)).unwrap();
        assert!((mono[0] + 0.5).abs() < 1e-6);
        assert!((mono[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn reads_float64_data() {
        let mut data = Vec::new();
        for v in [0.25f64, -0.75] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        let bytes = wav_bytes(WAV_FMT_FLOAT, 1, 16000, 64, &data);
        let (mono, rate) = read_wav_mono(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(rate, 16000);
        assert!((mono[0] - 0.25).abs() < 1e-6);
        assert!((mono[1] + 0.75).abs() < 1e-6);
    }

    #[test]
    fn skips_unknown_chunks_with_alignment() {
        let mut data = Vec::new();
        data.extend_from_slice(&1000i16.to_le_bytes());
        let inner = wav_bytes(WAV_FMT_PCM, 1, 8000, 16, &data);

        // Splice an odd-sized LIST chunk between WAVE and fmt.
        let mut bytes = inner[..12].to_vec();
        bytes.extend_from_slice(b"LIST");
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&[1, 2, 3, 0]); // padded to even
        bytes.extend_from_slice(&inner[12..]);

        let (mono, _) = read_wav_mono(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(mono.len(), 1);
    }

    #[test]
    fn rejects_garbage_and_unsupported_formats() {
        assert!(matches!(
            read_wav_mono(&mut Cursor::new(b"not a wav".to_vec())),
            Err(WavError::BadHeader)
        ));
        let bytes = wav_bytes(WAV_FMT_PCM, 1, 8000, 8, &[0x80, 0x80]);
        assert!(matches!(
            read_wav_mono(&mut Cursor::new(bytes)),
            Err(WavError::UnsupportedFormat { bits: 8, .. })
        ));
    }

    #[test]
    fn missing_data_chunk_is_reported() {
        let bytes = wav_bytes(WAV_FMT_PCM, 1, 8000, 16, &[]);
        // Truncate before the data chunk header.
        let truncated = bytes[..36].to_vec();
        assert!(matches!(
            read_wav_mono(&mut Cursor::new(truncated)),
            Err(WavError::MissingChunk("data"))
        ));
    }
}
