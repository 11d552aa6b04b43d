// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Station callsign carried in the end-of-over frame.
//!
//! The LDPC/CRC symbol codec is an external collaborator behind the traits
//! below; the character policy (what a callsign may contain at all) is
//! enforced here before anything reaches the encoder.

/// Maximum callsign length in characters.
pub const CALLSIGN_MAX_CHARS: usize = 8;

/// Floats of the EOO symbol buffer that carry the LDPC-encoded payload;
/// the remainder is a fixed filler sequence known to the receiver.
pub const CALLSIGN_PAYLOAD_FLOATS: usize = 112;

/// Decode a callsign from the interleaved I/Q floats a receiver emits at
/// end-of-over.  Returns `Some` only when the internal BER estimate and
/// CRC check pass.
pub trait CallsignDecoder: Send {
    fn decode(&self, eoo_syms: &[f32]) -> Option<String>;
}

/// Encode a callsign into the first [`CALLSIGN_PAYLOAD_FLOATS`] floats of
/// an EOO symbol buffer and fill the remainder with the known filler.
pub trait CallsignEncoder: Send {
    fn encode(&self, callsign: &str, eoo_syms: &mut [f32]);
}

/// Reduce `raw` to the transmittable alphabet: uppercase `A–Z`, `0–9` and
/// the punctuation run `&'()*+,-./` (ASCII 38–47).  Unsupported characters
/// are silently dropped; the result is capped at [`CALLSIGN_MAX_CHARS`].
pub fn sanitize_callsign(raw: &str) -> String {
    raw.chars()
        .filter_map(|c| {
            let c = c.to_ascii_uppercase();
            match c {
                'A'..='Z' | '0'..='9' => Some(c),
                c if (38..=47).contains(&(c as u32)) => Some(c),
                _ => None,
            }
        })
        .take(CALLSIGN_MAX_CHARS)
        .collect()
}
