// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Safe wrappers over the RADE neural codec C API.
//!
//! Implements the `radae-core` codec capability traits on top of
//! `librade`, the LPCNet feature extractor and the FARGAN vocoder.  The
//! whole surface is gated behind the `librade` feature; without it this
//! crate is empty and the workspace builds with no codec installed.

#[cfg(feature = "librade")]
mod ffi;

#[cfg(feature = "librade")]
pub use ffi::{Fargan, LpcnetEncoder, Rade, RadeBpf};
