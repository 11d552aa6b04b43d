// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Lock-free telemetry primitives shared between a pipeline worker and the
//! polling UI thread.

use std::sync::atomic::{AtomicU32, Ordering};

/// An `f32` published with relaxed ordering through an [`AtomicU32`].
///
/// Consumers may observe values a few milliseconds stale and must not
/// assume consistency between distinct fields; no value is ever torn.
#[derive(Debug, Default)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_values() {
        let a = AtomicF32::new(0.0);
        assert_eq!(a.load(), 0.0);
        a.store(-3.25);
        assert_eq!(a.load(), -3.25);
        a.store(f32::MIN_POSITIVE);
        assert_eq!(a.load(), f32::MIN_POSITIVE);
    }
}
