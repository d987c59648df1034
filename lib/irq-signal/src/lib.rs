// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A word of pending notification bits, posted from interrupt context and
//! consumed from thread context.
//!
//! Posting is a `fetch_or` with release ordering, so anything the handler
//! wrote before posting is visible to whoever takes the bits. Taking swaps
//! the word to zero in one step; two consumers can never both observe the
//! same bit, and a bit posted between a check and a clear is never lost.

#![cfg_attr(target_os = "none", no_std)]

use core::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug, Default)]
pub struct Signal {
    bits: AtomicU32,
}

impl Signal {
    pub const fn new() -> Self {
        Self {
            bits: AtomicU32::new(0),
        }
    }

    /// Marks `mask` pending. Posting a bit that is already pending has no
    /// further effect.
    pub fn post(&self, mask: u32) {
        if mask != 0 {
            self.bits.fetch_or(mask, Ordering::Release);
        }
    }

    /// Returns every pending bit and clears them.
    pub fn take(&self) -> u32 {
        self.bits.swap(0, Ordering::Acquire)
    }

    /// Returns and clears only the pending bits in `mask`, leaving the rest.
    pub fn take_masked(&self, mask: u32) -> u32 {
        self.bits.fetch_and(!mask, Ordering::Acquire) & mask
    }

    /// Returns the pending bits without consuming them.
    pub fn peek(&self) -> u32 {
        self.bits.load(Ordering::Acquire)
    }

    /// Spins until at least one bit is pending, then takes them all.
    ///
    /// `relax` is called between polls; pass `coherence::wfe` on a bare core
    /// or a yield on an RTOS.
    pub fn wait(&self, mut relax: impl FnMut()) -> u32 {
        loop {
            let bits = self.take();
            if bits != 0 {
                return bits;
            }
            relax();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn post_accumulates_and_take_clears() {
        let s = Signal::new();
        s.post(0b001);
        s.post(0b100);
        s.post(0b001);
        assert_eq!(s.peek(), 0b101);
        assert_eq!(s.take(), 0b101);
        assert_eq!(s.take(), 0);
    }

    #[test]
    fn take_masked_leaves_other_bits() {
        let s = Signal::new();
        s.post(0b1110);
        assert_eq!(s.take_masked(0b0011), 0b0010);
        assert_eq!(s.peek(), 0b1100);
    }

    #[test]
    fn wait_returns_bits_from_another_thread() {
        let s = Arc::new(Signal::new());
        let poster = {
            let s = Arc::clone(&s);
            std::thread::spawn(move || s.post(1 << 5))
        };
        let got = s.wait(std::thread::yield_now);
        poster.join().unwrap();
        assert_eq!(got, 1 << 5);
        assert_eq!(s.peek(), 0);
    }

    #[test]
    fn concurrent_posts_are_all_seen() {
        let s = Arc::new(Signal::new());
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let s = Arc::clone(&s);
                std::thread::spawn(move || s.post(1 << n))
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(s.take(), 0xFF);
    }
}
