// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cortex-M4 (the real-time core) operations.
//!
//! The M4 has no data cache, so maintenance reduces to making sure our
//! stores have left the write buffer before the peer is told to look.

use core::arch::asm;
use core::ops::Range;

#[inline(always)]
pub fn dsb() {
    unsafe {
        asm!("dsb sy", options(nostack, preserves_flags));
    }
    core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
}

#[inline(always)]
pub fn dmb() {
    unsafe {
        asm!("dmb sy", options(nostack, preserves_flags));
    }
    core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
}

#[inline(always)]
pub fn sev() {
    unsafe {
        asm!("sev", options(nomem, nostack, preserves_flags));
    }
}

#[inline(always)]
pub fn wfe() {
    unsafe {
        asm!("wfe", options(nomem, nostack, preserves_flags));
    }
}

pub fn clean(_range: Range<usize>) {}

pub fn invalidate(_range: Range<usize>) {}

pub fn clean_invalidate(_range: Range<usize>) {}
