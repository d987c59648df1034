// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! AArch64 (Cortex-A35 cluster) cache and barrier operations.
//!
//! Maintenance is by virtual address to the point of coherency, one line at
//! a time. The line size comes from `CTR_EL0.DminLine` so we don't bake in a
//! particular core's geometry.

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

fn dcache_line() -> usize {
    let ctr: u64;
    unsafe {
        asm!(
            "mrs {}, ctr_el0",
            out(reg) ctr,
            options(nomem, nostack, preserves_flags),
        );
    }
    4 << ((ctr >> 16) & 0xF)
}

macro_rules! by_line {
    ($range:expr, $op:literal) => {{
        let line = dcache_line();
        let span = crate::line_span($range, line);
        let mut addr = span.start;
        while addr < span.end {
            unsafe {
                asm!(
                    concat!("dc ", $op, ", {}"),
                    in(reg) addr,
                    options(nostack, preserves_flags),
                );
            }
            addr += line;
        }
    }};
}

pub fn clean(range: Range<usize>) {
    by_line!(range, "cvac");
}

pub fn invalidate(range: Range<usize>) {
    by_line!(range, "ivac");
}

pub fn clean_invalidate(range: Range<usize>) {
    by_line!(range, "civac");
}
