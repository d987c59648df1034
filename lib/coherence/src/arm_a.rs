// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ARMv7-A (AArch32 state on the application cluster) cache and barrier
//! operations, through the CP15 maintenance-by-MVA registers.

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
    let ctr: u32;
    unsafe {
        asm!(
            "mrc p15, 0, {}, c0, c0, 1",
            out(reg) ctr,
            options(nomem, nostack, preserves_flags),
        );
    }
    4 << ((ctr >> 16) & 0xF)
}

// DCCMVAC = c7,c10,1; DCIMVAC = c7,c6,1; DCCIMVAC = c7,c14,1
macro_rules! by_line {
    ($range:expr, $crm:literal) => {{
        let line = dcache_line();
        let span = crate::line_span($range, line);
        let mut addr = span.start;
        while addr < span.end {
            unsafe {
                asm!(
                    concat!("mcr p15, 0, {}, c7, ", $crm, ", 1"),
                    in(reg) addr,
                    options(nostack, preserves_flags),
                );
            }
            addr += line;
        }
    }};
}

pub fn clean(range: Range<usize>) {
    by_line!(range, "c10");
}

pub fn invalidate(range: Range<usize>) {
    by_line!(range, "c6");
}

pub fn clean_invalidate(range: Range<usize>) {
    by_line!(range, "c14");
}
