// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cache maintenance and barriers for memory shared between cores.
//!
//! The application cluster and the real-time core do not snoop each other's
//! data caches. Anything handed across through shared memory (an image being
//! loaded, a boot flag, vring contents) must be cleaned by the producer after
//! writing and invalidated by the consumer before reading. Forgetting either
//! step does not fail loudly; the other side just sees stale bytes.
//!
//! Maintenance is expressed through the [`CacheMaint`] trait so that drivers
//! can be exercised on the host against [`fake::TrackingCache`], which
//! records every operation instead of touching hardware.
//!
//! The free functions (`dsb`, `dmb`, `sev`, `wfe`) are for ordering
//! `volatile` register accesses and for the event handshake used during
//! bring-up. If you're trying to order _atomic_ accesses you want
//! `core::sync::atomic::fence` instead.

#![cfg_attr(target_os = "none", no_std)]

use core::ops::Range;

cfg_if::cfg_if! {
    if #[cfg(target_arch = "aarch64")] {
        mod aarch64;
        use aarch64 as arch;
    } else if #[cfg(all(target_arch = "arm", target_feature = "mclass"))] {
        mod arm_m;
        use arm_m as arch;
    } else if #[cfg(target_arch = "arm")] {
        mod arm_a;
        use arm_a as arch;
    } else {
        mod host;
        use host as arch;
    }
}

#[cfg(not(target_os = "none"))]
pub mod fake;

/// Data synchronization barrier: every memory access before it completes
/// before any instruction after it executes.
#[inline(always)]
pub fn dsb() {
    arch::dsb();
}

/// Data memory barrier: orders memory accesses on either side of it.
#[inline(always)]
pub fn dmb() {
    arch::dmb();
}

/// Signals an event to every core, waking any that sit in `wfe`.
#[inline(always)]
pub fn sev() {
    arch::sev();
}

/// Waits for an event (or returns immediately if one is already latched).
#[inline(always)]
pub fn wfe() {
    arch::wfe();
}

/// Data cache maintenance over a range of addresses.
///
/// Ranges need not be line-aligned. Implementations widen them to whole
/// cache lines, which means neighbouring bytes sharing the first and last
/// line are affected too; keep shared buffers line-aligned to avoid surprises
/// from `invalidate`.
pub trait CacheMaint {
    /// Writes dirty lines covering `range` back to memory.
    fn clean(&self, range: Range<usize>);

    /// Discards lines covering `range` so the next read comes from memory.
    fn invalidate(&self, range: Range<usize>);

    /// Writes back and then discards lines covering `range`.
    fn clean_invalidate(&self, range: Range<usize>);

    /// Cleans the bytes backing `obj`.
    fn clean_obj<T: ?Sized>(&self, obj: &T) {
        self.clean(byte_range(obj));
    }

    /// Invalidates the bytes backing `obj`.
    fn invalidate_obj<T: ?Sized>(&self, obj: &T) {
        self.invalidate(byte_range(obj));
    }
}

impl<C: CacheMaint> CacheMaint for &C {
    fn clean(&self, range: Range<usize>) {
        (**self).clean(range)
    }

    fn invalidate(&self, range: Range<usize>) {
        (**self).invalidate(range)
    }

    fn clean_invalidate(&self, range: Range<usize>) {
        (**self).clean_invalidate(range)
    }
}

/// Returns the address range occupied by `obj`.
pub fn byte_range<T: ?Sized>(obj: &T) -> Range<usize> {
    let start = obj as *const T as *const u8 as usize;
    start..start + core::mem::size_of_val(obj)
}

/// Widens `range` to whole lines of `line` bytes. `line` must be a power of
/// two.
pub fn line_span(range: Range<usize>, line: usize) -> Range<usize> {
    let start = range.start & !(line - 1);
    let end = range.end.saturating_add(line - 1) & !(line - 1);
    start..end
}

/// The data cache of the core we are running on.
#[derive(Copy, Clone, Debug, Default)]
pub struct DataCache;

impl CacheMaint for DataCache {
    fn clean(&self, range: Range<usize>) {
        if range.is_empty() {
            return;
        }
        arch::clean(range);
        arch::dsb();
    }

    fn invalidate(&self, range: Range<usize>) {
        if range.is_empty() {
            return;
        }
        arch::invalidate(range);
        arch::dsb();
    }

    fn clean_invalidate(&self, range: Range<usize>) {
        if range.is_empty() {
            return;
        }
        arch::clean_invalidate(range);
        arch::dsb();
    }
}
