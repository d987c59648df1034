// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host stand-ins. Host memory is coherent, so only ordering matters.

use core::ops::Range;
use core::sync::atomic::{fence, Ordering};

#[inline(always)]
pub fn dsb() {
    fence(Ordering::SeqCst);
}

#[inline(always)]
pub fn dmb() {
    fence(Ordering::SeqCst);
}

#[inline(always)]
pub fn sev() {}

#[inline(always)]
pub fn wfe() {
    core::hint::spin_loop();
}

pub fn clean(_range: Range<usize>) {}

pub fn invalidate(_range: Range<usize>) {}

pub fn clean_invalidate(_range: Range<usize>) {}
