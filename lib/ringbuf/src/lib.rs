// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Trace ring buffers for the inter-core drivers.
//!
//! Each driver module declares a small static ring buffer of its own trace
//! type and deposits an entry at every interesting point: a claim, a
//! rejected unlock, an interrupt status read, a boot transition. Nothing is
//! formatted and nothing leaves the core; the buffers are read back with a
//! debugger (or by the host tests) after the fact.
//!
//! ## Constraints
//!
//! The payload type must implement both `Copy` and `PartialEq`.
//!
//! If you use the variants of the `ringbuf!` macro that leave the name of the
//! data structure implicit, you can only have one per module.
//!
//! ## Creating a ring buffer
//!
//! ```ignore
//! ringbuf!(Trace, 16, Trace::None);
//!
//! ringbuf_entry!(Trace::Claimed { channel: 3, key: 0xA5 });
//! ```
//!
//! A named buffer:
//!
//! ```ignore
//! ringbuf!(WHC_RINGBUF, Trace, 32, Trace::None);
//! ringbuf_entry!(WHC_RINGBUF, Trace::Sent(0));
//! ```
//!
//! ## Concurrency
//!
//! The same buffer may be hit from thread context and from an interrupt
//! handler that preempts it. The handler's entry would otherwise need a
//! second borrow of the buffer; instead it is dropped and counted in
//! [`DROPPED_WITHOUT_BORROW`], so the trace never takes the system down.
//!
//! ## Inspecting a ring buffer via GDB
//!
//! ```console
//! (gdb) set print pretty on
//! (gdb) print drv_hwsem::__RINGBUF
//! ```
//!
//! `last` is the index of the newest entry; `generation` tells you how many
//! times that slot has been rewritten.

#![cfg_attr(target_os = "none", no_std)]

/// Re-export the bits we use from `static_cell` so that code generated by the
/// macros is guaranteed to be able to find them.
pub use static_cell::StaticCell;

/// Declares a ringbuffer in the current module or context.
///
/// `ringbuf!(NAME, Type, N, expr)` makes a ringbuffer named `NAME`,
/// containing entries of type `Type`, with room for `N` such entries, all of
/// which are initialized to `expr`.
///
/// The actual type of `NAME` will be `StaticCell<Ringbuf<T, N>>`.
///
/// If you omit the name, it will default to `__RINGBUF`.
#[cfg(not(feature = "disabled"))]
#[macro_export]
macro_rules! ringbuf {
    ($name:ident, $t:ty, $n:expr, $init:expr) => {
        #[used]
        static $name: $crate::StaticCell<$crate::Ringbuf<$t, $n>> =
            $crate::StaticCell::new($crate::Ringbuf {
                last: None,
                buffer: [$crate::RingbufEntry {
                    line: 0,
                    generation: 0,
                    count: 0,
                    payload: $init,
                }; $n],
            });
    };
    ($t:ty, $n:expr, $init:expr) => {
        $crate::ringbuf!(__RINGBUF, $t, $n, $init);
    };
}

#[cfg(feature = "disabled")]
#[macro_export]
macro_rules! ringbuf {
    ($name:ident, $t:ty, $n:expr, $init:expr) => {
        #[allow(dead_code)]
        const _: $t = $init;
    };
    ($t:ty, $n:expr, $init:expr) => {
        #[allow(dead_code)]
        const _: $t = $init;
    };
}

/// Inserts data into a named ringbuffer (which should have been declared with
/// the `ringbuf!` macro).
///
/// `ringbuf_entry!(NAME, expr)` will insert `expr` into the ringbuffer called
/// `NAME`. Without a name it defaults to `__RINGBUF`.
#[cfg(not(feature = "disabled"))]
#[macro_export]
macro_rules! ringbuf_entry {
    ($buf:expr, $payload:expr) => {{
        // Evaluate both buf and payload, without letting them access each
        // other, by evaluating them in a tuple where each cannot
        // accidentally use the other's binding.
        let (p, buf) = ($payload, &$buf);
        $crate::record(buf, line!() as u16, p);
    }};
    ($payload:expr) => {
        $crate::ringbuf_entry!(__RINGBUF, $payload);
    };
}

#[cfg(feature = "disabled")]
#[macro_export]
macro_rules! ringbuf_entry {
    ($buf:expr, $payload:expr) => {{
        let _ = &$payload;
    }};
    ($payload:expr) => {{
        let _ = &$payload;
    }};
}

/// Inserts data into a ringbuffer at the root of this crate.
#[cfg(not(feature = "disabled"))]
#[allow(clippy::crate_in_macro_def)]
#[macro_export]
macro_rules! ringbuf_entry_root {
    ($buf:ident, $payload:expr) => {
        $crate::ringbuf_entry!(crate::$buf, $payload);
    };
    ($payload:expr) => {
        $crate::ringbuf_entry!(crate::__RINGBUF, $payload);
    };
}

#[cfg(feature = "disabled")]
#[macro_export]
macro_rules! ringbuf_entry_root {
    ($buf:ident, $payload:expr) => {{
        let _ = &$payload;
    }};
    ($payload:expr) => {{
        let _ = &$payload;
    }};
}

/// The structure of a single [`Ringbuf`] entry. When an entry is generated
/// with an identical payload to the most recent entry (in terms of both
/// `line` and `payload`), `count` is incremented rather than generating a new
/// entry.
#[derive(Debug, Copy, Clone)]
pub struct RingbufEntry<T: Copy + PartialEq> {
    pub line: u16,
    pub generation: u16,
    pub count: u32,
    pub payload: T,
}

/// A ring buffer of parametrized type and size. In practice, instantiating
/// this directly is strange -- see the [`ringbuf!`] macro.
#[derive(Debug)]
pub struct Ringbuf<T: Copy + PartialEq, const N: usize> {
    pub last: Option<usize>,
    pub buffer: [RingbufEntry<T>; N],
}

/// Records `payload` into `buf`, or counts it as dropped if the buffer is
/// borrowed by a context we preempted.
#[doc(hidden)]
pub fn record<T: Copy + PartialEq, const N: usize>(
    buf: &StaticCell<Ringbuf<T, N>>,
    line: u16,
    payload: T,
) {
    if let Some(mut rb) = buf.try_borrow_mut() {
        rb.entry(line, payload);
    } else {
        DROPPED_WITHOUT_BORROW
            .fetch_add(1, core::sync::atomic::Ordering::Relaxed);
    }
}

/// Entries lost across all ring buffers because the buffer was borrowed at
/// the time.
pub static DROPPED_WITHOUT_BORROW: core::sync::atomic::AtomicU32 =
    core::sync::atomic::AtomicU32::new(0);

impl<T: Copy + PartialEq, const N: usize> Ringbuf<T, { N }> {
    pub fn entry(&mut self, line: u16, payload: T) {
        // The first insertion finds `last` at None; treating that as an
        // out-of-range index makes it land in slot 0 without reusing anything.
        let last = self.last.unwrap_or(usize::MAX);

        if let Some(ent) = self.buffer.get_mut(last) {
            if ent.line == line && ent.payload == payload {
                // Only reuse this entry if we don't overflow the count.
                if let Some(new_count) = ent.count.checked_add(1) {
                    ent.count = new_count;
                    return;
                }
            }
        }

        // Not a remainder: this form also turns usize::MAX into 0.
        let ndx = {
            let last_plus_1 = last.wrapping_add(1);
            if last_plus_1 >= self.buffer.len() {
                0
            } else {
                last_plus_1
            }
        };

        let ent = &mut self.buffer[ndx];
        *ent = RingbufEntry {
            line,
            payload,
            count: 1,
            generation: ent.generation.wrapping_add(1),
        };

        self.last = Some(ndx);
    }

    /// Iterates over recorded entries from newest to oldest, skipping slots
    /// that have never been written.
    pub fn iter_recent(&self) -> impl Iterator<Item = &RingbufEntry<T>> {
        let start = self.last.map(|l| l + 1).unwrap_or(0);
        let (through_last, after_last) = self.buffer.split_at(start.min(N));
        after_last
            .iter()
            .chain(through_last.iter())
            .rev()
            .filter(|e| e.generation != 0)
    }
}
