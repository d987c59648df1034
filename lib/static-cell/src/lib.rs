// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Single-borrower cells for driver statics.
//!
//! Driver state in this workspace lives in `static`s that are touched from
//! both thread context and interrupt handlers on the same core. A `StaticCell`
//! hands out at most one mutable borrow at a time. Code that may be preempted
//! by a handler touching the same cell (the trace buffers, mostly) should use
//! [`StaticCell::try_borrow_mut`] and tolerate `None`.

#![cfg_attr(target_os = "none", no_std)]

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, Ordering};

/// A RefCell-style container that can be used in a static for cases where only
/// a single borrow needs to happen at any given time.
///
/// Only `mut` access is provided. There is no many-reader mode.
#[derive(Default)]
pub struct StaticCell<T> {
    borrowed: AtomicBool,
    cell: UnsafeCell<T>,
}

impl<T> StaticCell<T> {
    /// Creates a `StaticCell` containing `contents`.
    pub const fn new(contents: T) -> Self {
        Self {
            borrowed: AtomicBool::new(false),
            cell: UnsafeCell::new(contents),
        }
    }

    /// Gets mutable access to the contents of `self`.
    ///
    /// If a `StaticRef` for `self` still exists anywhere in the program, this
    /// will panic.
    #[track_caller]
    pub fn borrow_mut(&self) -> StaticRef<'_, T> {
        match self.try_borrow_mut() {
            Some(r) => r,
            None => panic!(),
        }
    }

    /// Gets mutable access to the contents of `self` if nobody else holds it.
    pub fn try_borrow_mut(&self) -> Option<StaticRef<'_, T>> {
        if self.borrowed.swap(true, Ordering::Acquire) {
            return None;
        }
        // Safety: the swap above ensures that we are not producing an
        // aliasing &mut to our contents.
        unsafe {
            Some(StaticRef {
                contents: &mut *self.cell.get(),
                borrow: &self.borrowed,
            })
        }
    }

    /// Returns `true` if a `StaticRef` is currently outstanding.
    pub fn is_borrowed(&self) -> bool {
        self.borrowed.load(Ordering::Relaxed)
    }
}

unsafe impl<T> Sync for StaticCell<T> where for<'a> &'a mut T: Send {}

pub struct StaticRef<'a, T> {
    contents: &'a mut T,
    borrow: &'a AtomicBool,
}

impl<T> Drop for StaticRef<'_, T> {
    fn drop(&mut self) {
        self.borrow.store(false, Ordering::Release);
    }
}

impl<T> core::ops::Deref for StaticRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &*self.contents
    }
}

impl<T> core::ops::DerefMut for StaticRef<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.contents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_borrow_is_refused() {
        let cell = StaticCell::new(5u32);
        let first = cell.try_borrow_mut();
        assert!(first.is_some());
        assert!(cell.is_borrowed());
        assert!(cell.try_borrow_mut().is_none());
        drop(first);
        assert!(!cell.is_borrowed());

        *cell.borrow_mut() += 1;
        assert_eq!(*cell.borrow_mut(), 6);
    }

    #[test]
    #[should_panic]
    fn nested_borrow_mut_panics() {
        let cell = StaticCell::new(());
        let _a = cell.borrow_mut();
        let _b = cell.borrow_mut();
    }
}
