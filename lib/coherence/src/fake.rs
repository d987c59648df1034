// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host-side cache model that records maintenance instead of performing it.

use std::ops::Range;
use std::sync::Mutex;

use crate::CacheMaint;

/// One recorded maintenance operation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CacheOp {
    Clean(Range<usize>),
    Invalidate(Range<usize>),
    CleanInvalidate(Range<usize>),
}

impl CacheOp {
    /// Returns the range the operation applied to.
    pub fn range(&self) -> &Range<usize> {
        match self {
            CacheOp::Clean(r)
            | CacheOp::Invalidate(r)
            | CacheOp::CleanInvalidate(r) => r,
        }
    }

    /// Returns `true` if the operation wrote dirty data back to memory.
    pub fn writes_back(&self) -> bool {
        matches!(self, CacheOp::Clean(_) | CacheOp::CleanInvalidate(_))
    }

    /// Returns `true` if the operation discarded cached data.
    pub fn discards(&self) -> bool {
        matches!(self, CacheOp::Invalidate(_) | CacheOp::CleanInvalidate(_))
    }
}

#[derive(Debug, Default)]
pub struct TrackingCache {
    ops: Mutex<Vec<CacheOp>>,
}

impl TrackingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns everything recorded so far.
    pub fn take(&self) -> Vec<CacheOp> {
        std::mem::take(&mut *self.lock())
    }

    /// Returns a copy of everything recorded so far.
    pub fn ops(&self) -> Vec<CacheOp> {
        self.lock().clone()
    }

    /// Returns `true` if some recorded write-back covers all of `range`.
    pub fn cleaned(&self, range: &Range<usize>) -> bool {
        self.lock()
            .iter()
            .any(|op| op.writes_back() && covers(op.range(), range))
    }

    /// Returns `true` if some recorded discard covers all of `range`.
    pub fn invalidated(&self, range: &Range<usize>) -> bool {
        self.lock()
            .iter()
            .any(|op| op.discards() && covers(op.range(), range))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<CacheOp>> {
        // A panicking test thread shouldn't hide the record from the others.
        self.ops.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn covers(outer: &Range<usize>, inner: &Range<usize>) -> bool {
    outer.start <= inner.start && inner.end <= outer.end
}

impl CacheMaint for TrackingCache {
    fn clean(&self, range: Range<usize>) {
        self.lock().push(CacheOp::Clean(range));
    }

    fn invalidate(&self, range: Range<usize>) {
        self.lock().push(CacheOp::Invalidate(range));
    }

    fn clean_invalidate(&self, range: Range<usize>) {
        self.lock().push(CacheOp::CleanInvalidate(range));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_answers_coverage() {
        let cache = TrackingCache::new();
        cache.clean_invalidate(0x1000..0x2000);
        cache.invalidate(0x3000..0x3010);

        assert!(cache.cleaned(&(0x1800..0x1900)));
        assert!(cache.invalidated(&(0x1000..0x2000)));
        assert!(!cache.cleaned(&(0x3000..0x3010)));
        assert!(cache.invalidated(&(0x3000..0x3008)));
        assert!(!cache.invalidated(&(0x0FFF..0x1001)));

        assert_eq!(cache.take().len(), 2);
        assert!(cache.ops().is_empty());
    }
}
