// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use core::sync::atomic::{AtomicU32, Ordering};

use coherence::CacheMaint;

/// The word in shared memory the secondary core sets once it is up.
///
/// It reads zero from the moment the primary core clears it before release,
/// and [`BOOT_MAGIC`](amp_config::secondary::BOOT_MAGIC) once the secondary
/// has announced itself. Neither core snoops the other's cache, so every
/// access goes with the matching clean or invalidate.
#[derive(Copy, Clone)]
pub struct BootFlag<'a> {
    word: &'a AtomicU32,
}

impl<'a> BootFlag<'a> {
    pub fn new(word: &'a AtomicU32) -> Self {
        Self { word }
    }

    /// Zeroes the flag and pushes the zero out to memory.
    pub fn clear(&self, cache: &impl CacheMaint) {
        self.word.store(0, Ordering::Release);
        cache.clean_obj(self.word);
    }

    /// Re-reads the flag from memory and checks it for the magic value.
    pub fn is_set(&self, cache: &impl CacheMaint) -> bool {
        cache.invalidate_obj(self.word);
        self.word.load(Ordering::Acquire) == amp_config::secondary::BOOT_MAGIC
    }

    /// Called on the secondary core: sets the flag, pushes it out and wakes
    /// anyone sitting in `wfe`.
    pub fn announce(&self, cache: &impl CacheMaint) {
        self.word
            .store(amp_config::secondary::BOOT_MAGIC, Ordering::Release);
        cache.clean_obj(self.word);
        coherence::sev();
    }
}

impl BootFlag<'static> {
    /// The board's boot flag.
    ///
    /// # Safety
    ///
    /// The address in the board configuration must be mapped and must not
    /// be used for anything else.
    pub unsafe fn board() -> Self {
        let word = amp_config::secondary::BOOT_FLAG as *const AtomicU32;
        Self::new(unsafe { &*word })
    }
}
