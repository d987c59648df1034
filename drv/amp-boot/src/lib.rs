// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bring-up of the real-time core from the application core.
//!
//! The real-time core comes out of power-on reset held by its `IPRST` bit.
//! Bringing it up is a fixed sequence, tracked by [`SecondaryCore`]:
//!
//! 1. [`load_image`](SecondaryCore::load_image) copies the image to its load
//!    address and pushes it out of this core's data cache.
//! 2. [`release`](SecondaryCore::release) clears the boot flag, drops the
//!    reset bit and sends an event.
//! 3. [`wait_running`](SecondaryCore::wait_running) polls the boot flag until
//!    the real-time core announces itself.
//!
//! [`hold`](SecondaryCore::hold) puts the core back in reset from any state.

#![cfg_attr(target_os = "none", no_std)]

use coherence::CacheMaint;
use drv_amp_sys::{ResetLine, Sys, SysError, SysRegs};
use ringbuf::{ringbuf, ringbuf_entry};

mod flag;

pub use flag::BootFlag;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CoreState {
    HeldInReset,
    ImageLoaded,
    Released,
    Running,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BootError {
    /// The operation isn't valid from the core's current state.
    WrongState(CoreState),
    /// The image doesn't fit in the destination.
    ImageTooLarge,
    /// Memory read back after cache maintenance differs from the image.
    VerifyFailed { offset: usize },
    /// The boot flag never showed up.
    Timeout,
    Sys(SysError),
}

impl From<SysError> for BootError {
    fn from(e: SysError) -> Self {
        BootError::Sys(e)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Trace {
    None,
    Loaded(usize),
    VerifyFailed(usize),
    Released,
    Running { polls: u32 },
    TimedOut,
    Held,
    WrongState(CoreState),
}

ringbuf!(Trace, 16, Trace::None);

pub struct SecondaryCore<'a, C: CacheMaint> {
    state: CoreState,
    cache: C,
    flag: BootFlag<'a>,
    verify: bool,
    release_spin: u32,
}

impl<'a, C: CacheMaint> SecondaryCore<'a, C> {
    /// Starts tracking a core that is held in reset, as it is at power-on.
    pub fn new(cache: C, flag: BootFlag<'a>) -> Self {
        Self {
            state: CoreState::HeldInReset,
            cache,
            flag,
            verify: true,
            release_spin: amp_config::secondary::RELEASE_SPIN,
        }
    }

    /// Turns read-back verification of loaded images on or off.
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Sets how many iterations to spin between dropping reset and sending
    /// the event.
    pub fn with_release_spin(mut self, spin: u32) -> Self {
        self.release_spin = spin;
        self
    }

    pub fn state(&self) -> CoreState {
        self.state
    }

    fn require(&self, allowed: &[CoreState]) -> Result<(), BootError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            ringbuf_entry!(Trace::WrongState(self.state));
            Err(BootError::WrongState(self.state))
        }
    }

    /// Copies `image` to the start of `dest` and makes it visible to the
    /// real-time core.
    ///
    /// May be repeated before release to replace the image.
    pub fn load_image(
        &mut self,
        image: &[u8],
        dest: &mut [u8],
    ) -> Result<(), BootError> {
        self.require(&[CoreState::HeldInReset, CoreState::ImageLoaded])?;
        let dest = dest
            .get_mut(..image.len())
            .ok_or(BootError::ImageTooLarge)?;

        dest.copy_from_slice(image);
        // From here on memory is only reached through `base`, since cache
        // maintenance can change it behind the slice's back.
        let base = dest.as_mut_ptr();
        let start = base as usize;
        self.cache.clean_invalidate(start..start + image.len());
        coherence::dsb();

        if self.verify {
            // SAFETY: `base` comes from `dest`, which is `image.len()` bytes
            // long and not used again.
            unsafe { verify(image, base) }?;
        }
        ringbuf_entry!(Trace::Loaded(image.len()));
        self.state = CoreState::ImageLoaded;
        Ok(())
    }

    /// Lets the real-time core run.
    ///
    /// The boot flag is cleared first so a value left over from an earlier
    /// boot can't be mistaken for this one.
    pub fn release<R: SysRegs>(
        &mut self,
        sys: &Sys<R>,
    ) -> Result<(), BootError> {
        self.require(&[CoreState::ImageLoaded])?;
        self.flag.clear(&self.cache);
        coherence::dsb();

        sys.leave_reset(ResetLine::RtCore)?;
        for _ in 0..self.release_spin {
            core::hint::spin_loop();
        }
        coherence::sev();

        ringbuf_entry!(Trace::Released);
        self.state = CoreState::Released;
        Ok(())
    }

    /// Polls the boot flag up to `attempts` times.
    ///
    /// Returns immediately if the core is already known to be running.
    pub fn wait_running(&mut self, attempts: u32) -> Result<(), BootError> {
        if self.state == CoreState::Running {
            return Ok(());
        }
        self.require(&[CoreState::Released])?;
        for polls in 0..attempts {
            if self.flag.is_set(&self.cache) {
                ringbuf_entry!(Trace::Running { polls });
                self.state = CoreState::Running;
                return Ok(());
            }
            core::hint::spin_loop();
        }
        ringbuf_entry!(Trace::TimedOut);
        Err(BootError::Timeout)
    }

    /// [`SecondaryCore::wait_running`] with the board's attempt budget.
    pub fn wait_running_default(&mut self) -> Result<(), BootError> {
        self.wait_running(amp_config::secondary::WAIT_ATTEMPTS)
    }

    /// Puts the core back in reset. A new image must be loaded before it is
    /// released again.
    pub fn hold<R: SysRegs>(
        &mut self,
        sys: &Sys<R>,
    ) -> Result<(), BootError> {
        sys.enter_reset(ResetLine::RtCore)?;
        ringbuf_entry!(Trace::Held);
        self.state = CoreState::HeldInReset;
        Ok(())
    }
}

/// Compares `image` against memory at `base`.
///
/// # Safety
///
/// `base` must be valid for reads of `image.len()` bytes.
unsafe fn verify(image: &[u8], base: *const u8) -> Result<(), BootError> {
    for (offset, want) in image.iter().enumerate() {
        // Volatile so the comparison reads memory rather than what was just
        // copied.
        //
        // SAFETY: `offset` is in bounds per this function's contract.
        let got = unsafe { core::ptr::read_volatile(base.add(offset)) };
        if got != *want {
            ringbuf_entry!(Trace::VerifyFailed(offset));
            return Err(BootError::VerifyFailed { offset });
        }
    }
    Ok(())
}

/// The real-time core's load window.
///
/// # Safety
///
/// The window in the board configuration must be mapped, and nothing else
/// may hold a reference into it while the returned slice is live.
pub unsafe fn load_region() -> &'static mut [u8] {
    let base = amp_config::secondary::LOAD.base as usize as *mut u8;
    let size = amp_config::secondary::LOAD.size as usize;
    // SAFETY: upheld by the caller.
    unsafe { core::slice::from_raw_parts_mut(base, size) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::AtomicU32;
    use coherence::fake::TrackingCache;
    use drv_amp_sys::fake::FakeSys;

    fn bare(word: &AtomicU32) -> SecondaryCore<'_, TrackingCache> {
        SecondaryCore::new(TrackingCache::new(), BootFlag::new(word))
            .with_release_spin(0)
    }

    fn sys_at_power_on(hw: &FakeSys) -> Sys<&FakeSys> {
        hw.assert_at_power_on(ResetLine::RtCore.bit());
        Sys::new(hw)
    }

    #[test]
    fn load_cleans_exactly_the_image() {
        let word = AtomicU32::new(0);
        let cache = TrackingCache::new();
        let mut rt = SecondaryCore::new(&cache, BootFlag::new(&word));
        let mut dest = [0u8; 64];
        let image = [0xA5u8; 40];

        rt.load_image(&image, &mut dest).unwrap();
        assert_eq!(rt.state(), CoreState::ImageLoaded);
        assert_eq!(&dest[..40], &image[..]);
        assert_eq!(dest[40], 0);

        let range = coherence::byte_range(&dest[..40]);
        assert!(cache.cleaned(&range));
        assert!(cache.invalidated(&range));
    }

    #[test]
    fn oversize_image_is_rejected_untouched() {
        let word = AtomicU32::new(0);
        let mut rt = bare(&word);
        let mut dest = [0u8; 8];

        assert_eq!(
            rt.load_image(&[1; 9], &mut dest),
            Err(BootError::ImageTooLarge)
        );
        assert_eq!(dest, [0; 8]);
        assert_eq!(rt.state(), CoreState::HeldInReset);
    }

    #[test]
    fn release_needs_an_image() {
        let hw = FakeSys::new();
        let sys = sys_at_power_on(&hw);
        let word = AtomicU32::new(0);
        let mut rt = bare(&word);

        assert_eq!(
            rt.release(&sys),
            Err(BootError::WrongState(CoreState::HeldInReset))
        );
        assert!(sys.in_reset(ResetLine::RtCore));
        assert_eq!(
            rt.wait_running(1),
            Err(BootError::WrongState(CoreState::HeldInReset))
        );
    }

    #[test]
    fn release_clears_stale_flag_and_drops_reset() {
        let hw = FakeSys::new();
        let sys = sys_at_power_on(&hw);
        let word = AtomicU32::new(amp_config::secondary::BOOT_MAGIC);
        let cache = TrackingCache::new();
        let mut rt = SecondaryCore::new(&cache, BootFlag::new(&word))
            .with_release_spin(0);

        rt.load_image(&[1, 2, 3, 4], &mut [0; 4]).unwrap();
        cache.take();
        rt.release(&sys).unwrap();

        assert_eq!(rt.state(), CoreState::Released);
        assert!(!sys.in_reset(ResetLine::RtCore));
        assert_eq!(hw.releases(ResetLine::RtCore.bit()), 1);
        assert!(hw.is_locked());
        assert!(cache.cleaned(&coherence::byte_range(&word)));

        // Nobody has announced this boot yet.
        assert_eq!(rt.wait_running(10), Err(BootError::Timeout));
        assert_eq!(rt.state(), CoreState::Released);
    }

    #[test]
    fn stuck_protection_keeps_the_core_loaded() {
        let hw = FakeSys::new();
        let sys = sys_at_power_on(&hw);
        hw.set_stuck(true);
        let word = AtomicU32::new(0);
        let mut rt = bare(&word);

        rt.load_image(&[0; 4], &mut [0; 4]).unwrap();
        assert_eq!(
            rt.release(&sys),
            Err(BootError::Sys(SysError::LockStuck))
        );
        assert_eq!(rt.state(), CoreState::ImageLoaded);
        assert!(sys.in_reset(ResetLine::RtCore));
    }

    #[test]
    fn default_wait_uses_the_board_budget() {
        let hw = FakeSys::new();
        let sys = sys_at_power_on(&hw);
        let word = AtomicU32::new(0);
        let mut rt = bare(&word);

        assert_eq!(
            rt.wait_running_default(),
            Err(BootError::WrongState(CoreState::HeldInReset))
        );
        rt.load_image(&[0; 4], &mut [0; 4]).unwrap();
        rt.release(&sys).unwrap();
        BootFlag::new(&word).announce(&TrackingCache::new());
        rt.wait_running_default().unwrap();
        assert_eq!(rt.state(), CoreState::Running);
    }

    #[test]
    fn hold_returns_to_reset_from_any_state() {
        let hw = FakeSys::new();
        let sys = sys_at_power_on(&hw);
        let word = AtomicU32::new(0);
        let mut rt = bare(&word);

        rt.load_image(&[0; 4], &mut [0; 4]).unwrap();
        rt.release(&sys).unwrap();
        BootFlag::new(&word).announce(&TrackingCache::new());
        rt.wait_running(1).unwrap();
        assert_eq!(rt.state(), CoreState::Running);
        // Already running: no polling needed.
        rt.wait_running(0).unwrap();

        rt.hold(&sys).unwrap();
        assert_eq!(rt.state(), CoreState::HeldInReset);
        assert!(sys.in_reset(ResetLine::RtCore));
        assert_eq!(
            rt.release(&sys),
            Err(BootError::WrongState(CoreState::HeldInReset))
        );
    }
}
