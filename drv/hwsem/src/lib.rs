// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Driver for the hardware semaphore (HWSEM) block.
//!
//! Each channel is a spinlock arbitrated in hardware between the application
//! cluster and the real-time core. A channel records the 8-bit key of its
//! holder, with zero meaning free. Writing key `K` to a channel's claim
//! register does one of three things:
//!
//! - if the channel is free, it becomes held by `K`;
//! - if the channel is held by `K`, it is released, and every *other* domain
//!   that has the channel's interrupt enabled latches its status bit;
//! - if the channel is held by some other key, nothing happens.
//!
//! Claiming is therefore write-then-read-back, and releasing is the same
//! write. Because a write of the holder's own key releases, this driver never
//! writes a key into a channel that key already holds, and never writes on
//! behalf of a key that doesn't hold the channel.
//!
//! Keys are chosen by software. Nothing stops two callers from using the same
//! key, in which case the hardware cannot tell them apart.
//!
//! # Interrupts
//!
//! Interrupts are the only way to learn that the other side released a
//! channel without polling. The status bit is latched only if the enable bit
//! was set at the moment of the release; enabling afterwards does not replay
//! a release that already happened. Enable before you need to hear about it.

#![cfg_attr(target_os = "none", no_std)]

use core::num::NonZeroU8;

use drv_amp_sys::{ResetLine, Sys, SysError, SysRegs};
use irq_signal::Signal;
use ringbuf::{ringbuf, ringbuf_entry};

pub mod mmio;

#[cfg(not(target_os = "none"))]
pub mod fake;

/// The non-zero value a caller writes to claim a channel.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Key(NonZeroU8);

impl Key {
    pub const fn new(raw: u8) -> Option<Self> {
        match NonZeroU8::new(raw) {
            Some(k) => Some(Self(k)),
            None => None,
        }
    }

    pub const fn get(self) -> u8 {
        self.0.get()
    }
}

/// A channel index known to exist on this board.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Channel(u8);

impl Channel {
    pub const COUNT: u8 = amp_config::hwsem::CHANNELS;

    pub const fn new(index: u8) -> Option<Self> {
        if index < Self::COUNT {
            Some(Self(index))
        } else {
            None
        }
    }

    pub const fn index(self) -> u8 {
        self.0
    }

    /// This channel's bit in the interrupt registers.
    pub const fn mask(self) -> u32 {
        1 << self.0
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (0..Self::COUNT).map(Self)
    }
}

/// One side of the semaphore block's interrupt registers.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Domain {
    App,
    Rt,
}

impl Domain {
    /// The domain this image runs in.
    #[cfg(all(target_arch = "arm", target_feature = "mclass"))]
    pub const LOCAL: Self = Self::Rt;

    /// The domain this image runs in.
    #[cfg(not(all(target_arch = "arm", target_feature = "mclass")))]
    pub const LOCAL: Self = Self::App;

    pub fn peer(self) -> Self {
        match self {
            Domain::App => Domain::Rt,
            Domain::Rt => Domain::App,
        }
    }
}

/// Register-level access to the semaphore block from one domain.
///
/// `inten`, `intsts` and friends refer to the local domain's pair; the claim
/// registers are shared by everyone.
pub trait HwsemRegs {
    fn sem(&self, channel: u8) -> u8;
    fn set_sem(&self, channel: u8, key: u8);
    fn inten(&self) -> u32;
    fn set_inten(&self, bits: u32);
    fn intsts(&self) -> u32;
    /// Clears the status bits set in `bits`.
    fn clear_intsts(&self, bits: u32);
}

impl<T: HwsemRegs + ?Sized> HwsemRegs for &T {
    fn sem(&self, channel: u8) -> u8 {
        (**self).sem(channel)
    }

    fn set_sem(&self, channel: u8, key: u8) {
        (**self).set_sem(channel, key)
    }

    fn inten(&self) -> u32 {
        (**self).inten()
    }

    fn set_inten(&self, bits: u32) {
        (**self).set_inten(bits)
    }

    fn intsts(&self) -> u32 {
        (**self).intsts()
    }

    fn clear_intsts(&self, bits: u32) {
        (**self).clear_intsts(bits)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LockError {
    /// Gave up after the allotted attempts. `holder` is whoever had the
    /// channel on the last look, if anyone.
    Timeout { holder: Option<Key> },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UnlockError {
    /// The key does not hold the channel; nothing was written.
    NotHolder { holder: Option<Key> },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Trace {
    None,
    Claimed(Channel, Key),
    Timeout {
        channel: Channel,
        holder: Option<Key>,
    },
    Released(Channel),
    NotHolder {
        channel: Channel,
        key: Key,
        holder: Option<Key>,
    },
    IntEnabled(Channel),
    IntDisabled(Channel),
    Irq(u32),
}

ringbuf!(Trace, 32, Trace::None);

pub struct Hwsem<R: HwsemRegs> {
    regs: R,
}

impl<R: HwsemRegs> Hwsem<R> {
    pub fn new(regs: R) -> Self {
        Self { regs }
    }

    /// Puts every channel back to free by pulsing the block's reset line.
    ///
    /// This drops locks held by *both* cores, so only call it while the
    /// other core is held in reset.
    pub fn init<S: SysRegs>(&self, sys: &Sys<S>) -> Result<(), SysError> {
        sys.pulse_reset(ResetLine::Hwsem)
    }

    /// Returns the key currently holding `channel`.
    pub fn holder(&self, channel: Channel) -> Option<Key> {
        Key::new(self.regs.sem(channel.index()))
    }

    /// Makes one attempt to claim `channel` for `key`.
    ///
    /// Returns `true` if `key` holds the channel afterwards, including when
    /// it already held it on entry.
    pub fn try_lock(&self, channel: Channel, key: Key) -> bool {
        let ch = channel.index();
        match self.regs.sem(ch) {
            0 => (),
            k if k == key.get() => return true,
            _ => return false,
        }
        self.regs.set_sem(ch, key.get());
        if self.regs.sem(ch) == key.get() {
            ringbuf_entry!(Trace::Claimed(channel, key));
            true
        } else {
            false
        }
    }

    /// Spins until `key` holds `channel`. There is no timeout; see
    /// [`Hwsem::lock_bounded`] for one.
    pub fn lock(&self, channel: Channel, key: Key) {
        self.lock_with(channel, key, core::hint::spin_loop);
    }

    /// Like [`Hwsem::lock`], calling `relax` between attempts.
    pub fn lock_with(
        &self,
        channel: Channel,
        key: Key,
        mut relax: impl FnMut(),
    ) {
        while !self.try_lock(channel, key) {
            relax();
        }
    }

    /// Makes up to `attempts` attempts to claim `channel`, returning a guard
    /// that releases it when dropped.
    pub fn lock_bounded(
        &self,
        channel: Channel,
        key: Key,
        attempts: u32,
    ) -> Result<HwsemGuard<'_, R>, LockError> {
        for _ in 0..attempts {
            if self.try_lock(channel, key) {
                return Ok(HwsemGuard {
                    hwsem: self,
                    channel,
                    key,
                });
            }
            core::hint::spin_loop();
        }
        let holder = self.holder(channel);
        ringbuf_entry!(Trace::Timeout { channel, holder });
        Err(LockError::Timeout { holder })
    }

    /// [`Hwsem::lock_bounded`] with the board's attempt budget.
    pub fn lock_bounded_default(
        &self,
        channel: Channel,
        key: Key,
    ) -> Result<HwsemGuard<'_, R>, LockError> {
        self.lock_bounded(channel, key, amp_config::hwsem::LOCK_ATTEMPTS)
    }

    /// Spins until `key` holds `channel`, returning a guard that releases it
    /// when dropped.
    pub fn lock_guard(
        &self,
        channel: Channel,
        key: Key,
    ) -> HwsemGuard<'_, R> {
        self.lock(channel, key);
        HwsemGuard {
            hwsem: self,
            channel,
            key,
        }
    }

    /// Releases `channel` if `key` holds it.
    ///
    /// Any other key gets `NotHolder` and the claim register is not touched,
    /// so a stray unlock can neither release someone else's lock nor claim a
    /// free channel.
    pub fn unlock(
        &self,
        channel: Channel,
        key: Key,
    ) -> Result<(), UnlockError> {
        let ch = channel.index();
        let current = self.regs.sem(ch);
        if current != key.get() {
            let holder = Key::new(current);
            ringbuf_entry!(Trace::NotHolder {
                channel,
                key,
                holder
            });
            return Err(UnlockError::NotHolder { holder });
        }
        self.regs.set_sem(ch, key.get());
        ringbuf_entry!(Trace::Released(channel));
        Ok(())
    }

    /// Enables the local domain's interrupt for releases of `channel` by
    /// the other domain.
    pub fn enable_int(&self, channel: Channel) {
        ringbuf_entry!(Trace::IntEnabled(channel));
        self.regs.set_inten(self.regs.inten() | channel.mask());
    }

    pub fn disable_int(&self, channel: Channel) {
        ringbuf_entry!(Trace::IntDisabled(channel));
        self.regs.set_inten(self.regs.inten() & !channel.mask());
    }

    /// Status bits currently latched for the local domain.
    pub fn pending(&self) -> u32 {
        self.regs.intsts()
    }

    /// Interrupt handler body: acknowledges the enabled channels whose
    /// status is set and posts them to `signal`.
    ///
    /// Status bits for channels whose interrupt is disabled are left
    /// latched. Returns the bits handled.
    pub fn handle_interrupt(&self, signal: &Signal) -> u32 {
        let bits = self.regs.intsts() & self.regs.inten();
        if bits != 0 {
            self.regs.clear_intsts(bits);
            signal.post(bits);
        }
        ringbuf_entry!(Trace::Irq(bits));
        bits
    }
}

/// A held channel. Dropping the guard releases it.
pub struct HwsemGuard<'a, R: HwsemRegs> {
    hwsem: &'a Hwsem<R>,
    channel: Channel,
    key: Key,
}

impl<R: HwsemRegs> HwsemGuard<'_, R> {
    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn key(&self) -> Key {
        self.key
    }
}

impl<R: HwsemRegs> Drop for HwsemGuard<'_, R> {
    fn drop(&mut self) {
        // The only way this fails is if the block was reset under us, in
        // which case there's nothing left to release. The rejection is in
        // the trace.
        let _ = self.hwsem.unlock(self.channel, self.key);
    }
}
