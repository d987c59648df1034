// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Driver for the system controller's write-protected reset registers.
//!
//! The `IPRST` registers ignore writes unless register protection has been
//! opened by writing the magic sequence `0x59, 0x16, 0x88` to `REGLCTL`.
//! Every write this driver makes is bracketed by that sequence and a relock,
//! except when protection was already open on entry, in which case it is
//! left open for whoever opened it.
//!
//! The same registers hold the HWSEM and WHC blocks in reset and keep the
//! real-time core from running, so both the module drivers and the bring-up
//! code go through here.

#![cfg_attr(target_os = "none", no_std)]

use amp_config::ResetBit;
use ringbuf::{ringbuf, ringbuf_entry};

pub mod mmio;

#[cfg(not(target_os = "none"))]
pub mod fake;

/// The unlock sequence for `REGLCTL`.
pub const UNLOCK_SEQUENCE: [u32; 3] = [0x59, 0x16, 0x88];

/// Register-level access to the system controller.
///
/// Implemented by [`mmio::RegisterBlock`] on target and by
/// [`fake::FakeSys`] on the host.
pub trait SysRegs {
    fn reglctl(&self) -> u32;
    fn set_reglctl(&self, value: u32);
    fn iprst(&self, index: u8) -> u32;
    fn set_iprst(&self, index: u8, value: u32);
}

impl<T: SysRegs + ?Sized> SysRegs for &T {
    fn reglctl(&self) -> u32 {
        (**self).reglctl()
    }

    fn set_reglctl(&self, value: u32) {
        (**self).set_reglctl(value)
    }

    fn iprst(&self, index: u8) -> u32 {
        (**self).iprst(index)
    }

    fn set_iprst(&self, index: u8, value: u32) {
        (**self).set_iprst(index, value)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SysError {
    /// `REGLCTL` still reads locked after the unlock sequence.
    LockStuck,
}

/// Reset lines this layer cares about.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ResetLine {
    Hwsem,
    Whc,
    /// Holds the real-time core; released to boot it.
    RtCore,
}

impl ResetLine {
    pub fn bit(self) -> ResetBit {
        match self {
            ResetLine::Hwsem => amp_config::hwsem::RESET,
            ResetLine::Whc => amp_config::whc::RESET,
            ResetLine::RtCore => amp_config::secondary::RESET,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Trace {
    None,
    Unlocked,
    AlreadyOpen,
    LockStuck,
    Relocked,
    EnterReset(ResetLine),
    LeaveReset(ResetLine),
}

ringbuf!(Trace, 16, Trace::None);

pub struct Sys<R: SysRegs> {
    regs: R,
}

impl<R: SysRegs> Sys<R> {
    pub fn new(regs: R) -> Self {
        Self { regs }
    }

    pub fn regs(&self) -> &R {
        &self.regs
    }

    fn is_open(&self) -> bool {
        self.regs.reglctl() & 1 != 0
    }

    /// Runs `body` with register protection open, restoring the previous
    /// protection state afterwards.
    ///
    /// Returns `Err(SysError::LockStuck)` without running `body` if the
    /// protection does not open.
    pub fn protected<T>(
        &self,
        body: impl FnOnce(&R) -> T,
    ) -> Result<T, SysError> {
        let was_open = self.is_open();
        if was_open {
            ringbuf_entry!(Trace::AlreadyOpen);
        } else {
            for word in UNLOCK_SEQUENCE {
                self.regs.set_reglctl(word);
            }
            if !self.is_open() {
                ringbuf_entry!(Trace::LockStuck);
                return Err(SysError::LockStuck);
            }
            ringbuf_entry!(Trace::Unlocked);
        }

        let r = body(&self.regs);

        if !was_open {
            self.regs.set_reglctl(0);
            ringbuf_entry!(Trace::Relocked);
        }
        Ok(r)
    }

    /// Asserts `line`, holding the module in reset.
    pub fn enter_reset(&self, line: ResetLine) -> Result<(), SysError> {
        ringbuf_entry!(Trace::EnterReset(line));
        let ResetBit { register, bit } = line.bit();
        self.protected(|r| {
            r.set_iprst(register, r.iprst(register) | 1 << bit);
        })
    }

    /// Deasserts `line`, letting the module run.
    pub fn leave_reset(&self, line: ResetLine) -> Result<(), SysError> {
        ringbuf_entry!(Trace::LeaveReset(line));
        let ResetBit { register, bit } = line.bit();
        self.protected(|r| {
            r.set_iprst(register, r.iprst(register) & !(1 << bit));
        })
    }

    /// Asserts and then deasserts `line` inside one unlock window.
    pub fn pulse_reset(&self, line: ResetLine) -> Result<(), SysError> {
        ringbuf_entry!(Trace::EnterReset(line));
        ringbuf_entry!(Trace::LeaveReset(line));
        let ResetBit { register, bit } = line.bit();
        self.protected(|r| {
            let v = r.iprst(register);
            r.set_iprst(register, v | 1 << bit);
            r.set_iprst(register, v & !(1 << bit));
        })
    }

    pub fn in_reset(&self, line: ResetLine) -> bool {
        let ResetBit { register, bit } = line.bit();
        self.regs.iprst(register) & (1 << bit) != 0
    }
}
