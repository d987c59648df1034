// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The system controller registers as they sit in memory.

use static_assertions::const_assert_eq;
use vcell::VolatileCell;

use crate::SysRegs;

#[repr(C)]
pub struct RegisterBlock {
    _reserved0: [u32; 8],
    /// Module reset control; a set bit holds the module in reset.
    pub iprst: [VolatileCell<u32>; 4],
    _reserved1: [u32; 52],
    /// Register write-protection control.
    pub reglctl: VolatileCell<u32>,
}

const_assert_eq!(core::mem::offset_of!(RegisterBlock, iprst), 0x20);
const_assert_eq!(core::mem::offset_of!(RegisterBlock, reglctl), 0x100);

impl RegisterBlock {
    /// Returns the board's system controller.
    ///
    /// # Safety
    ///
    /// Only one driver may own the block, and the address in the board
    /// configuration must be mapped as device memory.
    pub unsafe fn board() -> &'static Self {
        unsafe { &*(amp_config::sys::BASE as *const Self) }
    }
}

impl SysRegs for RegisterBlock {
    fn reglctl(&self) -> u32 {
        self.reglctl.get()
    }

    fn set_reglctl(&self, value: u32) {
        self.reglctl.set(value);
    }

    fn iprst(&self, index: u8) -> u32 {
        self.iprst[usize::from(index)].get()
    }

    fn set_iprst(&self, index: u8, value: u32) {
        self.iprst[usize::from(index)].set(value);
    }
}
