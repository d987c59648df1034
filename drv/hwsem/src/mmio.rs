// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use static_assertions::const_assert_eq;
use vcell::VolatileCell;

use crate::{Domain, HwsemRegs};

/// One domain's interrupt enable/status pair.
#[repr(C)]
pub struct DomainBlock {
    pub inten: VolatileCell<u32>,
    /// Write one to clear.
    pub intsts: VolatileCell<u32>,
}

#[repr(C)]
pub struct RegisterBlock {
    _reserved0: [u32; 4],
    pub app: DomainBlock,
    pub rt: DomainBlock,
    _reserved1: [u32; 8],
    /// Claim registers; bits 7:0 hold the owning key, zero when free.
    pub sem: [VolatileCell<u32>; 32],
}

const_assert_eq!(core::mem::offset_of!(RegisterBlock, app), 0x10);
const_assert_eq!(core::mem::offset_of!(RegisterBlock, rt), 0x18);
const_assert_eq!(core::mem::offset_of!(RegisterBlock, sem), 0x40);

/// The semaphore block as seen from one domain.
pub struct Mmio {
    reg: &'static RegisterBlock,
    domain: Domain,
}

impl Mmio {
    /// Returns the board's semaphore block as seen from this core.
    ///
    /// # Safety
    ///
    /// The address in the board configuration must be mapped as device
    /// memory.
    pub unsafe fn board() -> Self {
        Self {
            reg: unsafe {
                &*(amp_config::hwsem::BASE as *const RegisterBlock)
            },
            domain: Domain::LOCAL,
        }
    }

    fn local(&self) -> &DomainBlock {
        match self.domain {
            Domain::App => &self.reg.app,
            Domain::Rt => &self.reg.rt,
        }
    }
}

impl HwsemRegs for Mmio {
    fn sem(&self, channel: u8) -> u8 {
        self.reg.sem[usize::from(channel)].get() as u8
    }

    fn set_sem(&self, channel: u8, key: u8) {
        self.reg.sem[usize::from(channel)].set(u32::from(key));
    }

    fn inten(&self) -> u32 {
        self.local().inten.get()
    }

    fn set_inten(&self, bits: u32) {
        self.local().inten.set(bits);
    }

    fn intsts(&self) -> u32 {
        self.local().intsts.get()
    }

    fn clear_intsts(&self, bits: u32) {
        self.local().intsts.set(bits);
    }
}
