// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use static_assertions::const_assert_eq;
use vcell::VolatileCell;

use crate::WhcRegs;

#[repr(C)]
pub struct RegisterBlock {
    /// Write bit n to send channel n.
    pub txctl: VolatileCell<u32>,
    /// Bit n set when channel n may send.
    pub txsts: VolatileCell<u32>,
    /// Bit n set when channel n holds a message.
    pub rxsts: VolatileCell<u32>,
    /// Write bit n to acknowledge channel n's message.
    pub rxctl: VolatileCell<u32>,
    pub inten: VolatileCell<u32>,
    /// Write one to clear. Bit n is receive, bit 16 + n is send
    /// acknowledged.
    pub intsts: VolatileCell<u32>,
    _reserved: [u32; 58],
    pub tmdat: [[VolatileCell<u32>; 4]; 16],
    pub rmdat: [[VolatileCell<u32>; 4]; 16],
}

const_assert_eq!(core::mem::offset_of!(RegisterBlock, intsts), 0x14);
const_assert_eq!(core::mem::offset_of!(RegisterBlock, tmdat), 0x100);
const_assert_eq!(core::mem::offset_of!(RegisterBlock, rmdat), 0x200);

impl RegisterBlock {
    /// Returns this core's view of the board's controller.
    ///
    /// # Safety
    ///
    /// Only one driver may own the block, and the address in the board
    /// configuration must be mapped as device memory.
    pub unsafe fn board() -> &'static Self {
        #[cfg(all(target_arch = "arm", target_feature = "mclass"))]
        let base = amp_config::whc::RT_BASE;
        #[cfg(not(all(target_arch = "arm", target_feature = "mclass")))]
        let base = amp_config::whc::APP_BASE;

        unsafe { &*(base as *const Self) }
    }
}

impl WhcRegs for RegisterBlock {
    fn txsts(&self) -> u32 {
        self.txsts.get()
    }

    fn trigger(&self, mask: u32) {
        self.txctl.set(mask);
    }

    fn rxsts(&self) -> u32 {
        self.rxsts.get()
    }

    fn ack(&self, mask: u32) {
        self.rxctl.set(mask);
    }

    fn inten(&self) -> u32 {
        self.inten.get()
    }

    fn set_inten(&self, bits: u32) {
        self.inten.set(bits);
    }

    fn intsts(&self) -> u32 {
        self.intsts.get()
    }

    fn clear_intsts(&self, bits: u32) {
        self.intsts.set(bits);
    }

    fn write_tx(&self, channel: u8, word: usize, value: u32) {
        self.tmdat[usize::from(channel)][word].set(value);
    }

    fn read_rx(&self, channel: u8, word: usize) -> u32 {
        self.rmdat[usize::from(channel)][word].get()
    }
}
