// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Board constants for the inter-core drivers.
//!
//! Everything here is generated at build time from the board description
//! (`boards/amp-evb.toml`, or the file named by `$AMP_BOARD_CONFIG`). The
//! build script rejects descriptions whose vrings are misaligned, fall
//! outside the shared window or overlap each other, so the values below can
//! be trusted without re-checking at startup.

#![cfg_attr(not(test), no_std)]

/// A bit in one of the system controller's `IPRST` registers.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ResetBit {
    pub register: u8,
    pub bit: u8,
}

/// Geometry of one vring as both cores must agree on it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Vring {
    pub da: u32,
    pub align: u32,
    pub num: u32,
    pub notify_id: u32,
}

/// A span of physical memory.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Region {
    pub base: u32,
    pub size: u32,
}

impl Region {
    pub const fn end(&self) -> u64 {
        self.base as u64 + self.size as u64
    }

    /// Returns `true` if `[addr, addr + len)` lies entirely inside this
    /// region.
    pub const fn contains(&self, addr: u64, len: u64) -> bool {
        addr >= self.base as u64 && addr + len <= self.end()
    }
}

include!(concat!(env!("OUT_DIR"), "/amp_config.rs"));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_contains() {
        let r = Region {
            base: 0x1000,
            size: 0x100,
        };
        assert!(r.contains(0x1000, 0x100));
        assert!(r.contains(0x10F0, 0x10));
        assert!(!r.contains(0x10F0, 0x11));
        assert!(!r.contains(0x0FFF, 1));
        assert_eq!(r.end(), 0x1100);
    }

    #[test]
    fn generated_board_is_self_consistent() {
        assert!(hwsem::CHANNELS > 0 && hwsem::CHANNELS <= 32);
        assert!(whc::CHANNELS > 0 && whc::CHANNELS <= 16);
        assert!(SHARED.contains(rpmsg::TX.da as u64, 1));
        assert!(SHARED.contains(rpmsg::RX.da as u64, 1));
        assert!(SHARED.contains(secondary::BOOT_FLAG as u64, 4));
        assert_ne!(secondary::BOOT_MAGIC, 0);
        assert!(trace::NAME.len() < 32);
    }
}
