// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A host model of the system controller.
//!
//! Protection behaves like the hardware: `IPRST` writes are dropped (and
//! counted) unless the full unlock sequence has been written to `REGLCTL`,
//! and writing anything else to `REGLCTL` closes it again.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use amp_config::ResetBit;

use crate::{SysRegs, UNLOCK_SEQUENCE};

#[derive(Debug, Default)]
struct State {
    open: bool,
    /// How much of the unlock sequence has been seen.
    progress: usize,
    stuck: bool,
    iprst: [u32; 4],
    unlocks: usize,
    ignored: usize,
    releases: HashMap<(u8, u8), usize>,
}

#[derive(Debug, Default)]
pub struct FakeSys {
    state: Mutex<State>,
}

impl FakeSys {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Makes the unlock sequence stop working.
    pub fn set_stuck(&self, stuck: bool) {
        self.lock().stuck = stuck;
    }

    pub fn is_locked(&self) -> bool {
        !self.lock().open
    }

    /// Number of times protection has been opened.
    pub fn unlocks(&self) -> usize {
        self.lock().unlocks
    }

    /// Number of `IPRST` writes dropped because protection was closed.
    pub fn ignored_writes(&self) -> usize {
        self.lock().ignored
    }

    /// Number of times `bit` has gone from asserted to released.
    pub fn releases(&self, bit: ResetBit) -> usize {
        self.lock()
            .releases
            .get(&(bit.register, bit.bit))
            .copied()
            .unwrap_or(0)
    }

    /// Sets a reset bit directly, as the power-on state would.
    pub fn assert_at_power_on(&self, bit: ResetBit) {
        self.lock().iprst[usize::from(bit.register)] |= 1 << bit.bit;
    }
}

impl SysRegs for FakeSys {
    fn reglctl(&self) -> u32 {
        u32::from(self.lock().open)
    }

    fn set_reglctl(&self, value: u32) {
        let mut s = self.lock();
        if s.open {
            // Any write while open relocks.
            s.open = false;
            s.progress = 0;
            return;
        }
        if value == UNLOCK_SEQUENCE[s.progress] {
            s.progress += 1;
        } else {
            s.progress = usize::from(value == UNLOCK_SEQUENCE[0]);
        }
        if s.progress == UNLOCK_SEQUENCE.len() {
            s.progress = 0;
            if !s.stuck {
                s.open = true;
                s.unlocks += 1;
            }
        }
    }

    fn iprst(&self, index: u8) -> u32 {
        self.lock().iprst[usize::from(index)]
    }

    fn set_iprst(&self, index: u8, value: u32) {
        let mut s = self.lock();
        if !s.open {
            s.ignored += 1;
            return;
        }
        let old = s.iprst[usize::from(index)];
        let released = old & !value;
        for bit in 0..32u8 {
            if released & (1 << bit) != 0 {
                *s.releases.entry((index, bit)).or_default() += 1;
            }
        }
        s.iprst[usize::from(index)] = value;
    }
}
