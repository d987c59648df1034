// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A host model of the semaphore block.
//!
//! One [`FakeHwsem`] is the shared hardware; [`FakeHwsem::view`] gives each
//! domain its own register view onto it. Every register access takes the
//! model's lock, so a single access is atomic but a driver's read, write and
//! read-back are not, which is the interleaving real hardware allows.

use std::sync::{Mutex, MutexGuard};

use crate::{Domain, HwsemRegs};

const CHANNELS: usize = 32;

#[derive(Debug, Default)]
struct State {
    sem: [u8; CHANNELS],
    inten: [u32; 2],
    intsts: [u32; 2],
    sem_writes: usize,
}

fn slot(domain: Domain) -> usize {
    match domain {
        Domain::App => 0,
        Domain::Rt => 1,
    }
}

#[derive(Debug, Default)]
pub struct FakeHwsem {
    state: Mutex<State>,
}

impl FakeHwsem {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn view(&self, domain: Domain) -> DomainView<'_> {
        DomainView { hw: self, domain }
    }

    /// Number of writes made to any claim register, effective or not.
    pub fn sem_writes(&self) -> usize {
        self.lock().sem_writes
    }

    /// Frees every channel and clears all interrupt state, as a module reset
    /// would.
    pub fn reset(&self) {
        *self.lock() = State::default();
    }
}

/// The semaphore block as seen from one domain.
#[derive(Copy, Clone, Debug)]
pub struct DomainView<'a> {
    hw: &'a FakeHwsem,
    domain: Domain,
}

impl HwsemRegs for DomainView<'_> {
    fn sem(&self, channel: u8) -> u8 {
        self.hw.lock().sem[usize::from(channel)]
    }

    fn set_sem(&self, channel: u8, key: u8) {
        let mut s = self.hw.lock();
        s.sem_writes += 1;
        let ch = usize::from(channel);
        if key == 0 {
            return;
        }
        if s.sem[ch] == 0 {
            s.sem[ch] = key;
        } else if s.sem[ch] == key {
            s.sem[ch] = 0;
            let peer = slot(self.domain.peer());
            let bit = 1 << channel;
            if s.inten[peer] & bit != 0 {
                s.intsts[peer] |= bit;
            }
        }
    }

    fn inten(&self) -> u32 {
        self.hw.lock().inten[slot(self.domain)]
    }

    fn set_inten(&self, bits: u32) {
        self.hw.lock().inten[slot(self.domain)] = bits;
    }

    fn intsts(&self) -> u32 {
        self.hw.lock().intsts[slot(self.domain)]
    }

    fn clear_intsts(&self, bits: u32) {
        self.hw.lock().intsts[slot(self.domain)] &= !bits;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_follows_claim_register_rules() {
        let hw = FakeHwsem::new();
        let app = hw.view(Domain::App);
        let rt = hw.view(Domain::Rt);
        app.set_inten(1);
        rt.set_inten(1);

        rt.set_sem(0, 7);
        assert_eq!(app.sem(0), 7);
        // Another key is ignored.
        app.set_sem(0, 9);
        assert_eq!(app.sem(0), 7);
        // The holder's key releases and interrupts the other domain.
        rt.set_sem(0, 7);
        assert_eq!(app.sem(0), 0);
        assert_eq!(app.intsts(), 1);
        assert_eq!(rt.intsts(), 0);

        hw.reset();
        assert_eq!(app.intsts(), 0);
        assert_eq!(app.inten(), 0);
        assert_eq!(hw.sem_writes(), 0);
    }
}
