// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A host model of the controller with both cores' views.
//!
//! Each direction of each channel is a single four-word slot: the sender's
//! transmit words and the receiver's receive words are the same storage, so
//! a sender that writes before the receiver has acknowledged really does
//! replace the unread message. Status flags latch whether or not the
//! matching interrupt is enabled.

use std::sync::{Mutex, MutexGuard};

use crate::{Message, WhcRegs, TX_ACK_SHIFT};

const CHANNELS: usize = 16;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Side {
    App,
    Rt,
}

impl Side {
    fn slot(self) -> usize {
        match self {
            Side::App => 0,
            Side::Rt => 1,
        }
    }

    fn peer(self) -> Side {
        match self {
            Side::App => Side::Rt,
            Side::Rt => Side::App,
        }
    }
}

#[derive(Debug)]
struct State {
    /// Indexed by sending side, then channel.
    slot: [[Message; CHANNELS]; 2],
    txsts: [u32; 2],
    rxsts: [u32; 2],
    inten: [u32; 2],
    intsts: [u32; 2],
    acks: [usize; 2],
    overwrites: usize,
}

impl Default for State {
    fn default() -> Self {
        Self {
            slot: [[[0; 4]; CHANNELS]; 2],
            txsts: [(1 << CHANNELS) - 1; 2],
            rxsts: [0; 2],
            inten: [0; 2],
            intsts: [0; 2],
            acks: [0; 2],
            overwrites: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeWhc {
    state: Mutex<State>,
}

impl FakeWhc {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn view(&self, side: Side) -> View<'_> {
        View { hw: self, side }
    }

    /// Number of sends made on a channel that was not ready.
    pub fn overwrites(&self) -> usize {
        self.lock().overwrites
    }

    /// Number of acknowledgements written by `side`.
    pub fn acks(&self, side: Side) -> usize {
        self.lock().acks[side.slot()]
    }

    /// Latches receive status bits for `side` with no message behind them.
    pub fn raise_spurious(&self, side: Side, bits: u32) {
        self.lock().intsts[side.slot()] |= bits;
    }
}

/// One core's view of the controller.
#[derive(Copy, Clone, Debug)]
pub struct View<'a> {
    hw: &'a FakeWhc,
    side: Side,
}

impl WhcRegs for View<'_> {
    fn txsts(&self) -> u32 {
        self.hw.lock().txsts[self.side.slot()]
    }

    fn trigger(&self, mask: u32) {
        let mut s = self.hw.lock();
        let (me, peer) = (self.side.slot(), self.side.peer().slot());
        let busy = mask & !s.txsts[me];
        s.overwrites += busy.count_ones() as usize;
        s.txsts[me] &= !mask;
        s.rxsts[peer] |= mask;
        s.intsts[peer] |= mask;
    }

    fn rxsts(&self) -> u32 {
        self.hw.lock().rxsts[self.side.slot()]
    }

    fn ack(&self, mask: u32) {
        let mut s = self.hw.lock();
        let (me, peer) = (self.side.slot(), self.side.peer().slot());
        let mask = mask & s.rxsts[me];
        s.acks[me] += 1;
        s.rxsts[me] &= !mask;
        s.txsts[peer] |= mask;
        s.intsts[peer] |= mask << TX_ACK_SHIFT;
    }

    fn inten(&self) -> u32 {
        self.hw.lock().inten[self.side.slot()]
    }

    fn set_inten(&self, bits: u32) {
        self.hw.lock().inten[self.side.slot()] = bits;
    }

    fn intsts(&self) -> u32 {
        self.hw.lock().intsts[self.side.slot()]
    }

    fn clear_intsts(&self, bits: u32) {
        self.hw.lock().intsts[self.side.slot()] &= !bits;
    }

    fn write_tx(&self, channel: u8, word: usize, value: u32) {
        self.hw.lock().slot[self.side.slot()][usize::from(channel)][word] =
            value;
    }

    fn read_rx(&self, channel: u8, word: usize) -> u32 {
        self.hw.lock().slot[self.side.peer().slot()][usize::from(channel)]
            [word]
    }
}
