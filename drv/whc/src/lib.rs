// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Driver for the Wormhole Controller (WHC), the fixed-slot message channel
//! between the application cluster and the real-time core.
//!
//! Each channel carries one four-word [`Message`] at a time in each
//! direction. Sending writes the transmit slot and pokes `TXCTL`; the
//! channel's ready bit drops until the peer reads the message and
//! acknowledges it through `RXCTL`, at which point the sender's ready bit
//! comes back (and, if enabled, the sender gets a send-acknowledged
//! interrupt).
//!
//! The hardware does not stop a sender from writing a channel that isn't
//! ready; the new words simply replace whatever the peer has not read yet.
//! [`Whc::send_unchecked`] preserves that behavior. Everything else in this
//! crate ([`Whc::try_send`], [`Outbox`]) refuses instead.

#![cfg_attr(target_os = "none", no_std)]

use drv_amp_sys::{ResetLine, Sys, SysError, SysRegs};
use ringbuf::{ringbuf, ringbuf_entry};

pub mod mmio;
mod outbox;

#[cfg(not(target_os = "none"))]
pub mod fake;

pub use outbox::{Outbox, QueueFull};

/// One message: four 32-bit words.
pub type Message = [u32; 4];

/// Bit offset of the send-acknowledged flags in `INTEN`/`INTSTS`.
pub const TX_ACK_SHIFT: u32 = 16;

/// A channel index known to exist on this board.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Channel(u8);

impl Channel {
    pub const COUNT: u8 = amp_config::whc::CHANNELS;

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

    /// This channel's receive bit.
    pub const fn mask(self) -> u32 {
        1 << self.0
    }

    /// This channel's send-acknowledged interrupt bit.
    pub const fn tx_ack_mask(self) -> u32 {
        1 << (self.0 as u32 + TX_ACK_SHIFT)
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (0..Self::COUNT).map(Self)
    }
}

/// Register-level access to one core's view of the controller.
pub trait WhcRegs {
    fn txsts(&self) -> u32;
    /// Sends every channel set in `mask`.
    fn trigger(&self, mask: u32);
    fn rxsts(&self) -> u32;
    /// Acknowledges every channel set in `mask`.
    fn ack(&self, mask: u32);
    fn inten(&self) -> u32;
    fn set_inten(&self, bits: u32);
    fn intsts(&self) -> u32;
    fn clear_intsts(&self, bits: u32);
    fn write_tx(&self, channel: u8, word: usize, value: u32);
    fn read_rx(&self, channel: u8, word: usize) -> u32;
}

impl<T: WhcRegs + ?Sized> WhcRegs for &T {
    fn txsts(&self) -> u32 {
        (**self).txsts()
    }

    fn trigger(&self, mask: u32) {
        (**self).trigger(mask)
    }

    fn rxsts(&self) -> u32 {
        (**self).rxsts()
    }

    fn ack(&self, mask: u32) {
        (**self).ack(mask)
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

    fn write_tx(&self, channel: u8, word: usize, value: u32) {
        (**self).write_tx(channel, word, value)
    }

    fn read_rx(&self, channel: u8, word: usize) -> u32 {
        (**self).read_rx(channel, word)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SendError {
    /// The peer has not acknowledged the previous message yet.
    Busy,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Trace {
    None,
    Sent(Channel),
    Overwrote(Channel),
    Busy(Channel),
    Received(Channel, Message),
    Spurious(Channel),
    Irq(u32),
}

ringbuf!(Trace, 32, Trace::None);

pub struct Whc<R: WhcRegs> {
    regs: R,
}

impl<R: WhcRegs> Whc<R> {
    pub fn new(regs: R) -> Self {
        Self { regs }
    }

    /// Empties every channel in both directions by pulsing the controller's
    /// reset line. Only call it while the other core is held in reset.
    pub fn init<S: SysRegs>(&self, sys: &Sys<S>) -> Result<(), SysError> {
        sys.pulse_reset(ResetLine::Whc)
    }

    /// Returns `true` if the peer has acknowledged the last message sent on
    /// `channel`.
    pub fn is_tx_ready(&self, channel: Channel) -> bool {
        self.regs.txsts() & channel.mask() != 0
    }

    /// Returns `true` if a message is waiting on `channel`.
    pub fn is_rx_available(&self, channel: Channel) -> bool {
        self.regs.rxsts() & channel.mask() != 0
    }

    /// Writes `msg` and sends it without checking that the channel is
    /// ready. If it isn't, the unread message is replaced.
    pub fn send_unchecked(&self, channel: Channel, msg: &Message) {
        if self.is_tx_ready(channel) {
            ringbuf_entry!(Trace::Sent(channel));
        } else {
            ringbuf_entry!(Trace::Overwrote(channel));
        }
        for (i, &word) in msg.iter().enumerate() {
            self.regs.write_tx(channel.index(), i, word);
        }
        self.regs.trigger(channel.mask());
    }

    /// Sends `msg` if the channel is ready, and otherwise leaves the
    /// in-flight message alone and returns `Busy`.
    pub fn try_send(
        &self,
        channel: Channel,
        msg: &Message,
    ) -> Result<(), SendError> {
        if !self.is_tx_ready(channel) {
            ringbuf_entry!(Trace::Busy(channel));
            return Err(SendError::Busy);
        }
        self.send_unchecked(channel, msg);
        Ok(())
    }

    /// Takes the message waiting on `channel`, if any.
    ///
    /// The receive interrupt flag is cleared first, so a message that lands
    /// after we look will raise it again. With nothing waiting, nothing but
    /// that flag is touched.
    pub fn recv(&self, channel: Channel) -> Option<Message> {
        self.regs.clear_intsts(channel.mask());
        if !self.is_rx_available(channel) {
            ringbuf_entry!(Trace::Spurious(channel));
            return None;
        }
        let mut msg = [0; 4];
        for (i, word) in msg.iter_mut().enumerate() {
            *word = self.regs.read_rx(channel.index(), i);
        }
        self.regs.ack(channel.mask());
        ringbuf_entry!(Trace::Received(channel, msg));
        Some(msg)
    }

    pub fn enable_rx_int(&self, channel: Channel) {
        self.regs.set_inten(self.regs.inten() | channel.mask());
    }

    pub fn disable_rx_int(&self, channel: Channel) {
        self.regs.set_inten(self.regs.inten() & !channel.mask());
    }

    /// Enables the interrupt raised when the peer acknowledges a message we
    /// sent on `channel`.
    pub fn enable_tx_int(&self, channel: Channel) {
        self.regs.set_inten(self.regs.inten() | channel.tx_ack_mask());
    }

    pub fn disable_tx_int(&self, channel: Channel) {
        self.regs.set_inten(self.regs.inten() & !channel.tx_ack_mask());
    }

    /// Interrupt handler body. Receives on every enabled channel with its
    /// receive flag set, handing each message to `deliver`, and acknowledges
    /// enabled send-acknowledged flags.
    ///
    /// Returns the send-acknowledged bits handled, shifted down so that bit
    /// n is channel n; those channels are ready to send again.
    pub fn handle_interrupt(
        &self,
        mut deliver: impl FnMut(Channel, Message),
    ) -> u32 {
        let pending = self.regs.intsts() & self.regs.inten();
        ringbuf_entry!(Trace::Irq(pending));

        for ch in Channel::all() {
            if pending & ch.mask() != 0 {
                if let Some(msg) = self.recv(ch) {
                    deliver(ch, msg);
                }
            }
        }

        let acked = pending & !((1 << TX_ACK_SHIFT) - 1);
        if acked != 0 {
            self.regs.clear_intsts(acked);
        }
        acked >> TX_ACK_SHIFT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeWhc, Side};
    use drv_amp_sys::fake::FakeSys;

    fn ch(n: u8) -> Channel {
        Channel::new(n).unwrap()
    }

    #[test]
    fn channel_masks() {
        assert_eq!(Channel::new(Channel::COUNT), None);
        assert_eq!(ch(2).mask(), 0b100);
        assert_eq!(ch(2).tx_ack_mask(), 0b100 << 16);
    }

    #[test]
    fn try_send_refuses_until_acknowledged() {
        let hw = FakeWhc::new();
        let app = Whc::new(hw.view(Side::App));
        let rt = Whc::new(hw.view(Side::Rt));

        app.try_send(ch(0), &[1, 2, 3, 4]).unwrap();
        assert_eq!(app.try_send(ch(0), &[9, 9, 9, 9]), Err(SendError::Busy));
        assert_eq!(rt.recv(ch(0)), Some([1, 2, 3, 4]));
        app.try_send(ch(0), &[5, 6, 7, 8]).unwrap();
        assert_eq!(rt.recv(ch(0)), Some([5, 6, 7, 8]));
    }

    #[test]
    fn directions_and_channels_are_independent() {
        let hw = FakeWhc::new();
        let app = Whc::new(hw.view(Side::App));
        let rt = Whc::new(hw.view(Side::Rt));

        app.send_unchecked(ch(1), &[1, 1, 1, 1]);
        rt.send_unchecked(ch(1), &[2, 2, 2, 2]);
        assert!(app.is_tx_ready(ch(0)));
        assert!(!app.is_rx_available(ch(0)));

        assert_eq!(app.recv(ch(1)), Some([2, 2, 2, 2]));
        assert_eq!(rt.recv(ch(1)), Some([1, 1, 1, 1]));
    }

    #[test]
    fn spurious_recv_only_clears_the_flag() {
        let hw = FakeWhc::new();
        let rt = Whc::new(hw.view(Side::Rt));
        hw.raise_spurious(Side::Rt, ch(2).mask());

        assert_eq!(rt.recv(ch(2)), None);
        assert_eq!(hw.view(Side::Rt).intsts(), 0);
        assert_eq!(hw.acks(Side::Rt), 0);
    }

    #[test]
    fn handler_delivers_and_reports_acks() {
        let hw = FakeWhc::new();
        let app = Whc::new(hw.view(Side::App));
        let rt = Whc::new(hw.view(Side::Rt));
        rt.enable_rx_int(ch(0));
        rt.enable_rx_int(ch(3));
        app.enable_tx_int(ch(3));

        app.send_unchecked(ch(0), &[10, 11, 12, 13]);
        app.send_unchecked(ch(3), &[30, 31, 32, 33]);

        let mut got = Vec::new();
        assert_eq!(rt.handle_interrupt(|c, m| got.push((c, m))), 0);
        assert_eq!(
            got,
            vec![(ch(0), [10, 11, 12, 13]), (ch(3), [30, 31, 32, 33])]
        );
        assert_eq!(hw.view(Side::Rt).intsts(), 0);

        // Only channel 3 asked to hear about acknowledgement; channel 0's
        // flag stays latched.
        assert_eq!(app.handle_interrupt(|_, _| panic!()), ch(3).mask());
        assert_eq!(hw.view(Side::App).intsts(), ch(0).tx_ack_mask());
    }

    #[test]
    fn disabled_channels_are_left_for_polling() {
        let hw = FakeWhc::new();
        let app = Whc::new(hw.view(Side::App));
        let rt = Whc::new(hw.view(Side::Rt));
        rt.enable_rx_int(ch(1));
        rt.disable_rx_int(ch(1));

        app.send_unchecked(ch(1), &[4, 3, 2, 1]);
        assert_eq!(rt.handle_interrupt(|_, _| panic!()), 0);
        assert_eq!(rt.recv(ch(1)), Some([4, 3, 2, 1]));
    }

    #[test]
    fn init_pulses_the_module_reset() {
        let hw = FakeWhc::new();
        let sys_hw = FakeSys::new();
        let whc = Whc::new(hw.view(Side::App));

        whc.init(&Sys::new(&sys_hw)).unwrap();
        assert_eq!(sys_hw.releases(ResetLine::Whc.bit()), 1);
    }
}
