// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use heapless::Deque;

use crate::{Channel, Message, Whc, WhcRegs};

/// Returned by [`Outbox::post`] when the queue is full, carrying back the
/// message that didn't fit.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct QueueFull(pub Message);

/// A software queue of up to `N` messages in front of one channel's
/// hardware slot.
///
/// [`Outbox::post`] never touches the hardware; [`Outbox::pump`] moves the
/// oldest message into the slot whenever the peer has acknowledged the
/// previous one. Call `pump` after posting and again from the
/// send-acknowledged interrupt.
pub struct Outbox<const N: usize> {
    channel: Channel,
    queue: Deque<Message, N>,
}

impl<const N: usize> Outbox<N> {
    pub const fn new(channel: Channel) -> Self {
        Self {
            channel,
            queue: Deque::new(),
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Queues `msg` behind anything already waiting.
    pub fn post(&mut self, msg: Message) -> Result<(), QueueFull> {
        self.queue.push_back(msg).map_err(QueueFull)
    }

    /// Sends the oldest queued message if the channel is ready. Returns
    /// `true` if a message went out.
    pub fn pump<R: WhcRegs>(&mut self, whc: &Whc<R>) -> bool {
        let Some(msg) = self.queue.front() else {
            return false;
        };
        if whc.try_send(self.channel, msg).is_err() {
            return false;
        }
        self.queue.pop_front();
        true
    }
}
