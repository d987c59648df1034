// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Random interleavings of posting, pumping and receiving, checked against
//! a plain FIFO.

use std::collections::VecDeque;

use drv_whc::fake::{FakeWhc, Side};
use drv_whc::{Channel, Message, Outbox, QueueFull, Whc};
use proptest::prelude::*;

const DEPTH: usize = 4;

#[derive(Copy, Clone, Debug)]
enum Op {
    Post(u32),
    Pump,
    Recv,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<u32>().prop_map(Op::Post),
        Just(Op::Pump),
        Just(Op::Recv),
    ]
}

proptest! {
    #[test]
    fn outbox_is_a_lossless_fifo(
        ops in proptest::collection::vec(op(), 1..100),
    ) {
        let hw = FakeWhc::new();
        let app = Whc::new(hw.view(Side::App));
        let rt = Whc::new(hw.view(Side::Rt));
        let ch = Channel::new(0).unwrap();
        let mut out = Outbox::<DEPTH>::new(ch);

        // Messages posted, in order, that haven't been received yet.
        let mut expected: VecDeque<Message> = VecDeque::new();
        let mut in_flight = 0usize;

        for op in ops {
            match op {
                Op::Post(n) => {
                    let msg = [n, !n, n.rotate_left(8), 0];
                    let queued = expected.len() - in_flight;
                    match out.post(msg) {
                        Ok(()) => {
                            prop_assert!(queued < DEPTH);
                            expected.push_back(msg);
                        }
                        Err(QueueFull(back)) => {
                            prop_assert_eq!(queued, DEPTH);
                            prop_assert_eq!(back, msg);
                        }
                    }
                }
                Op::Pump => {
                    if out.pump(&app) {
                        prop_assert_eq!(in_flight, 0);
                        in_flight = 1;
                    }
                }
                Op::Recv => match rt.recv(ch) {
                    Some(m) => {
                        prop_assert_eq!(in_flight, 1);
                        prop_assert_eq!(Some(m), expected.pop_front());
                        in_flight = 0;
                    }
                    None => prop_assert_eq!(in_flight, 0),
                },
            }
            prop_assert_eq!(out.len(), expected.len() - in_flight);
        }
        prop_assert_eq!(hw.overwrites(), 0);
    }
}
