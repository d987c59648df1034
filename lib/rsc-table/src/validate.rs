// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use core::ops::Range;

use amp_config::Region;

use crate::{
    ResourceTable, TableError, VringDesc, NUM_ENTRIES, NUM_VRINGS,
    RSC_TABLE_VERSION, RSC_TRACE, RSC_VDEV, VIRTIO_ID_RPMSG,
};

/// Bytes occupied by a split virtqueue of `num` descriptors: the descriptor
/// table and available ring, padded to `align`, then the used ring.
///
/// `align` must be a power of two. Computed in 64 bits so that any `num`
/// a peer can put in its table yields the true size.
pub const fn vring_size(num: u32, align: u32) -> u64 {
    let num = num as u64;
    let align = align as u64;
    let avail_end = 16 * num + 2 * (3 + num);
    let used = (avail_end + align - 1) & !(align - 1);
    used + 2 * 3 + 8 * num
}

fn span(base: u32, len: u64) -> Range<u64> {
    base as u64..base as u64 + len
}

fn overlaps(a: &Range<u64>, b: &Range<u64>) -> bool {
    a.start < b.end && b.start < a.end
}

fn check_vring(
    v: &VringDesc,
    window: &Region,
) -> Result<Range<u64>, TableError> {
    if !v.align.is_power_of_two() {
        return Err(TableError::BadAlignment);
    }
    if v.da % v.align != 0 {
        return Err(TableError::Unaligned);
    }
    if v.num == 0 {
        return Err(TableError::EmptyRing);
    }
    if !v.num.is_power_of_two() {
        return Err(TableError::BadRingSize(v.num));
    }
    let r = span(v.da, vring_size(v.num, v.align));
    if !window.contains(r.start, r.end - r.start) {
        return Err(TableError::OutsideWindow);
    }
    Ok(r)
}

impl ResourceTable {
    /// Checks that the table is one this crate can use with memory inside
    /// `window`: current version, an RPMsg device with two vrings, each ring
    /// aligned and non-empty, and no two of the rings and the trace buffer
    /// sharing a byte.
    pub fn validate(&self, window: &Region) -> Result<(), TableError> {
        if self.header.ver != RSC_TABLE_VERSION {
            return Err(TableError::BadVersion(self.header.ver));
        }
        if self.header.num as usize != NUM_ENTRIES {
            return Err(TableError::BadEntryCount(self.header.num));
        }
        if self.vdev.rtype != RSC_VDEV {
            return Err(TableError::BadResourceType(self.vdev.rtype));
        }
        if self.vdev.id != VIRTIO_ID_RPMSG {
            return Err(TableError::BadDeviceId(self.vdev.id));
        }
        if self.vdev.num_of_vrings as usize != NUM_VRINGS {
            return Err(TableError::BadVringCount(self.vdev.num_of_vrings));
        }
        if self.trace.rtype != RSC_TRACE {
            return Err(TableError::BadResourceType(self.trace.rtype));
        }

        let tx = check_vring(&self.vdev.vring[0], window)?;
        let rx = check_vring(&self.vdev.vring[1], window)?;

        let trace = span(self.trace.da, u64::from(self.trace.len));
        if !window.contains(trace.start, trace.end - trace.start) {
            return Err(TableError::OutsideWindow);
        }

        if overlaps(&tx, &rx) || overlaps(&tx, &trace) || overlaps(&rx, &trace)
        {
            return Err(TableError::Overlap);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{VdevLayout, RESOURCE_TABLE};
    use amp_config::Vring;
    use proptest::prelude::*;

    const WINDOW: Region = Region {
        base: 0x2000_0000,
        size: 0x0004_0000,
    };

    fn layout(tx: Vring, rx: Vring, trace: Region) -> VdevLayout {
        VdevLayout {
            features: 1,
            notify_id: 0,
            vrings: [tx, rx],
            trace,
            trace_name: "test",
        }
    }

    fn ring(da: u32, align: u32, num: u32, notify_id: u32) -> Vring {
        Vring {
            da,
            align,
            num,
            notify_id,
        }
    }

    const TRACE: Region = Region {
        base: 0x2003_0000,
        size: 0x1000,
    };

    #[test]
    fn vring_size_matches_virtio_layout() {
        // 16 descriptors: 256 bytes of table, 38 of avail ring, pad to 4 KiB,
        // 6 + 128 of used ring.
        assert_eq!(vring_size(16, 4096), 4096 + 134);
        assert_eq!(vring_size(1, 4), 16 + 8 + 6 + 8);
        assert_eq!(vring_size(256, 16), 4096 + 528 + 6 + 2048);
    }

    #[test]
    fn huge_ring_counts_do_not_wrap() {
        const HUGE: u64 = vring_size(0x8000_0000, 0x1000);
        assert!(HUGE > 16 * 0x8000_0000);

        let t = ResourceTable::new(&layout(
            ring(0x2000_0000, 0x1000, 0x8000_0000, 0),
            ring(0x2000_4000, 0x1000, 16, 1),
            TRACE,
        ));
        assert_eq!(t.validate(&WINDOW), Err(TableError::OutsideWindow));

        let t = ResourceTable::new(&layout(
            ring(0x2000_0000, 0x1000, 16, 0),
            ring(0x2000_4000, 0x1000, 1 << 31, 1),
            TRACE,
        ));
        assert_eq!(t.validate(&WINDOW), Err(TableError::OutsideWindow));
    }

    #[test]
    fn good_layout_validates() {
        let t = ResourceTable::new(&layout(
            ring(0x2000_0000, 0x1000, 16, 0),
            ring(0x2000_4000, 0x1000, 16, 1),
            TRACE,
        ));
        assert_eq!(t.validate(&WINDOW), Ok(()));
    }

    #[test]
    fn geometry_errors_are_reported() {
        let ok = ring(0x2000_4000, 0x1000, 16, 1);
        let cases = [
            (ring(0x2000_0000, 0x0C00, 16, 0), TableError::BadAlignment),
            (ring(0x2000_0800, 0x1000, 16, 0), TableError::Unaligned),
            (ring(0x2000_0000, 0x1000, 0, 0), TableError::EmptyRing),
            (ring(0x2000_0000, 0x1000, 12, 0), TableError::BadRingSize(12)),
            (ring(0x1FFF_0000, 0x1000, 16, 0), TableError::OutsideWindow),
            (ring(0x2003_F000, 0x1000, 16, 0), TableError::OutsideWindow),
            (ring(0x2000_3000, 0x1000, 16, 0), TableError::Overlap),
        ];
        for (bad, want) in cases {
            let t = ResourceTable::new(&layout(bad, ok, TRACE));
            assert_eq!(t.validate(&WINDOW), Err(want), "{bad:x?}");
        }
    }

    #[test]
    fn trace_buffer_must_fit_and_stay_clear_of_rings() {
        let tx = ring(0x2000_0000, 0x1000, 16, 0);
        let rx = ring(0x2000_4000, 0x1000, 16, 1);

        let outside = Region {
            base: 0x2003_F800,
            size: 0x1000,
        };
        let t = ResourceTable::new(&layout(tx, rx, outside));
        assert_eq!(t.validate(&WINDOW), Err(TableError::OutsideWindow));

        let on_rx = Region {
            base: 0x2000_5000,
            size: 0x100,
        };
        let t = ResourceTable::new(&layout(tx, rx, on_rx));
        assert_eq!(t.validate(&WINDOW), Err(TableError::Overlap));
    }

    #[test]
    fn framing_is_checked_too() {
        let mut t = RESOURCE_TABLE;
        t.header.ver = 0;
        assert_eq!(
            t.validate(&amp_config::SHARED),
            Err(TableError::BadVersion(0))
        );

        let mut t = RESOURCE_TABLE;
        t.vdev.num_of_vrings = 3;
        assert_eq!(
            t.validate(&amp_config::SHARED),
            Err(TableError::BadVringCount(3))
        );
    }

    fn arb_ring() -> impl Strategy<Value = Vring> {
        (0u32..0x40, 4u32..13, 0u32..9).prop_map(|(page, align, num)| Vring {
            da: WINDOW.base + page * 0x1000,
            align: 1 << align,
            num: 1 << num,
            notify_id: 0,
        })
    }

    proptest! {
        #[test]
        fn validate_agrees_with_a_direct_overlap_check(
            tx in arb_ring(),
            rx in arb_ring(),
        ) {
            let t = ResourceTable::new(&layout(tx, rx, TRACE));
            let tx_r = span(tx.da, vring_size(tx.num, tx.align));
            let rx_r = span(rx.da, vring_size(rx.num, rx.align));
            let tr = span(TRACE.base, u64::from(TRACE.size));
            let inside = |r: &Range<u64>| {
                r.start >= WINDOW.base as u64 && r.end <= WINDOW.end()
            };

            match t.validate(&WINDOW) {
                Ok(()) => {
                    prop_assert!(inside(&tx_r) && inside(&rx_r));
                    prop_assert!(!overlaps(&tx_r, &rx_r));
                    prop_assert!(!overlaps(&tx_r, &tr));
                    prop_assert!(!overlaps(&rx_r, &tr));
                }
                Err(TableError::Overlap) => {
                    prop_assert!(
                        overlaps(&tx_r, &rx_r)
                            || overlaps(&tx_r, &tr)
                            || overlaps(&rx_r, &tr)
                    );
                }
                Err(TableError::OutsideWindow) => {
                    prop_assert!(!inside(&tx_r) || !inside(&rx_r));
                }
                Err(e) => prop_assert!(false, "unexpected {e:?}"),
            }
        }

        #[test]
        fn vring_size_grows_with_buffer_count(
            num_log in 0u32..12,
            align_log in 2u32..14,
        ) {
            let align = 1 << align_log;
            let n = 1 << num_log;
            let small = vring_size(n, align);
            let big = vring_size(n * 2, align);
            prop_assert!(big > small);
            prop_assert!(small >= 16 * u64::from(n));
        }
    }
}
