// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The remoteproc resource table shared by the application cluster and the
//! real-time core.
//!
//! Both images are linked separately, so the only thing tying their view of
//! the RPMsg transport together is this table: a versioned header, an offset
//! per entry, one virtio device entry carrying the two vrings, and one trace
//! buffer entry. The layout is the OpenAMP one, in the byte order of the
//! cores (little-endian on every part we build for).
//!
//! ```text
//!  0  ver | num | reserved[2]
//! 16  offset[0] | offset[1]
//! 24  vdev: type id notifyid dfeatures gfeatures config_len
//!           status num_of_vrings reserved[2]
//!           vring[0]: da align num notifyid reserved
//!           vring[1]: da align num notifyid reserved
//! 92  trace: type da len reserved name[32]
//! ```
//!
//! The table built here is checked in two places: the board configuration
//! is checked when it is compiled in, and [`ResourceTable::validate`] checks
//! any table (ours or one read from the peer) against the shared window at
//! run time.

#![cfg_attr(target_os = "none", no_std)]

use amp_config::Region;
use ringbuf::{ringbuf, ringbuf_entry};
use static_assertions::const_assert_eq;
use zerocopy::{FromBytes, IntoBytes};

mod validate;

pub use validate::vring_size;

/// The only table version either side understands.
pub const RSC_TABLE_VERSION: u32 = 1;

/// Number of entries in the table.
pub const NUM_ENTRIES: usize = 2;

/// Resource type of a trace buffer entry.
pub const RSC_TRACE: u32 = 2;

/// Resource type of a virtio device entry.
pub const RSC_VDEV: u32 = 3;

/// Virtio device id of an RPMsg device.
pub const VIRTIO_ID_RPMSG: u32 = 7;

/// Feature bit announcing name-service support.
pub const VIRTIO_RPMSG_F_NS: u32 = 1 << 0;

/// Number of vrings an RPMsg device carries: one per direction.
pub const NUM_VRINGS: usize = 2;

/// Length of a trace buffer's name, including the terminating NUL.
pub const TRACE_NAME_LEN: usize = 32;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TableError {
    /// Not enough bytes for the structure being read.
    TooShort,
    BadVersion(u32),
    BadEntryCount(u32),
    /// An entry offset is unaligned or points outside the table.
    BadOffset,
    BadResourceType(u32),
    /// The virtio device is not an RPMsg device.
    BadDeviceId(u32),
    BadVringCount(u8),
    /// A vring alignment is not a power of two.
    BadAlignment,
    /// A vring address is not a multiple of its alignment.
    Unaligned,
    /// A vring has no buffers.
    EmptyRing,
    /// A vring buffer count is not a power of two.
    BadRingSize(u32),
    OutsideWindow,
    Overlap,
}

#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    zerocopy_derive::FromBytes,
    zerocopy_derive::IntoBytes,
    zerocopy_derive::Immutable,
    zerocopy_derive::KnownLayout,
)]
#[repr(C)]
pub struct Header {
    pub ver: u32,
    pub num: u32,
    pub reserved: [u32; 2],
}

#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    zerocopy_derive::FromBytes,
    zerocopy_derive::IntoBytes,
    zerocopy_derive::Immutable,
    zerocopy_derive::KnownLayout,
)]
#[repr(C)]
pub struct VringDesc {
    pub da: u32,
    pub align: u32,
    pub num: u32,
    pub notifyid: u32,
    pub reserved: u32,
}

#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    zerocopy_derive::FromBytes,
    zerocopy_derive::IntoBytes,
    zerocopy_derive::Immutable,
    zerocopy_derive::KnownLayout,
)]
#[repr(C)]
pub struct VdevEntry {
    pub rtype: u32,
    pub id: u32,
    pub notifyid: u32,
    pub dfeatures: u32,
    pub gfeatures: u32,
    pub config_len: u32,
    pub status: u8,
    pub num_of_vrings: u8,
    pub reserved: [u8; 2],
    pub vring: [VringDesc; NUM_VRINGS],
}

#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    zerocopy_derive::FromBytes,
    zerocopy_derive::IntoBytes,
    zerocopy_derive::Immutable,
    zerocopy_derive::KnownLayout,
)]
#[repr(C)]
pub struct TraceEntry {
    pub rtype: u32,
    pub da: u32,
    pub len: u32,
    pub reserved: u32,
    pub name: [u8; TRACE_NAME_LEN],
}

#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    zerocopy_derive::FromBytes,
    zerocopy_derive::IntoBytes,
    zerocopy_derive::Immutable,
    zerocopy_derive::KnownLayout,
)]
#[repr(C)]
pub struct ResourceTable {
    pub header: Header,
    pub offset: [u32; NUM_ENTRIES],
    pub vdev: VdevEntry,
    pub trace: TraceEntry,
}

const_assert_eq!(core::mem::size_of::<Header>(), 16);
const_assert_eq!(core::mem::size_of::<VringDesc>(), 20);
const_assert_eq!(core::mem::size_of::<VdevEntry>(), 68);
const_assert_eq!(core::mem::size_of::<TraceEntry>(), 48);
const_assert_eq!(core::mem::size_of::<ResourceTable>(), 140);

const VDEV_OFFSET: u32 = core::mem::offset_of!(ResourceTable, vdev) as u32;
const TRACE_OFFSET: u32 = core::mem::offset_of!(ResourceTable, trace) as u32;

const_assert_eq!(VDEV_OFFSET, 24);
const_assert_eq!(TRACE_OFFSET, 92);

/// Everything that varies between boards.
#[derive(Copy, Clone, Debug)]
pub struct VdevLayout {
    pub features: u32,
    pub notify_id: u32,
    /// Ring 0 carries messages from the host to the remote, ring 1 the
    /// reverse.
    pub vrings: [amp_config::Vring; NUM_VRINGS],
    pub trace: Region,
    pub trace_name: &'static str,
}

impl VdevLayout {
    /// The layout described by the board configuration.
    pub const BOARD: Self = Self {
        features: amp_config::rpmsg::FEATURES,
        notify_id: amp_config::rpmsg::NOTIFY_ID,
        vrings: [amp_config::rpmsg::TX, amp_config::rpmsg::RX],
        trace: amp_config::trace::BUFFER,
        trace_name: amp_config::trace::NAME,
    };
}

/// Which end of the RPMsg link this core plays.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Role {
    /// Owns the vrings and kicks the remote first; the application cluster.
    Host,
    /// Attaches to vrings the host describes; the real-time core.
    Remote,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Trace {
    None,
    Init(Role),
    Parsed,
    Rejected(TableError),
}

ringbuf!(Trace, 8, Trace::None);

const fn vring_desc(v: &amp_config::Vring) -> VringDesc {
    VringDesc {
        da: v.da,
        align: v.align,
        num: v.num,
        notifyid: v.notify_id,
        reserved: 0,
    }
}

/// Copies `name` into a NUL-terminated fixed buffer, truncating if needed.
const fn trace_name(name: &str) -> [u8; TRACE_NAME_LEN] {
    let src = name.as_bytes();
    let mut out = [0u8; TRACE_NAME_LEN];
    let mut i = 0;
    while i < src.len() && i < TRACE_NAME_LEN - 1 {
        out[i] = src[i];
        i += 1;
    }
    out
}

impl ResourceTable {
    pub const fn new(layout: &VdevLayout) -> Self {
        Self {
            header: Header {
                ver: RSC_TABLE_VERSION,
                num: NUM_ENTRIES as u32,
                reserved: [0; 2],
            },
            offset: [VDEV_OFFSET, TRACE_OFFSET],
            vdev: VdevEntry {
                rtype: RSC_VDEV,
                id: VIRTIO_ID_RPMSG,
                notifyid: layout.notify_id,
                dfeatures: layout.features,
                gfeatures: 0,
                config_len: 0,
                status: 0,
                num_of_vrings: NUM_VRINGS as u8,
                reserved: [0; 2],
                vring: [
                    vring_desc(&layout.vrings[0]),
                    vring_desc(&layout.vrings[1]),
                ],
            },
            trace: TraceEntry {
                rtype: RSC_TRACE,
                da: layout.trace.base,
                len: layout.trace.size,
                reserved: 0,
                name: trace_name(layout.trace_name),
            },
        }
    }

    /// Reads a table out of `bytes`, following its offset array.
    ///
    /// Only the framing is checked here: version, entry count, offsets and
    /// entry types. The returned table always carries this crate's offsets,
    /// whatever the source used. Call [`ResourceTable::validate`] to check
    /// the vring geometry.
    pub fn parse(bytes: &[u8]) -> Result<Self, TableError> {
        let r = Self::parse_inner(bytes);
        match r {
            Ok(_) => ringbuf_entry!(Trace::Parsed),
            Err(e) => ringbuf_entry!(Trace::Rejected(e)),
        }
        r
    }

    fn parse_inner(bytes: &[u8]) -> Result<Self, TableError> {
        let (header, rest) = Header::read_from_prefix(bytes)
            .map_err(|_| TableError::TooShort)?;
        if header.ver != RSC_TABLE_VERSION {
            return Err(TableError::BadVersion(header.ver));
        }
        if header.num as usize != NUM_ENTRIES {
            return Err(TableError::BadEntryCount(header.num));
        }
        let (offset, _) = <[u32; NUM_ENTRIES]>::read_from_prefix(rest)
            .map_err(|_| TableError::TooShort)?;

        let vdev: VdevEntry = entry_at(bytes, offset[0])?;
        if vdev.rtype != RSC_VDEV {
            return Err(TableError::BadResourceType(vdev.rtype));
        }
        if vdev.id != VIRTIO_ID_RPMSG {
            return Err(TableError::BadDeviceId(vdev.id));
        }
        if vdev.num_of_vrings as usize != NUM_VRINGS {
            return Err(TableError::BadVringCount(vdev.num_of_vrings));
        }

        let trace: TraceEntry = entry_at(bytes, offset[1])?;
        if trace.rtype != RSC_TRACE {
            return Err(TableError::BadResourceType(trace.rtype));
        }

        Ok(Self {
            header,
            offset: [VDEV_OFFSET, TRACE_OFFSET],
            vdev,
            trace,
        })
    }

    /// Returns the table's trace buffer name up to its terminator.
    pub fn trace_name(&self) -> &[u8] {
        let n = self
            .trace
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(TRACE_NAME_LEN);
        &self.trace.name[..n]
    }
}

/// Reads a `T` at byte `offset` of `bytes`. The first table entry can start
/// no earlier than the end of the offset array.
fn entry_at<T: FromBytes>(bytes: &[u8], offset: u32) -> Result<T, TableError> {
    let offset = offset as usize;
    let first = core::mem::size_of::<Header>()
        + NUM_ENTRIES * core::mem::size_of::<u32>();
    if offset < first || offset % 4 != 0 {
        return Err(TableError::BadOffset);
    }
    let src = bytes.get(offset..).ok_or(TableError::BadOffset)?;
    T::read_from_prefix(src)
        .map(|(t, _)| t)
        .map_err(|_| TableError::TooShort)
}

/// This core's copy of the table. On target it lands in the
/// `.resource_table` section where the loader on the host side looks for it.
#[cfg_attr(target_os = "none", link_section = ".resource_table")]
#[used]
pub static RESOURCE_TABLE: ResourceTable =
    ResourceTable::new(&VdevLayout::BOARD);

/// Hands out the static resource table as raw bytes: its address is
/// `as_ptr()` and its length is `len()`.
///
/// Both roles get the same table; `role` is only recorded.
pub fn resource_table_init(role: Role) -> &'static [u8] {
    ringbuf_entry!(Trace::Init(role));
    RESOURCE_TABLE.as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_table_bytes() -> Vec<u8> {
        RESOURCE_TABLE.as_bytes().to_vec()
    }

    #[test]
    fn board_table_is_well_formed() {
        let t = &RESOURCE_TABLE;
        assert_eq!(t.header.ver, 1);
        assert_eq!(t.header.num, 2);
        assert_eq!(t.offset, [24, 92]);
        assert_eq!(t.vdev.rtype, RSC_VDEV);
        assert_eq!(t.vdev.id, VIRTIO_ID_RPMSG);
        assert_eq!(t.vdev.num_of_vrings, 2);
        assert_eq!(t.trace_name(), amp_config::trace::NAME.as_bytes());
        assert_eq!(t.validate(&amp_config::SHARED), Ok(()));
    }

    #[test]
    fn init_hands_out_the_same_table_for_both_roles() {
        let host = resource_table_init(Role::Host);
        let remote = resource_table_init(Role::Remote);
        assert_eq!(host.as_ptr(), remote.as_ptr());
        assert_eq!(host.len(), core::mem::size_of::<ResourceTable>());
        assert_eq!(host, remote);
    }

    #[test]
    fn parse_reads_back_our_own_table() {
        let bytes = board_table_bytes();
        assert_eq!(ResourceTable::parse(&bytes), Ok(RESOURCE_TABLE));
    }

    #[test]
    fn parse_rejects_wrong_version() {
        let mut bytes = board_table_bytes();
        bytes[0] = 2;
        assert_eq!(
            ResourceTable::parse(&bytes),
            Err(TableError::BadVersion(2))
        );
    }

    #[test]
    fn parse_rejects_wrong_entry_count() {
        let mut bytes = board_table_bytes();
        bytes[4] = 3;
        assert_eq!(
            ResourceTable::parse(&bytes),
            Err(TableError::BadEntryCount(3))
        );
    }

    #[test]
    fn parse_rejects_truncated_tables() {
        let bytes = board_table_bytes();
        assert_eq!(
            ResourceTable::parse(&bytes[..8]),
            Err(TableError::TooShort)
        );
        assert_eq!(
            ResourceTable::parse(&bytes[..100]),
            Err(TableError::TooShort)
        );
    }

    #[test]
    fn parse_rejects_offsets_into_the_header() {
        let mut bytes = board_table_bytes();
        bytes[16..20].copy_from_slice(&8u32.to_le_bytes());
        assert_eq!(ResourceTable::parse(&bytes), Err(TableError::BadOffset));

        bytes[16..20].copy_from_slice(&4096u32.to_le_bytes());
        assert_eq!(ResourceTable::parse(&bytes), Err(TableError::BadOffset));
    }

    #[test]
    fn parse_checks_entry_types() {
        let mut bytes = board_table_bytes();
        bytes[24..28].copy_from_slice(&RSC_TRACE.to_le_bytes());
        assert_eq!(
            ResourceTable::parse(&bytes),
            Err(TableError::BadResourceType(RSC_TRACE))
        );

        let mut bytes = board_table_bytes();
        bytes[28..32].copy_from_slice(&1u32.to_le_bytes());
        assert_eq!(
            ResourceTable::parse(&bytes),
            Err(TableError::BadDeviceId(1))
        );

        let mut bytes = board_table_bytes();
        bytes[24 + 25] = 1;
        assert_eq!(
            ResourceTable::parse(&bytes),
            Err(TableError::BadVringCount(1))
        );
    }

    #[test]
    fn parse_follows_relocated_entries() {
        // Same entries, but the peer put four bytes of padding before the
        // device entry.
        let t = RESOURCE_TABLE;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(t.header.as_bytes());
        bytes.extend_from_slice(&28u32.to_le_bytes());
        bytes.extend_from_slice(&96u32.to_le_bytes());
        bytes.extend_from_slice(&[0; 4]);
        bytes.extend_from_slice(t.vdev.as_bytes());
        bytes.extend_from_slice(t.trace.as_bytes());

        assert_eq!(ResourceTable::parse(&bytes), Ok(t));
    }

    #[test]
    fn long_trace_names_are_truncated() {
        let name = trace_name("a-name-that-is-much-longer-than-thirty-one");
        assert_eq!(name[TRACE_NAME_LEN - 1], 0);
        assert!(name[..TRACE_NAME_LEN - 1].iter().all(|&b| b != 0));
    }
}
