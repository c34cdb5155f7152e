// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Controller live migration definitions.
//!
//! Covers the Controller Data Queue (CDQ) admin command and feature, Track
//! Send, Migration Send and Migration Receive, and the binary Controller State
//! data structure returned by Migration Receive. All multi-byte wire fields
//! are little endian.

use bitfield_struct::bitfield;
use open_enum::open_enum;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;
use zerocopy::LE;
use zerocopy::U128;
use zerocopy::U16;
use zerocopy::U32;
use zerocopy::U64;

type U16LE = U16<LE>;
type U32LE = U32<LE>;
type U64LE = U64<LE>;
type U128LE = U128<LE>;

/// Name used when a selector value has no defined meaning.
const UNRECOGNIZED: &str = "unrecognized";

// Controller Data Queue

open_enum! {
    pub enum CdqSelect: u8 {
        CREATE = 0,
        DELETE = 1,
    }
}

open_enum! {
    pub enum CdqQueueType: u8 {
        USER_DATA_MIGRATION = 0,
    }
}

#[bitfield(u32)]
pub struct Cdw10ControllerDataQueue {
    pub sel: u8,
    _rsvd: u8,
    /// Queue type, only meaningful for create.
    pub qt: u8,
    _rsvd2: u8,
}

#[bitfield(u32)]
pub struct Cdw11CreateCdq {
    /// Physically contiguous. The queue memory is always a single buffer.
    pub pc: bool,
    #[bits(15)]
    _rsvd: u16,
    pub cntlid: u16,
}

#[bitfield(u32)]
pub struct Cdw11DeleteCdq {
    pub cdqid: u16,
    _rsvd: u16,
}

/// Set/Get Features dword 11 for [`crate::Feature::CONTROLLER_DATA_QUEUE`].
#[bitfield(u32)]
pub struct Cdw11FeatureControllerDataQueue {
    pub cdqid: u16,
    #[bits(15)]
    _rsvd: u16,
    /// Dword 13 holds a tail pointer trigger.
    pub tpt_valid: bool,
}

/// Data returned by Get Features for the CDQ feature.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoBytes, Immutable, KnownLayout, FromBytes, Unaligned)]
pub struct CdqFeatureData {
    /// Head pointer.
    pub hp: U32LE,
    /// Tail pointer trigger.
    pub tpt: U32LE,
    pub rsvd8: [u8; 504],
}

const _: () = assert!(size_of::<CdqFeatureData>() == 512);

/// LBA Migration Queue Entry Type 0, the entry format of a user data
/// migration queue.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoBytes, Immutable, KnownLayout, FromBytes, Unaligned)]
pub struct LbaMigrationQueueEntry {
    pub nsid: U32LE,
    /// Number of logical blocks.
    pub nlb: U32LE,
    /// Starting LBA.
    pub slba: U64LE,
    pub rsvd16: [u8; 15],
    /// Packed [`CdqEntryAttributes`].
    pub attributes: u8,
}

const _: () = assert!(size_of::<LbaMigrationQueueEntry>() == 32);

/// Size of a CDQ entry in dwords. CDQ sizes are multiples of this.
pub const CDQ_ENTRY_DWORDS: u32 = (size_of::<LbaMigrationQueueEntry>() / 4) as u32;

impl LbaMigrationQueueEntry {
    pub fn attributes(&self) -> CdqEntryAttributes {
        CdqEntryAttributes::from(self.attributes)
    }
}

#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct CdqEntryAttributes {
    /// Controller data queue phase tag.
    pub cdqp: bool,
    /// Entry sequence attribute.
    #[bits(3)]
    pub esa: u8,
    #[bits(1)]
    _rsvd: u8,
    /// Deallocated LBAs.
    pub dlba: bool,
    /// LBA change information attribute, see [`LbaChangeInformation`].
    #[bits(2)]
    pub lbacir: u8,
}

open_enum! {
    pub enum LbaChangeInformation: u8 {
        LBA_RANGE_VALID = 0b00,
        ALL_LOGICAL_BLOCKS = 0b01,
        NO_RANGE_REPORTED = 0b10,
    }
}

// Track Send

open_enum! {
    pub enum TrackSendSelect: u8 {
        LOG_USER_DATA_CHANGES = 0,
        TRACK_MEMORY_CHANGES = 1,
    }
}

impl TrackSendSelect {
    pub fn name(&self) -> &'static str {
        match *self {
            Self::LOG_USER_DATA_CHANGES => "Log User Data Changes",
            Self::TRACK_MEMORY_CHANGES => "Track Memory Changes",
            _ => UNRECOGNIZED,
        }
    }
}

open_enum! {
    /// Management operation specific values for
    /// [`TrackSendSelect::LOG_USER_DATA_CHANGES`].
    pub enum TrackSendMos: u16 {
        STOP_LOGGING = 0,
        START_LOGGING = 1,
    }
}

#[bitfield(u32)]
pub struct Cdw10TrackSend {
    pub sel: u8,
    _rsvd: u8,
    pub mos: u16,
}

#[bitfield(u32)]
pub struct Cdw11TrackSend {
    pub cdqid: u16,
    _rsvd: u16,
}

// Migration Send

open_enum! {
    pub enum MigrationSendSelect: u8 {
        SUSPEND = 0,
        RESUME = 1,
        SET_CONTROLLER_STATE = 2,
    }
}

impl MigrationSendSelect {
    pub fn name(&self) -> &'static str {
        match *self {
            Self::SUSPEND => "Suspend",
            Self::RESUME => "Resume",
            Self::SET_CONTROLLER_STATE => "Set Controller State",
            _ => UNRECOGNIZED,
        }
    }
}

open_enum! {
    pub enum SuspendType: u8 {
        SUSPEND_NOTIFICATION = 0,
        SUSPEND = 1,
    }
}

open_enum! {
    pub enum SequenceIndicator: u8 {
        NOT_FIRST_NOT_LAST = 0,
        FIRST = 1,
        LAST = 2,
        ENTIRE = 3,
    }
}

#[bitfield(u32)]
pub struct Cdw10MigrationSend {
    pub sel: u8,
    _rsvd: u8,
    #[bits(2)]
    pub seqind: u8,
    #[bits(14)]
    _rsvd2: u16,
}

/// Migration Send dword 11 for Suspend and Resume.
#[bitfield(u32)]
pub struct Cdw11MigrationSendSuspend {
    pub cntlid: u16,
    pub stype: u8,
    #[bits(7)]
    _rsvd: u8,
    /// Delete the user data migration queue as part of the suspend.
    pub dudmq: bool,
}

/// Migration Send dword 11 for Set Controller State.
#[bitfield(u32)]
pub struct Cdw11MigrationSendSetState {
    pub cntlid: u16,
    /// Controller state version index.
    pub csvi: u8,
    /// Controller state UUID index.
    pub csuuidi: u8,
}

// Migration Receive

open_enum! {
    pub enum MigrationReceiveSelect: u8 {
        GET_CONTROLLER_STATE = 0,
    }
}

#[bitfield(u32)]
pub struct Cdw10MigrationReceive {
    pub sel: u8,
    _rsvd: u8,
    pub csvi: u8,
    _rsvd2: u8,
}

#[bitfield(u32)]
pub struct Cdw11MigrationReceive {
    pub cntlid: u16,
    pub csuuidi: u8,
    _rsvd: u8,
}

/// Completion dword 0 of Migration Receive.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct MigrationReceiveDw0 {
    pub suspended: bool,
    #[bits(31)]
    _rsvd: u32,
}

// Controller State data structure

/// Leading header of the Controller State data structure.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoBytes, Immutable, KnownLayout, FromBytes, Unaligned)]
pub struct ControllerStateHeader {
    pub ver: U16LE,
    /// Packed [`ControllerStateAttributes`].
    pub csattr: u8,
    pub rsvd3: [u8; 13],
    /// Size of the NVMe controller state section.
    pub nvmecss: U128LE,
    /// Size of the vendor specific section.
    pub vss: U128LE,
}

const _: () = assert!(size_of::<ControllerStateHeader>() == 48);

impl ControllerStateHeader {
    pub fn attributes(&self) -> ControllerStateAttributes {
        ControllerStateAttributes::from(self.csattr)
    }
}

#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct ControllerStateAttributes {
    pub suspended: bool,
    #[bits(7)]
    _rsvd: u8,
}

/// Header of the NVMe controller state section, followed by `niosq`
/// [`IoSubmissionQueueState`] and then `niocq` [`IoCompletionQueueState`].
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoBytes, Immutable, KnownLayout, FromBytes, Unaligned)]
pub struct NvmeControllerStateHeader {
    pub ver: U16LE,
    pub niosq: U16LE,
    pub niocq: U16LE,
    pub rsvd: [u8; 2],
}

const _: () = assert!(size_of::<NvmeControllerStateHeader>() == 8);

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoBytes, Immutable, KnownLayout, FromBytes, Unaligned)]
pub struct IoSubmissionQueueState {
    pub prp1: U64LE,
    pub qsize: U16LE,
    pub qid: U16LE,
    pub cqid: U16LE,
    /// Packed [`IosqAttributes`].
    pub attrs: U16LE,
    pub hp: U16LE,
    pub tp: U16LE,
    pub rsvd: [u8; 4],
}

const _: () = assert!(size_of::<IoSubmissionQueueState>() == 24);

impl IoSubmissionQueueState {
    pub fn attributes(&self) -> IosqAttributes {
        IosqAttributes::from(self.attrs.get())
    }
}

#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct IosqAttributes {
    pub pc: bool,
    #[bits(2)]
    pub qprio: u8,
    #[bits(13)]
    _rsvd: u16,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoBytes, Immutable, KnownLayout, FromBytes, Unaligned)]
pub struct IoCompletionQueueState {
    pub prp1: U64LE,
    pub qsize: U16LE,
    pub qid: U16LE,
    pub hp: U16LE,
    pub tp: U16LE,
    /// Packed [`IocqAttributes`].
    pub attrs: U32LE,
    pub rsvd: [u8; 4],
}

const _: () = assert!(size_of::<IoCompletionQueueState>() == 24);

impl IoCompletionQueueState {
    pub fn attributes(&self) -> IocqAttributes {
        IocqAttributes::from(self.attrs.get())
    }
}

#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct IocqAttributes {
    pub pc: bool,
    /// Interrupts enabled.
    pub ien: bool,
    /// Phase tag of slot 0.
    pub phase: bool,
    #[bits(13)]
    _rsvd: u16,
    /// Interrupt vector.
    pub iv: u16,
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerocopy::FromZeros;

    #[test]
    fn cdq_entry_attribute_bits() {
        let attrs = CdqEntryAttributes::from(0b1010_0111);
        assert!(attrs.cdqp());
        assert_eq!(attrs.esa(), 0b011);
        assert!(attrs.dlba());
        assert_eq!(
            LbaChangeInformation(attrs.lbacir()),
            LbaChangeInformation::NO_RANGE_REPORTED
        );

        let packed: u8 = CdqEntryAttributes::new()
            .with_cdqp(true)
            .with_lbacir(LbaChangeInformation::ALL_LOGICAL_BLOCKS.0)
            .into();
        assert_eq!(packed, 0b0100_0001);
    }

    #[test]
    fn queue_attribute_bits() {
        let sq = IosqAttributes::from(0b101);
        assert!(sq.pc());
        assert_eq!(sq.qprio(), 0b10);

        let cq = IocqAttributes::from(0x0012_0007);
        assert!(cq.pc());
        assert!(cq.ien());
        assert!(cq.phase());
        assert_eq!(cq.iv(), 0x12);
    }

    #[test]
    fn migration_send_dword_packing() {
        let cdw10: u32 = Cdw10MigrationSend::new()
            .with_sel(MigrationSendSelect::SET_CONTROLLER_STATE.0)
            .with_seqind(SequenceIndicator::ENTIRE.0)
            .into();
        assert_eq!(cdw10, 0x0003_0002);

        let suspend: u32 = Cdw11MigrationSendSuspend::new()
            .with_cntlid(0x1234)
            .with_stype(SuspendType::SUSPEND.0)
            .with_dudmq(true)
            .into();
        assert_eq!(suspend, 0x8001_1234);

        let set_state: u32 = Cdw11MigrationSendSetState::new()
            .with_cntlid(0x1234)
            .with_csvi(0x56)
            .with_csuuidi(0x78)
            .into();
        assert_eq!(set_state, 0x7856_1234);
    }

    #[test]
    fn cdq_feature_tpt_valid_is_bit_31() {
        let cdw11: u32 = Cdw11FeatureControllerDataQueue::new()
            .with_cdqid(7)
            .with_tpt_valid(true)
            .into();
        assert_eq!(cdw11, 0x8000_0007);
    }

    #[test]
    fn header_fields_are_little_endian() {
        let mut header = ControllerStateHeader::new_zeroed();
        header.ver = U16::new(0x0102);
        header.csattr = ControllerStateAttributes::new().with_suspended(true).into();
        header.nvmecss = U128::new(0x0102_0304_0506_0708_090a_0b0c_0d0e_0f10);

        let bytes = header.as_bytes();
        assert_eq!(&bytes[..3], &[0x02, 0x01, 0x01]);
        assert_eq!(bytes[16], 0x10);
        assert_eq!(bytes[31], 0x01);
        assert!(header.attributes().suspended());
    }

    #[test]
    fn selector_names() {
        assert_eq!(
            TrackSendSelect::LOG_USER_DATA_CHANGES.name(),
            "Log User Data Changes"
        );
        assert_eq!(MigrationSendSelect(9).name(), "unrecognized");
        assert_eq!(CDQ_ENTRY_DWORDS, 8);
    }
}
