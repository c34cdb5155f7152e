// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Definitions from the NVMe specifications needed to drive controller live
//! migration from the host:
//!
//! NVM Express Base Specification 2.1, admin command set, with the Controller
//! Data Queue, Track Send and Migration Send/Receive commands.
//!
//! The base command and completion formats live here; everything specific to
//! migration lives in [`lm`].

#![no_std]

pub mod lm;

use bitfield_struct::bitfield;
use open_enum::open_enum;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;

/// A submission queue entry.
///
/// Data pointers are owned by whoever issues the command, so `dptr` is left
/// zero by the command builders.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct Command {
    pub cdw0: Cdw0,
    pub nsid: u32,
    pub cdw2: u32,
    pub cdw3: u32,
    pub mptr: u64,
    pub dptr: [u64; 2],
    pub cdw10: u32,
    pub cdw11: u32,
    pub cdw12: u32,
    pub cdw13: u32,
    pub cdw14: u32,
    pub cdw15: u32,
}

const _: () = assert!(size_of::<Command>() == 64);

#[bitfield(u32)]
#[derive(PartialEq, Eq, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct Cdw0 {
    pub opcode: u8,
    #[bits(2)]
    pub fuse: u8,
    #[bits(4)]
    pub reserved: u8,
    #[bits(2)]
    pub psdt: u8,
    pub cid: u16,
}

#[repr(C)]
pub struct Opcode(pub u8);

impl Opcode {
    pub fn transfer_controller_to_host(&self) -> bool {
        self.0 & 0b10 != 0
    }

    pub fn transfer_host_to_controller(&self) -> bool {
        self.0 & 0b01 != 0
    }
}

open_enum! {
    pub enum AdminOpcode: u8 {
        GET_LOG_PAGE = 0x02,
        IDENTIFY = 0x06,
        SET_FEATURES = 0x09,
        GET_FEATURES = 0x0a,
        TRACK_SEND = 0x3d,
        TRACK_RECEIVE = 0x3e,
        MIGRATION_SEND = 0x41,
        MIGRATION_RECEIVE = 0x42,
        CONTROLLER_DATA_QUEUE = 0x45,
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct Completion {
    pub dw0: u32,
    pub dw1: u32,
    pub sqhd: u16,
    pub sqid: u16,
    pub cid: u16,
    pub status: CompletionStatus,
}

const _: () = assert!(size_of::<Completion>() == 16);

#[bitfield(u16)]
#[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct CompletionStatus {
    pub phase: bool,
    /// 8 bits of status code followed by 3 bits of the status code type.
    #[bits(11)]
    pub status: u16,
    #[bits(2)]
    pub crd: u8,
    pub more: bool,
    pub dnr: bool,
}

open_enum! {
    #[derive(Default)]
    pub enum StatusCodeType: u8 {
        GENERIC = 0,
        COMMAND_SPECIFIC = 1,
        MEDIA_ERROR = 2,
        PATH_RELATED = 3,
        VENDOR_SPECIFIC = 7,
    }
}

open_enum! {
    #[derive(Default)]
    pub enum Status: u16 {
        SUCCESS = 0x00,
        INVALID_COMMAND_OPCODE = 0x01,
        INVALID_FIELD_IN_COMMAND = 0x02,
        DATA_TRANSFER_ERROR = 0x04,
        INTERNAL_ERROR = 0x06,
        COMMAND_ABORT_REQUESTED = 0x07,
        COMMAND_SEQUENCE_ERROR = 0x0c,
        OPERATION_DENIED = 0x15,
        COMMAND_INTERRUPTED = 0x21,
        TRANSIENT_TRANSPORT_ERROR = 0x22,
        ADMIN_COMMAND_MEDIA_NOT_READY = 0x24,

        INVALID_QUEUE_IDENTIFIER = 0x101,
        INVALID_QUEUE_SIZE = 0x102,
        FEATURE_NOT_CHANGEABLE = 0x10e,
        INVALID_CONTROLLER_IDENTIFIER = 0x11f,
        INVALID_SECONDARY_CONTROLLER_STATE = 0x120,
        INVALID_RESOURCE_IDENTIFIER = 0x122,
        IDENTIFIER_UNAVAILABLE = 0x12d,
    }
}

impl Status {
    pub fn status_code(&self) -> u8 {
        self.0 as u8
    }

    pub fn status_code_type(&self) -> StatusCodeType {
        StatusCodeType((self.0 >> 8) as u8)
    }
}

#[bitfield(u32)]
pub struct Cdw10SetFeatures {
    pub fid: u8,
    #[bits(23)]
    _rsvd: u32,
    pub save: bool,
}

#[bitfield(u32)]
pub struct Cdw10GetFeatures {
    pub fid: u8,
    #[bits(3)]
    pub sel: u8,
    #[bits(21)]
    _rsvd: u32,
}

open_enum! {
    pub enum Feature: u8 {
        ARBITRATION = 0x01,
        POWER_MANAGEMENT = 0x02,
        NUMBER_OF_QUEUES = 0x07,
        ASYNC_EVENT_CONFIG = 0x0b,
        CONTROLLER_DATA_QUEUE = 0x21,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_type_split() {
        let status = Status::INVALID_QUEUE_IDENTIFIER;
        assert_eq!(status.status_code(), 0x01);
        assert_eq!(status.status_code_type(), StatusCodeType::COMMAND_SPECIFIC);
        assert_eq!(
            Status::INVALID_FIELD_IN_COMMAND.status_code_type(),
            StatusCodeType::GENERIC
        );
    }

    #[test]
    fn migration_opcodes_data_direction() {
        // Migration Send carries state into the controller, Migration
        // Receive carries it out.
        assert!(Opcode(AdminOpcode::MIGRATION_SEND.0).transfer_host_to_controller());
        assert!(Opcode(AdminOpcode::MIGRATION_RECEIVE.0).transfer_controller_to_host());
        assert!(Opcode(AdminOpcode::CONTROLLER_DATA_QUEUE.0).transfer_host_to_controller());
    }
}
