// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builders for the live migration admin commands.
//!
//! Each parameter type validates itself and then packs its command dwords.
//! The data pointer is left zero: the issuer owns the memory and fills in
//! `dptr` when it submits.

use crate::error::ValidationError;
use crate::validate;
use nvme_spec as spec;
use nvme_spec::lm;
use nvme_spec::lm::CdqQueueType;
use nvme_spec::lm::MigrationSendSelect;
use nvme_spec::lm::SequenceIndicator;
use nvme_spec::lm::SuspendType;
use nvme_spec::lm::TrackSendMos;
use nvme_spec::lm::TrackSendSelect;
use zerocopy::FromZeros;

/// Direction and length of the data moved by a command.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Transfer {
    None,
    HostToController(usize),
    ControllerToHost(usize),
}

impl Transfer {
    pub fn len(&self) -> usize {
        match *self {
            Transfer::None => 0,
            Transfer::HostToController(len) | Transfer::ControllerToHost(len) => len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A built admin command and the data transfer it expects.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AdminCommand {
    pub command: spec::Command,
    pub transfer: Transfer,
}

impl AdminCommand {
    pub fn opcode(&self) -> spec::AdminOpcode {
        spec::AdminOpcode(self.command.cdw0.opcode())
    }
}

fn admin_cmd(opcode: spec::AdminOpcode) -> spec::Command {
    spec::Command {
        cdw0: spec::Cdw0::new().with_opcode(opcode.0),
        ..FromZeros::new_zeroed()
    }
}

fn dwords_to_bytes(numd: u32) -> usize {
    numd as usize * 4
}

/// Create a controller data queue.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CreateCdq {
    /// Queue size in dwords.
    pub size_dwords: u32,
    pub cntlid: u16,
    pub queue_type: CdqQueueType,
}

impl CreateCdq {
    /// A user data migration queue of `size_dwords` for controller 0.
    pub fn new(size_dwords: u32) -> Self {
        Self {
            size_dwords,
            cntlid: 0,
            queue_type: CdqQueueType::USER_DATA_MIGRATION,
        }
    }

    /// Bytes of queue memory the controller writes to.
    pub fn queue_len(&self) -> usize {
        dwords_to_bytes(self.size_dwords)
    }

    pub fn command(&self) -> Result<AdminCommand, ValidationError> {
        validate::create_cdq(self)?;
        let mut command = admin_cmd(spec::AdminOpcode::CONTROLLER_DATA_QUEUE);
        command.cdw10 = lm::Cdw10ControllerDataQueue::new()
            .with_sel(lm::CdqSelect::CREATE.0)
            .with_qt(self.queue_type.0)
            .into();
        command.cdw11 = lm::Cdw11CreateCdq::new()
            .with_pc(true)
            .with_cntlid(self.cntlid)
            .into();
        command.cdw12 = self.size_dwords;
        Ok(AdminCommand {
            command,
            transfer: Transfer::ControllerToHost(self.queue_len()),
        })
    }
}

/// Delete a controller data queue.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DeleteCdq {
    pub cdqid: u16,
}

impl DeleteCdq {
    pub fn command(&self) -> AdminCommand {
        let mut command = admin_cmd(spec::AdminOpcode::CONTROLLER_DATA_QUEUE);
        command.cdw10 = lm::Cdw10ControllerDataQueue::new()
            .with_sel(lm::CdqSelect::DELETE.0)
            .into();
        command.cdw11 = lm::Cdw11DeleteCdq::new().with_cdqid(self.cdqid).into();
        AdminCommand {
            command,
            transfer: Transfer::None,
        }
    }
}

/// Manage tracking of information by the controller.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TrackSend {
    pub select: TrackSendSelect,
    /// Raw management operation specific value, used when neither `start`
    /// nor `stop` is set.
    pub mos: TrackSendMos,
    pub cdqid: u16,
    pub start: bool,
    pub stop: bool,
}

impl TrackSend {
    /// Start logging user data changes to `cdqid`.
    pub fn start_logging(cdqid: u16) -> Self {
        Self {
            select: TrackSendSelect::LOG_USER_DATA_CHANGES,
            mos: TrackSendMos::STOP_LOGGING,
            cdqid,
            start: true,
            stop: false,
        }
    }

    /// Stop logging user data changes to `cdqid`.
    pub fn stop_logging(cdqid: u16) -> Self {
        Self {
            start: false,
            stop: true,
            ..Self::start_logging(cdqid)
        }
    }

    pub fn command(&self) -> Result<AdminCommand, ValidationError> {
        let mos = validate::track_send(self)?;
        let mut command = admin_cmd(spec::AdminOpcode::TRACK_SEND);
        command.cdw10 = lm::Cdw10TrackSend::new()
            .with_sel(self.select.0)
            .with_mos(mos.0)
            .into();
        command.cdw11 = lm::Cdw11TrackSend::new().with_cdqid(self.cdqid).into();
        Ok(AdminCommand {
            command,
            transfer: Transfer::None,
        })
    }
}

/// Suspend, resume, or load state into a controller.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MigrationSend<'a> {
    pub select: MigrationSendSelect,
    pub cntlid: u16,
    /// Suspend and resume only.
    pub suspend_type: SuspendType,
    /// Delete the user data migration queue. Suspend and resume only.
    pub delete: bool,
    pub sequence: SequenceIndicator,
    /// Set controller state only.
    pub uuid_index: u8,
    /// Set controller state only.
    pub version_index: u8,
    /// Byte offset into the controller state.
    pub offset: u64,
    /// Dwords of controller state carried by this command.
    pub numd: u32,
    /// Controller state data, `numd * 4` bytes.
    pub data: Option<&'a [u8]>,
}

impl<'a> MigrationSend<'a> {
    fn new(select: MigrationSendSelect, cntlid: u16) -> Self {
        Self {
            select,
            cntlid,
            suspend_type: SuspendType::SUSPEND_NOTIFICATION,
            delete: false,
            sequence: SequenceIndicator::NOT_FIRST_NOT_LAST,
            uuid_index: 0,
            version_index: 0,
            offset: 0,
            numd: 0,
            data: None,
        }
    }

    pub fn suspend(cntlid: u16) -> Self {
        Self::new(MigrationSendSelect::SUSPEND, cntlid)
    }

    pub fn resume(cntlid: u16) -> Self {
        Self::new(MigrationSendSelect::RESUME, cntlid)
    }

    /// Load the entire controller state in `data` into `cntlid`.
    pub fn set_controller_state(cntlid: u16, data: &'a [u8]) -> Self {
        Self {
            sequence: SequenceIndicator::ENTIRE,
            numd: (data.len() / 4) as u32,
            data: Some(data),
            ..Self::new(MigrationSendSelect::SET_CONTROLLER_STATE, cntlid)
        }
    }

    pub fn command(&self) -> Result<AdminCommand, ValidationError> {
        validate::migration_send(self)?;
        let mut command = admin_cmd(spec::AdminOpcode::MIGRATION_SEND);
        command.cdw10 = lm::Cdw10MigrationSend::new()
            .with_sel(self.select.0)
            .with_seqind(self.sequence.0)
            .into();
        command.cdw11 = if self.select == MigrationSendSelect::SET_CONTROLLER_STATE {
            lm::Cdw11MigrationSendSetState::new()
                .with_cntlid(self.cntlid)
                .with_csvi(self.version_index)
                .with_csuuidi(self.uuid_index)
                .into()
        } else {
            lm::Cdw11MigrationSendSuspend::new()
                .with_cntlid(self.cntlid)
                .with_stype(self.suspend_type.0)
                .with_dudmq(self.delete)
                .into()
        };
        command.cdw12 = self.offset as u32;
        command.cdw13 = (self.offset >> 32) as u32;
        command.cdw15 = self.numd;
        let transfer = match self.data {
            Some(data) if !data.is_empty() => Transfer::HostToController(data.len()),
            _ => Transfer::None,
        };
        Ok(AdminCommand { command, transfer })
    }
}

/// Read controller state.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct MigrationReceive {
    pub cntlid: u16,
    pub uuid_index: u8,
    pub version_index: u8,
    /// Byte offset into the controller state.
    pub offset: u64,
    /// Dwords of controller state requested.
    pub numd: u32,
}

impl MigrationReceive {
    /// Length of the receive buffer, one dword more than `numd` describes.
    pub fn buffer_len(&self) -> usize {
        dwords_to_bytes(self.numd) + 4
    }

    /// Length of the controller state the command returns.
    pub fn state_len(&self) -> usize {
        dwords_to_bytes(self.numd)
    }

    pub fn command(&self) -> AdminCommand {
        let mut command = admin_cmd(spec::AdminOpcode::MIGRATION_RECEIVE);
        command.cdw10 = lm::Cdw10MigrationReceive::new()
            .with_sel(lm::MigrationReceiveSelect::GET_CONTROLLER_STATE.0)
            .with_csvi(self.version_index)
            .into();
        command.cdw11 = lm::Cdw11MigrationReceive::new()
            .with_cntlid(self.cntlid)
            .with_csuuidi(self.uuid_index)
            .into();
        command.cdw12 = self.offset as u32;
        command.cdw13 = (self.offset >> 32) as u32;
        command.cdw15 = self.numd;
        AdminCommand {
            command,
            transfer: Transfer::ControllerToHost(self.buffer_len()),
        }
    }
}

/// Update the head pointer and tail trigger of a controller data queue.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SetCdqFeature {
    pub cdqid: u16,
    /// Head pointer slot.
    pub hp: u32,
    /// Slot whose write raises a CDQ tail pointer event, if any.
    pub tpt: Option<u32>,
}

impl SetCdqFeature {
    pub fn command(&self) -> AdminCommand {
        let mut command = admin_cmd(spec::AdminOpcode::SET_FEATURES);
        command.cdw10 = spec::Cdw10SetFeatures::new()
            .with_fid(spec::Feature::CONTROLLER_DATA_QUEUE.0)
            .into();
        command.cdw11 = lm::Cdw11FeatureControllerDataQueue::new()
            .with_cdqid(self.cdqid)
            .with_tpt_valid(self.tpt.is_some())
            .into();
        command.cdw12 = self.hp;
        command.cdw13 = self.tpt.unwrap_or(0);
        AdminCommand {
            command,
            transfer: Transfer::None,
        }
    }
}

/// Read the head pointer and tail trigger of a controller data queue.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GetCdqFeature {
    pub cdqid: u16,
}

impl GetCdqFeature {
    pub fn command(&self) -> AdminCommand {
        let mut command = admin_cmd(spec::AdminOpcode::GET_FEATURES);
        command.cdw10 = spec::Cdw10GetFeatures::new()
            .with_fid(spec::Feature::CONTROLLER_DATA_QUEUE.0)
            .into();
        command.cdw11 = lm::Cdw11FeatureControllerDataQueue::new()
            .with_cdqid(self.cdqid)
            .into();
        AdminCommand {
            command,
            transfer: Transfer::ControllerToHost(size_of::<lm::CdqFeatureData>()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationErrorKind;

    #[test]
    fn create_cdq() {
        let params = CreateCdq {
            size_dwords: 24,
            cntlid: 0x12,
            queue_type: CdqQueueType::USER_DATA_MIGRATION,
        };
        let cmd = params.command().unwrap();
        assert_eq!(cmd.opcode(), spec::AdminOpcode::CONTROLLER_DATA_QUEUE);
        assert_eq!(cmd.command.cdw10, 0);
        assert_eq!(cmd.command.cdw11, 0x0012_0001);
        assert_eq!(cmd.command.cdw12, 24);
        assert_eq!(cmd.transfer, Transfer::ControllerToHost(96));
    }

    #[test]
    fn create_cdq_queue_type() {
        let params = CreateCdq {
            queue_type: CdqQueueType(2),
            ..CreateCdq::new(8)
        };
        assert_eq!(params.command().unwrap().command.cdw10, 0x0002_0000);
    }

    #[test]
    fn create_cdq_bad_size_builds_nothing() {
        let err = CreateCdq::new(12).command().unwrap_err();
        assert_eq!(err.kind(), ValidationErrorKind::Size);
    }

    #[test]
    fn delete_cdq() {
        let cmd = DeleteCdq { cdqid: 0xbeef }.command();
        assert_eq!(cmd.opcode(), spec::AdminOpcode::CONTROLLER_DATA_QUEUE);
        assert_eq!(cmd.command.cdw10, 1);
        assert_eq!(cmd.command.cdw11, 0xbeef);
        assert!(cmd.transfer.is_empty());
    }

    #[test]
    fn track_send() {
        let cmd = TrackSend::start_logging(3).command().unwrap();
        assert_eq!(cmd.opcode(), spec::AdminOpcode::TRACK_SEND);
        assert_eq!(cmd.command.cdw10, 0x0001_0000);
        assert_eq!(cmd.command.cdw11, 3);

        let cmd = TrackSend::stop_logging(3).command().unwrap();
        assert_eq!(cmd.command.cdw10, 0);

        let raw = TrackSend {
            start: false,
            mos: TrackSendMos(0x1ff),
            ..TrackSend::start_logging(3)
        };
        assert_eq!(raw.command().unwrap().command.cdw10, 0x01ff_0000);
    }

    #[test]
    fn suspend() {
        let params = MigrationSend {
            suspend_type: SuspendType::SUSPEND,
            delete: true,
            ..MigrationSend::suspend(0x21)
        };
        let cmd = params.command().unwrap();
        assert_eq!(cmd.opcode(), spec::AdminOpcode::MIGRATION_SEND);
        assert_eq!(cmd.command.cdw10, 0);
        assert_eq!(cmd.command.cdw11, 0x8001_0021);
        assert_eq!(cmd.transfer, Transfer::None);
    }

    #[test]
    fn resume() {
        let cmd = MigrationSend::resume(5).command().unwrap();
        assert_eq!(cmd.command.cdw10, 1);
        assert_eq!(cmd.command.cdw11, 5);
    }

    #[test]
    fn set_controller_state() {
        let data = [0x5a; 40];
        let params = MigrationSend {
            uuid_index: 0x7,
            version_index: 0x3,
            offset: 0x1_0000_0200,
            ..MigrationSend::set_controller_state(0x44, &data)
        };
        let cmd = params.command().unwrap();
        assert_eq!(cmd.command.cdw10, 0x0003_0002);
        assert_eq!(cmd.command.cdw11, 0x0703_0044);
        assert_eq!(cmd.command.cdw12, 0x200);
        assert_eq!(cmd.command.cdw13, 1);
        assert_eq!(cmd.command.cdw15, 10);
        assert_eq!(cmd.transfer, Transfer::HostToController(40));
    }

    #[test]
    fn migration_receive() {
        let params = MigrationReceive {
            cntlid: 0x9,
            uuid_index: 0x2,
            version_index: 0x4,
            offset: 0x2_0000_0010,
            numd: 10,
        };
        let cmd = params.command();
        assert_eq!(cmd.opcode(), spec::AdminOpcode::MIGRATION_RECEIVE);
        assert_eq!(cmd.command.cdw10, 0x0004_0000);
        assert_eq!(cmd.command.cdw11, 0x0002_0009);
        assert_eq!(cmd.command.cdw12, 0x10);
        assert_eq!(cmd.command.cdw13, 2);
        assert_eq!(cmd.command.cdw15, 10);
        assert_eq!(cmd.transfer, Transfer::ControllerToHost(44));
        assert_eq!(params.state_len(), 40);
    }

    #[test]
    fn set_cdq_feature() {
        let cmd = SetCdqFeature {
            cdqid: 2,
            hp: 0x40,
            tpt: Some(0x80),
        }
        .command();
        assert_eq!(cmd.opcode(), spec::AdminOpcode::SET_FEATURES);
        assert_eq!(cmd.command.cdw10, 0x21);
        assert_eq!(cmd.command.cdw11, 0x8000_0002);
        assert_eq!(cmd.command.cdw12, 0x40);
        assert_eq!(cmd.command.cdw13, 0x80);

        // A trigger of all ones is still a trigger.
        let cmd = SetCdqFeature {
            cdqid: 2,
            hp: 0,
            tpt: Some(u32::MAX),
        }
        .command();
        assert_eq!(cmd.command.cdw11, 0x8000_0002);
        assert_eq!(cmd.command.cdw13, u32::MAX);

        let cmd = SetCdqFeature {
            cdqid: 2,
            hp: 0x40,
            tpt: None,
        }
        .command();
        assert_eq!(cmd.command.cdw11, 2);
        assert_eq!(cmd.command.cdw13, 0);
    }

    #[test]
    fn get_cdq_feature() {
        let cmd = GetCdqFeature { cdqid: 6 }.command();
        assert_eq!(cmd.opcode(), spec::AdminOpcode::GET_FEATURES);
        assert_eq!(cmd.command.cdw10, 0x21);
        assert_eq!(cmd.command.cdw11, 6);
        assert_eq!(cmd.transfer, Transfer::ControllerToHost(512));
    }
}
