// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Live migration operations against a controller.

use crate::command::AdminCommand;
use crate::command::CreateCdq;
use crate::command::DeleteCdq;
use crate::command::GetCdqFeature;
use crate::command::MigrationReceive;
use crate::command::MigrationSend;
use crate::command::SetCdqFeature;
use crate::command::TrackSend;
use crate::error::OperationError;
use crate::error::RequestError;
use crate::error::StructuralError;
use crate::error::ValidationError;
use crate::issuer::AdminIssuer;
use crate::issuer::Payload;
use crate::state::ControllerState;
use crate::validate;
use nvme_spec as spec;
use nvme_spec::lm;
use nvme_spec::lm::CdqFeatureData;
use nvme_spec::lm::TrackSendMos;
use zerocopy::FromZeros;
use zerocopy::IntoBytes;

/// Controller state returned by Migration Receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerStateData {
    pub dw0: lm::MigrationReceiveDw0,
    /// Offset the state was read from.
    pub offset: u64,
    pub numd: u32,
    /// The whole receive buffer, one dword longer than `numd` describes.
    pub buffer: Vec<u8>,
}

impl ControllerStateData {
    /// Whether the completion reported the controller as suspended.
    pub fn suspended(&self) -> bool {
        self.dw0.suspended()
    }

    /// The `numd` dwords of state that were requested.
    pub fn state_bytes(&self) -> &[u8] {
        let len = (self.numd as usize * 4).min(self.buffer.len());
        &self.buffer[..len]
    }

    pub fn parse(&self) -> Result<ControllerState, StructuralError> {
        ControllerState::parse_at(&self.buffer, self.offset)
    }
}

/// Issues live migration commands through an [`AdminIssuer`].
///
/// Every operation validates its parameters first, so a rejected request
/// never reaches the issuer. Nothing is retried.
#[derive(Debug)]
pub struct LiveMigration<T> {
    issuer: T,
}

impl<T: AdminIssuer> LiveMigration<T> {
    pub fn new(issuer: T) -> Self {
        Self { issuer }
    }

    pub fn issuer(&self) -> &T {
        &self.issuer
    }

    fn issue(
        &self,
        cmd: &AdminCommand,
        payload: Payload<'_>,
    ) -> Result<spec::Completion, OperationError> {
        let opcode = cmd.opcode();
        tracing::debug!(
            ?opcode,
            cdw10 = cmd.command.cdw10,
            cdw11 = cmd.command.cdw11,
            cdw12 = cmd.command.cdw12,
            cdw13 = cmd.command.cdw13,
            cdw15 = cmd.command.cdw15,
            data_len = cmd.transfer.len(),
            "issuing admin command"
        );
        self.issuer
            .issue_raw(&cmd.command, payload)
            .map_err(|err| {
                match &err {
                    RequestError::Nvme(_) => tracing::warn!(
                        ?opcode,
                        error = &err as &dyn std::error::Error,
                        "admin command failed"
                    ),
                    RequestError::Transport(_) => tracing::error!(
                        ?opcode,
                        error = &err as &dyn std::error::Error,
                        "admin command not completed"
                    ),
                }
                OperationError::Request {
                    opcode,
                    source: err,
                }
            })
    }

    /// Creates a controller data queue backed by `queue` and returns its
    /// identifier.
    ///
    /// `queue` must be exactly [`CreateCdq::queue_len`] bytes. It is zeroed
    /// before the command is issued.
    pub fn create_cdq(
        &self,
        params: &CreateCdq,
        queue: &mut [u8],
    ) -> Result<u16, OperationError> {
        let _span = tracing::info_span!("create_cdq", cntlid = params.cntlid).entered();
        let cmd = params.command()?;
        if queue.len() != params.queue_len() {
            return Err(ValidationError::DataLength {
                expected: params.queue_len() as u64,
                actual: queue.len(),
            }
            .into());
        }
        queue.fill(0);
        let completion = self.issue(&cmd, Payload::Out(queue))?;
        let cdqid = completion.dw0 as u16;
        tracing::info!(cdqid, size_dwords = params.size_dwords, "created cdq");
        Ok(cdqid)
    }

    pub fn delete_cdq(&self, cdqid: u16) -> Result<(), OperationError> {
        let _span = tracing::info_span!("delete_cdq", cdqid).entered();
        self.issue(&DeleteCdq { cdqid }.command(), Payload::None)?;
        tracing::info!("deleted cdq");
        Ok(())
    }

    /// Returns the management operation specific value that was sent.
    pub fn track_send(&self, params: &TrackSend) -> Result<TrackSendMos, OperationError> {
        let _span = tracing::info_span!(
            "track_send",
            select = params.select.name(),
            cdqid = params.cdqid
        )
        .entered();
        let cmd = params.command()?;
        let mos = TrackSendMos(lm::Cdw10TrackSend::from(cmd.command.cdw10).mos());
        self.issue(&cmd, Payload::None)?;
        tracing::info!(?mos, "track send complete");
        Ok(mos)
    }

    pub fn migration_send(&self, params: &MigrationSend<'_>) -> Result<(), OperationError> {
        let _span = tracing::info_span!(
            "migration_send",
            select = params.select.name(),
            cntlid = params.cntlid
        )
        .entered();
        let cmd = params.command()?;
        let payload = match params.data {
            Some(data) if !data.is_empty() => Payload::In(data),
            _ => Payload::None,
        };
        self.issue(&cmd, payload)?;
        tracing::info!("migration send complete");
        Ok(())
    }

    /// Reads raw controller state from any offset.
    pub fn migration_receive(
        &self,
        params: &MigrationReceive,
    ) -> Result<ControllerStateData, OperationError> {
        let _span = tracing::info_span!(
            "migration_receive",
            cntlid = params.cntlid,
            offset = params.offset,
            numd = params.numd
        )
        .entered();
        let cmd = params.command();
        let mut buffer = vec![0; params.buffer_len()];
        let completion = self.issue(&cmd, Payload::Out(&mut buffer))?;
        let data = ControllerStateData {
            dw0: lm::MigrationReceiveDw0::from(completion.dw0),
            offset: params.offset,
            numd: params.numd,
            buffer,
        };
        tracing::info!(suspended = data.suspended(), "migration receive complete");
        Ok(data)
    }

    /// Reads and decodes controller state.
    ///
    /// The read must start at offset zero; any other offset is refused
    /// before a command is issued. Sections cut short by `numd` are logged
    /// and flagged in the result.
    pub fn get_controller_state(
        &self,
        params: &MigrationReceive,
    ) -> Result<ControllerState, OperationError> {
        validate::structured_read(params.offset)?;
        let data = self.migration_receive(params)?;
        let state = data.parse()?;
        for msg in state.truncated.messages() {
            tracing::warn!(cntlid = params.cntlid, numd = params.numd, "{msg}");
        }
        Ok(state)
    }

    /// Returns completion dword 0.
    pub fn set_cdq_feature(&self, params: &SetCdqFeature) -> Result<u32, OperationError> {
        let _span = tracing::info_span!("set_cdq_feature", cdqid = params.cdqid).entered();
        let completion = self.issue(&params.command(), Payload::None)?;
        tracing::info!(hp = params.hp, tpt = ?params.tpt, "cdq feature set");
        Ok(completion.dw0)
    }

    pub fn get_cdq_feature(&self, cdqid: u16) -> Result<CdqFeatureData, OperationError> {
        let _span = tracing::info_span!("get_cdq_feature", cdqid).entered();
        let mut data = CdqFeatureData::new_zeroed();
        self.issue(
            &GetCdqFeature { cdqid }.command(),
            Payload::Out(data.as_mut_bytes()),
        )?;
        tracing::info!(hp = data.hp.get(), tpt = data.tpt.get(), "cdq feature read");
        Ok(data)
    }
}
