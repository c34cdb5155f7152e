// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cross-field legality checks run before a command is built.
//!
//! These only look at one parameter set. Ordering across commands (suspend
//! before setting controller state, setting state before resume) is up to the
//! caller.

use crate::command::CreateCdq;
use crate::command::MigrationSend;
use crate::command::TrackSend;
use crate::error::StructuralError;
use crate::error::ValidationError;
use nvme_spec::lm::MigrationSendSelect;
use nvme_spec::lm::SequenceIndicator;
use nvme_spec::lm::SuspendType;
use nvme_spec::lm::TrackSendMos;
use nvme_spec::lm::TrackSendSelect;
use nvme_spec::lm::CDQ_ENTRY_DWORDS;

pub fn create_cdq(params: &CreateCdq) -> Result<(), ValidationError> {
    if params.size_dwords == 0 || params.size_dwords % CDQ_ENTRY_DWORDS != 0 {
        return Err(ValidationError::CdqSize(params.size_dwords));
    }
    Ok(())
}

/// Returns the management operation specific value to send.
///
/// `start` and `stop` replace the raw value with the canonical one.
pub fn track_send(params: &TrackSend) -> Result<TrackSendMos, ValidationError> {
    if params.select != TrackSendSelect::LOG_USER_DATA_CHANGES {
        return Err(ValidationError::UnsupportedTrackSelect {
            select: params.select,
        });
    }
    match (params.start, params.stop) {
        (true, true) => Err(ValidationError::StartAndStop),
        (true, false) => Ok(TrackSendMos::START_LOGGING),
        (false, true) => Ok(TrackSendMos::STOP_LOGGING),
        (false, false) => Ok(params.mos),
    }
}

pub fn migration_send(params: &MigrationSend<'_>) -> Result<(), ValidationError> {
    let select = params.select;
    match select {
        MigrationSendSelect::SUSPEND | MigrationSendSelect::RESUME => {
            if params.uuid_index != 0 {
                return Err(ValidationError::UnexpectedField {
                    select,
                    field: "uuid index",
                });
            }
            if params.version_index != 0 {
                return Err(ValidationError::UnexpectedField {
                    select,
                    field: "version index",
                });
            }
        }
        MigrationSendSelect::SET_CONTROLLER_STATE => {
            if params.delete {
                return Err(ValidationError::UnexpectedField {
                    select,
                    field: "delete",
                });
            }
            if params.suspend_type != SuspendType::SUSPEND_NOTIFICATION {
                return Err(ValidationError::UnexpectedField {
                    select,
                    field: "suspend type",
                });
            }
            if params.data.map_or(true, |data| data.is_empty()) {
                return Err(ValidationError::MissingControllerState { select });
            }
        }
        _ => return Err(ValidationError::UnsupportedMigrationSelect { select }),
    }

    if params.sequence.0 > SequenceIndicator::ENTIRE.0 {
        return Err(ValidationError::SequenceIndicator {
            seqind: params.sequence,
        });
    }

    if let Some(data) = params.data {
        let expected = params.numd as u64 * 4;
        if data.len() as u64 != expected {
            return Err(ValidationError::DataLength {
                expected,
                actual: data.len(),
            });
        }
    }
    Ok(())
}

/// Controller state is only self describing from its first byte.
pub fn structured_read(offset: u64) -> Result<(), StructuralError> {
    if offset != 0 {
        return Err(StructuralError::NonZeroOffset(offset));
    }
    Ok(())
}
