// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types.

use nvme_spec as spec;
use nvme_spec::lm::MigrationSendSelect;
use nvme_spec::lm::SequenceIndicator;
use nvme_spec::lm::TrackSendSelect;
use thiserror::Error;

/// Broad class of a [`ValidationError`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// A size or length is not a legal multiple or does not match.
    Size,
    /// A field value or combination of fields is illegal for the operation.
    Parameter,
}

/// Parameters rejected before any command was built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("cdq size of {0} dwords is not a non-zero multiple of the queue entry size")]
    CdqSize(u32),
    #[error("data buffer is {actual} bytes, expected {expected} bytes")]
    DataLength { expected: u64, actual: usize },
    #[error("unsupported track send select {select:?} ({})", .select.name())]
    UnsupportedTrackSelect { select: TrackSendSelect },
    #[error("start and stop are mutually exclusive")]
    StartAndStop,
    #[error("unsupported migration send select {select:?}")]
    UnsupportedMigrationSelect { select: MigrationSendSelect },
    #[error("unexpected {field} for {}", .select.name())]
    UnexpectedField {
        select: MigrationSendSelect,
        field: &'static str,
    },
    #[error("{} requires controller state data", .select.name())]
    MissingControllerState { select: MigrationSendSelect },
    #[error("sequence indicator {seqind:?} does not fit in two bits")]
    SequenceIndicator { seqind: SequenceIndicator },
}

impl ValidationError {
    pub fn kind(&self) -> ValidationErrorKind {
        match self {
            ValidationError::CdqSize(_) | ValidationError::DataLength { .. } => {
                ValidationErrorKind::Size
            }
            ValidationError::UnsupportedTrackSelect { .. }
            | ValidationError::StartAndStop
            | ValidationError::UnsupportedMigrationSelect { .. }
            | ValidationError::UnexpectedField { .. }
            | ValidationError::MissingControllerState { .. }
            | ValidationError::SequenceIndicator { .. } => ValidationErrorKind::Parameter,
        }
    }
}

/// A request to structurally decode data that is not self describing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("cannot parse controller state read at non-zero offset {0:#x}")]
    NonZeroOffset(u64),
}

/// A failed completion status.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct NvmeError(spec::Status);

impl NvmeError {
    pub fn status(&self) -> spec::Status {
        self.0
    }
}

impl From<spec::Status> for NvmeError {
    fn from(value: spec::Status) -> Self {
        Self(value)
    }
}

impl std::error::Error for NvmeError {}

impl std::fmt::Display for NvmeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.status_code_type() {
            spec::StatusCodeType::GENERIC => write!(f, "general error {:#x?}", self.0),
            spec::StatusCodeType::COMMAND_SPECIFIC => {
                write!(f, "command-specific error {:#x?}", self.0)
            }
            spec::StatusCodeType::MEDIA_ERROR => {
                write!(f, "media error {:#x?}", self.0)
            }
            _ => write!(f, "{:#x?}", self.0),
        }
    }
}

/// An error issuing an admin command.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("nvme error")]
    Nvme(#[source] NvmeError),
    #[error("transport error")]
    Transport(#[source] std::io::Error),
}

/// An error from a [`crate::LiveMigration`] operation.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("invalid parameters")]
    Validation(#[from] ValidationError),
    #[error("invalid controller state request")]
    Structural(#[from] StructuralError),
    #[error("{opcode:?} command failed")]
    Request {
        opcode: spec::AdminOpcode,
        #[source]
        source: RequestError,
    },
}
