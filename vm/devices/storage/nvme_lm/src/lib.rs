// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Host side NVMe controller live migration.
//!
//! Builds and validates the admin commands that manage controller data
//! queues, start and stop change logging, suspend and resume a controller,
//! and move its state (Track Send, Migration Send, Migration Receive and the
//! CDQ feature). Received controller state is decoded by
//! [`ControllerState::parse`], which tolerates short buffers.
//!
//! Commands are issued through an [`AdminIssuer`] supplied by the caller;
//! this crate has no transport of its own.

#![forbid(unsafe_code)]

mod cdq;
pub mod codec;
mod command;
mod error;
mod issuer;
mod migration;
mod state;
#[cfg(test)]
mod tests;
mod validate;

pub use self::cdq::CdqReader;
pub use self::command::AdminCommand;
pub use self::command::CreateCdq;
pub use self::command::DeleteCdq;
pub use self::command::GetCdqFeature;
pub use self::command::MigrationReceive;
pub use self::command::MigrationSend;
pub use self::command::SetCdqFeature;
pub use self::command::TrackSend;
pub use self::command::Transfer;
pub use self::error::NvmeError;
pub use self::error::OperationError;
pub use self::error::RequestError;
pub use self::error::StructuralError;
pub use self::error::ValidationError;
pub use self::error::ValidationErrorKind;
pub use self::issuer::AdminIssuer;
pub use self::issuer::Payload;
pub use self::migration::ControllerStateData;
pub use self::migration::LiveMigration;
pub use self::state::ControllerState;
pub use self::state::NvmeControllerState;
pub use self::state::Truncated;
