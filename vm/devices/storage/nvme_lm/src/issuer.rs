// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The admin command transport.

use crate::error::NvmeError;
use crate::error::RequestError;
use nvme_spec as spec;

/// Data moved by a submitted command.
#[derive(Debug)]
pub enum Payload<'a> {
    None,
    /// Host to controller.
    In(&'a [u8]),
    /// Controller to host.
    Out(&'a mut [u8]),
}

/// Submits admin commands to a controller and waits for their completion.
///
/// Implementors provide [`AdminIssuer::submit`]. They own the data pointer:
/// the memory behind a payload must be made visible to the device (and, for
/// a controller data queue, stay pinned and physically contiguous for the
/// life of the queue) before `dptr` is filled in.
pub trait AdminIssuer {
    /// Submits `command` and returns its completion, whatever its status.
    fn submit(
        &self,
        command: &spec::Command,
        payload: Payload<'_>,
    ) -> Result<spec::Completion, std::io::Error>;

    /// Issues a command with a raw payload, failing on a non-zero status.
    fn issue_raw(
        &self,
        command: &spec::Command,
        payload: Payload<'_>,
    ) -> Result<spec::Completion, RequestError> {
        match self.submit(command, payload) {
            Ok(completion) if completion.status.status() == 0 => Ok(completion),
            Ok(completion) => Err(RequestError::Nvme(NvmeError::from(spec::Status(
                completion.status.status(),
            )))),
            Err(err) => Err(RequestError::Transport(err)),
        }
    }

    /// Issues a command that transfers no data.
    fn issue_neither(&self, command: &spec::Command) -> Result<spec::Completion, RequestError> {
        self.issue_raw(command, Payload::None)
    }

    /// Issues a command that sends `data` to the controller.
    fn issue_in(
        &self,
        command: &spec::Command,
        data: &[u8],
    ) -> Result<spec::Completion, RequestError> {
        self.issue_raw(command, Payload::In(data))
    }

    /// Issues a command that reads into `data` from the controller.
    fn issue_out(
        &self,
        command: &spec::Command,
        data: &mut [u8],
    ) -> Result<spec::Completion, RequestError> {
        self.issue_raw(command, Payload::Out(data))
    }
}

impl<T: AdminIssuer + ?Sized> AdminIssuer for &T {
    fn submit(
        &self,
        command: &spec::Command,
        payload: Payload<'_>,
    ) -> Result<spec::Completion, std::io::Error> {
        (**self).submit(command, payload)
    }
}
