// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Controller State data structure decoding.
//!
//! The structure is a 48-byte header followed by the NVMe controller state
//! section: an 8-byte header, `niosq` submission queue records and then
//! `niocq` completion queue records. A short buffer is not an error. Each
//! section that does not fit is clamped to what is present and flagged in
//! [`Truncated`].

use crate::codec;
use crate::codec::Reader;
use crate::error::StructuralError;
use crate::validate;
use bitfield_struct::bitfield;
use nvme_spec::lm::ControllerStateHeader;
use nvme_spec::lm::IoCompletionQueueState;
use nvme_spec::lm::IoSubmissionQueueState;
use nvme_spec::lm::NvmeControllerStateHeader;

/// Sections of a [`ControllerState`] that were cut short by the buffer.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct Truncated {
    /// Fewer than 48 bytes were available.
    pub header: bool,
    /// Bytes followed the header but not enough for the section header.
    pub nvme_header: bool,
    pub submission_queues: bool,
    pub completion_queues: bool,
    #[bits(4)]
    _rsvd: u8,
}

impl Truncated {
    pub fn any(&self) -> bool {
        u8::from(*self) != 0
    }

    /// One message per truncated section, in structure order.
    pub fn messages(&self) -> impl Iterator<Item = &'static str> {
        [
            (self.header(), "Header truncated"),
            (
                self.nvme_header(),
                "NVMe Controller State Data Structure truncated",
            ),
            (self.submission_queues(), "I/O Submission Queues truncated"),
            (self.completion_queues(), "I/O Completion Queues truncated"),
        ]
        .into_iter()
        .filter_map(|(set, msg)| set.then_some(msg))
    }
}

/// The NVMe controller state section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NvmeControllerState {
    pub header: NvmeControllerStateHeader,
    pub submission_queues: Vec<IoSubmissionQueueState>,
    /// Completion queues, located after the last submission queue record.
    pub completion_queues: Vec<IoCompletionQueueState>,
}

/// A decoded, possibly partial, Controller State data structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerState {
    pub header: Option<ControllerStateHeader>,
    pub nvme: Option<NvmeControllerState>,
    pub truncated: Truncated,
}

impl ControllerState {
    /// Decodes `data`, never reading past its end.
    pub fn parse(data: &[u8]) -> Self {
        let mut reader = Reader::new(data);
        let mut truncated = Truncated::new();

        let Some(header) = reader.read::<ControllerStateHeader>() else {
            return Self {
                header: None,
                nvme: None,
                truncated: truncated.with_header(true),
            };
        };

        // Nothing after the header means there is no NVMe section at all.
        if reader.remaining() == 0 {
            return Self {
                header: Some(header),
                nvme: None,
                truncated,
            };
        }

        let Some(nvme_header) = reader.read::<NvmeControllerStateHeader>() else {
            return Self {
                header: Some(header),
                nvme: None,
                truncated: truncated.with_nvme_header(true),
            };
        };

        let sqs =
            reader.read_array::<IoSubmissionQueueState>(nvme_header.niosq.get().into());
        truncated.set_submission_queues(sqs.truncated());
        let cqs =
            reader.read_array::<IoCompletionQueueState>(nvme_header.niocq.get().into());
        truncated.set_completion_queues(cqs.truncated());

        Self {
            header: Some(header),
            nvme: Some(NvmeControllerState {
                header: nvme_header,
                submission_queues: sqs.items,
                completion_queues: cqs.items,
            }),
            truncated,
        }
    }

    /// Decodes state that was read starting at byte `offset`.
    ///
    /// Only a read from the start of the structure can be decoded.
    pub fn parse_at(data: &[u8], offset: u64) -> Result<Self, StructuralError> {
        validate::structured_read(offset)?;
        Ok(Self::parse(data))
    }

    /// Whether the header reports the controller as suspended.
    pub fn suspended(&self) -> Option<bool> {
        self.header.map(|h| h.attributes().suspended())
    }

    /// Encodes the sections that are present.
    ///
    /// The counts in the NVMe section header are written as stored, so a
    /// clamped decode re-encodes with the declared counts.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        if let Some(header) = &self.header {
            codec::write(&mut out, header);
            if let Some(nvme) = &self.nvme {
                codec::write(&mut out, &nvme.header);
                codec::write_array(&mut out, &nvme.submission_queues);
                codec::write_array(&mut out, &nvme.completion_queues);
            }
        }
        out
    }
}
