// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Consumer side of a user data migration controller data queue.

use nvme_spec::lm::LbaMigrationQueueEntry;
use nvme_spec::lm::CDQ_ENTRY_DWORDS;
use zerocopy::FromBytes;

/// Tracks the head and expected phase of a controller data queue.
///
/// The controller posts entries with the phase tag inverted on each pass
/// through the queue, the same convention as an NVMe completion queue. The
/// reader starts at slot 0 expecting a phase of 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdqReader {
    len: u32,
    head: u32,
    phase: bool,
}

impl CdqReader {
    /// A reader for a queue of `len` entries.
    pub fn new(len: u32) -> Self {
        Self {
            len,
            head: 0,
            phase: true,
        }
    }

    /// A reader for a queue created with `size_dwords` dwords.
    pub fn for_size(size_dwords: u32) -> Self {
        Self::new(size_dwords / CDQ_ENTRY_DWORDS)
    }

    /// The slot of the next entry to read, to hand back to the controller as
    /// the CDQ head pointer.
    pub fn head(&self) -> u32 {
        self.head
    }

    pub fn phase(&self) -> bool {
        self.phase
    }

    /// Reads the next posted entry from `queue`, the queue memory.
    ///
    /// Returns `None` when the slot at the head has not been posted yet or
    /// when `queue` is too short to hold it.
    pub fn read(&mut self, queue: &[u8]) -> Option<LbaMigrationQueueEntry> {
        if self.len == 0 {
            return None;
        }
        let offset = self.head as usize * size_of::<LbaMigrationQueueEntry>();
        let (entry, _) = LbaMigrationQueueEntry::read_from_prefix(queue.get(offset..)?).ok()?;
        if entry.attributes().cdqp() != self.phase {
            return None;
        }
        self.head += 1;
        if self.head == self.len {
            self.head = 0;
            self.phase = !self.phase;
        }
        Some(entry)
    }

    /// Reads every posted entry, stopping at the first unposted slot.
    pub fn drain<'a>(
        &'a mut self,
        queue: &'a [u8],
    ) -> impl Iterator<Item = LbaMigrationQueueEntry> + 'a {
        let mut remaining = self.len;
        std::iter::from_fn(move || {
            // At most one pass through the queue.
            remaining = remaining.checked_sub(1)?;
            self.read(queue)
        })
    }
}
