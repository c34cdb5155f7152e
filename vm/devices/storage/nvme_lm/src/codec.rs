// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Bounds-checked sequential access to migration data buffers.
//!
//! Records are copied out of the buffer with `zerocopy`, so neither the buffer
//! alignment nor the host byte order matter. Reads never look past the end of
//! the buffer: a fixed record that does not fit is reported as missing, and a
//! trailing array that does not fit is shortened to its complete records.

use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;

/// A cursor over a received buffer.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    consumed: usize,
}

/// Records read by [`Reader::read_array`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Records<T> {
    /// The complete records, in buffer order.
    pub items: Vec<T>,
    /// The count the caller asked for.
    pub declared: usize,
}

impl<T> Records<T> {
    /// Returns true if fewer records were available than declared.
    pub fn truncated(&self) -> bool {
        self.items.len() < self.declared
    }
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, consumed: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Bytes consumed so far.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Reads one `T`, or returns `None` without advancing if fewer than
    /// `size_of::<T>()` bytes remain.
    pub fn read<T: FromBytes>(&mut self) -> Option<T> {
        let (value, rest) = T::read_from_prefix(self.buf).ok()?;
        self.consumed += self.buf.len() - rest.len();
        self.buf = rest;
        Some(value)
    }

    /// Reads up to `count` consecutive `T`s, stopping at the last record that
    /// fits entirely in the buffer.
    pub fn read_array<T: FromBytes>(&mut self, count: usize) -> Records<T> {
        let available = count.min(self.remaining() / size_of::<T>().max(1));
        let mut items = Vec::with_capacity(available);
        while items.len() < count {
            let Some(item) = self.read::<T>() else {
                break;
            };
            items.push(item);
        }
        Records {
            items,
            declared: count,
        }
    }
}

/// Appends the wire representation of `value` to `out`.
pub fn write<T: IntoBytes + Immutable>(out: &mut Vec<u8>, value: &T) {
    out.extend_from_slice(value.as_bytes());
}

/// Appends the wire representation of each record in `values` to `out`.
pub fn write_array<T: IntoBytes + Immutable>(out: &mut Vec<u8>, values: &[T]) {
    out.extend_from_slice(values.as_bytes());
}
