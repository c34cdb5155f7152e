// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![no_std]

//! Provides the [`open_enum`] macro.

/// Declares a protocol enumeration whose storage may hold values beyond the
/// named ones.
///
/// The generated type is a `#[repr(transparent)]` tuple struct around the
/// storage integer, with one associated `pub const` per named value. Matching
/// on it never invokes undefined behavior for a value a device or a caller
/// made up, which is what command fields and selectors read off the wire
/// need: an unrecognized selector is representable and can be rejected by
/// validation instead of by the type system.
///
/// The macro implements `Copy`, `Clone`, `Debug`, `Eq`, `PartialEq`, `Hash`,
/// `Ord` and `PartialOrd`. `Debug` prints the value's name when it has one
/// and the raw integer otherwise.
///
/// # Examples
///
/// ```
/// use open_enum::open_enum;
///
/// open_enum! {
///     pub enum SequenceIndicator: u8 {
///         NOT_FIRST_NOT_LAST = 0,
///         FIRST = 1,
///         LAST = 2,
///         ENTIRE = 3,
///     }
/// }
///
/// let seq = SequenceIndicator::ENTIRE;
/// assert_eq!(seq.0, 3);
/// assert_eq!(format!("{:?}", seq), "ENTIRE");
/// assert_eq!(format!("{:?}", SequenceIndicator(7)), "7");
/// ```
#[macro_export]
macro_rules! open_enum {
    (
        $(#[$a:meta])*
        $v:vis enum $name:ident : $storage:ty {
            $(#![$implattr:meta])*
            $(
                $(#[$vattr:meta])*
                $variant:ident = $value:expr,
            )*
        }
    ) => {
        #[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
        #[repr(transparent)]
        $(#[$a])*
        $v struct $name(pub $storage);
        $(#[$implattr])*
        impl $name {
            $(
                $(#[$vattr])*
                pub const $variant: $name = $name($value);
            )*
        }
        impl ::core::fmt::Debug for $name {
            fn fmt(&self, fmt: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                #![allow(unreachable_patterns)]
                let s = match *self {
                    $( Self::$variant => stringify!($variant), )*
                    _ => {
                        return ::core::fmt::Debug::fmt(&self.0, fmt);
                    }
                };
                fmt.pad(s)
            }
        }
    }
}
