// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the error taxonomy shared by every reader and writer.
//!
//! Errors are classified by *kind*, not by format: the same [`Error`] variants are raised by
//! the MP4 traversal engine, the MPEG frame-sync engine, and the APEv2 tag codec alike. Whether
//! a given kind is terminal for a reader (returned as [`crate::status::Status::Error`]) or
//! recoverable (returned as [`crate::status::Status::Warning`]) is a per-call-site decision made
//! by the format implementation, not by the error type itself.

use core::fmt;

/// The reason a chunk/box/element failed one of the container traversal engine's structural
/// invariants (see `container` module docs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantKind {
    /// A box flagged `UNIQUE` appeared a second time under the same parent.
    DuplicateSingleton,
    /// A required child was missing when its parent container closed.
    MissingRequiredChild,
    /// A box with priority `p` appeared before a sibling with priority `p - 1`.
    OutOfOrder,
    /// A child's declared size exceeds its parent's remaining unread size.
    SizeExceedsParent,
}

impl InvariantKind {
    fn as_str(self) -> &'static str {
        match self {
            InvariantKind::DuplicateSingleton => "duplicate singleton chunk",
            InvariantKind::MissingRequiredChild => "missing required child chunk",
            InvariantKind::OutOfOrder => "chunk appeared out of priority order",
            InvariantKind::SizeExceedsParent => "chunk size exceeds parent's remaining size",
        }
    }
}

/// Enumeration of every error kind a reader or writer can report.
///
/// This mirrors the taxonomy in the system's error handling design: errors are grouped by
/// *kind*, with a human-readable, per-occurrence message attached rather than one type per
/// format.
#[derive(Debug)]
pub enum Error {
    /// A declared size/length exceeded what is structurally available, or end-of-stream was
    /// reached while a gather request was still outstanding on a stream marked final.
    Truncated(&'static str),
    /// A top-level signature/magic check failed.
    BadMagic(&'static str),
    /// A structural invariant of the container traversal engine was violated.
    Invariant(InvariantKind),
    /// A format version, codec id, or construct newer/other than what this implementation
    /// models.
    Unsupported(&'static str),
    /// Decoded data failed a content-level check: a bad checksum, invalid UTF-8 in mandatory
    /// text, a malformed variable-length integer, or an out-of-range integer.
    Corrupt(&'static str),
    /// The gather buffer would have to grow past its per-format ceiling, or a table (sample
    /// map, seek table) would exceed its bound.
    LimitExceeded(&'static str),
    /// A seek was requested that the reader/writer cannot satisfy.
    SeekUnsupported(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Truncated(msg) => write!(f, "truncated stream: {msg}"),
            Error::BadMagic(msg) => write!(f, "bad magic: {msg}"),
            Error::Invariant(kind) => write!(f, "invariant violation: {}", kind.as_str()),
            Error::Unsupported(msg) => write!(f, "unsupported: {msg}"),
            Error::Corrupt(msg) => write!(f, "corrupt data: {msg}"),
            Error::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            Error::SeekUnsupported(msg) => write!(f, "seek not possible: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Convenience constructor for [`Error::Truncated`].
pub fn truncated<T>(msg: &'static str) -> Result<T> {
    Err(Error::Truncated(msg))
}

/// Convenience constructor for [`Error::BadMagic`].
pub fn bad_magic<T>(msg: &'static str) -> Result<T> {
    Err(Error::BadMagic(msg))
}

/// Convenience constructor for [`Error::Invariant`].
pub fn invariant<T>(kind: InvariantKind) -> Result<T> {
    Err(Error::Invariant(kind))
}

/// Convenience constructor for [`Error::Unsupported`].
pub fn unsupported<T>(msg: &'static str) -> Result<T> {
    Err(Error::Unsupported(msg))
}

/// Convenience constructor for [`Error::Corrupt`].
pub fn corrupt<T>(msg: &'static str) -> Result<T> {
    Err(Error::Corrupt(msg))
}

/// Convenience constructor for [`Error::LimitExceeded`].
pub fn limit_exceeded<T>(msg: &'static str) -> Result<T> {
    Err(Error::LimitExceeded(msg))
}
