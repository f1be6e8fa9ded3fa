// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared primitives for the avpush family of incremental, push-model container and codec
//! readers/writers.
//!
//! None of the types in this crate perform I/O. A caller feeds arbitrarily-sized byte chunks
//! into a reader's `process` method and reacts to the returned [`Status`]; a writer is driven the
//! same way in reverse. See [`gather`], [`container`], [`framesync`], [`bisect`] for the four
//! reusable engines every format implementation is built from.

pub mod bisect;
pub mod container;
pub mod errors;
pub mod format;
pub mod framesync;
pub mod gather;
pub mod sniff;
pub mod status;
pub mod tag;

pub use errors::{Error, Result};
pub use format::{Codec, Format, ReaderConf, Seekable, WriterInfo};
pub use gather::ByteGatherer;
pub use status::{ErrorInfo, FrameRecord, HeaderInfo, ReadResult, Status};
pub use tag::{NormalizedTag, TagRecord};
