// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Matroska/EBML reader: variable-length id/size elements, Cluster/BlockGroup/Block traversal,
//! Xiph/EBML/fixed lacing, SimpleTag metadata.

mod ebml;
mod reader;

pub use reader::MkvReader;
