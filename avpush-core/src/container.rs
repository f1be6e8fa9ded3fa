// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared building blocks for hierarchical box/chunk-based container formats (MP4/MOV, AVI/RIFF,
//! Matroska/EBML, CAF, WAV).
//!
//! This module does not drive a traversal loop itself — box header encodings differ too much
//! between RIFF's fixed 8-byte `{fourcc, u32le size}`, MP4's 8-or-16-byte header with the
//! `size == 1` largesize extension, and EBML's fully variable-length id/size fields for a single
//! generic loop to stay readable. Instead it gives every per-format reader the same declarative
//! table type, the same stack-of-open-boxes bookkeeping, and the same invariant checks, and each
//! format's own `process` loop (see `avpush-format-*`) drives the gatherer and this stack
//! directly, the way the reference's per-format readers do.

use bitflags::bitflags;

use crate::errors::{invariant, InvariantKind, Result};

/// A box/chunk/element identifier. RIFF, MP4, and AVI ids are 4-byte FourCCs, widened into the
/// low 32 bits; EBML element ids are up to 4 bytes per the EBML spec and also fit here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkId(pub u32);

impl ChunkId {
    pub const fn fourcc(tag: &[u8; 4]) -> Self {
        Self(u32::from_be_bytes(*tag))
    }
}

bitflags! {
    /// Flags on a declarative chunk descriptor table entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ChunkFlags: u16 {
        /// Must appear under its parent at least once before the parent closes.
        const REQUIRED = 1 << 0;
        /// May appear under its parent at most once.
        const UNIQUE = 1 << 1;
        /// The full payload is gathered in one view before the handler runs.
        const GATHER_WHOLE = 1 << 2;
        /// Only the first `min_size` bytes are gathered; the remainder streams through (used for
        /// large leaves like MP4 `mdat` or RIFF `data`).
        const GATHER_MIN = 1 << 3;
        /// This id names a container; its own children table is consulted instead of a payload
        /// handler.
        const IS_CONTAINER = 1 << 4;
    }
}

/// Compile-time table entry describing one possible child under a given parent context.
#[derive(Debug, Clone, Copy)]
pub struct ChunkDescriptor {
    pub id: ChunkId,
    pub flags: ChunkFlags,
    /// Children table to switch to when descending into this id, if `IS_CONTAINER` is set.
    pub children: Option<&'static [ChunkDescriptor]>,
    /// Minimum payload size accepted; smaller declared sizes are a corruption error.
    pub min_size: u64,
    /// Ordering priority: a sibling with priority `p` must not appear before one with `p - 1`
    /// has already been seen. `0` means unordered.
    pub priority: u8,
    /// Opaque 24-bit-equivalent semantic tag a format reader uses to bind this id to a payload
    /// handler or a normalized tag identifier; meaningless to this module.
    pub semantic: u32,
}

impl ChunkDescriptor {
    pub const fn leaf(id: ChunkId, flags: ChunkFlags, semantic: u32) -> Self {
        Self { id, flags, children: None, min_size: 0, priority: 0, semantic }
    }

    pub const fn container(id: ChunkId, flags: ChunkFlags, children: &'static [ChunkDescriptor]) -> Self {
        Self {
            id,
            flags: ChunkFlags::from_bits_truncate(flags.bits() | ChunkFlags::IS_CONTAINER.bits()),
            children: Some(children),
            min_size: 0,
            priority: 0,
            semantic: 0,
        }
    }

    pub fn find(table: &'static [ChunkDescriptor], id: ChunkId) -> Option<&'static ChunkDescriptor> {
        table.iter().find(|d| d.id == id)
    }
}

/// A stack entry tracking one currently-open box/element.
#[derive(Debug, Clone)]
pub struct ContainerNode {
    pub id: ChunkId,
    pub total_size: u64,
    pub remaining: u64,
    pub children: Option<&'static [ChunkDescriptor]>,
    seen_unique: Vec<ChunkId>,
    max_priority_seen: u8,
}

impl ContainerNode {
    pub fn new(id: ChunkId, total_size: u64, children: Option<&'static [ChunkDescriptor]>) -> Self {
        Self {
            id,
            total_size,
            remaining: total_size,
            children,
            seen_unique: Vec::new(),
            max_priority_seen: 0,
        }
    }

    /// Consume `n` bytes of this node's remaining unread size. `n` may exceed `remaining` only
    /// due to caller error; that case is a logic bug, not a stream-corruption error, so it
    /// saturates rather than panicking.
    pub fn consume(&mut self, n: u64) {
        self.remaining = self.remaining.saturating_sub(n);
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

/// The depth-bounded stack of open container nodes plus the invariant checks every format's
/// traversal loop runs on each child as it is discovered.
#[derive(Debug)]
pub struct ContainerStack {
    stack: Vec<ContainerNode>,
    max_depth: usize,
}

impl ContainerStack {
    pub fn new(max_depth: usize) -> Self {
        Self { stack: Vec::new(), max_depth }
    }

    pub fn top(&self) -> Option<&ContainerNode> {
        self.stack.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut ContainerNode> {
        self.stack.last_mut()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn pop(&mut self) -> Option<ContainerNode> {
        self.stack.pop()
    }

    /// Validate and push a new child node under the current top of stack (or as the root, if
    /// the stack is empty). Enforces: depth bound, size-within-parent, unique-singleton, and
    /// priority ordering, per the descriptor's flags.
    pub fn push_child(
        &mut self,
        id: ChunkId,
        size: u64,
        desc: &ChunkDescriptor,
    ) -> Result<()> {
        if self.stack.len() >= self.max_depth {
            return invariant(InvariantKind::SizeExceedsParent);
        }

        if let Some(parent) = self.stack.last_mut() {
            if size > parent.remaining {
                return invariant(InvariantKind::SizeExceedsParent);
            }

            if desc.flags.contains(ChunkFlags::UNIQUE) && parent.seen_unique.contains(&id) {
                return invariant(InvariantKind::DuplicateSingleton);
            }

            if desc.priority > 1 && parent.max_priority_seen < desc.priority - 1 {
                return invariant(InvariantKind::OutOfOrder);
            }

            if desc.priority > 0 {
                parent.max_priority_seen = desc.priority;
            }
            parent.seen_unique.push(id);
        }

        if size < desc.min_size {
            return invariant(InvariantKind::SizeExceedsParent);
        }

        self.stack.push(ContainerNode::new(id, size, desc.children));
        Ok(())
    }

    /// Account for `n` bytes consumed from the currently-open node (and transitively from every
    /// open ancestor, since a child's bytes are also unread bytes of its parent).
    pub fn consume(&mut self, n: u64) {
        for node in self.stack.iter_mut() {
            node.consume(n);
        }
    }

    /// Check that every `REQUIRED` child named in `children` was seen under `node` before it
    /// closes.
    pub fn check_required(node: &ContainerNode) -> Result<()> {
        if let Some(children) = node.children {
            for child in children {
                if child.flags.contains(ChunkFlags::REQUIRED) && !node.seen_unique.contains(&child.id)
                {
                    return invariant(InvariantKind::MissingRequiredChild);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEAF: ChunkDescriptor =
        ChunkDescriptor::leaf(ChunkId::fourcc(b"leaf"), ChunkFlags::UNIQUE, 0);
    const ROOT: &[ChunkDescriptor] = &[LEAF];

    #[test]
    fn duplicate_singleton_is_rejected() {
        let mut stack = ContainerStack::new(8);
        stack.push_child(ChunkId::fourcc(b"root"), 100, &ChunkDescriptor::container(
            ChunkId::fourcc(b"root"),
            ChunkFlags::empty(),
            ROOT,
        )).unwrap();
        stack.push_child(ChunkId::fourcc(b"leaf"), 4, &LEAF).unwrap();
        stack.pop();
        assert!(stack.push_child(ChunkId::fourcc(b"leaf"), 4, &LEAF).is_err());
    }

    #[test]
    fn child_larger_than_parent_remaining_is_rejected() {
        let mut stack = ContainerStack::new(8);
        stack
            .push_child(
                ChunkId::fourcc(b"root"),
                10,
                &ChunkDescriptor::container(ChunkId::fourcc(b"root"), ChunkFlags::empty(), ROOT),
            )
            .unwrap();
        assert!(stack.push_child(ChunkId::fourcc(b"leaf"), 20, &LEAF).is_err());
    }
}
