// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The byte gatherer: the one piece of buffering state every reader and writer in this crate
//! shares.
//!
//! A gatherer never owns more than one in-flight prefix of whatever structure the caller of
//! `gather` is currently trying to assemble. It is deliberately dumb: it has no notion of boxes,
//! frames, or tags, only "I have N bytes, I need M, hand me more or give me a view".

use crate::errors::{limit_exceeded, Result};

/// A view into either the gatherer's own buffer or directly into the caller's input slice.
///
/// Gather is zero-copy when the caller's input already contains at least `need` bytes and the
/// gatherer is empty: in that case the returned view borrows straight from the caller's input
/// (`Direct`) and nothing is copied into the gatherer. Otherwise bytes accumulate in the
/// gatherer's own buffer across calls and the view borrows from there (`Buffered`).
#[derive(Debug, Clone, Copy)]
pub enum GatherView<'g, 'i> {
    Buffered(&'g [u8]),
    Direct(&'i [u8]),
}

impl<'g, 'i> GatherView<'g, 'i> {
    pub fn as_slice(&self) -> &[u8] {
        match self {
            GatherView::Buffered(b) => b,
            GatherView::Direct(d) => d,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

/// Holds at most one in-flight prefix of a needed structure.
#[derive(Debug, Default)]
pub struct ByteGatherer {
    buf: Vec<u8>,
}

impl ByteGatherer {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Drop all buffered bytes.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Peek at the currently buffered bytes.
    pub fn view(&self) -> &[u8] {
        &self.buf
    }

    /// Drop `n` bytes from the front after they have been interpreted.
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.buf.len());
        self.buf.drain(..n);
    }

    /// Append from `input` until internal holdings reach `need`.
    ///
    /// Returns the number of bytes consumed from `input` and, if the gatherer now holds at
    /// least `need` contiguous bytes, an exact-`need` view. `cap` is the per-format ceiling on
    /// how large a single gather request is allowed to grow; exceeding it is
    /// [`crate::errors::Error::LimitExceeded`], not a silent truncation.
    pub fn gather<'g, 'i>(
        &'g mut self,
        input: &'i [u8],
        need: usize,
        cap: usize,
    ) -> Result<(usize, Option<GatherView<'g, 'i>>)> {
        if need > cap {
            return limit_exceeded("gather request exceeds format ceiling");
        }

        if self.buf.is_empty() && input.len() >= need {
            return Ok((need, Some(GatherView::Direct(&input[..need]))));
        }

        let remaining = need.saturating_sub(self.buf.len());
        let take = remaining.min(input.len());
        self.buf.extend_from_slice(&input[..take]);

        if self.buf.len() >= need {
            Ok((take, Some(GatherView::Buffered(&self.buf[..need]))))
        }
        else {
            Ok((take, None))
        }
    }

    /// Sync-scan variant of [`Self::gather`], used by the frame-sync engine.
    ///
    /// Admits up to `(need - 1) * 2` bytes per call instead of exactly `need`, so a scanner can
    /// slide its search window across chunk boundaries without re-inspecting already-rejected
    /// candidate positions on every call. The returned view, when present, is the *entire*
    /// current buffer (which may be larger than `need`) rather than an exact-`need` slice;
    /// callers find a sync candidate somewhere in that window and call [`Self::consume`] with
    /// the offset of the candidate (or `1` to slide past a false start) to keep scanning.
    ///
    /// Unlike [`Self::gather`], this never takes the zero-copy `Direct` shortcut: the window it
    /// reports always lives in `buf`, even when the caller's input alone would satisfy `need`.
    /// A frame-sync commit reads this window, then immediately issues a second `gather` call
    /// measured from the same start position (to reach the predicted second header); that call
    /// must continue accumulating in the same buffer the window came from, or the two reads end
    /// up aligned to different stream offsets.
    pub fn gather_header<'g, 'i>(
        &'g mut self,
        input: &'i [u8],
        need: usize,
    ) -> (usize, Option<GatherView<'g, 'i>>) {
        debug_assert!(need >= 1);

        if self.buf.len() >= need {
            return (0, Some(GatherView::Buffered(&self.buf)));
        }

        let window_cap = (need - 1) * 2;
        let budget = window_cap.saturating_sub(self.buf.len());
        let n = budget.min(input.len());
        self.buf.extend_from_slice(&input[..n]);

        let view =
            if self.buf.len() >= need { Some(GatherView::Buffered(&self.buf)) } else { None };
        (n, view)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_copy_when_input_is_sufficient() {
        let mut g = ByteGatherer::new();
        let input = b"0123456789";
        let (consumed, view) = g.gather(input, 4, 64).unwrap();
        assert_eq!(consumed, 4);
        assert_eq!(view.unwrap().as_slice(), b"0123");
        assert!(g.is_empty());
    }

    #[test]
    fn buffers_across_short_calls() {
        let mut g = ByteGatherer::new();
        let (c1, v1) = g.gather(b"01", 5, 64).unwrap();
        assert_eq!(c1, 2);
        assert!(v1.is_none());

        let (c2, v2) = g.gather(b"2", 5, 64).unwrap();
        assert_eq!(c2, 1);
        assert!(v2.is_none());

        let (c3, v3) = g.gather(b"34567", 5, 64).unwrap();
        assert_eq!(c3, 3);
        assert_eq!(v3.unwrap().as_slice(), b"01234");
    }

    #[test]
    fn chunking_invariance_matches_single_shot() {
        let whole = b"the quick brown fox jumps";
        let mut single = ByteGatherer::new();
        let (_, v) = single.gather(whole, whole.len(), 64).unwrap();
        let single_result = v.unwrap().as_slice().to_vec();

        let mut chunked = ByteGatherer::new();
        let mut out = Vec::new();
        let mut remaining = &whole[..];
        while out.len() < whole.len() {
            let take = remaining.len().min(3);
            let (consumed, view) = chunked.gather(&remaining[..take], whole.len(), 64).unwrap();
            remaining = &remaining[consumed..];
            if let Some(v) = view {
                out = v.as_slice().to_vec();
            }
        }
        assert_eq!(out, single_result);
    }

    #[test]
    fn gather_header_admits_double_window() {
        let mut g = ByteGatherer::new();
        let (consumed, view) = g.gather_header(b"ab", 4);
        assert_eq!(consumed, 2);
        assert!(view.is_none());
        let (consumed, view) = g.gather_header(b"cdef", 4);
        assert_eq!(consumed, 4);
        // window cap is (4-1)*2 = 6, so only 4 more bytes fit before it would overflow the cap
        assert_eq!(view.unwrap().as_slice(), b"abcdef");
    }

    #[test]
    fn gather_header_then_gather_stay_aligned_on_one_big_slice() {
        // A single slice large enough to satisfy `need` on the first call must not bypass the
        // buffer: a follow-up `gather` has to continue accumulating from the same stream
        // position the `gather_header` window reported, exactly as it would have if the same
        // bytes had arrived split across several short calls.
        let whole = b"0123456789";
        let mut g = ByteGatherer::new();
        // window cap is (4-1)*2 = 6: the whole-slice call still only admits 6 bytes into the
        // window, even though the caller handed over all 10 at once.
        let (consumed, view) = g.gather_header(whole, 4);
        assert_eq!(consumed, 6);
        assert_eq!(view.unwrap().as_slice(), b"012345");
        let mut rest = &whole[consumed..];

        let (consumed2, view2) = g.gather(rest, 8, 64).unwrap();
        rest = &rest[consumed2..];
        assert_eq!(view2.unwrap().as_slice(), b"01234567");
        assert!(rest.starts_with(b"89"));
    }

    #[test]
    fn over_cap_is_an_error() {
        let mut g = ByteGatherer::new();
        assert!(g.gather(b"0123456789", 10, 4).is_err());
    }
}
