// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The frame-sync resync engine shared by MPEG-1 audio, ADTS/AAC, FLAC, and WavPack.
//!
//! The shared shape is "two consecutive headers": a candidate sync word is validated as a
//! header, then a *second* well-formed header must be found at the byte distance the first one
//! predicts before either is trusted. Only after that initial commit does the engine start
//! delivering frames one at a time; a frame whose header fails the stream-identity check at
//! delivery time is a lost-sync event, not a fatal error, and the engine falls back to scanning.
//!
//! What is generic here is the scan/commit/deliver state machine. What is *not* generic is how a
//! candidate byte sequence is recognized, sized, and compared — that is supplied per format via
//! the [`FrameHeader`] trait (see `avpush-codec-mpeg`, `avpush-codec-aac`, `avpush-codec-flac`,
//! `avpush-codec-wavpack`).

use crate::errors::Result;
use crate::gather::ByteGatherer;

/// A parsed candidate frame header, plus its size accounting.
#[derive(Debug, Clone, Copy)]
pub struct ParsedHeader<H> {
    pub header: H,
    /// Total size of the frame (header + payload) in bytes; this is the distance to the next
    /// header if the stream is well-formed.
    pub frame_size: usize,
}

/// Per-format glue the generic frame-sync engine needs.
pub trait FrameHeader: Copy {
    /// Upper bound on how many bytes a header needs to be parsed. The engine never scans past
    /// this many bytes looking for a candidate's start.
    const MAX_HEADER_LEN: usize;

    /// Attempt to parse a header candidate starting at `data[0]`. `data` is at least
    /// `MAX_HEADER_LEN` bytes unless the stream is ending. Reserved-bit / range checks that
    /// would reject an impossible header happen here.
    fn try_parse(data: &[u8]) -> Option<ParsedHeader<Self>>
    where
        Self: Sized;

    /// True if `self` and `other` are consistent with being two frames of the same logical
    /// stream (the "invariant mask" — e.g. for MPEG-1 the version/layer/sample-rate/channel-mode
    /// bits that must not change frame to frame).
    fn same_stream(&self, other: &Self) -> bool;
}

/// What [`FrameSyncEngine::step`] produced this call.
#[derive(Debug)]
pub enum SyncOutcome<H> {
    /// No output yet; more input is required.
    More,
    /// The first two consecutive valid headers were just found and committed; this header
    /// should be used to derive stream-level info (sample rate, channels, ...). The frame itself
    /// is delivered on a subsequent call, via `Frame`.
    Committed(H),
    /// One complete frame is ready.
    Frame { header: H, bytes: Vec<u8> },
    /// A frame header failed the stream-identity check once sync had already been established;
    /// the engine has dropped back to scanning for a new two-header commit.
    LostSync,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Scanning,
    Synced,
}

/// Drives the scan → validate → commit → deliver state machine for one logical stream.
pub struct FrameSyncEngine<H> {
    gather: ByteGatherer,
    state: State,
    mask: Option<H>,
    cap: usize,
}

impl<H: FrameHeader> FrameSyncEngine<H> {
    pub fn new(cap: usize) -> Self {
        Self { gather: ByteGatherer::new(), state: State::Scanning, mask: None, cap }
    }

    pub fn reset(&mut self) {
        self.gather.reset();
        self.state = State::Scanning;
        self.mask = None;
    }

    /// First header ever committed, used as the stream-identity mask thereafter.
    pub fn first_header(&self) -> Option<&H> {
        self.mask.as_ref()
    }

    pub fn process(&mut self, input: &mut &[u8]) -> Result<SyncOutcome<H>> {
        match self.state {
            State::Scanning => self.scan(input),
            State::Synced => self.deliver(input),
        }
    }

    fn scan(&mut self, input: &mut &[u8]) -> Result<SyncOutcome<H>> {
        loop {
            let (consumed, view) = self.gather.gather_header(*input, H::MAX_HEADER_LEN);
            *input = &input[consumed..];
            let Some(view) = view else {
                return Ok(SyncOutcome::More);
            };
            let window = view.as_slice().to_vec();
            drop(view);

            let last_start = window.len().saturating_sub(H::MAX_HEADER_LEN);
            let mut candidate = None;
            for start in 0..=last_start {
                if let Some(p1) = H::try_parse(&window[start..]) {
                    candidate = Some((start, p1));
                    break;
                }
            }

            let Some((start, p1)) = candidate else {
                // Nothing plausible anywhere in the window: drop everything except a tail that
                // could still be the prefix of a header split across the next chunk boundary.
                let keep = H::MAX_HEADER_LEN - 1;
                let drop = window.len().saturating_sub(keep);
                self.gather.consume(drop);
                if input.is_empty() {
                    return Ok(SyncOutcome::More);
                }
                continue;
            };

            if start > 0 {
                self.gather.consume(start);
                continue;
            }

            // Need H1's own header bytes plus the predicted frame size plus enough trailing
            // bytes to parse H2. `gather_header` above always buffered its window (never took
            // the zero-copy shortcut), so `self.gather` still holds it at offset 0 here; this
            // call extends the same buffer rather than starting a fresh read past it.
            let need2 = p1.frame_size + H::MAX_HEADER_LEN;
            let (consumed2, view2) = self.gather.gather(*input, need2.max(window.len()), self.cap)?;
            *input = &input[consumed2..];
            let Some(view2) = view2 else {
                return Ok(SyncOutcome::More);
            };

            if view2.len() < p1.frame_size + 1 {
                drop(view2);
                return Ok(SyncOutcome::More);
            }

            let h2 = H::try_parse(&view2.as_slice()[p1.frame_size..]).map(|p2| p2.header);
            drop(view2);

            match h2 {
                Some(h2) if p1.header.same_stream(&h2) => {
                    self.mask = Some(p1.header);
                    self.state = State::Synced;
                    // The gatherer is left holding the already-accumulated bytes (at least the
                    // first frame, possibly a prefix of the second header too); `deliver` reuses
                    // them on the next call instead of requesting fresh input.
                    return Ok(SyncOutcome::Committed(p1.header));
                }
                _ => {
                    self.gather.consume(1);
                    continue;
                }
            }
        }
    }

    fn deliver(&mut self, input: &mut &[u8]) -> Result<SyncOutcome<H>> {
        let (consumed, view) = self.gather.gather(*input, H::MAX_HEADER_LEN, self.cap)?;
        *input = &input[consumed..];
        let Some(view) = view else {
            return Ok(SyncOutcome::More);
        };
        let head = view.as_slice().to_vec();

        let Some(p) = H::try_parse(&head) else {
            self.gather.consume(1);
            self.state = State::Scanning;
            return Ok(SyncOutcome::LostSync);
        };

        if let Some(mask) = &self.mask {
            if !mask.same_stream(&p.header) {
                self.gather.consume(1);
                self.state = State::Scanning;
                return Ok(SyncOutcome::LostSync);
            }
        }

        let (consumed2, view2) = self.gather.gather(*input, p.frame_size, self.cap)?;
        *input = &input[consumed2..];
        let Some(view2) = view2 else {
            return Ok(SyncOutcome::More);
        };
        let bytes = view2.as_slice().to_vec();
        self.gather.consume(p.frame_size);

        Ok(SyncOutcome::Frame { header: p.header, bytes })
    }
}
