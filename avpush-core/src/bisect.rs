// avpush
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The bisecting seek engine shared by FLAC, OGG, and WavPack (and used as the fallback by
//! every other seekable format that lacks a real index for the requested region).
//!
//! The engine only ever prescribes an absolute byte offset to probe and narrows `[lo, hi]`
//! based on what the caller's frame-sync scan finds there; it never touches the byte source
//! itself.

/// One endpoint of the current search window: a known (sample, byte offset) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekPoint {
    pub sample: u64,
    pub offset: u64,
}

/// What the caller should do next after a bisection step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekStep {
    /// Reposition the source to `offset` and resume frame-sync scanning from there.
    Probe { offset: u64 },
    /// The target sample lies within the frame already found; deliver starting at `offset`.
    Done { offset: u64 },
    /// The window collapsed without finding a new frame; deliver the closest frame to the left.
    GiveUp { offset: u64 },
}

const PROBE_BACKOFF: u64 = 4 * 1024;
const STALL_WINDOW: u64 = 64 * 1024;

/// Narrows `[lo, hi]` toward `target_sample` by linear sample-to-offset interpolation.
#[derive(Debug, Clone)]
pub struct BisectSeeker {
    lo: SeekPoint,
    hi: SeekPoint,
    target: u64,
    last_probe_off: Option<u64>,
}

impl BisectSeeker {
    pub fn new(lo: SeekPoint, hi: SeekPoint, target_sample: u64) -> Self {
        Self { lo, hi, target: target_sample, last_probe_off: None }
    }

    /// Tighten the initial window using a real index (FLAC seek table, OGG granule-position
    /// boundaries, MP3 Xing TOC) rather than the file's overall extent.
    pub fn narrow_initial(&mut self, lo: SeekPoint, hi: SeekPoint) {
        self.lo = lo;
        self.hi = hi;
    }

    /// Estimate the next probe offset via linear interpolation between `lo` and `hi`, backed
    /// off by a fixed margin to land before rather than after the target frame, and bumped by
    /// one byte if it would repeat the previous probe (anti-stall).
    pub fn estimate_offset(&mut self) -> u64 {
        let offset = if self.hi.sample == self.lo.sample {
            self.lo.offset
        }
        else {
            let span_samples = (self.hi.sample - self.lo.sample) as u128;
            let span_offset = (self.hi.offset - self.lo.offset) as u128;
            let delta_samples = self.target.saturating_sub(self.lo.sample) as u128;
            let est = self.lo.offset as u128 + delta_samples * span_offset / span_samples;
            let backoff = PROBE_BACKOFF.min(est as u64) as u128;
            (est - backoff) as u64
        };

        let offset = match self.last_probe_off {
            Some(prev) if prev == offset => offset + 1,
            _ => offset,
        };

        self.last_probe_off = Some(offset);
        offset
    }

    /// A frame header was found at `frame_offset`, starting at sample `frame_sample`, occupying
    /// `frame_size` bytes. Narrows the window and reports what to do next.
    pub fn on_frame_found(&mut self, frame_sample: u64, frame_offset: u64, frame_size: u64) -> SeekStep {
        if frame_sample > self.target {
            self.hi = SeekPoint { sample: frame_sample, offset: frame_offset };
        }
        else {
            self.lo = SeekPoint { sample: frame_sample, offset: frame_offset + frame_size };
        }

        if self.lo.offset.saturating_add(1) >= self.hi.offset {
            SeekStep::Done { offset: self.lo.offset }
        }
        else {
            SeekStep::Probe { offset: self.estimate_offset() }
        }
    }

    /// No new frame was found before reaching `hi.offset`. Bisects the window by the probe's
    /// endpoint rather than giving up outright, unless the window has already stalled.
    pub fn on_no_frame_found(&mut self) -> SeekStep {
        if let Some(last) = self.last_probe_off {
            self.hi.offset = last;
        }

        let window = self.hi.offset.saturating_sub(self.lo.offset);
        if window <= 1 {
            SeekStep::GiveUp { offset: self.lo.offset }
        }
        else if window > STALL_WINDOW {
            SeekStep::Probe { offset: self.lo.offset + window / 2 }
        }
        else {
            SeekStep::Probe { offset: self.lo.offset + 1 }
        }
    }
}

/// MP3's Xing/VBRI TOC variant: 100 percent-to-byte-fraction entries (0..=255, scaled by 256)
/// replace linear interpolation with the encoder's own mapping.
pub fn xing_toc_offset(toc: &[u8; 100], target_sample: u64, total_samples: u64, total_size: u64) -> u64 {
    if total_samples == 0 {
        return 0;
    }

    let percent = (target_sample as f64 / total_samples as f64 * 100.0).clamp(0.0, 99.0);
    let idx = percent as usize;
    let frac_lo = toc[idx] as f64;
    let frac_hi = if idx + 1 < 100 { toc[idx + 1] as f64 } else { 256.0 };
    let frac = frac_lo + (frac_hi - frac_lo) * (percent - idx as f64);
    (frac / 256.0 * total_size as f64) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrows_toward_target_and_finishes() {
        let mut seeker =
            BisectSeeker::new(SeekPoint { sample: 0, offset: 0 }, SeekPoint { sample: 1000, offset: 10000 }, 500);
        let off = seeker.estimate_offset();
        assert!(off < 5000);

        // Pretend the probe landed past the target; narrow hi and keep going.
        let step = seeker.on_frame_found(600, off, 100);
        match step {
            SeekStep::Probe { offset } => assert!(offset <= off),
            other => panic!("expected another probe, got {other:?}"),
        }
    }

    #[test]
    fn stalled_window_gives_up() {
        let mut seeker = BisectSeeker::new(
            SeekPoint { sample: 0, offset: 100 },
            SeekPoint { sample: 1000, offset: 101 },
            500,
        );
        match seeker.on_no_frame_found() {
            SeekStep::GiveUp { offset } => assert_eq!(offset, 100),
            other => panic!("expected give up, got {other:?}"),
        }
    }
}
