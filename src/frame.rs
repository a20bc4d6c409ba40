//! Frame rewriting and frame health checks.
//!
//! # Frames
//! Frame data starts at the header size and consists of `frame_count`
//! frames of `frame_size` bytes.  Each frame starts with the sync word
//! 0xFFFF and ends with a big-endian checksum over the bytes before it.
//! Frames carry no cross-frame state.
//!
//! # Short input
//! When the input ends before `frame_count` complete frames, processing stops
//! after the last complete frame.  This is not an error.
//!
//! # Parallelism
//! With the `parallel` feature, frames are transformed concurrently with
//! Rayon.  Output order is identical to the sequential path.

use serde::Serialize;
use tracing::warn;

use crate::checksum::{checksum, stamp};
use crate::cipher::CipherTable;
use crate::header::HcaHeader;

/// First two bytes of every plain frame.
pub const SYNC_WORD: u16 = 0xFFFF;

/// Number of complete frames available at `offset`, capped at `frame_count`.
pub fn complete_frames(input_len: usize, offset: usize, frame_size: usize, frame_count: u32) -> usize {
    if frame_size == 0 {
        return 0;
    }
    let available = input_len.saturating_sub(offset) / frame_size;
    available.min(frame_count as usize)
}

/// Substitute every byte of each frame through `table`, re-stamp the frame
/// checksum, and append the frames to `out`.
///
/// Returns the number of frames written, which is less than `frame_count`
/// when the input is short.
pub fn transform_frames(
    input:       &[u8],
    offset:      usize,
    frame_size:  usize,
    frame_count: u32,
    table:       &CipherTable,
    out:         &mut Vec<u8>,
) -> usize {
    let n = complete_frames(input.len(), offset, frame_size, frame_count);
    if n < frame_count as usize {
        warn!(
            declared = frame_count,
            present  = n,
            "input ends before the declared frame count; stopping after the last complete frame"
        );
    }
    if n == 0 {
        return 0;
    }
    let src = &input[offset..offset + n * frame_size];

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;

        let base = out.len();
        out.resize(base + src.len(), 0);
        out[base..]
            .par_chunks_exact_mut(frame_size)
            .zip(src.par_chunks_exact(frame_size))
            .for_each(|(dst, frame)| {
                dst.copy_from_slice(frame);
                rewrite_frame(dst, table);
            });
    }

    #[cfg(not(feature = "parallel"))]
    {
        out.reserve(src.len());
        for frame in src.chunks_exact(frame_size) {
            let start = out.len();
            out.extend_from_slice(frame);
            rewrite_frame(&mut out[start..], table);
        }
    }

    n
}

/// Transform one frame in place.
#[inline]
pub fn rewrite_frame(frame: &mut [u8], table: &CipherTable) {
    table.apply(frame);
    stamp(frame);
}

// ── Verification ─────────────────────────────────────────────────────────────

/// Health verdict for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FrameHealth {
    Healthy,
    /// Non-zero residue over the whole frame.
    ChecksumMismatch(u16),
    /// Checksum holds but the frame does not start with [`SYNC_WORD`].
    MissingSync(u16),
}

impl FrameHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, FrameHealth::Healthy)
    }
}

/// Result of [`verify_frames`].  Only unhealthy frames are listed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FrameReport {
    /// Frame count declared by the header.
    pub declared: u32,
    /// Complete frames present in the input.
    pub present:  usize,
    pub healthy:  usize,
    pub corrupt:  usize,
    /// `(frame index, verdict)` for every frame that is not healthy.
    pub problems: Vec<(usize, FrameHealth)>,
}

impl FrameReport {
    pub fn is_clean(&self) -> bool {
        self.corrupt == 0
    }

    /// Declared frames that are not in the input.
    pub fn missing(&self) -> usize {
        (self.declared as usize).saturating_sub(self.present)
    }

    pub fn summary(&self) -> String {
        format!(
            "{}/{} frames present, {} healthy, {} corrupt, {} missing",
            self.present,
            self.declared,
            self.healthy,
            self.corrupt,
            self.missing(),
        )
    }
}

pub fn check_frame(frame: &[u8]) -> FrameHealth {
    let residue = checksum(frame);
    if residue != 0 {
        return FrameHealth::ChecksumMismatch(residue);
    }
    match frame {
        [a, b, ..] if u16::from_be_bytes([*a, *b]) != SYNC_WORD => {
            FrameHealth::MissingSync(u16::from_be_bytes([*a, *b]))
        }
        _ => FrameHealth::Healthy,
    }
}

/// Check every complete frame of an HCA file described by `header`.
///
/// Works on ciphered and plain files alike: 0xFF is a fixed point of every
/// cipher table, so the sync word survives ciphering, and frame checksums
/// are always computed over the stored bytes.
pub fn verify_frames(data: &[u8], header: &HcaHeader) -> FrameReport {
    let frame_size = header.geometry.frame_size as usize;
    let offset = header.data_offset();
    let present = complete_frames(data.len(), offset, frame_size, header.frame_count);

    let mut report = FrameReport {
        declared: header.frame_count,
        present,
        ..FrameReport::default()
    };
    if present == 0 {
        return report;
    }

    for (index, frame) in data[offset..offset + present * frame_size]
        .chunks_exact(frame_size)
        .enumerate()
    {
        match check_frame(frame) {
            FrameHealth::Healthy => report.healthy += 1,
            bad => {
                report.corrupt += 1;
                report.problems.push((index, bad));
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::is_valid;

    fn plain_frame(size: usize, fill: u8) -> Vec<u8> {
        let mut f = vec![fill; size];
        f[0] = 0xFF;
        f[1] = 0xFF;
        stamp(&mut f);
        f
    }

    #[test]
    fn identity_keeps_consistent_frames_unchanged() {
        let mut input = plain_frame(32, 0x11);
        input.extend(plain_frame(32, 0x22));
        let mut out = Vec::new();
        let n = transform_frames(&input, 0, 32, 2, &CipherTable::identity(), &mut out);
        assert_eq!(n, 2);
        assert_eq!(out, input);
    }

    #[test]
    fn fixed_table_substitutes_and_restamps() {
        let input = plain_frame(16, 0x01);
        let mut out = Vec::new();
        transform_frames(&input, 0, 16, 1, &CipherTable::fixed(), &mut out);
        assert_eq!(&out[..2], &[0xFF, 0xFF]);
        assert!(out[2..14].iter().all(|&b| b == 11));
        assert!(is_valid(&out));
    }

    #[test]
    fn short_input_stops_after_last_complete_frame() {
        let mut input = vec![0xAA; 4];
        input.extend(plain_frame(20, 0x33));
        input.extend(plain_frame(20, 0x44));
        input.extend_from_slice(&[0xFF, 0xFF, 0x00]);
        let mut out = vec![0xEE];
        let n = transform_frames(&input, 4, 20, 5, &CipherTable::identity(), &mut out);
        assert_eq!(n, 2);
        assert_eq!(out.len(), 1 + 40);
        assert_eq!(out[0], 0xEE);
    }

    #[test]
    fn offset_past_end_writes_nothing() {
        let mut out = Vec::new();
        assert_eq!(transform_frames(&[0u8; 4], 10, 2, 3, &CipherTable::identity(), &mut out), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn zero_frame_size_writes_nothing() {
        let mut out = Vec::new();
        assert_eq!(transform_frames(&[0u8; 4], 0, 0, 3, &CipherTable::identity(), &mut out), 0);
    }

    #[test]
    fn check_frame_verdicts() {
        let good = plain_frame(12, 0x5A);
        assert_eq!(check_frame(&good), FrameHealth::Healthy);

        let mut bad = good.clone();
        bad[5] ^= 1;
        assert!(matches!(check_frame(&bad), FrameHealth::ChecksumMismatch(_)));

        let mut nosync = good;
        nosync[0] = 0x7F;
        stamp(&mut nosync);
        assert_eq!(check_frame(&nosync), FrameHealth::MissingSync(0x7FFF));
    }
}
