//! Frame geometry chunk: `comp` (modern) or `dec\0` (legacy).
//!
//! Both variants describe the same frame layout but encode it differently:
//!
//! ```text
//! comp: frame_size u16 | min_res u8 | max_res u8 | track_count u8 | channel_config u8
//!       | total_bands u8 | base_bands u8 | stereo_bands u8 | hfr_group u8 | ms_stereo u8 | reserved u8
//! dec : frame_size u16 | min_res u8 | max_res u8 | total_bands-1 u8 | base_bands-1 u8
//!       | (track_count << 4 | channel_config) u8 | stereo_type u8
//! ```
//!
//! The legacy stereo band count is not stored; it is `total - base` when the
//! stereo type is non-zero and zero otherwise.

use byteorder::{BigEndian, ReadBytesExt};
use std::io::{self, Read};

use crate::chunk::Tag;

/// Variant-specific fields of the frame geometry chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryLayout {
    /// `comp` chunk.  Carries HFR grouping and M/S stereo directly; there is
    /// no stereo type selector.
    Modern { bands_per_hfr_group: u8, ms_stereo: u8 },
    /// `dec\0` chunk.  Carries an explicit stereo type selector.
    Legacy { stereo_type: u8 },
}

/// Decoded frame geometry, shared by both chunk variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameGeometry {
    pub frame_size:        u16,
    pub min_resolution:    u8,
    pub max_resolution:    u8,
    pub track_count:       u8,
    pub channel_config:    u8,
    pub total_band_count:  u8,
    pub base_band_count:   u8,
    pub stereo_band_count: u8,
    pub layout:            GeometryLayout,
}

impl FrameGeometry {
    /// Body of a `comp` chunk (tag already consumed).
    pub fn read_modern<R: Read>(mut r: R) -> io::Result<Self> {
        let frame_size          = r.read_u16::<BigEndian>()?;
        let min_resolution      = r.read_u8()?;
        let max_resolution      = r.read_u8()?;
        let track_count         = r.read_u8()?;
        let channel_config      = r.read_u8()?;
        let total_band_count    = r.read_u8()?;
        let base_band_count     = r.read_u8()?;
        let stereo_band_count   = r.read_u8()?;
        let bands_per_hfr_group = r.read_u8()?;
        let ms_stereo           = r.read_u8()?;
        let _reserved           = r.read_u8()?;
        Ok(Self {
            frame_size,
            min_resolution,
            max_resolution,
            track_count,
            channel_config,
            total_band_count,
            base_band_count,
            stereo_band_count,
            layout: GeometryLayout::Modern { bands_per_hfr_group, ms_stereo },
        })
    }

    /// Body of a `dec\0` chunk (tag already consumed).
    pub fn read_legacy<R: Read>(mut r: R) -> io::Result<Self> {
        let frame_size       = r.read_u16::<BigEndian>()?;
        let min_resolution   = r.read_u8()?;
        let max_resolution   = r.read_u8()?;
        let total_band_count = r.read_u8()?.wrapping_add(1);
        let base_band_count  = r.read_u8()?.wrapping_add(1);
        let packed           = r.read_u8()?;
        let stereo_type      = r.read_u8()?;
        let stereo_band_count = if stereo_type == 0 {
            0
        } else {
            total_band_count.wrapping_sub(base_band_count)
        };
        Ok(Self {
            frame_size,
            min_resolution,
            max_resolution,
            track_count:    packed >> 4,
            channel_config: packed & 0x0F,
            total_band_count,
            base_band_count,
            stereo_band_count,
            layout: GeometryLayout::Legacy { stereo_type },
        })
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self.layout, GeometryLayout::Legacy { .. })
    }

    /// The explicit stereo selector.  `None` means unset, which is always
    /// the case for the modern variant.
    pub fn stereo_type(&self) -> Option<u8> {
        match self.layout {
            GeometryLayout::Legacy { stereo_type } => Some(stereo_type),
            GeometryLayout::Modern { .. }          => None,
        }
    }

    pub fn tag(&self) -> Tag {
        match self.layout {
            GeometryLayout::Modern { .. } => Tag::COMP,
            GeometryLayout::Legacy { .. } => Tag::DEC,
        }
    }

    /// Append the chunk, tag included, in the variant it was read from.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.tag().to_bytes());
        out.extend_from_slice(&self.frame_size.to_be_bytes());
        out.push(self.min_resolution);
        out.push(self.max_resolution);
        match self.layout {
            GeometryLayout::Modern { bands_per_hfr_group, ms_stereo } => {
                out.extend_from_slice(&[
                    self.track_count,
                    self.channel_config,
                    self.total_band_count,
                    self.base_band_count,
                    self.stereo_band_count,
                    bands_per_hfr_group,
                    ms_stereo,
                    0, // reserved
                ]);
            }
            GeometryLayout::Legacy { stereo_type } => {
                out.extend_from_slice(&[
                    self.total_band_count.wrapping_sub(1),
                    self.base_band_count.wrapping_sub(1),
                    ((self.track_count & 0x0F) << 4) | (self.channel_config & 0x0F),
                    stereo_type,
                ]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_decodes_zero_based_counts_and_nibbles() {
        let body = [0x01, 0x00, 1, 15, 9, 4, 0x21, 0];
        let g = FrameGeometry::read_legacy(&body[..]).unwrap();
        assert_eq!(g.frame_size, 0x100);
        assert_eq!(g.total_band_count, 10);
        assert_eq!(g.base_band_count, 5);
        assert_eq!(g.track_count, 2);
        assert_eq!(g.channel_config, 1);
        assert_eq!(g.stereo_band_count, 0);
        assert_eq!(g.stereo_type(), Some(0));
    }

    #[test]
    fn legacy_stereo_bands_derived_from_selector() {
        let body = [0x01, 0x00, 1, 15, 9, 4, 0x10, 2];
        let g = FrameGeometry::read_legacy(&body[..]).unwrap();
        assert_eq!(g.stereo_band_count, 5);
    }

    #[test]
    fn legacy_reencodes_original_bytes() {
        let body = [0x02, 0x00, 1, 15, 9, 4, 0x21, 0];
        let g = FrameGeometry::read_legacy(&body[..]).unwrap();
        let mut out = Vec::new();
        g.encode_into(&mut out);
        assert_eq!(&out[..4], b"dec\0");
        assert_eq!(&out[4..], &body);
    }

    #[test]
    fn modern_has_unset_stereo_type() {
        let body = [0x01, 0x00, 1, 15, 1, 0, 128, 16, 8, 4, 0, 0];
        let g = FrameGeometry::read_modern(&body[..]).unwrap();
        assert_eq!(g.stereo_type(), None);
        assert_eq!(g.stereo_band_count, 8);
        assert!(!g.is_legacy());

        let mut out = Vec::new();
        g.encode_into(&mut out);
        assert_eq!(&out[..4], b"comp");
        assert_eq!(&out[4..], &body);
    }

    #[test]
    fn short_body_is_an_error() {
        assert!(FrameGeometry::read_modern(&[0u8; 5][..]).is_err());
    }
}
