//! HCA header: parsing the chunked metadata region and rebuilding it in
//! plain (cipher 0) form.
//!
//! # Layout
//! ```text
//! "HCA\0" | version u16 | header_size u16
//! fmt  chunk                          (mandatory)
//! comp | dec chunk                    (exactly one)
//! vbr, ath, loop, ciph, rva, comm, pad  (each optional, in this order)
//! checksum u16                        (last two bytes of header_size)
//! ```
//!
//! All integers are big-endian.  Frame data starts at `header_size`.

use byteorder::{BigEndian, ReadBytesExt};
use serde::Serialize;
use std::io::{self, Cursor, Read};
use thiserror::Error;
use tracing::debug;

use crate::checksum::{checksum, checksum_tail};
use crate::chunk::{OptionalChunk, Tag};
use crate::cipher::CipherScheme;
use crate::geometry::{FrameGeometry, GeometryLayout};

/// Signature + version + header size.
pub const BASE_SIZE: usize = 8;
/// Version from which the default ATH type switches from 1 to 0.
pub const ATH_DEFAULT_SWITCH_VERSION: u16 = 0x0200;
/// Longest comment a `comm` chunk can carry (single length byte).
pub const MAX_COMMENT_LEN: usize = 255;

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("Input too small for an HCA header ({0} bytes)")]
    TooShort(usize),
    #[error("Bad HCA signature: {0:#010x}")]
    BadSignature(u32),
    #[error("Declared header size {declared} exceeds input size {available}")]
    HeaderTooLong { declared: u16, available: usize },
    #[error("Header checksum mismatch (residue {0:#06x})")]
    ChecksumMismatch(u16),
    #[error("Missing fmt chunk")]
    MissingFmt,
    #[error("Missing comp/dec chunk, found '{0}'")]
    MissingFrameGeometry(Tag),
    #[error("Chunk '{0}' runs past the end of the header")]
    Truncated(Tag),
}

// ── Optional chunk bodies ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VbrInfo {
    pub max_frame_size: u16,
    pub noise_level:    u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoopInfo {
    pub start_frame: u32,
    pub end_frame:   u32,
    pub start_delay: u16,
    pub end_padding: u16,
}

// ── Header ───────────────────────────────────────────────────────────────────

/// Parsed HCA header.  Optional chunks are `Some` exactly when their tag was
/// found at its expected position.
#[derive(Debug, Clone, PartialEq)]
pub struct HcaHeader {
    pub version:         u16,
    pub header_size:     u16,
    pub channels:        u8,
    /// 24-bit on disk.
    pub sample_rate:     u32,
    pub frame_count:     u32,
    pub encoder_delay:   u16,
    pub encoder_padding: u16,
    pub geometry:        FrameGeometry,
    pub vbr:             Option<VbrInfo>,
    pub ath_type:        Option<u16>,
    pub loop_info:       Option<LoopInfo>,
    pub cipher_type:     Option<u16>,
    pub rva_volume:      Option<f32>,
    pub comment:         Option<Vec<u8>>,
    /// A `pad\0` chunk was present.  It is never written back.
    pub has_padding:     bool,
}

impl HcaHeader {
    /// Parse and validate the header at the start of `data`.
    pub fn parse(data: &[u8]) -> Result<Self, HeaderError> {
        if data.len() < BASE_SIZE {
            return Err(HeaderError::TooShort(data.len()));
        }
        let signature = Tag(u32::from_be_bytes([data[0], data[1], data[2], data[3]]));
        if !signature.matches(Tag::HCA) {
            return Err(HeaderError::BadSignature(signature.0));
        }
        let version     = u16::from_be_bytes([data[4], data[5]]);
        let header_size = u16::from_be_bytes([data[6], data[7]]);
        if data.len() < header_size as usize {
            return Err(HeaderError::HeaderTooLong { declared: header_size, available: data.len() });
        }
        let region = &data[..header_size as usize];
        let residue = checksum(region);
        if residue != 0 {
            return Err(HeaderError::ChecksumMismatch(residue));
        }

        let mut cur = Cursor::new(region);
        cur.set_position(BASE_SIZE as u64);

        // fmt
        match peek_tag(&cur) {
            Some(t) if t.matches(Tag::FMT) => skip(&mut cur, 4),
            _ => return Err(HeaderError::MissingFmt),
        }
        let channels        = read_or(&mut cur, Tag::FMT, |r| r.read_u8())?;
        let sample_rate     = read_or(&mut cur, Tag::FMT, |r| r.read_u24::<BigEndian>())?;
        let frame_count     = read_or(&mut cur, Tag::FMT, |r| r.read_u32::<BigEndian>())?;
        let encoder_delay   = read_or(&mut cur, Tag::FMT, |r| r.read_u16::<BigEndian>())?;
        let encoder_padding = read_or(&mut cur, Tag::FMT, |r| r.read_u16::<BigEndian>())?;

        // comp / dec
        let geometry = match peek_tag(&cur) {
            Some(t) if t.matches(Tag::COMP) => {
                skip(&mut cur, 4);
                read_or(&mut cur, Tag::COMP, |r| FrameGeometry::read_modern(r))?
            }
            Some(t) if t.matches(Tag::DEC) => {
                skip(&mut cur, 4);
                read_or(&mut cur, Tag::DEC, |r| FrameGeometry::read_legacy(r))?
            }
            other => return Err(HeaderError::MissingFrameGeometry(other.unwrap_or(Tag(0)))),
        };

        let mut header = HcaHeader {
            version,
            header_size,
            channels,
            sample_rate,
            frame_count,
            encoder_delay,
            encoder_padding,
            geometry,
            vbr:         None,
            ath_type:    None,
            loop_info:   None,
            cipher_type: None,
            rva_volume:  None,
            comment:     None,
            has_padding: false,
        };

        let mut tag = peek_tag(&cur);
        let mut state = Some(OptionalChunk::first());
        while let Some(chunk) = state {
            if tag.is_some_and(|t| t.matches(chunk.tag())) {
                skip(&mut cur, 4);
                header.read_optional(chunk, &mut cur)?;
                tag = peek_tag(&cur);
            }
            state = chunk.next();
        }

        debug!(
            version     = header.version,
            header_size = header.header_size,
            frame_count = header.frame_count,
            frame_size  = header.geometry.frame_size,
            legacy      = header.geometry.is_legacy(),
            cipher      = header.cipher_scheme_id(),
            "parsed HCA header"
        );
        Ok(header)
    }

    fn read_optional(&mut self, chunk: OptionalChunk, cur: &mut Cursor<&[u8]>) -> Result<(), HeaderError> {
        let tag = chunk.tag();
        match chunk {
            OptionalChunk::Vbr => {
                self.vbr = Some(read_or(cur, tag, |r| {
                    Ok(VbrInfo {
                        max_frame_size: r.read_u16::<BigEndian>()?,
                        noise_level:    r.read_u16::<BigEndian>()?,
                    })
                })?);
            }
            OptionalChunk::Ath => {
                self.ath_type = Some(read_or(cur, tag, |r| r.read_u16::<BigEndian>())?);
            }
            OptionalChunk::Loop => {
                self.loop_info = Some(read_or(cur, tag, |r| {
                    Ok(LoopInfo {
                        start_frame: r.read_u32::<BigEndian>()?,
                        end_frame:   r.read_u32::<BigEndian>()?,
                        start_delay: r.read_u16::<BigEndian>()?,
                        end_padding: r.read_u16::<BigEndian>()?,
                    })
                })?);
            }
            OptionalChunk::Cipher => {
                self.cipher_type = Some(read_or(cur, tag, |r| r.read_u16::<BigEndian>())?);
            }
            OptionalChunk::Rva => {
                let bits = read_or(cur, tag, |r| r.read_u32::<BigEndian>())?;
                self.rva_volume = Some(f32::from_bits(bits));
            }
            OptionalChunk::Comment => {
                self.comment = Some(read_or(cur, tag, |r| {
                    let len = r.read_u8()? as usize;
                    let mut text = vec![0u8; len];
                    r.read_exact(&mut text)?;
                    Ok(text)
                })?);
            }
            OptionalChunk::Padding => {
                // Filler runs up to the trailing checksum.
                self.has_padding = true;
                let end = (self.header_size as u64).saturating_sub(2);
                cur.set_position(end.max(cur.position()));
            }
        }
        Ok(())
    }

    // ── Derived values ──────────────────────────────────────────────────────

    /// Byte offset of the first frame.
    pub fn data_offset(&self) -> usize {
        self.header_size as usize
    }

    /// Declared cipher scheme id; 0 when no `ciph` chunk is present.
    pub fn cipher_scheme_id(&self) -> u16 {
        self.cipher_type.unwrap_or(0)
    }

    /// ATH type from the `ath` chunk, or the version default when absent.
    pub fn effective_ath_type(&self) -> u16 {
        match self.ath_type {
            Some(t) => t,
            None if self.version < ATH_DEFAULT_SWITCH_VERSION => 1,
            None => 0,
        }
    }

    /// Comment decoded lossily as UTF-8.
    pub fn comment_lossy(&self) -> Option<String> {
        self.comment.as_deref().map(|c| String::from_utf8_lossy(c).into_owned())
    }

    // ── Rebuild ─────────────────────────────────────────────────────────────

    /// Serialize this header with the cipher scheme forced to none.
    ///
    /// Chunk set and order follow the parsed header, except that `pad\0` is
    /// dropped and an empty comment is omitted.  The result carries a fresh
    /// header size and trailing checksum.
    pub fn to_plain_bytes(&self) -> Vec<u8> {
        let mut chunks = Vec::with_capacity(96);

        chunks.extend_from_slice(&Tag::FMT.to_bytes());
        chunks.push(self.channels);
        chunks.extend_from_slice(&self.sample_rate.to_be_bytes()[1..]);
        chunks.extend_from_slice(&self.frame_count.to_be_bytes());
        chunks.extend_from_slice(&self.encoder_delay.to_be_bytes());
        chunks.extend_from_slice(&self.encoder_padding.to_be_bytes());

        self.geometry.encode_into(&mut chunks);

        if let Some(vbr) = &self.vbr {
            chunks.extend_from_slice(&Tag::VBR.to_bytes());
            chunks.extend_from_slice(&vbr.max_frame_size.to_be_bytes());
            chunks.extend_from_slice(&vbr.noise_level.to_be_bytes());
        }
        if let Some(ath) = self.ath_type {
            chunks.extend_from_slice(&Tag::ATH.to_bytes());
            chunks.extend_from_slice(&ath.to_be_bytes());
        }
        if let Some(lp) = &self.loop_info {
            chunks.extend_from_slice(&Tag::LOOP.to_bytes());
            chunks.extend_from_slice(&lp.start_frame.to_be_bytes());
            chunks.extend_from_slice(&lp.end_frame.to_be_bytes());
            chunks.extend_from_slice(&lp.start_delay.to_be_bytes());
            chunks.extend_from_slice(&lp.end_padding.to_be_bytes());
        }
        if self.cipher_type.is_some() {
            chunks.extend_from_slice(&Tag::CIPH.to_bytes());
            chunks.extend_from_slice(&CipherScheme::None.id().to_be_bytes());
        }
        if let Some(volume) = self.rva_volume {
            chunks.extend_from_slice(&Tag::RVA.to_bytes());
            chunks.extend_from_slice(&volume.to_bits().to_be_bytes());
        }
        if let Some(text) = self.comment.as_deref().filter(|c| !c.is_empty()) {
            let text = &text[..text.len().min(MAX_COMMENT_LEN)];
            chunks.extend_from_slice(&Tag::COMM.to_bytes());
            chunks.push(text.len() as u8);
            chunks.extend_from_slice(text);
        }

        let header_size = (BASE_SIZE + chunks.len() + 2) as u16;
        let mut out = Vec::with_capacity(header_size as usize);
        out.extend_from_slice(&Tag::HCA.to_bytes());
        out.extend_from_slice(&self.version.to_be_bytes());
        out.extend_from_slice(&header_size.to_be_bytes());
        out.extend_from_slice(&chunks);
        let tail = checksum_tail(&out);
        out.extend_from_slice(&tail);
        out
    }
}

// ── Cursor helpers ───────────────────────────────────────────────────────────

/// Next 4 bytes as a tag without consuming them; `None` if fewer remain.
fn peek_tag(cur: &Cursor<&[u8]>) -> Option<Tag> {
    let pos = cur.position() as usize;
    cur.get_ref()
        .get(pos..pos + 4)
        .map(|b| Tag(u32::from_be_bytes([b[0], b[1], b[2], b[3]])))
}

fn skip(cur: &mut Cursor<&[u8]>, n: u64) {
    cur.set_position(cur.position() + n);
}

/// Run a body reader, reporting a short read as a truncated `tag` chunk.
fn read_or<T, F>(cur: &mut Cursor<&[u8]>, tag: Tag, f: F) -> Result<T, HeaderError>
where
    F: FnOnce(&mut Cursor<&[u8]>) -> io::Result<T>,
{
    f(cur).map_err(|_| HeaderError::Truncated(tag))
}

// ── Summary ──────────────────────────────────────────────────────────────────

/// Flat, serializable view of a header for display.
#[derive(Debug, Clone, Serialize)]
pub struct HeaderSummary {
    pub version:             String,
    pub header_size:         u16,
    pub channels:            u8,
    pub sample_rate:         u32,
    pub frame_count:         u32,
    pub encoder_delay:       u16,
    pub encoder_padding:     u16,
    pub frame_size:          u16,
    pub geometry_chunk:      String,
    pub min_resolution:      u8,
    pub max_resolution:      u8,
    pub track_count:         u8,
    pub channel_config:      u8,
    pub total_band_count:    u8,
    pub base_band_count:     u8,
    pub stereo_band_count:   u8,
    pub stereo_type:         Option<u8>,
    pub bands_per_hfr_group: Option<u8>,
    pub ms_stereo:           Option<u8>,
    pub vbr:                 Option<VbrInfo>,
    pub ath_type:            u16,
    pub loop_info:           Option<LoopInfo>,
    pub cipher_type:         u16,
    pub cipher_name:         &'static str,
    pub rva_volume:          Option<f32>,
    pub comment:             Option<String>,
    pub data_offset:         usize,
}

impl From<&HcaHeader> for HeaderSummary {
    fn from(h: &HcaHeader) -> Self {
        let g = &h.geometry;
        let (bands_per_hfr_group, ms_stereo) = match g.layout {
            GeometryLayout::Modern { bands_per_hfr_group, ms_stereo } => {
                (Some(bands_per_hfr_group), Some(ms_stereo))
            }
            GeometryLayout::Legacy { .. } => (None, None),
        };
        let cipher_type = h.cipher_scheme_id();
        HeaderSummary {
            version:           format!("{}.{}", h.version >> 8, h.version & 0xFF),
            header_size:       h.header_size,
            channels:          h.channels,
            sample_rate:       h.sample_rate,
            frame_count:       h.frame_count,
            encoder_delay:     h.encoder_delay,
            encoder_padding:   h.encoder_padding,
            frame_size:        g.frame_size,
            geometry_chunk:    g.tag().to_string(),
            min_resolution:    g.min_resolution,
            max_resolution:    g.max_resolution,
            track_count:       g.track_count,
            channel_config:    g.channel_config,
            total_band_count:  g.total_band_count,
            base_band_count:   g.base_band_count,
            stereo_band_count: g.stereo_band_count,
            stereo_type:       g.stereo_type(),
            bands_per_hfr_group,
            ms_stereo,
            vbr:               h.vbr,
            ath_type:          h.effective_ath_type(),
            loop_info:         h.loop_info,
            cipher_type,
            cipher_name:       CipherScheme::try_from(cipher_type).map(|s| s.name()).unwrap_or("unknown"),
            rva_volume:        h.rva_volume,
            comment:           h.comment_lossy(),
            data_offset:       h.data_offset(),
        }
    }
}
