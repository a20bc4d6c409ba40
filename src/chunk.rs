//! Chunk tags and the fixed order of optional header chunks.
//!
//! Every chunk starts with a 4-byte big-endian tag.  Some producers set the
//! high bit of each tag byte, so tags are always compared after masking with
//! [`TAG_MASK`].  Rebuilt headers write the plain 7-bit form.

use std::fmt;

/// Clears the high bit of every tag byte before comparison.
pub const TAG_MASK: u32 = 0x7F7F_7F7F;

/// A 4-byte chunk tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag(pub u32);

impl Tag {
    pub const HCA:  Tag = Tag(0x4843_4100); // "HCA\0"
    pub const FMT:  Tag = Tag(0x666D_7400); // "fmt\0"
    pub const COMP: Tag = Tag(0x636F_6D70); // "comp"
    pub const DEC:  Tag = Tag(0x6465_6300); // "dec\0"
    pub const VBR:  Tag = Tag(0x7662_7200); // "vbr\0"
    pub const ATH:  Tag = Tag(0x6174_6800); // "ath\0"
    pub const LOOP: Tag = Tag(0x6C6F_6F70); // "loop"
    pub const CIPH: Tag = Tag(0x6369_7068); // "ciph"
    pub const RVA:  Tag = Tag(0x7276_6100); // "rva\0"
    pub const COMM: Tag = Tag(0x636F_6D6D); // "comm"
    pub const PAD:  Tag = Tag(0x7061_6400); // "pad\0"

    /// The tag with the obfuscation bit stripped from every byte.
    #[inline]
    pub fn masked(self) -> Tag {
        Tag(self.0 & TAG_MASK)
    }

    /// Compare under the high-bit mask.
    #[inline]
    pub fn matches(self, expected: Tag) -> bool {
        self.masked() == expected.masked()
    }

    /// Big-endian bytes as written on disk.
    #[inline]
    pub fn to_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.masked().to_bytes() {
            match b {
                0 => {}
                0x20..=0x7E => write!(f, "{}", b as char)?,
                _ => write!(f, "\\x{b:02x}")?,
            }
        }
        Ok(())
    }
}

// ── Optional chunk sequence ──────────────────────────────────────────────────

/// Optional chunks in the order they may appear after the frame geometry.
///
/// The header parser walks this sequence once.  At each state the current
/// tag either matches (the chunk is present: its body is consumed and the
/// next tag read) or it does not (the chunk is absent and the same tag is
/// offered to the next state).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionalChunk {
    Vbr,
    Ath,
    Loop,
    Cipher,
    Rva,
    Comment,
    Padding,
}

impl OptionalChunk {
    pub fn first() -> Self {
        OptionalChunk::Vbr
    }

    /// The state after this one, `None` once the sequence is exhausted.
    pub fn next(self) -> Option<Self> {
        match self {
            OptionalChunk::Vbr     => Some(OptionalChunk::Ath),
            OptionalChunk::Ath     => Some(OptionalChunk::Loop),
            OptionalChunk::Loop    => Some(OptionalChunk::Cipher),
            OptionalChunk::Cipher  => Some(OptionalChunk::Rva),
            OptionalChunk::Rva     => Some(OptionalChunk::Comment),
            OptionalChunk::Comment => Some(OptionalChunk::Padding),
            OptionalChunk::Padding => None,
        }
    }

    pub fn tag(self) -> Tag {
        match self {
            OptionalChunk::Vbr     => Tag::VBR,
            OptionalChunk::Ath     => Tag::ATH,
            OptionalChunk::Loop    => Tag::LOOP,
            OptionalChunk::Cipher  => Tag::CIPH,
            OptionalChunk::Rva     => Tag::RVA,
            OptionalChunk::Comment => Tag::COMM,
            OptionalChunk::Padding => Tag::PAD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_bit_obfuscated_tag_matches() {
        let obfuscated = Tag(0x4843_4100 | 0x8080_8080);
        assert!(obfuscated.matches(Tag::HCA));
        assert!(!obfuscated.matches(Tag::FMT));
    }

    #[test]
    fn display_strips_nul_and_mask() {
        assert_eq!(Tag::FMT.to_string(), "fmt");
        assert_eq!(Tag(0xE3EF_EDF0).to_string(), "comp");
    }

    #[test]
    fn sequence_walks_every_state_once() {
        let mut seen = Vec::new();
        let mut state = Some(OptionalChunk::first());
        while let Some(s) = state {
            seen.push(s);
            state = s.next();
        }
        assert_eq!(
            seen,
            [
                OptionalChunk::Vbr,
                OptionalChunk::Ath,
                OptionalChunk::Loop,
                OptionalChunk::Cipher,
                OptionalChunk::Rva,
                OptionalChunk::Comment,
                OptionalChunk::Padding,
            ]
        );
    }
}
