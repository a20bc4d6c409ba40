//! Byte-substitution tables for the three HCA cipher schemes.
//!
//! | id | scheme  | table                                               |
//! |----|---------|-----------------------------------------------------|
//! | 0  | none    | identity                                            |
//! | 1  | fixed   | key-independent LCG walk over the byte domain       |
//! | 56 | keyed   | permutation derived from a 56-bit key               |
//!
//! Every table maps each ciphered byte to its plain value.  For `fixed` and
//! `keyed`, bytes 0x00 and 0xFF are fixed points.

pub mod key;

use std::fmt;
use thiserror::Error;
use tracing::debug;

pub use key::{KeyCode, KeyParseError, KEY_MASK};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CipherError {
    #[error("Unsupported cipher scheme: {0}")]
    UnsupportedScheme(u16),
}

// ── Scheme ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherScheme {
    None,
    Fixed,
    Keyed,
}

impl CipherScheme {
    /// Value stored in the `ciph` chunk.
    #[inline]
    pub fn id(self) -> u16 {
        match self {
            CipherScheme::None  => 0,
            CipherScheme::Fixed => 1,
            CipherScheme::Keyed => 56,
        }
    }

    /// Human-readable name (diagnostics and CLI).
    pub fn name(self) -> &'static str {
        match self {
            CipherScheme::None  => "none",
            CipherScheme::Fixed => "fixed",
            CipherScheme::Keyed => "keyed",
        }
    }

    /// Parse a CLI name or a numeric id.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none"  => Some(CipherScheme::None),
            "fixed" => Some(CipherScheme::Fixed),
            "keyed" => Some(CipherScheme::Keyed),
            other   => other.parse::<u16>().ok().and_then(|id| Self::try_from(id).ok()),
        }
    }
}

impl TryFrom<u16> for CipherScheme {
    type Error = CipherError;

    fn try_from(id: u16) -> Result<Self, Self::Error> {
        match id {
            0  => Ok(CipherScheme::None),
            1  => Ok(CipherScheme::Fixed),
            56 => Ok(CipherScheme::Keyed),
            _  => Err(CipherError::UnsupportedScheme(id)),
        }
    }
}

impl fmt::Display for CipherScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.id())
    }
}

// ── Table ────────────────────────────────────────────────────────────────────

/// 256-entry substitution table.  Immutable once built.
#[derive(Clone, PartialEq, Eq)]
pub struct CipherTable([u8; 256]);

impl CipherTable {
    /// Build the table for `scheme` from an already-derived 56-bit key.
    pub fn build(scheme: CipherScheme, key: u64) -> Self {
        match scheme {
            CipherScheme::None  => Self::identity(),
            CipherScheme::Fixed => Self::fixed(),
            CipherScheme::Keyed => Self::keyed(key),
        }
    }

    pub fn identity() -> Self {
        let mut t = [0u8; 256];
        for (i, slot) in t.iter_mut().enumerate() {
            *slot = i as u8;
        }
        Self(t)
    }

    /// Scheme 1: `v = v * 13 + 11 (mod 256)` starting from 0, stepping once
    /// more whenever the value lands on 0x00 or 0xFF.
    pub fn fixed() -> Self {
        const MUL: u8 = 13;
        const ADD: u8 = 11;

        let mut t = [0u8; 256];
        t[0xFF] = 0xFF;
        let mut v: u8 = 0;
        for slot in t.iter_mut().take(0xFF).skip(1) {
            v = v.wrapping_mul(MUL).wrapping_add(ADD);
            if v == 0 || v == 0xFF {
                v = v.wrapping_mul(MUL).wrapping_add(ADD);
            }
            *slot = v;
        }
        Self(t)
    }

    /// Scheme 56.
    ///
    /// The key is decremented (when non-zero) and split into seven bytes.
    /// Key byte 0 drives the row nibbles; sixteen seed bytes mixed from key
    /// bytes 1..=6 drive the column nibbles of a 16x16 base grid.  The grid
    /// is then walked with stride 17 and every value other than 0x00/0xFF is
    /// placed into slots 1..=254 in order.
    ///
    /// If the walk meets fewer than 254 usable values the remaining slots
    /// stay zero.  That matches the reference format and is not corrected.
    pub fn keyed(key: u64) -> Self {
        let mut key = key & KEY_MASK;
        if key != 0 {
            key = (key - 1) & KEY_MASK;
        }
        let kc: [u8; 7] = {
            let b = key.to_le_bytes();
            [b[0], b[1], b[2], b[3], b[4], b[5], b[6]]
        };

        let seed: [u8; 16] = [
            kc[1],
            kc[1] ^ kc[6],
            kc[2] ^ kc[3],
            kc[2],
            kc[2] ^ kc[1],
            kc[3] ^ kc[4],
            kc[3],
            kc[3] ^ kc[2],
            kc[4] ^ kc[5],
            kc[4],
            kc[4] ^ kc[3],
            kc[5] ^ kc[6],
            kc[5],
            kc[5] ^ kc[4],
            kc[6] ^ kc[1],
            kc[6],
        ];

        let rows = nibble_sequence(kc[0]);
        let mut base = [0u8; 256];
        for (r, row) in base.chunks_exact_mut(16).enumerate() {
            let cols = nibble_sequence(seed[r]);
            let high = rows[r] << 4;
            for (cell, col) in row.iter_mut().zip(cols) {
                *cell = high | col;
            }
        }

        let mut t = [0u8; 256];
        t[0xFF] = 0xFF;
        let mut pos = 1usize;
        let mut x: u8 = 0;
        for _ in 0..256 {
            x = x.wrapping_add(17);
            let bx = base[x as usize];
            if bx != 0 && bx != 0xFF && pos < 0xFF {
                t[pos] = bx;
                pos += 1;
            }
        }
        if pos < 0xFF {
            debug!(filled = pos - 1, "keyed cipher table under-filled");
        }
        Self(t)
    }

    /// Plain value for a ciphered byte.
    #[inline]
    pub fn get(&self, byte: u8) -> u8 {
        self.0[byte as usize]
    }

    /// Substitute every byte of `buf` in place.
    #[inline]
    pub fn apply(&self, buf: &mut [u8]) {
        for b in buf.iter_mut() {
            *b = self.0[*b as usize];
        }
    }

    pub fn as_bytes(&self) -> &[u8; 256] {
        &self.0
    }

    pub fn is_identity(&self) -> bool {
        self.0.iter().enumerate().all(|(i, &v)| v as usize == i)
    }

    /// `true` when every byte value appears exactly once.
    pub fn is_permutation(&self) -> bool {
        let mut seen = [false; 256];
        for &v in &self.0 {
            if seen[v as usize] {
                return false;
            }
            seen[v as usize] = true;
        }
        true
    }
}

impl fmt::Debug for CipherTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CipherTable({})", hex::encode(self.0))
    }
}

/// Sixteen outputs of the 4-bit LCG seeded from `byte`.
fn nibble_sequence(byte: u8) -> [u8; 16] {
    let mul = ((byte & 1) << 3) | 5;
    let add = (byte & 0x0E) | 1;
    let mut state = (byte >> 4) & 0x0F;
    let mut out = [0u8; 16];
    for slot in out.iter_mut() {
        state = (state * mul + add) & 0x0F;
        *slot = state;
    }
    out
}

/// Resolve the table for a header's declared scheme id.
///
/// A keyed scheme with a zero key carries no secret and degrades to the
/// identity table.
pub fn build_for_header(scheme_id: u16, key: u64) -> Result<CipherTable, CipherError> {
    let mut scheme = CipherScheme::try_from(scheme_id)?;
    if scheme == CipherScheme::Keyed && key == 0 {
        scheme = CipherScheme::None;
    }
    debug!(scheme = %scheme, "building cipher table");
    Ok(CipherTable::build(scheme, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const KEYED_0X30D9E8: &str = "0003762f1b42bb6b598ef7a495ca34e00271261a4db2625889fea794c537e3dd\
        7021154cbd6d5b88f9ae97c436ead40d201c4fbc6c528bf8a99ec731e5d70473\
        1f46bf6f5d82fba899ce38e4d6077a2341b6665c8df2ab98c93be7d106752a1e\
        b1615f8cfda29bc83aeed8017425194060568ffcad92cb35e9db0877241043b0\
        5186ac9dc23ce8da0b7e27134ab36381f6af9ccd3febd50a792e1245ba6a50f1\
        a69fcc3ee2dc0578291d44b5655380a196cf39eddf0c7b281447b4645a83f091\
        c630ecde0f722b174eb767558af3a0c133efd90e7d221649be6e5485faa39032\
        e6d0097c2d1148b9695784f5aa93c0e1d37f2c184bb8685e87f4a59ac33dd2ff";

    #[test]
    fn identity_for_none() {
        assert!(CipherTable::build(CipherScheme::None, 1234).is_identity());
    }

    #[test]
    fn fixed_table_reference_values() {
        let t = CipherTable::fixed();
        assert_eq!(&t.as_bytes()[..8], &[0, 11, 154, 221, 68, 127, 126, 113]);
        assert_eq!(&t.as_bytes()[250..], &[117, 252, 215, 246, 137, 255]);
    }

    #[test]
    fn fixed_table_is_bijection_with_fixed_ends() {
        let t = CipherTable::fixed();
        assert_eq!(t.get(0x00), 0x00);
        assert_eq!(t.get(0xFF), 0xFF);
        assert!(t.is_permutation());
        assert_eq!(t, CipherTable::build(CipherScheme::Fixed, 99));
    }

    #[test]
    fn keyed_table_reference_vector() {
        let t = CipherTable::keyed(0x30D9E8);
        assert_eq!(hex::encode(t.as_bytes()), KEYED_0X30D9E8);
        assert!(t.is_permutation());
    }

    #[test]
    fn keyed_table_for_key_one_starts_like_reference() {
        let t = CipherTable::keyed(1);
        assert_eq!(&t.as_bytes()[..8], &[0, 102, 204, 221, 34, 187, 136, 153]);
    }

    #[test]
    fn keyed_zero_key_degrades_to_identity() {
        assert!(build_for_header(56, 0).unwrap().is_identity());
        assert!(!build_for_header(56, 1).unwrap().is_identity());
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        assert_eq!(build_for_header(2, 1), Err(CipherError::UnsupportedScheme(2)));
    }

    #[test]
    fn scheme_names_round_trip() {
        for s in [CipherScheme::None, CipherScheme::Fixed, CipherScheme::Keyed] {
            assert_eq!(CipherScheme::from_name(s.name()), Some(s));
            assert_eq!(CipherScheme::from_name(&s.id().to_string()), Some(s));
        }
        assert_eq!(CipherScheme::from_name("aes"), None);
    }

    #[test]
    fn apply_substitutes_in_place() {
        let t = CipherTable::fixed();
        let mut buf = [0u8, 1, 2, 0xFF];
        t.apply(&mut buf);
        assert_eq!(buf, [0, 11, 154, 0xFF]);
    }

    proptest! {
        #[test]
        fn keyed_table_keeps_sentinels(key in 1u64..(1u64 << 56)) {
            let t = CipherTable::keyed(key);
            prop_assert_eq!(t.get(0x00), 0x00);
            prop_assert_eq!(t.get(0xFF), 0xFF);
        }

        #[test]
        fn distinct_keys_give_distinct_tables(a in 1u64..(1u64 << 56), b in 1u64..(1u64 << 56)) {
            prop_assume!(a != b);
            prop_assert_ne!(CipherTable::keyed(a), CipherTable::keyed(b));
        }
    }
}
