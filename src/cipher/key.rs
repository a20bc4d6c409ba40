//! Keycode handling: 56-bit reduction, subkey mixing and CLI parsing.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Only the low 56 bits of a keycode take part in table construction.
pub const KEY_MASK: u64 = (1u64 << 56) - 1;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum KeyParseError {
    #[error("Empty key")]
    Empty,
    #[error("Invalid key '{0}': expected decimal or 0x-prefixed hex")]
    Invalid(String),
}

/// Effective 56-bit keycode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KeyCode(u64);

impl KeyCode {
    /// Reduce a raw key to its low 56 bits.
    pub fn new(raw: u64) -> Self {
        KeyCode(raw & KEY_MASK)
    }

    /// Mix in a subkey:
    /// `key * ((sub << 16) | ((!sub + 2) & 0xFFFF)) mod 2^56`,
    /// where `sub` is the low 16 bits of `subkey`.
    pub fn with_subkey(self, subkey: u64) -> Self {
        let sub = subkey as u16;
        let factor = ((sub as u64) << 16) | (!sub).wrapping_add(2) as u64;
        KeyCode(self.0.wrapping_mul(factor) & KEY_MASK)
    }

    /// Key with an optional subkey applied.
    pub fn derive(raw: u64, subkey: Option<u64>) -> Self {
        let key = KeyCode::new(raw);
        match subkey {
            Some(s) => key.with_subkey(s),
            None    => key,
        }
    }

    #[inline]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#016x}", self.0)
    }
}

impl FromStr for KeyCode {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_u64(s).map(KeyCode::new)
    }
}

/// Parse a decimal or `0x`-prefixed hexadecimal integer.  Underscores are
/// accepted as digit separators.
pub fn parse_u64(s: &str) -> Result<u64, KeyParseError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(KeyParseError::Empty);
    }
    let digits: String = trimmed.chars().filter(|&c| c != '_').collect();
    let lower = digits.to_ascii_lowercase();
    let parsed = match lower.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None      => lower.parse::<u64>(),
    };
    parsed.map_err(|_| KeyParseError::Invalid(trimmed.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduces_to_56_bits() {
        assert_eq!(KeyCode::new(u64::MAX).value(), KEY_MASK);
    }

    #[test]
    fn subkey_hand_vector() {
        // factor = 0x5F3F_0000 | ((!0x5F3F + 2) & 0xFFFF) = 0x5F3F_A0C2
        let k = KeyCode::new(0x30D9E8).with_subkey(0x5F3F);
        assert_eq!(k.value(), 0x0012_2D01_654E_21D0);
        assert_eq!(k.value(), (0x30D9E8u64 * 0x5F3F_A0C2) & KEY_MASK);
    }

    #[test]
    fn subkey_edge_values() {
        let k = KeyCode::new(0x30D9E8);
        assert_eq!(k.with_subkey(0).value(), 0x30D9E8);
        assert_eq!(k.with_subkey(1).value(), 0x30_D9E8_0000);
        assert_eq!(k.with_subkey(0xFFFF).value(), 0x0030_D9B7_2679_B3D0);
    }

    #[test]
    fn subkey_uses_low_16_bits_only() {
        let k = KeyCode::new(0x1234_5678);
        assert_eq!(k.with_subkey(0x1_5F3F), k.with_subkey(0x5F3F));
    }

    #[test]
    fn derive_without_subkey_is_plain_reduction() {
        assert_eq!(KeyCode::derive(0xFF00_0000_0000_0001, None).value(), 1);
    }

    #[test]
    fn parses_hex_and_decimal() {
        assert_eq!("0x30D9E8".parse::<KeyCode>().unwrap().value(), 0x30D9E8);
        assert_eq!("3201512".parse::<KeyCode>().unwrap().value(), 3_201_512);
        assert_eq!(parse_u64(" 0X5f3f ").unwrap(), 0x5F3F);
        assert_eq!(parse_u64("1_000").unwrap(), 1000);
        assert_eq!(parse_u64(""), Err(KeyParseError::Empty));
        assert!(matches!(parse_u64("0xzz"), Err(KeyParseError::Invalid(_))));
    }
}
