//! 16-bit HCA checksum: polynomial 0x8005, MSB-first, init 0, no reflection,
//! no final XOR (the CRC-16/UMTS parameter set).
//!
//! The same function validates and generates.  A region that carries its own
//! big-endian checksum in the last two bytes checksums to zero.

/// Generator polynomial.
pub const POLYNOMIAL: u16 = 0x8005;

/// Byte-at-a-time lookup table for [`POLYNOMIAL`], built at compile time.
pub static CRC_TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut value = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            value = if value & 0x8000 != 0 {
                (value << 1) ^ POLYNOMIAL
            } else {
                value << 1
            };
            bit += 1;
        }
        table[i] = value;
        i += 1;
    }
    table
}

/// Checksum `data` left to right starting from state 0.
#[inline]
pub fn checksum(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |state, &byte| {
        (state << 8) ^ CRC_TABLE[((state >> 8) as u8 ^ byte) as usize]
    })
}

/// `true` when `data` ends in a checksum that covers everything before it.
#[inline]
pub fn is_valid(data: &[u8]) -> bool {
    checksum(data) == 0
}

/// Big-endian checksum bytes to append after `prefix`.
#[inline]
pub fn checksum_tail(prefix: &[u8]) -> [u8; 2] {
    checksum(prefix).to_be_bytes()
}

/// Overwrite the last two bytes of `buf` with the checksum of the rest.
/// Buffers shorter than two bytes are left untouched.
pub fn stamp(buf: &mut [u8]) {
    if buf.len() < 2 {
        return;
    }
    let split = buf.len() - 2;
    let tail = checksum_tail(&buf[..split]);
    buf[split..].copy_from_slice(&tail);
}
