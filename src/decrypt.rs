//! End-to-end rewrite of a ciphered HCA file into a plain one.
//!
//! ```no_run
//! use hcadecrypt::decrypt::{decrypt, decrypt_file, DecryptOptions};
//!
//! let raw = std::fs::read("voice.hca")?;
//! let plain = decrypt(&raw, 0x30D9E8, Some(0x5F3F))?;
//!
//! let opts = DecryptOptions { key: 0x30D9E8, subkey: Some(0x5F3F), verify_frames: true };
//! decrypt_file("voice.hca", "voice.plain.hca", &opts)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! The whole file is held in memory; there is no streaming path.

use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::checksum::checksum;
use crate::cipher::{build_for_header, CipherError, KeyCode};
use crate::frame::{transform_frames, FrameHealth};
use crate::header::{HcaHeader, HeaderError};

#[derive(Error, Debug)]
pub enum DecryptError {
    #[error("Malformed HCA header: {0}")]
    Header(#[from] HeaderError),
    #[error("Cipher error: {0}")]
    Cipher(#[from] CipherError),
    /// The rebuilt header failed its own checksum.  Never caused by input.
    #[error("Internal error: rebuilt header checksum residue {0:#06x}")]
    SelfCheck(u16),
    #[error("Rewritten frame {index} failed verification: {health:?}")]
    FrameCheck { index: usize, health: FrameHealth },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl DecryptError {
    /// `true` for failures that indicate a defect in this crate rather than
    /// bad input.
    pub fn is_internal(&self) -> bool {
        matches!(self, DecryptError::SelfCheck(_) | DecryptError::FrameCheck { .. })
    }
}

// ── Options ──────────────────────────────────────────────────────────────────

/// Configuration for [`decrypt_with`] and [`decrypt_file`].
#[derive(Debug, Clone, Default)]
pub struct DecryptOptions {
    /// Raw keycode; only the low 56 bits are used.
    pub key:           u64,
    /// Optional subkey mixed into the keycode.
    pub subkey:        Option<u64>,
    /// Re-check the checksum of every rewritten frame after the transform.
    pub verify_frames: bool,
}

impl DecryptOptions {
    pub fn new(key: u64, subkey: Option<u64>) -> Self {
        Self { key, subkey, verify_frames: false }
    }
}

// ── Entry points ─────────────────────────────────────────────────────────────

/// Rewrite `raw` as a plain (cipher 0) HCA file.
pub fn decrypt(raw: &[u8], key: u64, subkey: Option<u64>) -> Result<Vec<u8>, DecryptError> {
    decrypt_with(raw, &DecryptOptions::new(key, subkey))
}

pub fn decrypt_with(raw: &[u8], opts: &DecryptOptions) -> Result<Vec<u8>, DecryptError> {
    let header = HcaHeader::parse(raw)?;

    let key = KeyCode::derive(opts.key, opts.subkey);
    debug!(key = %key, subkey = opts.subkey.is_some(), "derived effective key");

    // A zero key (raw, or zeroed by the subkey) degrades keyed to none.
    let table = build_for_header(header.cipher_scheme_id(), key.value())?;

    let mut out = header.to_plain_bytes();
    let header_len = out.len();

    let frame_size = header.geometry.frame_size as usize;
    let written = transform_frames(
        raw,
        header.data_offset(),
        frame_size,
        header.frame_count,
        &table,
        &mut out,
    );

    self_check(&out)?;

    if opts.verify_frames && frame_size > 0 {
        // Checksums only.  The sync word is carried over from the input.
        for (index, frame) in out[header_len..].chunks_exact(frame_size).enumerate() {
            let residue = checksum(frame);
            if residue != 0 {
                let health = FrameHealth::ChecksumMismatch(residue);
                return Err(DecryptError::FrameCheck { index, health });
            }
        }
    }

    info!(
        cipher       = header.cipher_scheme_id(),
        frames       = written,
        declared     = header.frame_count,
        header_bytes = header_len,
        output_bytes = out.len(),
        "decrypted HCA"
    );
    Ok(out)
}

/// Read `input`, decrypt it, and write the result to `output`.
/// Returns the number of bytes written.
pub fn decrypt_file<P, Q>(input: P, output: Q, opts: &DecryptOptions) -> Result<usize, DecryptError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let raw = std::fs::read(input.as_ref())?;
    let out = decrypt_with(&raw, opts)?;
    std::fs::write(output.as_ref(), &out)?;
    Ok(out.len())
}

/// Re-read the header size from the output and require a zero checksum over
/// that many leading bytes.
fn self_check(out: &[u8]) -> Result<(), DecryptError> {
    let declared = match out.get(6..8) {
        Some(b) => u16::from_be_bytes([b[0], b[1]]) as usize,
        None    => 0,
    };
    let residue = checksum(&out[..declared.min(out.len())]);
    if residue != 0 {
        return Err(DecryptError::SelfCheck(residue));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_check_accepts_empty_and_valid() {
        assert!(self_check(&[]).is_ok());
        let mut h = b"HCA\0\x02\x00\x00\x0a".to_vec();
        let tail = crate::checksum::checksum_tail(&h);
        h.extend_from_slice(&tail);
        assert!(self_check(&h).is_ok());
    }

    #[test]
    fn self_check_rejects_bad_residue() {
        let h = b"HCA\0\x02\x00\x00\x0a\x00\x00".to_vec();
        let err = self_check(&h).unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn input_errors_are_not_internal() {
        let err = decrypt(b"RIFF\0\0\0\0", 1, None).unwrap_err();
        assert!(matches!(err, DecryptError::Header(HeaderError::BadSignature(_))));
        assert!(!err.is_internal());
    }
}
