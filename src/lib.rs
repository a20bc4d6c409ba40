//! Rewrite ciphered CRI HCA audio files as plain HCA (cipher 0).
//!
//! The header is parsed and rebuilt with a fresh checksum, and every frame
//! is passed through the cipher's substitution table and re-stamped.  No
//! audio is decoded.

pub mod checksum;
pub mod chunk;
pub mod cipher;
pub mod decrypt;
pub mod frame;
pub mod geometry;
pub mod header;

pub use cipher::{CipherScheme, CipherTable, KeyCode};
pub use decrypt::{decrypt, decrypt_file, decrypt_with, DecryptError, DecryptOptions};
pub use header::{HcaHeader, HeaderError};
