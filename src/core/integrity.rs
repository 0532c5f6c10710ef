//! Header integrity fields
//!
//! Both functions operate on a completed file image, after `write_to`.
//! The checksum covers the signature bytes, so the signature must be stamped
//! first; [`finalize`] does both in that order.

use crate::core::error::{DexError, Result};
use crate::core::header::{CHECKSUM_RANGE, SIGNATURE_RANGE};
use sha1::{Digest, Sha1};
use tracing::debug;

fn ensure_len(bytes: &[u8], needed: usize) -> Result<()> {
    if bytes.len() < needed {
        return Err(DexError::BufferTooSmall { len: bytes.len() });
    }
    Ok(())
}

/// SHA-1 over everything after the signature field
pub fn compute_signature(bytes: &[u8]) -> Result<[u8; 20]> {
    ensure_len(bytes, SIGNATURE_RANGE.end)?;
    Ok(Sha1::digest(&bytes[SIGNATURE_RANGE.end..]).into())
}

/// Adler-32 over everything after the checksum field
pub fn compute_checksum(bytes: &[u8]) -> Result<u32> {
    ensure_len(bytes, CHECKSUM_RANGE.end)?;
    Ok(adler::adler32_slice(&bytes[CHECKSUM_RANGE.end..]))
}

/// Compute the signature and store it at bytes 12..32
pub fn calc_signature(bytes: &mut [u8]) -> Result<()> {
    let signature = compute_signature(bytes)?;
    bytes[SIGNATURE_RANGE].copy_from_slice(&signature);
    Ok(())
}

/// Compute the checksum and store it little-endian at bytes 8..12
pub fn calc_checksum(bytes: &mut [u8]) -> Result<()> {
    let checksum = compute_checksum(bytes)?;
    bytes[CHECKSUM_RANGE].copy_from_slice(&checksum.to_le_bytes());
    Ok(())
}

/// Stamp signature, then checksum
pub fn finalize(bytes: &mut [u8]) -> Result<()> {
    calc_signature(bytes)?;
    calc_checksum(bytes)?;
    debug!(
        "Stamped integrity fields over {} bytes (checksum {:#010x})",
        bytes.len(),
        stored_checksum(bytes)
    );
    Ok(())
}

fn stored_checksum(bytes: &[u8]) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[CHECKSUM_RANGE]);
    u32::from_le_bytes(raw)
}

/// Check both stored integrity fields against the content
pub fn verify(bytes: &[u8]) -> Result<()> {
    let computed = compute_checksum(bytes)?;
    let stored = stored_checksum(bytes);
    if computed != stored {
        return Err(DexError::ChecksumMismatch { stored, computed });
    }
    if compute_signature(bytes)?.as_slice() != &bytes[SIGNATURE_RANGE] {
        return Err(DexError::SignatureMismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_known_value() {
        let mut bytes = vec![0u8; 12];
        bytes.extend_from_slice(b"Wikipedia");
        assert_eq!(compute_checksum(&bytes).unwrap(), 0x11E6_0398);

        calc_checksum(&mut bytes).unwrap();
        assert_eq!(&bytes[8..12], &0x11E6_0398u32.to_le_bytes());
    }

    #[test]
    fn test_signature_known_value() {
        let mut bytes = vec![0u8; 32];
        bytes.extend_from_slice(b"abc");
        calc_signature(&mut bytes).unwrap();
        let expected = [
            0xa9, 0x99, 0x3e, 0x36, 0x47, 0x06, 0x81, 0x6a, 0xba, 0x3e, 0x25, 0x71, 0x78, 0x50,
            0xc2, 0x6c, 0x9c, 0xd0, 0xd8, 0x9d,
        ];
        assert_eq!(&bytes[12..32], &expected);
    }

    #[test]
    fn test_finalize_then_verify() {
        let mut bytes = vec![0u8; 0x70];
        bytes[40] = 7;
        finalize(&mut bytes).unwrap();
        assert!(verify(&bytes).is_ok());

        bytes[50] ^= 0xff;
        assert!(matches!(
            verify(&bytes),
            Err(DexError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_verify_detects_signature_only_damage() {
        let mut bytes = vec![0u8; 0x70];
        finalize(&mut bytes).unwrap();
        bytes[12] ^= 0x01;
        calc_checksum(&mut bytes).unwrap();
        assert!(matches!(verify(&bytes), Err(DexError::SignatureMismatch)));
    }

    #[test]
    fn test_short_buffer() {
        let mut bytes = vec![0u8; 20];
        assert!(matches!(
            calc_signature(&mut bytes),
            Err(DexError::BufferTooSmall { len: 20 })
        ));
        assert!(calc_checksum(&mut bytes).is_ok());
    }
}
