//! Checksum and signature stamping

mod common;

use common::{read_u32, sample_file};
use dexfile::*;

#[test]
fn test_stamped_fields_match_content() {
    let bytes = sample_file().to_bytes().unwrap();
    integrity::verify(&bytes).unwrap();

    assert_eq!(
        read_u32(&bytes, 8),
        integrity::compute_checksum(&bytes).unwrap()
    );
    assert_eq!(
        bytes[12..32],
        integrity::compute_signature(&bytes).unwrap()
    );
}

#[test]
fn test_stamping_order_matters() {
    let mut bytes = sample_file().to_bytes().unwrap();
    bytes[8..32].fill(0);

    let mut signature_first = bytes.clone();
    calc_signature(&mut signature_first).unwrap();
    calc_checksum(&mut signature_first).unwrap();

    let mut checksum_first = bytes.clone();
    calc_checksum(&mut checksum_first).unwrap();
    calc_signature(&mut checksum_first).unwrap();

    assert_eq!(signature_first[12..32], checksum_first[12..32]);
    assert_ne!(read_u32(&signature_first, 8), read_u32(&checksum_first, 8));
    integrity::verify(&signature_first).unwrap();
    assert!(matches!(
        integrity::verify(&checksum_first),
        Err(DexError::ChecksumMismatch { .. })
    ));
}

#[test]
fn test_signature_damage_detected() {
    let mut bytes = sample_file().to_bytes().unwrap();
    bytes[20] ^= 0x01;
    // the checksum covers the signature too
    assert!(matches!(
        integrity::verify(&bytes),
        Err(DexError::ChecksumMismatch { .. })
    ));

    calc_checksum(&mut bytes).unwrap();
    assert!(matches!(
        integrity::verify(&bytes),
        Err(DexError::SignatureMismatch)
    ));
}

#[test]
fn test_short_buffer_rejected() {
    let mut bytes = [0u8; 16];
    assert!(calc_signature(&mut bytes).is_err());
    assert!(calc_checksum(&mut bytes[..8]).is_err());
}
