//! Integrity check words: FPROM-indexed values interleaved with cipher
//! output to let a decryptor detect corruption - or a mismatched FPROM
//! table - without a separate MAC.

use crate::crypto::cipher::ChainedCipher;
use crate::error::Error;
use crate::fprom::Fprom;

const INTEGRITY_INDEX_MASK: u32 = 0xFF;

/// Outcome of verifying one integrity check word during decryption.
///
/// Only [`IcvOutcome::Mismatch`] is fatal; an unknown FPROM index most
/// likely means a gap in *this crate's* table rather than corruption, so
/// it is reported and decoding continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IcvOutcome {
    /// The decrypted word matched the expected FPROM constant.
    Ok,
    /// The FPROM index this word depends on is absent from the table.
    /// Carries the index and the (unverifiable) decrypted value.
    UnknownFprom { index: u32, value: u32 },
    /// The decrypted word did not match the expected FPROM constant.
    Mismatch { index: u32, got: u32, expected: u32 },
}

/// Generate and encrypt an integrity check word from the cipher's current
/// state.
///
/// Returns [`Error::MissingFprom`] if the FPROM entry this word would
/// depend on is absent - the caller is expected to treat this as a
/// seed-search trigger during encryption.
pub(crate) fn encrypt_icv(cipher: &mut ChainedCipher, fprom: &Fprom) -> Result<u32, Error> {
    let idx = cipher.state() & INTEGRITY_INDEX_MASK;
    let value = fprom.get(idx).ok_or(Error::MissingFprom(idx))?;
    Ok(cipher.encrypt(value))
}

/// Decrypt and verify an integrity check word against the cipher's
/// current state.
///
/// The index is sampled from the cipher state *before* decrypting
/// `ct_icv`, i.e. using the state as it stands after the preceding data
/// words were processed - sampling it afterward would silently consult
/// the wrong FPROM entry.
pub(crate) fn decrypt_icv(cipher: &mut ChainedCipher, fprom: &Fprom, ct_icv: u32) -> IcvOutcome {
    let idx = cipher.state() & INTEGRITY_INDEX_MASK;
    let pt = cipher.decrypt(ct_icv);

    match fprom.get(idx) {
        None => IcvOutcome::UnknownFprom { index: idx, value: pt },
        Some(expected) if expected != pt => IcvOutcome::Mismatch {
            index: idx,
            got: pt,
            expected,
        },
        Some(_) => IcvOutcome::Ok,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_then_decrypt_icv_round_trips() {
        let fprom = Fprom::from_entries(&[(0x42, 0xAABB_CCDD)]);
        let mut enc = ChainedCipher::new(0x1234, 0x42);
        let ct = encrypt_icv(&mut enc, &fprom).unwrap();

        let mut dec = ChainedCipher::new(0x1234, 0x42);
        assert_eq!(decrypt_icv(&mut dec, &fprom, ct), IcvOutcome::Ok);
    }

    #[test]
    fn missing_fprom_blocks_encryption() {
        let fprom = Fprom::empty();
        let mut cipher = ChainedCipher::new(0x1234, 0x42);
        assert!(matches!(
            encrypt_icv(&mut cipher, &fprom),
            Err(Error::MissingFprom(0x42))
        ));
    }

    #[test]
    fn unknown_fprom_on_decrypt_is_nonfatal() {
        let encoder_fprom = Fprom::from_entries(&[(0x42, 0x1122_3344)]);
        let mut enc = ChainedCipher::new(0x1234, 0x42);
        let ct = encrypt_icv(&mut enc, &encoder_fprom).unwrap();

        let decoder_fprom = Fprom::empty();
        let mut dec = ChainedCipher::new(0x1234, 0x42);
        match decrypt_icv(&mut dec, &decoder_fprom, ct) {
            IcvOutcome::UnknownFprom { index, value } => {
                assert_eq!(index, 0x42);
                assert_eq!(value, 0x1122_3344);
            }
            other => panic!("expected UnknownFprom, got {other:?}"),
        }
    }

    #[test]
    fn bit_flip_is_a_fatal_mismatch() {
        let fprom = Fprom::from_entries(&[(0x42, 0x1122_3344)]);
        let mut enc = ChainedCipher::new(0x1234, 0x42);
        let ct = encrypt_icv(&mut enc, &fprom).unwrap();

        let mut dec = ChainedCipher::new(0x1234, 0x42);
        match decrypt_icv(&mut dec, &fprom, ct ^ 1) {
            IcvOutcome::Mismatch { .. } => {}
            other => panic!("expected Mismatch, got {other:?}"),
        }
    }
}
