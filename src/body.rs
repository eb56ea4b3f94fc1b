//! The patch body codec.
//!
//! Orchestrates the chained cipher and the integrity wrapper over the
//! fixed body layout, walking MSRAM words and control-register operations
//! in the one processing order that both encode and decode must agree on.
//! Encryption additionally implements seed-search: since the shipped
//! FPROM table may be incomplete, the encoder retries with successive
//! seeds until it finds one whose key derivation and every integrity word
//! land on present entries.

use crate::crypto::cipher::ChainedCipher;
use crate::derive::derive;
use crate::error::Error;
use crate::file::{EncryptedBody, EncryptedCrOp, CR_OP_COUNT, MSRAM_DWORD_COUNT};
use crate::fprom::Fprom;
use crate::icv::{decrypt_icv, encrypt_icv, IcvOutcome};

/// The bounded retry budget for seed-search (the reference implementation
/// loops unboundedly).
pub const SEED_SEARCH_BUDGET: u32 = 1 << 20;

/// One control-register operation in plaintext form: `{address, mask,
/// value}`, with no integrity word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrOp {
    pub address: u32,
    pub mask: u32,
    pub value: u32,
}

/// The decrypted contents of a patch body: 168 MSRAM words and 16
/// control-register operations, with neither key seed nor integrity
/// words.
#[derive(Debug, Clone)]
pub struct PlaintextBody {
    pub msram: [u32; MSRAM_DWORD_COUNT],
    pub cr_ops: [CrOp; CR_OP_COUNT],
}

impl Default for PlaintextBody {
    fn default() -> Self {
        Self {
            msram: [0; MSRAM_DWORD_COUNT],
            cr_ops: [CrOp::default(); CR_OP_COUNT],
        }
    }
}

/// Decrypt an encrypted patch body for `proc_sig`.
///
/// Key derivation failing with [`Error::MissingFprom`] aborts the whole
/// decode - there is no way to proceed without the key. A `Mismatch`
/// integrity outcome is fatal ([`Error::IntegrityMismatch`]); an
/// `UnknownFprom` outcome is reported back through `diagnostics` and
/// decoding continues.
pub fn decrypt_patch_body(
    fprom: &Fprom,
    proc_sig: u32,
    encrypted: &EncryptedBody,
    diagnostics: &mut dyn FnMut(u32, u32),
) -> Result<PlaintextBody, Error> {
    let (iv, key) = derive(fprom, proc_sig, encrypted.key_seed)?;
    let mut cipher = ChainedCipher::new(key, iv);
    let mut out = PlaintextBody::default();

    for (i, &word) in encrypted.msram.iter().enumerate() {
        out.msram[i] = cipher.decrypt(word);
    }

    report_icv(
        decrypt_icv(&mut cipher, fprom, encrypted.msram_integrity),
        diagnostics,
    )?;

    for (i, op) in encrypted.cr_ops.iter().enumerate() {
        out.cr_ops[i] = CrOp {
            address: cipher.decrypt(op.address),
            mask: cipher.decrypt(op.mask),
            value: cipher.decrypt(op.value),
        };
        report_icv(decrypt_icv(&mut cipher, fprom, op.integrity), diagnostics)?;
    }

    Ok(out)
}

fn report_icv(outcome: IcvOutcome, diagnostics: &mut dyn FnMut(u32, u32)) -> Result<(), Error> {
    match outcome {
        IcvOutcome::Ok => Ok(()),
        IcvOutcome::UnknownFprom { index, value } => {
            log::warn!("FPROM[0x{index:02X}] absent from table, skipping integrity check");
            diagnostics(index, value);
            Ok(())
        }
        IcvOutcome::Mismatch {
            index,
            got,
            expected,
        } => {
            log::error!(
                "integrity check failed at FPROM[0x{index:02X}]: got 0x{got:08X} expected 0x{expected:08X}"
            );
            Err(Error::IntegrityMismatch {
                index,
                got,
                expected,
            })
        }
    }
}

/// Encrypt `plain` for `proc_sig`, starting the seed search at
/// `initial_seed`.
///
/// Tries successive seeds (wrapping on overflow) until one is found for
/// which key derivation and all 17 integrity words reference FPROM
/// entries the table actually has, up to [`SEED_SEARCH_BUDGET`] attempts.
/// An [`Error::UnknownCpu`] is never retried - it is fatal immediately.
pub fn encrypt_patch_body(
    fprom: &Fprom,
    proc_sig: u32,
    initial_seed: u32,
    plain: &PlaintextBody,
) -> Result<EncryptedBody, Error> {
    let mut seed = initial_seed;
    for _attempt in 0..SEED_SEARCH_BUDGET {
        match try_encrypt_patch_body(fprom, proc_sig, seed, plain) {
            Ok(body) => return Ok(body),
            Err(Error::MissingFprom(idx)) => {
                log::debug!("seed 0x{seed:08X} needs missing FPROM[0x{idx:02X}], retrying");
                seed = seed.wrapping_add(1);
            }
            Err(e) => return Err(e),
        }
    }
    Err(Error::SeedSearchExhausted {
        attempts: SEED_SEARCH_BUDGET,
    })
}

/// Attempt to encrypt `plain` with exactly `seed`, without retrying.
///
/// Short-circuits on the first [`Error::MissingFprom`], leaving the
/// output unspecified (the caller is expected to discard it and retry
/// with a new seed).
fn try_encrypt_patch_body(
    fprom: &Fprom,
    proc_sig: u32,
    seed: u32,
    plain: &PlaintextBody,
) -> Result<EncryptedBody, Error> {
    let (iv, key) = derive(fprom, proc_sig, seed)?;
    let mut cipher = ChainedCipher::new(key, iv);

    let mut msram = [0u32; MSRAM_DWORD_COUNT];
    for (i, &word) in plain.msram.iter().enumerate() {
        msram[i] = cipher.encrypt(word);
    }

    let msram_integrity = encrypt_icv(&mut cipher, fprom)?;

    let mut cr_ops = [EncryptedCrOp {
        address: 0,
        mask: 0,
        value: 0,
        integrity: 0,
    }; CR_OP_COUNT];
    for (i, op) in plain.cr_ops.iter().enumerate() {
        cr_ops[i] = EncryptedCrOp {
            address: cipher.encrypt(op.address),
            mask: cipher.encrypt(op.mask),
            value: cipher.encrypt(op.value),
            integrity: encrypt_icv(&mut cipher, fprom)?,
        };
    }

    Ok(EncryptedBody {
        key_seed: seed,
        msram,
        msram_integrity,
        cr_ops,
    })
}
