//! Patch file binary layout.
//!
//! ```text
//! [0x0000] PatchHeader        (48 bytes, copied verbatim through encode/decode)
//! [0x0030] EncryptedBody      (2000 bytes, the only part ever transformed)
//! ```
//!
//! Total file size is fixed at 2048 bytes; [`PatchFile::parse`] rejects
//! any other size outright rather than guessing at a truncated or
//! over-long layout.

use std::io::{Read, Write};

use crate::body::{decrypt_patch_body, encrypt_patch_body, PlaintextBody};
use crate::error::Error;
use crate::fprom::Fprom;
use crate::utils::{bytesa, le_u32, write_le_u32};

pub const HEADER_SIZE: usize = 48;
pub const BODY_SIZE: usize = 2000;
pub const FILE_SIZE: usize = HEADER_SIZE + BODY_SIZE;

pub const MSRAM_DWORD_COUNT: usize = 168;
pub const CR_OP_COUNT: usize = 16;

/// MSRAM addressing geometry, used by the plaintext MSRAM hex format: the
/// first legal line address is `MSRAM_BASE_ADDRESS * MSRAM_GROUP_SIZE`.
pub const MSRAM_BASE_ADDRESS: u32 = 0xFEB;
pub const MSRAM_GROUP_SIZE: usize = 8;
pub const MSRAM_GROUP_COUNT: usize = MSRAM_DWORD_COUNT / MSRAM_GROUP_SIZE;

// Declared fields account for 944 bytes; the remaining 1056 bytes of the
// 2000-byte body are reserved padding.
const BODY_HEAD_SIZE: usize =
    4 + 4 + MSRAM_DWORD_COUNT * 4 + 4 + 4 + CR_OP_COUNT * 16;
const BODY_TAIL_SIZE: usize = BODY_SIZE - BODY_HEAD_SIZE;

/// The 48-byte patch header. Carried through encode/decode verbatim;
/// `checksum` is neither computed nor verified by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PatchHeader {
    pub header_ver: u32,
    pub update_rev: u32,
    pub date_bcd: u32,
    pub proc_sig: u32,
    pub checksum: u32,
    pub loader_ver: u32,
    pub proc_flags: u32,
    pub data_size: u32,
    pub total_size: u32,
}

impl PatchHeader {
    pub(crate) fn read<R: Read>(r: &mut R) -> Result<Self, Error> {
        let header_ver = le_u32(r)?;
        let update_rev = le_u32(r)?;
        let date_bcd = le_u32(r)?;
        let proc_sig = le_u32(r)?;
        let checksum = le_u32(r)?;
        let loader_ver = le_u32(r)?;
        let proc_flags = le_u32(r)?;
        let data_size = le_u32(r)?;
        let total_size = le_u32(r)?;
        let _reserved: [u8; 12] = bytesa(r)?;

        Ok(Self {
            header_ver,
            update_rev,
            date_bcd,
            proc_sig,
            checksum,
            loader_ver,
            proc_flags,
            data_size,
            total_size,
        })
    }

    pub(crate) fn write<W: Write>(&self, w: &mut W) -> Result<(), Error> {
        write_le_u32(w, self.header_ver)?;
        write_le_u32(w, self.update_rev)?;
        write_le_u32(w, self.date_bcd)?;
        write_le_u32(w, self.proc_sig)?;
        write_le_u32(w, self.checksum)?;
        write_le_u32(w, self.loader_ver)?;
        write_le_u32(w, self.proc_flags)?;
        write_le_u32(w, self.data_size)?;
        write_le_u32(w, self.total_size)?;
        w.write_all(&[0u8; 12])?;
        Ok(())
    }
}

/// One control-register operation as it appears in the encrypted body:
/// `{address, mask, value, integrity}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EncryptedCrOp {
    pub address: u32,
    pub mask: u32,
    pub value: u32,
    pub integrity: u32,
}

/// The encrypted patch body - key seed, 168 MSRAM words, their integrity
/// word, and 16 control-register operations each with their own
/// integrity word.
#[derive(Debug, Clone)]
pub(crate) struct EncryptedBody {
    pub key_seed: u32,
    pub msram: [u32; MSRAM_DWORD_COUNT],
    pub msram_integrity: u32,
    pub cr_ops: [EncryptedCrOp; CR_OP_COUNT],
}

impl EncryptedBody {
    pub(crate) fn read<R: Read>(r: &mut R) -> Result<Self, Error> {
        let key_seed = le_u32(r)?;
        let _reserved0 = le_u32(r)?;

        let mut msram = [0u32; MSRAM_DWORD_COUNT];
        for word in msram.iter_mut() {
            *word = le_u32(r)?;
        }

        let msram_integrity = le_u32(r)?;
        let _reserved1 = le_u32(r)?;

        let mut cr_ops = [EncryptedCrOp {
            address: 0,
            mask: 0,
            value: 0,
            integrity: 0,
        }; CR_OP_COUNT];
        for op in cr_ops.iter_mut() {
            op.address = le_u32(r)?;
            op.mask = le_u32(r)?;
            op.value = le_u32(r)?;
            op.integrity = le_u32(r)?;
        }

        let _tail: Vec<u8> = {
            let mut buf = vec![0u8; BODY_TAIL_SIZE];
            r.read_exact(&mut buf)?;
            buf
        };

        Ok(Self {
            key_seed,
            msram,
            msram_integrity,
            cr_ops,
        })
    }

    pub(crate) fn write<W: Write>(&self, w: &mut W) -> Result<(), Error> {
        write_le_u32(w, self.key_seed)?;
        write_le_u32(w, 0)?;

        for &word in &self.msram {
            write_le_u32(w, word)?;
        }

        write_le_u32(w, self.msram_integrity)?;
        write_le_u32(w, 0)?;

        for op in &self.cr_ops {
            write_le_u32(w, op.address)?;
            write_le_u32(w, op.mask)?;
            write_le_u32(w, op.value)?;
            write_le_u32(w, op.integrity)?;
        }

        w.write_all(&vec![0u8; BODY_TAIL_SIZE])?;
        Ok(())
    }
}

/// A complete 2048-byte patch file: header plus encrypted body.
#[derive(Debug, Clone)]
pub struct PatchFile {
    pub header: PatchHeader,
    pub(crate) body: EncryptedBody,
}

impl PatchFile {
    /// Parse a patch file from raw bytes.
    ///
    /// Returns [`Error::MalformedFile`] if `data` is not exactly
    /// [`FILE_SIZE`] bytes.
    pub fn parse(data: &[u8]) -> Result<Self, Error> {
        if data.len() != FILE_SIZE {
            return Err(Error::MalformedFile("patch file must be exactly 2048 bytes"));
        }
        let mut cursor = data;
        let header = PatchHeader::read(&mut cursor)?;
        let body = EncryptedBody::read(&mut cursor)?;
        Ok(Self { header, body })
    }

    /// Serialize this patch file to exactly [`FILE_SIZE`] bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(FILE_SIZE);
        self.header.write(&mut out).expect("writing to a Vec cannot fail");
        self.body.write(&mut out).expect("writing to a Vec cannot fail");
        out
    }

    /// The key seed this file's body was encrypted with.
    pub fn key_seed(&self) -> u32 {
        self.body.key_seed
    }

    /// Decrypt this file's body against `fprom`, reporting any
    /// `UnknownFprom` integrity outcome through `diagnostics` rather than
    /// failing outright.
    pub fn decrypt_body(
        &self,
        fprom: &Fprom,
        diagnostics: &mut dyn FnMut(u32, u32),
    ) -> Result<PlaintextBody, Error> {
        decrypt_patch_body(fprom, self.header.proc_sig, &self.body, diagnostics)
    }

    /// Encrypt `plain` under `header.proc_sig`, starting the seed search
    /// at `seed`, producing a complete patch file that pairs the
    /// encrypted body with `header` verbatim.
    pub fn encrypt(
        header: PatchHeader,
        fprom: &Fprom,
        seed: u32,
        plain: &PlaintextBody,
    ) -> Result<Self, Error> {
        let body = encrypt_patch_body(fprom, header.proc_sig, seed, plain)?;
        Ok(Self { header, body })
    }
}
