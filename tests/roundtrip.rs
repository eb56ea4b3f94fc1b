//! Full-file and config round-trip scenarios spanning every module:
//! binary patch file, body codec, and plaintext config/MSRAM formats.

use p2ucode::body::{CrOp, PlaintextBody};
use p2ucode::config::{parse_config, parse_msram, write_config, write_msram};
use p2ucode::file::{PatchFile, PatchHeader, FILE_SIZE};
use p2ucode::fprom::Fprom;

fn sample_header() -> PatchHeader {
    PatchHeader {
        header_ver: 1,
        update_rev: 3,
        date_bcd: 0x0612_1999,
        proc_sig: 0x652,
        checksum: 0xCAFEBABE,
        loader_ver: 1,
        proc_flags: 0,
        data_size: 2000,
        total_size: FILE_SIZE as u32,
    }
}

fn sample_plain() -> PlaintextBody {
    let mut body = PlaintextBody::default();
    for (i, w) in body.msram.iter_mut().enumerate() {
        *w = (i as u32).wrapping_mul(0x0B0B_0B0B) ^ 0xDEAD_0000;
    }
    for (i, op) in body.cr_ops.iter_mut().enumerate() {
        *op = CrOp {
            address: i as u32,
            mask: 0xFFFF_FFFF,
            value: (i as u32) * 7 + 1,
        };
    }
    body
}

#[test]
fn full_patch_file_round_trips_through_the_binary_layout() {
    let fprom = Fprom::reference();
    let header = sample_header();
    let plain = sample_plain();

    let file = PatchFile::encrypt(header, fprom, 0, &plain).unwrap();
    let bytes = file.to_bytes();
    assert_eq!(bytes.len(), FILE_SIZE);

    let parsed = PatchFile::parse(&bytes).unwrap();
    assert_eq!(parsed.header, header);

    let mut diags = Vec::new();
    let decrypted = parsed
        .decrypt_body(fprom, &mut |idx, val| diags.push((idx, val)))
        .unwrap();
    assert_eq!(decrypted.msram, plain.msram);
    assert_eq!(decrypted.cr_ops, plain.cr_ops);
}

#[test]
fn config_round_trip_reproduces_the_original_patch_byte_for_byte() {
    let fprom = Fprom::reference();
    let header = sample_header();
    let plain = sample_plain();

    let original = PatchFile::encrypt(header, fprom, 0, &plain).unwrap();
    let original_bytes = original.to_bytes();

    // Extract: decrypt, then serialize to plaintext config + MSRAM hex.
    let mut diags = Vec::new();
    let decrypted = original
        .decrypt_body(fprom, &mut |idx, val| diags.push((idx, val)))
        .unwrap();

    let mut config_buf = Vec::new();
    write_config(
        &mut config_buf,
        &original.header,
        original.key_seed(),
        "patch.hex",
        &decrypted.cr_ops,
    )
    .unwrap();
    let config_text = String::from_utf8(config_buf).unwrap();

    let mut msram_buf = Vec::new();
    write_msram(&mut msram_buf, &decrypted.msram).unwrap();
    let msram_text = String::from_utf8(msram_buf).unwrap();

    // Recreate: parse the plaintext back and re-encrypt at the same seed.
    let parsed = parse_config(&config_text).unwrap();
    let msram = parse_msram(&msram_text).unwrap();

    let mut cr_ops = [CrOp::default(); 16];
    cr_ops[..parsed.cr_ops.len()].copy_from_slice(&parsed.cr_ops);
    let recreated_plain = PlaintextBody { msram, cr_ops };

    let recreated = PatchFile::encrypt(parsed.header, fprom, parsed.key_seed, &recreated_plain)
        .unwrap();

    assert_eq!(recreated.to_bytes(), original_bytes);
}

#[test]
fn bit_flipped_integrity_word_is_rejected_end_to_end() {
    let fprom = Fprom::reference();
    let header = sample_header();
    let plain = sample_plain();

    let mut file = PatchFile::encrypt(header, fprom, 0, &plain).unwrap();
    let mut bytes = file.to_bytes();
    // msram_integrity sits right after the 168-word MSRAM block, itself
    // right after the header and the key_seed/reserved pair.
    let msram_integrity_offset = 48 + 4 + 4 + 168 * 4;
    bytes[msram_integrity_offset] ^= 0x01;

    file = PatchFile::parse(&bytes).unwrap();
    let mut diags = Vec::new();
    let result = file.decrypt_body(fprom, &mut |idx, val| diags.push((idx, val)));
    assert!(result.is_err());
}
