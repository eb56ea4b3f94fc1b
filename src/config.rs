//! Plaintext config codec.
//!
//! A line-based, one-directive-per-line text format for round-tripping a
//! decrypted patch: header fields, the initial key seed, a path to a
//! companion MSRAM hex file, and up to 16 `write_creg` control-register
//! operations. Numeric values are parsed permissively, `strtol`-style:
//! `0x`-prefixed hex, `0`-prefixed octal, otherwise decimal.

use std::io::Write;

use crate::body::CrOp;
use crate::error::Error;
use crate::file::{
    PatchHeader, CR_OP_COUNT, MSRAM_BASE_ADDRESS, MSRAM_DWORD_COUNT, MSRAM_GROUP_COUNT,
    MSRAM_GROUP_SIZE,
};

/// A parsed plaintext config: header fields (zero where unset), the
/// initial key seed, the companion MSRAM file name, and the control
/// register operations declared with `write_creg`.
#[derive(Debug, Clone, Default)]
pub struct ParsedConfig {
    pub header: PatchHeader,
    pub key_seed: u32,
    pub msram_file: Option<String>,
    pub cr_ops: Vec<CrOp>,
}

/// Parse a permissive `strtol`-like unsigned 32-bit integer: `0x`/`0X`
/// prefix selects hex, a lone leading `0` selects octal, otherwise
/// decimal.
fn parse_u32(s: &str) -> Result<u32, Error> {
    let bad = || Error::MalformedConfig(format!("invalid integer: \"{s}\""));
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|_| bad())
    } else if s.len() > 1 && s.starts_with('0') {
        u32::from_str_radix(&s[1..], 8).map_err(|_| bad())
    } else {
        s.parse::<u32>().map_err(|_| bad())
    }
}

/// Parse a plaintext config from its textual contents.
///
/// Returns [`Error::MalformedConfig`] on any unknown directive, missing
/// argument, out-of-range `write_creg` address, or more than 16
/// `write_creg` lines.
pub fn parse_config(text: &str) -> Result<ParsedConfig, Error> {
    let mut config = ParsedConfig::default();

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        let mut tokens = line.split_whitespace();
        let Some(directive) = tokens.next() else {
            continue;
        };

        macro_rules! next_u32 {
            () => {
                parse_u32(tokens.next().ok_or_else(|| {
                    Error::MalformedConfig(format!("{directive}: missing argument"))
                })?)?
            };
        }

        match directive {
            "header_ver" => config.header.header_ver = next_u32!(),
            "update_rev" => config.header.update_rev = next_u32!(),
            "date_bcd" => config.header.date_bcd = next_u32!(),
            "proc_sig" => config.header.proc_sig = next_u32!(),
            "checksum" => config.header.checksum = next_u32!(),
            "loader_rev" => config.header.loader_ver = next_u32!(),
            "proc_flags" => config.header.proc_flags = next_u32!(),
            "data_size" => config.header.data_size = next_u32!(),
            "total_size" => config.header.total_size = next_u32!(),
            "key_seed" => config.key_seed = next_u32!(),
            "msram_file" => {
                let path = tokens
                    .next()
                    .ok_or_else(|| Error::MalformedConfig("msram_file: missing argument".into()))?;
                config.msram_file = Some(path.to_string());
            }
            "write_creg" => {
                let address = next_u32!();
                let mask = next_u32!();
                let value = next_u32!();
                if address & !0x1FF != 0 {
                    return Err(Error::MalformedConfig(format!(
                        "write_creg: address 0x{address:03X} out of range"
                    )));
                }
                if config.cr_ops.len() >= CR_OP_COUNT {
                    return Err(Error::MalformedConfig(
                        "too many write_creg statements".into(),
                    ));
                }
                config.cr_ops.push(CrOp {
                    address,
                    mask,
                    value,
                });
            }
            other => {
                return Err(Error::MalformedConfig(format!(
                    "unknown config key \"{other}\""
                )));
            }
        }
    }

    Ok(config)
}

/// Serialize a config back to text, in the order the reference
/// implementation writes it.
pub fn write_config<W: Write>(
    w: &mut W,
    header: &PatchHeader,
    key_seed: u32,
    msram_file: &str,
    cr_ops: &[CrOp],
) -> Result<(), Error> {
    writeln!(w, "header_ver 0x{:08X}", header.header_ver)?;
    writeln!(w, "update_rev 0x{:08X}", header.update_rev)?;
    writeln!(w, "date_bcd   0x{:08X}", header.date_bcd)?;
    writeln!(w, "proc_sig   0x{:08X}", header.proc_sig)?;
    writeln!(w, "checksum   0x{:08X}", header.checksum)?;
    writeln!(w, "loader_rev 0x{:08X}", header.loader_ver)?;
    writeln!(w, "proc_flags 0x{:08X}", header.proc_flags)?;
    writeln!(w, "data_size  0x{:08X}", header.data_size)?;
    writeln!(w, "total_size 0x{:08X}", header.total_size)?;
    writeln!(w, "key_seed   0x{key_seed:08X}")?;
    writeln!(w, "msram_file {msram_file}")?;

    for op in cr_ops {
        writeln!(
            w,
            "write_creg 0x{:03X} 0x{:08X} 0x{:08X}",
            op.address, op.mask, op.value
        )?;
    }

    Ok(())
}

/// Parse the companion MSRAM hex file: lines `AAAA: W0 W1 ... W7` where
/// `AAAA` is a hex byte offset, starting at `MSRAM_BASE_ADDRESS *
/// MSRAM_GROUP_SIZE` and stepping by `MSRAM_GROUP_SIZE` per line.
///
/// Returns [`Error::MalformedConfig`] on a misaligned or out-of-range
/// address, or an incomplete line.
pub fn parse_msram(text: &str) -> Result<[u32; MSRAM_DWORD_COUNT], Error> {
    let mut msram = [0u32; MSRAM_DWORD_COUNT];
    let base = MSRAM_BASE_ADDRESS * MSRAM_GROUP_SIZE as u32;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        let Some((addr_str, rest)) = line.split_once(':') else {
            continue;
        };
        let addr = u32::from_str_radix(addr_str.trim(), 16)
            .map_err(|_| Error::MalformedConfig(format!("bad MSRAM address: \"{addr_str}\"")))?;

        if addr % MSRAM_GROUP_SIZE as u32 != 0 {
            return Err(Error::MalformedConfig(format!(
                "misaligned MSRAM address: 0x{addr:04X}"
            )));
        }
        if addr < base {
            return Err(Error::MalformedConfig(format!(
                "MSRAM address not in range: 0x{addr:04X}"
            )));
        }
        let group = (addr - base) / MSRAM_GROUP_SIZE as u32;
        if group as usize >= MSRAM_GROUP_COUNT {
            return Err(Error::MalformedConfig(format!(
                "MSRAM address not in range: 0x{addr:04X}"
            )));
        }

        let words: Vec<&str> = rest.split_whitespace().collect();
        if words.len() != MSRAM_GROUP_SIZE {
            return Err(Error::MalformedConfig(format!(
                "incomplete MSRAM data for address 0x{addr:04X}"
            )));
        }

        let base_idx = group as usize * MSRAM_GROUP_SIZE;
        for (i, w) in words.iter().enumerate() {
            msram[base_idx + i] = u32::from_str_radix(w, 16)
                .map_err(|_| Error::MalformedConfig(format!("bad MSRAM word: \"{w}\"")))?;
        }
    }

    Ok(msram)
}

/// Serialize the MSRAM block to the hex file format, one line per
/// 8-word group.
pub fn write_msram<W: Write>(w: &mut W, msram: &[u32; MSRAM_DWORD_COUNT]) -> Result<(), Error> {
    let base = MSRAM_BASE_ADDRESS * MSRAM_GROUP_SIZE as u32;
    for (group, chunk) in msram.chunks(MSRAM_GROUP_SIZE).enumerate() {
        write!(w, "{:04X}:", base + group as u32 * MSRAM_GROUP_SIZE as u32)?;
        for word in chunk {
            write!(w, " {word:08X}")?;
        }
        writeln!(w)?;
    }
    Ok(())
}
