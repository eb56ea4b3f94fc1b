//! `p2ucode` - a command-line front end over the `p2ucode` library for
//! encrypting, decrypting, and dumping Pentium II microcode patches.
//!
//! This binary is pure plumbing: it owns argument parsing, path
//! derivation, and file I/O, and calls straight into the library for
//! every cryptographic or format-parsing operation.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use p2ucode::body::{CrOp, PlaintextBody};
use p2ucode::config::{parse_config, parse_msram, write_config, write_msram};
use p2ucode::file::{PatchFile, FILE_SIZE};
use p2ucode::fprom::Fprom;
use p2ucode::{Error, Result};

/// Encrypt and decrypt Pentium II-family CPU microcode patches.
#[derive(Parser, Debug)]
#[command(name = "p2ucode", about, long_about = None)]
struct Args {
    /// Extract a patch to a configuration and MSRAM hexdump file.
    #[arg(short = 'e')]
    extract: bool,

    /// Create a patch from a configuration and MSRAM hexdump file.
    #[arg(short = 'c')]
    create: bool,

    /// Dump the patch contents and keys to the console.
    #[arg(short = 'd')]
    dump: bool,

    /// Path of the patchfile to create or decrypt.
    #[arg(short = 'p', value_name = "PATCH")]
    patch_path: Option<PathBuf>,

    /// Path of the config file to use or extract.
    #[arg(short = 'i', value_name = "CONFIG")]
    config_path: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("p2ucode: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    if args.create && args.extract {
        return Err(Error::MalformedConfig(
            "-c and -e are mutually exclusive".into(),
        ));
    }

    if args.create {
        create_patch(&args)?;
    } else if args.dump || args.extract {
        let (file, plain) = load_patch(&args)?;

        if args.dump {
            dump_patch(&file, &plain);
        }
        if args.extract {
            extract_patch(&args, &file, &plain)?;
        }
    } else {
        return Err(Error::MalformedConfig(
            "no mode specified; pass -e, -c, or -d".into(),
        ));
    }

    Ok(())
}

/// The filename stem, stripped of its extension, the way the reference
/// tool derives companion output paths.
fn stem_of(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| Error::MalformedConfig(format!("unusable path: {}", path.display())))
}

fn load_patch(args: &Args) -> Result<(PatchFile, PlaintextBody)> {
    let patch_path = args
        .patch_path
        .as_ref()
        .ok_or_else(|| Error::MalformedConfig("missing patch path (-p)".into()))?;

    let data = fs::read(patch_path)?;
    if data.len() != FILE_SIZE {
        return Err(Error::MalformedFile("patch file must be exactly 2048 bytes"));
    }
    let file = PatchFile::parse(&data)?;

    let mut diagnostics = |index: u32, value: u32| {
        log::warn!("unknown FPROM[0x{index:02X}] = 0x{value:08X}, skipping integrity check");
    };
    let plain = file.decrypt_body(Fprom::reference(), &mut diagnostics)?;

    Ok((file, plain))
}

fn dump_patch(file: &PatchFile, plain: &PlaintextBody) {
    let h = &file.header;
    println!("header_ver  0x{:08X}", h.header_ver);
    println!("update_rev  0x{:08X}", h.update_rev);
    println!("date_bcd    0x{:08X}", h.date_bcd);
    println!("proc_sig    0x{:08X}", h.proc_sig);
    println!("checksum    0x{:08X}", h.checksum);
    println!("loader_rev  0x{:08X}", h.loader_ver);
    println!("proc_flags  0x{:08X}", h.proc_flags);
    println!("data_size   0x{:08X}", h.data_size);
    println!("total_size  0x{:08X}", h.total_size);

    for (i, word) in plain.msram.iter().enumerate() {
        println!("msram[{i:03}]   0x{word:08X}");
    }
    for (i, op) in plain.cr_ops.iter().enumerate() {
        println!(
            "cr_op[{i:02}]    addr=0x{:03X} mask=0x{:08X} value=0x{:08X}",
            op.address, op.mask, op.value
        );
    }
}

fn extract_patch(args: &Args, file: &PatchFile, plain: &PlaintextBody) -> Result<()> {
    let patch_path = args.patch_path.as_ref().expect("checked in load_patch");
    let stem = stem_of(patch_path)?;

    let config_path = args
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{stem}.txt")));
    let msram_path = config_path.with_extension("hex");
    let msram_name = msram_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("patch.hex")
        .to_string();

    let mut config_buf = Vec::new();
    write_config(
        &mut config_buf,
        &file.header,
        file.key_seed(),
        &msram_name,
        &plain.cr_ops,
    )?;
    fs::write(&config_path, config_buf)?;

    let mut msram_buf = Vec::new();
    write_msram(&mut msram_buf, &plain.msram)?;
    fs::write(&msram_path, msram_buf)?;

    Ok(())
}

fn create_patch(args: &Args) -> Result<()> {
    let config_path = args
        .config_path
        .as_ref()
        .ok_or_else(|| Error::MalformedConfig("missing config path (-i)".into()))?;

    let config_text = String::from_utf8(fs::read(config_path)?)
        .map_err(|_| Error::MalformedConfig("config file is not valid UTF-8".into()))?;
    let parsed = parse_config(&config_text)?;

    let msram_file = parsed
        .msram_file
        .as_ref()
        .ok_or_else(|| Error::MalformedConfig("missing msram_file directive".into()))?;
    let msram_path = config_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(msram_file);
    let msram_text = String::from_utf8(fs::read(&msram_path)?)
        .map_err(|_| Error::MalformedConfig("MSRAM file is not valid UTF-8".into()))?;
    let msram = parse_msram(&msram_text)?;

    let mut cr_ops = [CrOp::default(); 16];
    cr_ops[..parsed.cr_ops.len()].copy_from_slice(&parsed.cr_ops);
    let plain = PlaintextBody { msram, cr_ops };

    let patch_path = args.patch_path.clone().unwrap_or_else(|| {
        let stem = stem_of(config_path).unwrap_or_else(|_| "patch".to_string());
        PathBuf::from(format!("{stem}.dat"))
    });

    let file = PatchFile::encrypt(parsed.header, Fprom::reference(), parsed.key_seed, &plain)?;
    fs::write(&patch_path, file.to_bytes())?;

    Ok(())
}
