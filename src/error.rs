//! Library-wide error and result types.

use std::fmt;
use std::io;

/// Result alias used throughout p2ucode.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors the library can produce.
///
/// Error messages are kept intentionally terse; callers that need richer
/// context should wrap `Error` in their own type.
#[derive(Debug)]
pub enum Error {
    /// Processor signature's low 12 bits are not in the recognized key
    /// table.
    UnknownCpu(u32),
    /// A required FPROM entry is absent. Fatal during key derivation;
    /// drives seed-search retry during encryption.
    MissingFprom(u32),
    /// A decrypted integrity check word did not match the expected FPROM
    /// constant.
    IntegrityMismatch {
        index: u32,
        got: u32,
        expected: u32,
    },
    /// The input is not a well-formed patch file (wrong size, truncated).
    MalformedFile(&'static str),
    /// The plaintext config file could not be parsed.
    MalformedConfig(String),
    /// Seed-search exceeded its retry budget without finding a seed that
    /// avoids every missing FPROM entry.
    SeedSearchExhausted { attempts: u32 },
    /// An underlying I/O operation failed.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnknownCpu(sig) => write!(f, "unknown CPU signature: 0x{sig:03X}"),
            Error::MissingFprom(idx) => write!(f, "missing FPROM entry at index 0x{idx:02X}"),
            Error::IntegrityMismatch {
                index,
                got,
                expected,
            } => write!(
                f,
                "integrity check failed at FPROM[0x{index:02X}]: got 0x{got:08X} expected 0x{expected:08X}"
            ),
            Error::MalformedFile(reason) => write!(f, "malformed patch file: {reason}"),
            Error::MalformedConfig(reason) => write!(f, "malformed config: {reason}"),
            Error::SeedSearchExhausted { attempts } => {
                write!(f, "seed search exhausted after {attempts} attempts")
            }
            Error::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        if let Error::Io(e) = self {
            Some(e)
        } else {
            None
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
