//! Low-level I/O primitives shared by the binary patch file codec.
//!
//! Each function reads or writes exactly the bytes it promises or returns
//! an error - there is no partial-read ambiguity.

use std::io::{Read, Write};

use crate::Result;

/// Read a little-endian `u32`.
#[inline]
pub(crate) fn le_u32<R: Read>(r: &mut R) -> Result<u32> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b)?;
    Ok(u32::from_le_bytes(b))
}

/// Write a little-endian `u32`.
#[inline]
pub(crate) fn write_le_u32<W: Write>(w: &mut W, v: u32) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Read exactly `N` bytes into a fixed-size array.
#[inline]
pub(crate) fn bytesa<const N: usize>(r: &mut impl Read) -> Result<[u8; N]> {
    let mut b = [0u8; N];
    r.read_exact(&mut b)?;
    Ok(b)
}
