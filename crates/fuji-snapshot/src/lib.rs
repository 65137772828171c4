//! Save-state container for the emulated machine.
//!
//! A snapshot file is a fixed header (magic, format version, endianness tag)
//! followed by self-describing sections. Each section carries an id, a
//! section version, flags, and a byte length, so readers can skip sections
//! they do not understand and old files stay loadable as the machine grows
//! new state. All integers are little-endian.
//!
//! This crate owns only the container: header and section framing, the
//! little-endian read/write helpers, and the error type. What goes *inside*
//! a section is defined by the component that owns it (the scheduler encodes
//! its event table in `fuji-interrupts`).

#![forbid(unsafe_code)]

mod error;
mod format;
mod io;

use std::io::{Read, Seek, SeekFrom, Write};

pub use error::{Result, SnapshotError};
pub use format::{SectionId, SNAPSHOT_ENDIANNESS_LITTLE, SNAPSHOT_MAGIC, SNAPSHOT_VERSION_V1};
pub use io::{ReadLeExt, WriteLeExt};

/// Frame of one section, as returned by [`read_section_header`].
#[derive(Debug, Clone, Copy)]
pub struct SectionHeader {
    pub id: SectionId,
    pub version: u16,
    pub len: u64,
}

pub fn write_file_header<W: Write>(w: &mut W) -> Result<()> {
    w.write_bytes(SNAPSHOT_MAGIC)?;
    w.write_u16_le(SNAPSHOT_VERSION_V1)?;
    w.write_u8(SNAPSHOT_ENDIANNESS_LITTLE)?;
    w.write_u8(0)?; // reserved
    w.write_u32_le(0)?; // flags/reserved
    Ok(())
}

pub fn read_file_header<R: Read>(r: &mut R) -> Result<()> {
    let mut magic = [0u8; 8];
    r.read_exact(&mut magic)?;
    if &magic != SNAPSHOT_MAGIC {
        return Err(SnapshotError::InvalidMagic);
    }
    let version = r.read_u16_le()?;
    if version != SNAPSHOT_VERSION_V1 {
        return Err(SnapshotError::UnsupportedVersion(version));
    }
    let endianness = r.read_u8()?;
    if endianness != SNAPSHOT_ENDIANNESS_LITTLE {
        return Err(SnapshotError::InvalidEndianness(endianness));
    }
    let _reserved = r.read_u8()?;
    let _flags = r.read_u32_le()?;
    Ok(())
}

/// Writes one section: header, payload produced by `f`, then patches the
/// payload length back into the header.
pub fn write_section<W: Write + Seek>(
    w: &mut W,
    id: SectionId,
    version: u16,
    flags: u16,
    f: impl FnOnce(&mut W) -> Result<()>,
) -> Result<()> {
    let header_pos = w.stream_position()?;
    w.write_u32_le(id.0)?;
    w.write_u16_le(version)?;
    w.write_u16_le(flags)?;
    w.write_u64_le(0)?; // placeholder len

    let payload_start = w.stream_position()?;
    f(w)?;
    let payload_end = w.stream_position()?;

    let len = payload_end
        .checked_sub(payload_start)
        .ok_or(SnapshotError::Corrupt("stream position underflow"))?;

    w.seek(SeekFrom::Start(header_pos + 8))?;
    w.write_u64_le(len)?;
    w.seek(SeekFrom::Start(payload_end))?;
    Ok(())
}

/// Reads the next section header, or `None` at a clean end of stream.
pub fn read_section_header<R: Read>(r: &mut R) -> Result<Option<SectionHeader>> {
    let mut first = [0u8; 1];
    match r.read(&mut first)? {
        0 => return Ok(None),
        1 => {}
        _ => unreachable!("read() with 1-byte buffer"),
    }
    let mut id_bytes = [0u8; 4];
    id_bytes[0] = first[0];
    r.read_exact(&mut id_bytes[1..])?;
    let id = SectionId(u32::from_le_bytes(id_bytes));
    let version = r.read_u16_le()?;
    let _flags = r.read_u16_le()?;
    let len = r.read_u64_le()?;
    Ok(Some(SectionHeader { id, version, len }))
}

/// Reads a whole section payload into memory for staged decoding.
///
/// Fails with a truncation error if the stream ends before `len` bytes, and
/// with [`SnapshotError::OutOfMemory`] rather than aborting if `len` is
/// hostile. Callers should bound `len` with their own sanity limit first.
pub fn read_section_payload<R: Read>(r: &mut R, len: u64) -> Result<Vec<u8>> {
    let len: usize = len
        .try_into()
        .map_err(|_| SnapshotError::Corrupt("section length overflow"))?;
    r.read_exact_vec(len)
}

/// Discards a section payload (unknown id or unsupported section version).
pub fn skip_section_payload<R: Read>(r: &mut R, len: u64) -> Result<()> {
    let mut limited = r.take(len);
    std::io::copy(&mut limited, &mut std::io::sink())?;
    if limited.limit() != 0 {
        return Err(SnapshotError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "truncated section payload",
        )));
    }
    Ok(())
}
