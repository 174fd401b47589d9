//! Reads the GSIC block that some script compilers place in front of compiled scripts. The block
//! describes detours: functions in other scripts that the mod wants to replace with its own.
//!
//! The block has to be removed before the game sees the script, because the script header is
//! expected to start at offset zero.
//!
//! Layout (all values little-endian):
//!
//! ```text
//! "GSIC"
//! u32 field_count
//! field_count * {
//!     u32 field_type
//!     payload
//! }
//! ```
//!
//! The only field type is the detour list, whose payload is a `u32` count followed by that many
//! 256-byte detour records.

use std::{
    fmt::Display,
    io::{Cursor, Write},
    ops::Range,
};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};

use super::hash::AssetKey;

pub const GSIC_MAGIC: &[u8; 4] = b"GSIC";

/// Every detour record occupies this many bytes, most of which are reserved.
pub const DETOUR_RECORD_SIZE: usize = 256;

/// Field type tag for a detour list.
const FIELD_DETOURS: u32 = 0;

/// A function replacement declared by a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GsicDetour {
    /// Canonical name of the replacement function inside the owning script.
    pub fixup_name: u32,

    /// Namespace of the function being replaced.
    pub replace_namespace: u32,

    /// Name of the function being replaced.
    pub replace_function: u32,

    /// Offset of the replacement function's code in the owning script, measured after the GSIC
    /// block has been removed.
    pub fixup_offset: u32,

    /// Size of the replacement function's code.
    pub fixup_size: u32,

    /// The script containing the function being replaced.
    pub target_script: AssetKey,
}

impl GsicDetour {
    /// Returns the byte range of the replacement code within the owning script.
    pub fn fixup_range(&self) -> Range<usize> {
        let start = self.fixup_offset as usize;
        start..start.saturating_add(self.fixup_size as usize)
    }

    /// Reads a detour from a full record.
    fn from_record(record: &[u8; DETOUR_RECORD_SIZE]) -> GsicDetour {
        GsicDetour {
            fixup_name: LittleEndian::read_u32(&record[0..4]),
            replace_namespace: LittleEndian::read_u32(&record[4..8]),
            replace_function: LittleEndian::read_u32(&record[8..12]),
            fixup_offset: LittleEndian::read_u32(&record[12..16]),
            fixup_size: LittleEndian::read_u32(&record[16..20]),
            target_script: AssetKey(LittleEndian::read_u64(&record[20..28])),
        }
    }

    /// Writes this detour as a full record. Reserved bytes are zero.
    fn to_record(self) -> [u8; DETOUR_RECORD_SIZE] {
        let mut record = [0u8; DETOUR_RECORD_SIZE];

        LittleEndian::write_u32(&mut record[0..4], self.fixup_name);
        LittleEndian::write_u32(&mut record[4..8], self.replace_namespace);
        LittleEndian::write_u32(&mut record[8..12], self.replace_function);
        LittleEndian::write_u32(&mut record[12..16], self.fixup_offset);
        LittleEndian::write_u32(&mut record[16..20], self.fixup_size);
        LittleEndian::write_u64(&mut record[20..28], self.target_script.0);

        record
    }
}

impl Display for GsicDetour {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:x} : namespace_{:x}<script_{}>::function_{:x} / offset={:x}+{:x}",
            self.fixup_name,
            self.replace_namespace,
            self.target_script,
            self.replace_function,
            self.fixup_offset,
            self.fixup_size
        )
    }
}

/// A read from the GSIC block that would have gone past the end of the buffer, or a value that
/// can't be understood. Each variant holds the offset at which the failed read started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GsicError {
    /// The field count is missing.
    Fields { offset: usize },

    /// The type tag for field `index` is missing.
    FieldType { offset: usize, index: u32 },

    /// The detour count is missing.
    DetourCount { offset: usize },

    /// There are fewer bytes left than `count` detour records need.
    Detours { offset: usize, count: u32 },

    /// The field type isn't one we know about.
    UnknownFieldType { offset: usize, tag: u32 },
}

impl Display for GsicError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GsicError::Fields { offset } => write!(f, "can't read gsic fields at {offset:#x}"),
            GsicError::FieldType { offset, index } => {
                write!(f, "can't read gsic field type {index} at {offset:#x}")
            }
            GsicError::DetourCount { offset } => {
                write!(f, "can't read gsic detours count at {offset:#x}")
            }
            GsicError::Detours { offset, count } => {
                write!(f, "can't read {count} detours at {offset:#x}")
            }
            GsicError::UnknownFieldType { offset, tag } => {
                write!(f, "bad gsic field type {tag} at {offset:#x}")
            }
        }
    }
}

impl std::error::Error for GsicError {}

/// The decoded contents of a GSIC block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GsicHeader {
    /// The detours declared in the block, in file order.
    pub detours: Vec<GsicDetour>,

    /// The number of bytes the block occupies at the start of the buffer.
    pub size: usize,
}

/// Sequential reader that checks that every read fits in the buffer before making it.
struct HeaderReader<'buf> {
    cursor: Cursor<&'buf [u8]>,
}

impl<'buf> HeaderReader<'buf> {
    /// Creates a reader positioned just after the magic.
    fn new(buffer: &'buf [u8]) -> HeaderReader<'buf> {
        let mut cursor = Cursor::new(buffer);
        cursor.set_position(GSIC_MAGIC.len() as u64);

        HeaderReader { cursor }
    }

    /// The offset of the next read from the start of the buffer.
    fn offset(&self) -> usize {
        self.cursor.position() as usize
    }

    fn can_read(&self, bytes: usize) -> bool {
        self.cursor.get_ref().len().saturating_sub(self.offset()) >= bytes
    }

    /// Reads a `u32`, producing `error(offset)` if there aren't four bytes left.
    fn read_u32(&mut self, error: impl FnOnce(usize) -> GsicError) -> Result<u32, GsicError> {
        let offset = self.offset();

        if !self.can_read(4) {
            return Err(error(offset));
        }

        self.cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| error(offset))
    }

    /// Reads `count` detour records.
    fn read_detours(&mut self, count: u32) -> Result<Vec<GsicDetour>, GsicError> {
        let offset = self.offset();
        let error = || GsicError::Detours { offset, count };

        let total = (count as usize)
            .checked_mul(DETOUR_RECORD_SIZE)
            .ok_or_else(error)?;

        if !self.can_read(total) {
            return Err(error());
        }

        let mut detours = Vec::with_capacity(count as usize);
        let mut record = [0u8; DETOUR_RECORD_SIZE];

        for _ in 0..count {
            std::io::Read::read_exact(&mut self.cursor, &mut record).map_err(|_| error())?;

            let detour = GsicDetour::from_record(&record);
            log::debug!("read detour {}", detour);

            detours.push(detour);
        }

        Ok(detours)
    }
}

/// Decodes the GSIC block at the start of `buffer`. Returns `Ok(None)` if the buffer doesn't
/// start with a GSIC block, which is the case for most scripts.
pub fn decode(buffer: &[u8]) -> Result<Option<GsicHeader>, GsicError> {
    if !buffer.starts_with(GSIC_MAGIC) {
        return Ok(None);
    }

    let mut reader = HeaderReader::new(buffer);
    let field_count = reader.read_u32(|offset| GsicError::Fields { offset })?;

    let mut detours = vec![];

    for index in 0..field_count {
        let field_type = reader.read_u32(|offset| GsicError::FieldType { offset, index })?;

        match field_type {
            FIELD_DETOURS => {
                let count = reader.read_u32(|offset| GsicError::DetourCount { offset })?;
                detours.extend(reader.read_detours(count)?);
            }

            tag => {
                return Err(GsicError::UnknownFieldType {
                    offset: reader.offset() - 4,
                    tag,
                })
            }
        }
    }

    Ok(Some(GsicHeader {
        detours,
        size: reader.offset(),
    }))
}

/// Removes the GSIC block from the start of `buffer`, returning the remaining script bytes and
/// the detours the block declared. Buffers without a block are returned unchanged with no
/// detours.
pub fn strip(mut buffer: Vec<u8>) -> Result<(Vec<u8>, Vec<GsicDetour>), GsicError> {
    match decode(&buffer)? {
        Some(header) => {
            buffer.drain(..header.size);
            Ok((buffer, header.detours))
        }

        None => Ok((buffer, vec![])),
    }
}

/// Builds a GSIC block containing a single detour list field. Script compilers write this in
/// front of the compiled script.
pub fn encode(detours: &[GsicDetour]) -> std::io::Result<Vec<u8>> {
    let mut block = Vec::with_capacity(16 + detours.len() * DETOUR_RECORD_SIZE);

    block.write_all(GSIC_MAGIC)?;
    block.write_u32::<LittleEndian>(1)?;
    block.write_u32::<LittleEndian>(FIELD_DETOURS)?;
    block.write_u32::<LittleEndian>(detours.len() as u32)?;

    for detour in detours {
        block.write_all(&detour.to_record())?;
    }

    Ok(block)
}
