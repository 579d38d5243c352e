use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::io::{self, Read, Write};
use thiserror::Error;
use tracing::debug;

use crate::reloc::Flattened;

pub const HEADER_SIZE: usize = 0x20;
pub const RELOC_ENTRY_SIZE: usize = 8;
/// Trailing header words, always written as-is.
pub const HEADER_TAIL: [u32; 5] = [0, 0, 1, 0, 0];

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("File too short for an HSDArc header: {0} bytes")]
    TooShort(usize),
    #[error("Header declares {declared} bytes, file has {actual}")]
    SizeMismatch { declared: usize, actual: usize },
    #[error("Relocation table offset {offset:#x} does not match data section end {expected:#x}")]
    BadRelocationOffset { offset: u32, expected: usize },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HsdArcHeader {
    pub file_size:    u32,
    /// Data-section-relative offset of the relocation table, 0 when empty.
    pub reloc_offset: u32,
    pub reloc_count:  u32,
    pub tail:         [u32; 5],
}

impl HsdArcHeader {
    pub fn new(data_len: usize, reloc_count: usize) -> Self {
        let file_size = HEADER_SIZE + data_len + reloc_count * RELOC_ENTRY_SIZE;
        Self {
            file_size:    file_size as u32,
            reloc_offset: if reloc_count == 0 { 0 } else { data_len as u32 },
            reloc_count:  reloc_count as u32,
            tail:         HEADER_TAIL,
        }
    }

    /// Length of the data section implied by the size fields.
    pub fn data_len(&self) -> usize {
        (self.file_size as usize)
            .saturating_sub(HEADER_SIZE + self.reloc_count as usize * RELOC_ENTRY_SIZE)
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut words = [0u32; 8];
        words[0] = self.file_size;
        words[1] = self.reloc_offset;
        words[2] = self.reloc_count;
        words[3..].copy_from_slice(&self.tail);

        let mut out = [0u8; HEADER_SIZE];
        LittleEndian::write_u32_into(&words, &mut out);
        out
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&self.to_bytes())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self, HeaderError> {
        let file_size = reader.read_u32::<LittleEndian>()?;
        let reloc_offset = reader.read_u32::<LittleEndian>()?;
        let reloc_count = reader.read_u32::<LittleEndian>()?;
        let mut tail = [0u32; 5];
        reader.read_u32_into::<LittleEndian>(&mut tail)?;
        Ok(Self { file_size, reloc_offset, reloc_count, tail })
    }

    /// Parse the header of a complete file and check it against the file length.
    pub fn from_file_bytes(bytes: &[u8]) -> Result<Self, HeaderError> {
        if bytes.len() < HEADER_SIZE {
            return Err(HeaderError::TooShort(bytes.len()));
        }
        let header = Self::read(&bytes[..HEADER_SIZE])?;
        header.validate(bytes.len())?;
        Ok(header)
    }

    pub fn validate(&self, actual_len: usize) -> Result<(), HeaderError> {
        let declared = self.file_size as usize;
        let table = self.reloc_count as usize * RELOC_ENTRY_SIZE;
        if declared != actual_len || declared < HEADER_SIZE + table {
            return Err(HeaderError::SizeMismatch { declared, actual: actual_len });
        }
        let expected = if self.reloc_count == 0 { 0 } else { self.data_len() };
        if self.reloc_offset as usize != expected {
            return Err(HeaderError::BadRelocationOffset { offset: self.reloc_offset, expected });
        }
        Ok(())
    }
}

/// Lay out header, data section and relocation table as one file.
pub fn assemble(flat: Flattened) -> Vec<u8> {
    let Flattened { data, relocations } = flat;
    let header = HsdArcHeader::new(data.len(), relocations.len());

    let mut table = vec![0u8; relocations.len() * RELOC_ENTRY_SIZE];
    LittleEndian::write_u64_into(&relocations, &mut table);

    let mut out = Vec::with_capacity(header.file_size as usize);
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(&data);
    out.extend_from_slice(&table);

    debug!(
        file_size = out.len(),
        data_len = data.len(),
        relocations = relocations.len(),
        "assembled HSDArc file"
    );
    out
}
