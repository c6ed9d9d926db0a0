use goblin::pe::{section_table::SectionTable, PE};

use crate::metadata::ParseError;

/// Offset of the metadata data directory within the CLI header.
const CLI_HEADER_METADATA_OFFSET: usize = 8;

/// Locate the metadata blob of a managed PE image.
pub(crate) fn metadata_slice(bytes: &[u8]) -> Result<&[u8], ParseError> {
    let pe = PE::parse(bytes).map_err(|e| ParseError::NotPortableExecutable(e.to_string()))?;
    let optional = pe.header.optional_header.as_ref().ok_or(ParseError::NotManaged)?;
    let Some(clr) = optional.data_directories.get_clr_runtime_header() else {
        return Err(ParseError::NotManaged);
    };

    let cli_offset = rva_to_offset(&pe.sections, clr.virtual_address)?;
    let metadata_rva = read_u32(bytes, cli_offset + CLI_HEADER_METADATA_OFFSET, "CLI header")?;
    let metadata_size = read_u32(bytes, cli_offset + CLI_HEADER_METADATA_OFFSET + 4, "CLI header")?;
    if metadata_rva == 0 || metadata_size == 0 {
        return Err(ParseError::NotManaged);
    }

    let start = rva_to_offset(&pe.sections, metadata_rva)?;
    let end = start.checked_add(metadata_size as usize).filter(|end| *end <= bytes.len());
    match end {
        Some(end) => Ok(&bytes[start..end]),
        None => Err(ParseError::Truncated { what: "metadata", offset: start }),
    }
}

/// Map an RVA to a file offset using the section table.
fn rva_to_offset(sections: &[SectionTable], rva: u32) -> Result<usize, ParseError> {
    for sec in sections {
        let start = sec.virtual_address;
        let size = if sec.virtual_size == 0 { sec.size_of_raw_data } else { sec.virtual_size };
        if rva >= start && (rva - start) < size {
            let delta = rva - start;
            if delta >= sec.size_of_raw_data {
                // Inside the zero-filled tail of the section; nothing on disk.
                return Err(ParseError::UnmappedRva(rva));
            }
            return Ok(sec.pointer_to_raw_data as usize + delta as usize);
        }
    }
    Err(ParseError::UnmappedRva(rva))
}

fn read_u32(bytes: &[u8], offset: usize, what: &'static str) -> Result<u32, ParseError> {
    bytes
        .get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(ParseError::Truncated { what, offset })
}
