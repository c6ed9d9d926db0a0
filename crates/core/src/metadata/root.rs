use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::metadata::ParseError;

/// `BSJB`, little-endian.
pub(crate) const METADATA_SIGNATURE: u32 = 0x424A_5342;

/// Metadata root (ECMA-335 II.24.2.1) with the streams this reader consumes.
#[derive(Debug)]
pub(crate) struct MetadataRoot<'a> {
    pub(crate) version: String,
    pub(crate) tables: &'a [u8],
    pub(crate) strings: &'a [u8],
    pub(crate) blobs: &'a [u8],
}

impl<'a> MetadataRoot<'a> {
    pub(crate) fn parse(data: &'a [u8]) -> Result<Self, ParseError> {
        let mut reader = Cursor::new(data);
        let truncated = |reader: &Cursor<&[u8]>| ParseError::Truncated {
            what: "metadata root",
            offset: reader.position() as usize,
        };

        let signature = reader.read_u32::<LittleEndian>().map_err(|_| truncated(&reader))?;
        if signature != METADATA_SIGNATURE {
            return Err(ParseError::BadMetadataSignature(signature));
        }
        // Major, minor, reserved.
        reader.set_position(12);
        let version_len =
            reader.read_u32::<LittleEndian>().map_err(|_| truncated(&reader))? as usize;
        let version_bytes = data
            .get(16..16 + version_len)
            .ok_or(ParseError::Truncated { what: "metadata version", offset: 16 })?;
        let version = String::from_utf8_lossy(version_bytes).trim_end_matches('\0').to_string();

        reader.set_position((16 + version_len) as u64);
        let _flags = reader.read_u16::<LittleEndian>().map_err(|_| truncated(&reader))?;
        let stream_count = reader.read_u16::<LittleEndian>().map_err(|_| truncated(&reader))?;

        let mut tables = None;
        let mut strings = None;
        let mut blobs = None;
        for _ in 0..stream_count {
            let offset =
                reader.read_u32::<LittleEndian>().map_err(|_| truncated(&reader))? as usize;
            let size = reader.read_u32::<LittleEndian>().map_err(|_| truncated(&reader))? as usize;
            let name_start = reader.position() as usize;
            let name_len = data
                .get(name_start..)
                .and_then(|tail| tail.iter().take(32).position(|b| *b == 0))
                .ok_or(ParseError::Truncated { what: "stream name", offset: name_start })?;
            let name = &data[name_start..name_start + name_len];
            // Name plus terminator, padded to a 4-byte boundary.
            let padded = (name_len + 1 + 3) & !3;
            reader.set_position((name_start + padded) as u64);

            let body = offset
                .checked_add(size)
                .and_then(|end| data.get(offset..end))
                .ok_or(ParseError::Truncated { what: "metadata stream", offset })?;
            match name {
                b"#~" | b"#-" => tables = Some(body),
                b"#Strings" => strings = Some(body),
                b"#Blob" => blobs = Some(body),
                _ => {}
            }
        }

        Ok(Self {
            version,
            tables: tables.ok_or(ParseError::MissingStream("#~"))?,
            strings: strings.ok_or(ParseError::MissingStream("#Strings"))?,
            blobs: blobs.unwrap_or(&[]),
        })
    }
}
