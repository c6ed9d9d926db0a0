use crate::metadata::ParseError;

/// Read an ECMA-335 compressed unsigned integer (II.23.2), advancing `pos`.
pub(crate) fn read_compressed_u32(data: &[u8], pos: &mut usize) -> Result<u32, ParseError> {
    let truncated = ParseError::Truncated { what: "compressed integer", offset: *pos };
    let first = *data.get(*pos).ok_or(truncated)?;
    let (len, value) = match first {
        b if b & 0x80 == 0 => (1, u32::from(b)),
        b if b & 0xC0 == 0x80 => {
            let second = *data.get(*pos + 1).ok_or(ParseError::Truncated {
                what: "compressed integer",
                offset: *pos,
            })?;
            (2, (u32::from(b & 0x3F) << 8) | u32::from(second))
        }
        b if b & 0xE0 == 0xC0 => {
            let rest = data.get(*pos + 1..*pos + 4).ok_or(ParseError::Truncated {
                what: "compressed integer",
                offset: *pos,
            })?;
            let value = (u32::from(b & 0x1F) << 24)
                | (u32::from(rest[0]) << 16)
                | (u32::from(rest[1]) << 8)
                | u32::from(rest[2]);
            (4, value)
        }
        b => {
            return Err(ParseError::InvalidSignature(format!(
                "invalid compressed integer lead byte 0x{b:02X}"
            )))
        }
    };
    *pos += len;
    Ok(value)
}

/// The `#Strings` heap: NUL-terminated UTF-8 strings addressed by byte offset.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StringsHeap<'a> {
    data: &'a [u8],
}

impl<'a> StringsHeap<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub(crate) fn get(&self, offset: u32) -> Result<&'a str, ParseError> {
        if offset == 0 {
            return Ok("");
        }
        let tail = self.data.get(offset as usize..).ok_or(ParseError::InvalidString(offset))?;
        let end = tail.iter().position(|b| *b == 0).ok_or(ParseError::InvalidString(offset))?;
        std::str::from_utf8(&tail[..end]).map_err(|_| ParseError::InvalidString(offset))
    }
}

/// The `#Blob` heap: length-prefixed byte sequences addressed by byte offset.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BlobHeap<'a> {
    data: &'a [u8],
}

impl<'a> BlobHeap<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub(crate) fn get(&self, offset: u32) -> Result<&'a [u8], ParseError> {
        if offset == 0 {
            return Ok(&[]);
        }
        let mut pos = offset as usize;
        let len = read_compressed_u32(self.data, &mut pos)
            .map_err(|_| ParseError::InvalidBlob(offset))?;
        let end = pos.checked_add(len as usize).ok_or(ParseError::InvalidBlob(offset))?;
        self.data.get(pos..end).ok_or(ParseError::InvalidBlob(offset))
    }
}
