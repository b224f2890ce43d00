//! Big-endian cursor over the raw file bytes

use super::error::FormatError;

pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    // Offset of `data[0]` within the whole file, for error reporting
    base: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            base: 0,
        }
    }

    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn peek_u8(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    pub fn read_u8(&mut self, context: &'static str) -> Result<u8, FormatError> {
        let byte = self.peek_u8().ok_or(self.truncated(context))?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_u16(&mut self, context: &'static str) -> Result<u16, FormatError> {
        let bytes = self.read_bytes(2, context)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self, context: &'static str) -> Result<u32, FormatError> {
        let bytes = self.read_bytes(4, context)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_tag(&mut self, context: &'static str) -> Result<[u8; 4], FormatError> {
        let bytes = self.read_bytes(4, context)?;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    pub fn read_bytes(&mut self, len: usize, context: &'static str) -> Result<&'a [u8], FormatError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(self.truncated(context))?;
        let data = self.data;
        let bytes = &data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// Splits off the next `len` bytes as an independent reader
    pub fn sub_reader(&mut self, len: usize, context: &'static str) -> Result<ByteReader<'a>, FormatError> {
        let base = self.offset();
        let data = self.read_bytes(len, context)?;
        Ok(ByteReader { data, pos: 0, base })
    }

    /// Reads a base-128 variable-length quantity (high bit = continuation)
    pub fn read_varlen(&mut self, context: &'static str) -> Result<u32, FormatError> {
        let start = self.offset();
        let mut value: u32 = 0;
        for _ in 0..4 {
            let byte = self.read_u8(context)?;
            value = (value << 7) | u32::from(byte & 0x7F);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(FormatError::VarLenTooLong { offset: start })
    }

    fn truncated(&self, context: &'static str) -> FormatError {
        FormatError::Truncated {
            context,
            offset: self.offset(),
        }
    }
}

/// Decodes a standalone variable-length quantity
pub fn read_varlen(bytes: &[u8]) -> Result<u32, FormatError> {
    ByteReader::new(bytes).read_varlen("variable-length quantity")
}
