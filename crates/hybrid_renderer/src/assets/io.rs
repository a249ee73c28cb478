//! Little-endian readers and writers shared by the binary formats

use super::FormatError;

pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub(crate) fn magic(&mut self, expected: [u8; 4]) -> Result<(), FormatError> {
        let found: [u8; 4] = self.array("magic")?;
        if found == expected {
            Ok(())
        } else {
            Err(FormatError::BadMagic { expected, found })
        }
    }

    pub(crate) fn take(&mut self, len: usize, field: &'static str) -> Result<&'a [u8], FormatError> {
        if self.bytes.len() < len {
            return Err(FormatError::Truncated(field));
        }
        let (head, tail) = self.bytes.split_at(len);
        self.bytes = tail;
        Ok(head)
    }

    pub(crate) fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], FormatError> {
        let mut out = [0; N];
        out.copy_from_slice(self.take(N, field)?);
        Ok(out)
    }

    pub(crate) fn u8(&mut self, field: &'static str) -> Result<u8, FormatError> {
        Ok(self.array::<1>(field)?[0])
    }

    pub(crate) fn u32(&mut self, field: &'static str) -> Result<u32, FormatError> {
        Ok(u32::from_le_bytes(self.array(field)?))
    }

    pub(crate) fn f32(&mut self, field: &'static str) -> Result<f32, FormatError> {
        Ok(f32::from_le_bytes(self.array(field)?))
    }

    pub(crate) fn f32s<const N: usize>(&mut self, field: &'static str) -> Result<[f32; N], FormatError> {
        let mut out = [0.0; N];
        for value in &mut out {
            *value = self.f32(field)?;
        }
        Ok(out)
    }

    /// Read a count of records of `record_size` bytes, rejecting counts the input cannot hold
    pub(crate) fn count(&mut self, field: &'static str, record_size: usize) -> Result<usize, FormatError> {
        let count = self.u32(field)?;
        let needed = (count as usize).checked_mul(record_size);
        match needed {
            Some(bytes) if bytes <= self.bytes.len() => Ok(count as usize),
            _ => Err(FormatError::InvalidCount { field, count }),
        }
    }

    pub(crate) fn finish(self) -> Result<(), FormatError> {
        if self.bytes.is_empty() {
            Ok(())
        } else {
            Err(FormatError::TrailingBytes(self.bytes.len()))
        }
    }
}

#[derive(Default)]
pub(crate) struct Writer {
    bytes: Vec<u8>,
}

impl Writer {
    pub(crate) fn bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    pub(crate) fn u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub(crate) fn u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn count(&mut self, len: usize) {
        // counts are u32 on disk
        self.u32(len as u32);
    }

    pub(crate) fn f32(&mut self, value: f32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn f32s(&mut self, values: &[f32]) {
        for value in values {
            self.f32(*value);
        }
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
