use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};

use super::AxmlError;

/// Little-endian reader over a borrowed buffer.
///
/// Every read either advances the position by exactly its width or fails with
/// [`AxmlError::Truncated`] leaving the position untouched.
pub struct ByteCursor<'a> {
    inner: Cursor<&'a [u8]>,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            inner: Cursor::new(data),
        }
    }

    pub fn position(&self) -> usize {
        self.inner.position() as usize
    }

    pub fn len(&self) -> usize {
        self.inner.get_ref().len()
    }

    pub fn remaining(&self) -> usize {
        self.len().saturating_sub(self.position())
    }

    pub fn has_remaining(&self) -> bool {
        self.remaining() > 0
    }

    pub fn seek(&mut self, target: usize) -> Result<(), AxmlError> {
        if target > self.len() {
            return Err(AxmlError::SeekOutOfBounds {
                target,
                len: self.len(),
            });
        }
        self.inner.set_position(target as u64);
        Ok(())
    }

    fn ensure(&self, needed: usize) -> Result<(), AxmlError> {
        if self.remaining() < needed {
            return Err(AxmlError::Truncated {
                offset: self.position(),
                needed,
            });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, AxmlError> {
        self.ensure(1)?;
        self.inner.read_u8().map_err(|_| self.truncated(1))
    }

    pub fn read_u16(&mut self) -> Result<u16, AxmlError> {
        self.ensure(2)?;
        self.inner
            .read_u16::<LittleEndian>()
            .map_err(|_| self.truncated(2))
    }

    pub fn read_u32(&mut self) -> Result<u32, AxmlError> {
        self.ensure(4)?;
        self.inner
            .read_u32::<LittleEndian>()
            .map_err(|_| self.truncated(4))
    }

    pub fn read_i32(&mut self) -> Result<i32, AxmlError> {
        self.ensure(4)?;
        self.inner
            .read_i32::<LittleEndian>()
            .map_err(|_| self.truncated(4))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], AxmlError> {
        self.ensure(len)?;
        let start = self.position();
        let data: &'a [u8] = *self.inner.get_ref();
        self.inner.set_position((start + len) as u64);
        Ok(&data[start..start + len])
    }

    /// Reads `count` consecutive `u16` code units.
    pub fn read_u16_units(&mut self, count: usize) -> Result<Vec<u16>, AxmlError> {
        let needed = count.checked_mul(2).ok_or(AxmlError::Truncated {
            offset: self.position(),
            needed: usize::MAX,
        })?;
        self.ensure(needed)?;
        let mut units = vec![0u16; count];
        self.inner
            .read_u16_into::<LittleEndian>(&mut units)
            .map_err(|_| self.truncated(needed))?;
        Ok(units)
    }

    fn truncated(&self, needed: usize) -> AxmlError {
        AxmlError::Truncated {
            offset: self.position(),
            needed,
        }
    }
}
