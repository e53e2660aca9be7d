use super::{cursor::ByteCursor, AxmlError};

const UTF8_FLAG: u32 = 0x0000_0100;

/// Strings referenced by index from every other chunk of a document.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StringPool {
    strings: Vec<String>,
}

impl StringPool {
    /// Parses a string pool chunk. `cursor` must sit right after the chunk
    /// header; on success it is left at `chunk_start + chunk_size`.
    pub fn read(
        cursor: &mut ByteCursor<'_>,
        chunk_start: usize,
        chunk_size: usize,
    ) -> Result<Self, AxmlError> {
        let string_count = cursor.read_u32()? as usize;
        let _style_count = cursor.read_u32()?;
        let flags = cursor.read_u32()?;
        let strings_start = cursor.read_u32()? as usize;
        let _styles_start = cursor.read_u32()?;
        let utf8 = flags & UTF8_FLAG != 0;

        // A corrupt count must not turn into a huge allocation.
        if string_count > cursor.remaining() / 4 {
            return Err(AxmlError::Truncated {
                offset: cursor.position(),
                needed: string_count.saturating_mul(4),
            });
        }
        let offsets = (0..string_count)
            .map(|_| cursor.read_u32())
            .collect::<Result<Vec<_>, _>>()?;

        let base = chunk_start + strings_start;
        let mut strings = Vec::with_capacity(string_count);
        for offset in offsets {
            cursor.seek(base + offset as usize)?;
            let string = if utf8 {
                read_utf8(cursor)?
            } else {
                read_utf16(cursor)?
            };
            strings.push(string);
        }
        log::debug!(
            "string pool: {} {} strings",
            strings.len(),
            if utf8 { "UTF-8" } else { "UTF-16" }
        );

        cursor.seek(chunk_start + chunk_size)?;
        Ok(Self { strings })
    }

    pub fn get(&self, index: u32) -> Option<&str> {
        self.strings.get(index as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl From<Vec<String>> for StringPool {
    fn from(strings: Vec<String>) -> Self {
        Self { strings }
    }
}

fn read_utf8_length(cursor: &mut ByteCursor<'_>) -> Result<usize, AxmlError> {
    let first = cursor.read_u8()? as usize;
    if first & 0x80 == 0 {
        return Ok(first);
    }
    let second = cursor.read_u8()? as usize;
    Ok((first & 0x7f) << 8 | second)
}

fn read_utf8(cursor: &mut ByteCursor<'_>) -> Result<String, AxmlError> {
    let _char_count = read_utf8_length(cursor)?;
    let byte_len = read_utf8_length(cursor)?;
    let bytes = cursor.read_bytes(byte_len)?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

fn read_utf16(cursor: &mut ByteCursor<'_>) -> Result<String, AxmlError> {
    let first = cursor.read_u16()? as usize;
    let len = if first & 0x8000 == 0 {
        first
    } else {
        let second = cursor.read_u16()? as usize;
        (first & 0x7fff) << 16 | second
    };
    let units = cursor.read_u16_units(len)?;
    Ok(String::from_utf16_lossy(&units))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axml::fixture::string_pool_chunk;

    fn parse(chunk: &[u8]) -> (StringPool, usize) {
        let mut cursor = ByteCursor::new(chunk);
        cursor.seek(8).unwrap();
        let size = u32::from_le_bytes(chunk[4..8].try_into().unwrap()) as usize;
        let pool = StringPool::read(&mut cursor, 0, size).unwrap();
        (pool, cursor.position())
    }

    #[test]
    fn utf8_strings_are_recoverable_by_index() {
        let chunk = string_pool_chunk(&["a", "bb", ""], true);
        let (pool, end) = parse(&chunk);
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.get(0), Some("a"));
        assert_eq!(pool.get(1), Some("bb"));
        assert_eq!(pool.get(2), Some(""));
        assert_eq!(end, chunk.len());
    }

    #[test]
    fn utf16_strings_are_recoverable_by_index() {
        let chunk = string_pool_chunk(&["manifest", "äpfel", "日本"], false);
        let (pool, end) = parse(&chunk);
        assert_eq!(pool.get(0), Some("manifest"));
        assert_eq!(pool.get(1), Some("äpfel"));
        assert_eq!(pool.get(2), Some("日本"));
        assert_eq!(end, chunk.len());
    }

    #[test]
    fn out_of_range_index_is_absent() {
        let pool = StringPool::from(vec!["only".to_string()]);
        assert_eq!(pool.get(1), None);
        assert_eq!(pool.get(u32::MAX), None);
    }

    #[test]
    fn long_utf8_string_uses_two_byte_lengths() {
        let long = "x".repeat(300);
        let chunk = string_pool_chunk(&[long.as_str(), "tail"], true);
        let (pool, _) = parse(&chunk);
        assert_eq!(pool.get(0), Some(long.as_str()));
        assert_eq!(pool.get(1), Some("tail"));
    }

    #[test]
    fn cursor_lands_on_chunk_end_when_padding_follows() {
        let mut chunk = string_pool_chunk(&["a"], true);
        chunk.extend_from_slice(&[0u8; 8]);
        let size = chunk.len() as u32;
        chunk[4..8].copy_from_slice(&size.to_le_bytes());
        let (_, end) = parse(&chunk);
        assert_eq!(end, chunk.len());
    }

    #[test]
    fn truncated_body_fails() {
        let chunk = string_pool_chunk(&["abcdef"], true);
        let cut = &chunk[..chunk.len() - 8];
        let mut cursor = ByteCursor::new(cut);
        cursor.seek(8).unwrap();
        assert!(StringPool::read(&mut cursor, 0, chunk.len()).is_err());
    }
}
