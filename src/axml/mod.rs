//! Decoder for Android's compiled binary XML (AXML).
//!
//! The chunk stream is walked once, front to back, and rendered straight to
//! indented text. Text nodes are not reproduced and namespace declarations
//! stay in scope for the whole document once seen.

mod cursor;
mod errors;
#[cfg(test)]
pub(crate) mod fixture;
mod string_pool;
mod value;

use std::fmt::Write;

use quick_xml::escape::escape;

pub use self::{
    cursor::ByteCursor, errors::AxmlError, string_pool::StringPool, value::TypedValue,
};

pub(crate) const CHUNK_AXML_FILE: u32 = 0x0008_0003;
pub(crate) const CHUNK_STRING_POOL: u32 = 0x001C_0001;
pub(crate) const CHUNK_RESOURCE_IDS: u32 = 0x0008_0180;
pub(crate) const CHUNK_START_NAMESPACE: u32 = 0x0010_0100;
pub(crate) const CHUNK_END_NAMESPACE: u32 = 0x0010_0101;
pub(crate) const CHUNK_START_TAG: u32 = 0x0010_0102;
pub(crate) const CHUNK_END_TAG: u32 = 0x0010_0103;
pub(crate) const CHUNK_TEXT: u32 = 0x0010_0104;

const CHUNK_HEADER_SIZE: u32 = 8;
const INDENT: &str = "    ";

pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;
const BAD_MAGIC_COMMENT: &str = "<!-- Unable to decode: not a valid Android binary XML file -->";

/// Decodes `buf` to XML text. Never fails: a foreign buffer yields the
/// declaration followed by an explanatory comment on the same line, and a
/// structural failure mid-stream appends a comment to the partial output.
pub fn decode(buf: &[u8]) -> String {
    let mut decoder = Decoder::new(buf);
    match decoder.run() {
        Ok(()) => decoder.output,
        Err(AxmlError::BadMagic(magic)) => {
            log::debug!("not binary XML, magic {magic:#010x}");
            format!("{XML_DECLARATION}{BAD_MAGIC_COMMENT}")
        }
        Err(e) => {
            log::warn!("binary XML decode stopped early: {e}");
            let mut output = decoder.output;
            let _ = write!(output, "\n<!-- Decode error: {e} -->");
            output
        }
    }
}

/// Like [`decode`], but reports any failure instead of rendering it.
pub fn try_decode(buf: &[u8]) -> Result<String, AxmlError> {
    let mut decoder = Decoder::new(buf);
    decoder.run()?;
    Ok(decoder.output)
}

/// Namespace URI to prefix, in declaration order.
#[derive(Debug, Default)]
pub struct NamespaceTable {
    entries: Vec<(String, String)>,
}

impl NamespaceTable {
    pub fn insert(&mut self, uri: &str, prefix: &str) {
        match self.entries.iter_mut().find(|(u, _)| u == uri) {
            Some((_, p)) => *p = prefix.to_string(),
            None => self.entries.push((uri.to_string(), prefix.to_string())),
        }
    }

    pub fn prefix(&self, uri: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(u, _)| u == uri)
            .map(|(_, p)| p.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(u, p)| (u.as_str(), p.as_str()))
    }
}

struct Decoder<'a> {
    cursor: ByteCursor<'a>,
    pool: Option<StringPool>,
    namespaces: NamespaceTable,
    depth: usize,
    output: String,
}

impl<'a> Decoder<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self {
            cursor: ByteCursor::new(buf),
            pool: None,
            namespaces: NamespaceTable::default(),
            depth: 0,
            output: String::new(),
        }
    }

    fn string(&self, index: u32) -> Option<&str> {
        self.pool.as_ref().and_then(|pool| pool.get(index))
    }

    fn run(&mut self) -> Result<(), AxmlError> {
        let magic = self
            .cursor
            .read_u32()
            .map_err(|_| AxmlError::BadMagic(0))?;
        if magic != CHUNK_AXML_FILE {
            return Err(AxmlError::BadMagic(magic));
        }
        self.output.push_str(XML_DECLARATION);
        self.output.push('\n');
        let _file_size = self.cursor.read_u32()?;

        while self.cursor.has_remaining() {
            let start = self.cursor.position();
            let typ = self.cursor.read_u32()?;
            let size = self.cursor.read_u32()?;
            if size < CHUNK_HEADER_SIZE {
                return Err(AxmlError::InvalidChunkSize {
                    offset: start,
                    size,
                });
            }
            let end = start + size as usize;
            log::trace!("chunk {typ:#010x} at {start}, {size} bytes");

            match typ {
                CHUNK_STRING_POOL if self.pool.is_none() => {
                    self.pool = Some(StringPool::read(&mut self.cursor, start, size as usize)?);
                }
                CHUNK_START_NAMESPACE => self.start_namespace()?,
                CHUNK_START_TAG => self.start_tag()?,
                CHUNK_END_TAG => self.end_tag()?,
                CHUNK_STRING_POOL | CHUNK_END_NAMESPACE | CHUNK_RESOURCE_IDS | CHUNK_TEXT => {}
                other => log::debug!("skipping unknown chunk {other:#010x} at {start}"),
            }
            self.cursor.seek(end)?;
        }
        Ok(())
    }

    fn start_namespace(&mut self) -> Result<(), AxmlError> {
        let _line = self.cursor.read_u32()?;
        let _comment = self.cursor.read_u32()?;
        let prefix = self.cursor.read_u32()?;
        let uri = self.cursor.read_u32()?;
        let declared = match (self.string(prefix), self.string(uri)) {
            (Some(prefix), Some(uri)) => Some((prefix.to_string(), uri.to_string())),
            _ => None,
        };
        if let Some((prefix, uri)) = declared {
            self.namespaces.insert(&uri, &prefix);
        }
        Ok(())
    }

    fn start_tag(&mut self) -> Result<(), AxmlError> {
        let _line = self.cursor.read_u32()?;
        let _comment = self.cursor.read_u32()?;
        let _ns = self.cursor.read_u32()?;
        let name = self.cursor.read_u32()?;
        let _attribute_start = self.cursor.read_u16()?;
        let _attribute_size = self.cursor.read_u16()?;
        let attribute_count = self.cursor.read_u16()?;
        let _id_index = self.cursor.read_u16()?;
        let _class_index = self.cursor.read_u16()?;
        let _style_index = self.cursor.read_u16()?;

        let indent = INDENT.repeat(self.depth);
        let mut text = format!("{indent}<{}", self.string(name).unwrap_or("unknown"));

        if self.depth == 0 {
            for (uri, prefix) in self.namespaces.iter() {
                let _ = write!(text, "\n{indent}{INDENT}xmlns:{prefix}=\"{}\"", escape(uri));
            }
        }

        let empty = StringPool::default();
        for i in 0..attribute_count {
            let ns = self.cursor.read_u32()?;
            let attr_name = self.cursor.read_u32()?;
            let raw_string = self.cursor.read_u32()?;
            let packed = self.cursor.read_u32()?;
            let data = self.cursor.read_i32()?;

            let attr_name = match self.string(attr_name) {
                Some(name) => name.to_string(),
                None => format!("attr{i}"),
            };
            let prefix = self
                .string(ns)
                .and_then(|uri| self.namespaces.prefix(uri))
                .map(|p| format!("{p}:"))
                .unwrap_or_default();
            let pool = self.pool.as_ref().unwrap_or(&empty);
            let value = TypedValue::from_packed(packed, data).render(raw_string, pool);
            let _ = write!(
                text,
                "\n{indent}{INDENT}{prefix}{attr_name}=\"{}\"",
                escape(&value)
            );
        }

        text.push_str(">\n");
        self.output.push_str(&text);
        self.depth += 1;
        Ok(())
    }

    fn end_tag(&mut self) -> Result<(), AxmlError> {
        self.depth = self.depth.saturating_sub(1);
        let _line = self.cursor.read_u32()?;
        let _comment = self.cursor.read_u32()?;
        let _ns = self.cursor.read_u32()?;
        let name = self.cursor.read_u32()?;
        let indent = INDENT.repeat(self.depth);
        let name = self.string(name).unwrap_or("unknown").to_string();
        let _ = writeln!(self.output, "{indent}</{name}>");
        Ok(())
    }
}
