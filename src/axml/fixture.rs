//! Builder for synthetic binary XML documents used by the tests.

use super::{
    value::{TYPE_INT_BOOLEAN, TYPE_INT_DEC, TYPE_INT_HEX, TYPE_REFERENCE, TYPE_STRING},
    CHUNK_AXML_FILE, CHUNK_END_NAMESPACE, CHUNK_END_TAG, CHUNK_RESOURCE_IDS,
    CHUNK_START_NAMESPACE, CHUNK_START_TAG, CHUNK_STRING_POOL, CHUNK_TEXT,
};

pub const NO_INDEX: u32 = u32::MAX;
pub const ANDROID_NS: &str = "http://schemas.android.com/apk/res/android";

fn push_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn push_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn pad4(buf: &mut Vec<u8>) {
    while buf.len() % 4 != 0 {
        buf.push(0);
    }
}

fn push_utf8_len(buf: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        buf.push(len as u8);
    } else {
        buf.push(0x80 | (len >> 8) as u8);
        buf.push(len as u8);
    }
}

pub fn string_pool_chunk(strings: &[&str], utf8: bool) -> Vec<u8> {
    let mut data = Vec::new();
    let mut offsets = Vec::new();
    for s in strings {
        offsets.push(data.len() as u32);
        if utf8 {
            push_utf8_len(&mut data, s.chars().count());
            push_utf8_len(&mut data, s.len());
            data.extend_from_slice(s.as_bytes());
            data.push(0);
        } else {
            let units: Vec<u16> = s.encode_utf16().collect();
            push_u16(&mut data, units.len() as u16);
            for unit in units {
                push_u16(&mut data, unit);
            }
            push_u16(&mut data, 0);
        }
    }
    pad4(&mut data);

    let mut chunk = Vec::new();
    push_u32(&mut chunk, CHUNK_STRING_POOL);
    push_u32(&mut chunk, 0);
    push_u32(&mut chunk, strings.len() as u32);
    push_u32(&mut chunk, 0);
    push_u32(&mut chunk, if utf8 { 0x100 } else { 0 });
    push_u32(&mut chunk, 28 + 4 * strings.len() as u32);
    push_u32(&mut chunk, 0);
    for offset in offsets {
        push_u32(&mut chunk, offset);
    }
    chunk.extend_from_slice(&data);
    let size = chunk.len() as u32;
    chunk[4..8].copy_from_slice(&size.to_le_bytes());
    chunk
}

/// One attribute of a start-tag chunk.
pub struct Attr {
    pub ns: u32,
    pub name: u32,
    pub raw: u32,
    pub type_tag: u8,
    pub data: i32,
}

impl Attr {
    pub fn string(ns: u32, name: u32, value: u32) -> Self {
        Self {
            ns,
            name,
            raw: value,
            type_tag: TYPE_STRING,
            data: value as i32,
        }
    }

    pub fn typed(ns: u32, name: u32, type_tag: u8, data: i32) -> Self {
        Self {
            ns,
            name,
            raw: NO_INDEX,
            type_tag,
            data,
        }
    }

    pub fn boolean(ns: u32, name: u32, value: bool) -> Self {
        Self::typed(ns, name, TYPE_INT_BOOLEAN, if value { -1 } else { 0 })
    }

    pub fn decimal(ns: u32, name: u32, value: i32) -> Self {
        Self::typed(ns, name, TYPE_INT_DEC, value)
    }

    pub fn hex(ns: u32, name: u32, value: i32) -> Self {
        Self::typed(ns, name, TYPE_INT_HEX, value)
    }

    pub fn reference(ns: u32, name: u32, value: i32) -> Self {
        Self::typed(ns, name, TYPE_REFERENCE, value)
    }
}

/// Assembles chunks in order and wraps them in the file header.
#[derive(Default)]
pub struct DocBuilder {
    body: Vec<u8>,
}

impl DocBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(mut self, chunk: &[u8]) -> Self {
        self.body.extend_from_slice(chunk);
        self
    }

    pub fn strings(self, strings: &[&str]) -> Self {
        let chunk = string_pool_chunk(strings, true);
        self.raw(&chunk)
    }

    pub fn utf16_strings(self, strings: &[&str]) -> Self {
        let chunk = string_pool_chunk(strings, false);
        self.raw(&chunk)
    }

    pub fn resource_ids(self, ids: &[u32]) -> Self {
        let mut chunk = Vec::new();
        push_u32(&mut chunk, CHUNK_RESOURCE_IDS);
        push_u32(&mut chunk, 8 + 4 * ids.len() as u32);
        for id in ids {
            push_u32(&mut chunk, *id);
        }
        self.raw(&chunk)
    }

    fn namespace(self, typ: u32, prefix: u32, uri: u32) -> Self {
        let mut chunk = Vec::new();
        push_u32(&mut chunk, typ);
        push_u32(&mut chunk, 24);
        push_u32(&mut chunk, 1);
        push_u32(&mut chunk, NO_INDEX);
        push_u32(&mut chunk, prefix);
        push_u32(&mut chunk, uri);
        self.raw(&chunk)
    }

    pub fn start_ns(self, prefix: u32, uri: u32) -> Self {
        self.namespace(CHUNK_START_NAMESPACE, prefix, uri)
    }

    pub fn end_ns(self, prefix: u32, uri: u32) -> Self {
        self.namespace(CHUNK_END_NAMESPACE, prefix, uri)
    }

    pub fn start(self, name: u32, attrs: &[Attr]) -> Self {
        let mut chunk = Vec::new();
        push_u32(&mut chunk, CHUNK_START_TAG);
        push_u32(&mut chunk, 36 + 20 * attrs.len() as u32);
        push_u32(&mut chunk, 1);
        push_u32(&mut chunk, NO_INDEX);
        push_u32(&mut chunk, NO_INDEX);
        push_u32(&mut chunk, name);
        push_u16(&mut chunk, 20);
        push_u16(&mut chunk, 20);
        push_u16(&mut chunk, attrs.len() as u16);
        push_u16(&mut chunk, 0);
        push_u16(&mut chunk, 0);
        push_u16(&mut chunk, 0);
        for attr in attrs {
            push_u32(&mut chunk, attr.ns);
            push_u32(&mut chunk, attr.name);
            push_u32(&mut chunk, attr.raw);
            push_u32(&mut chunk, 8 | (attr.type_tag as u32) << 24);
            push_u32(&mut chunk, attr.data as u32);
        }
        self.raw(&chunk)
    }

    pub fn end(self, name: u32) -> Self {
        let mut chunk = Vec::new();
        push_u32(&mut chunk, CHUNK_END_TAG);
        push_u32(&mut chunk, 24);
        push_u32(&mut chunk, 1);
        push_u32(&mut chunk, NO_INDEX);
        push_u32(&mut chunk, NO_INDEX);
        push_u32(&mut chunk, name);
        self.raw(&chunk)
    }

    pub fn text(self, data: u32) -> Self {
        let mut chunk = Vec::new();
        push_u32(&mut chunk, CHUNK_TEXT);
        push_u32(&mut chunk, 28);
        push_u32(&mut chunk, 1);
        push_u32(&mut chunk, NO_INDEX);
        push_u32(&mut chunk, data);
        push_u32(&mut chunk, 8 | (TYPE_STRING as u32) << 24);
        push_u32(&mut chunk, 0);
        self.raw(&chunk)
    }

    pub fn build(self) -> Vec<u8> {
        let mut doc = Vec::with_capacity(self.body.len() + 8);
        push_u32(&mut doc, CHUNK_AXML_FILE);
        push_u32(&mut doc, 8 + self.body.len() as u32);
        doc.extend_from_slice(&self.body);
        doc
    }
}

/// A small manifest: `<manifest package=... android:versionCode=...>` with one
/// `<application android:enabled="true"/>` child.
pub fn sample_manifest() -> Vec<u8> {
    DocBuilder::new()
        .strings(&[
            "android",
            ANDROID_NS,
            "manifest",
            "package",
            "com.example",
            "application",
            "enabled",
            "versionCode",
        ])
        .resource_ids(&[0x0101_000e, 0x0101_021b])
        .start_ns(0, 1)
        .start(
            2,
            &[Attr::string(NO_INDEX, 3, 4), Attr::decimal(1, 7, 7)],
        )
        .start(5, &[Attr::boolean(1, 6, true)])
        .end(5)
        .end(2)
        .end_ns(0, 1)
        .build()
}

pub const SAMPLE_MANIFEST_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<manifest
    xmlns:android="http://schemas.android.com/apk/res/android"
    package="com.example"
    android:versionCode="7">
    <application
        android:enabled="true">
    </application>
</manifest>
"#;
