use std::borrow::Cow;

use super::string_pool::StringPool;

pub const TYPE_REFERENCE: u8 = 0x01;
pub const TYPE_STRING: u8 = 0x03;
pub const TYPE_INT_DEC: u8 = 0x10;
pub const TYPE_INT_HEX: u8 = 0x11;
pub const TYPE_INT_BOOLEAN: u8 = 0x12;

/// Attribute value as stored in a start-tag chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypedValue {
    pub raw: i32,
    pub type_tag: u8,
}

impl TypedValue {
    /// Builds a value from the packed `Res_value` header word (type in the
    /// high byte) and its data word.
    pub fn from_packed(packed: u32, raw: i32) -> Self {
        Self {
            raw,
            type_tag: (packed >> 24) as u8,
        }
    }

    /// Renders the value; `string_index` is the attribute's raw string
    /// reference, used only for string-typed values.
    pub fn render<'a>(&self, string_index: u32, pool: &'a StringPool) -> Cow<'a, str> {
        match self.type_tag {
            TYPE_STRING => Cow::Borrowed(pool.get(string_index).unwrap_or("?")),
            TYPE_INT_BOOLEAN => Cow::Borrowed(if self.raw != 0 { "true" } else { "false" }),
            TYPE_INT_HEX => Cow::Owned(format!("0x{}", signed_hex(self.raw))),
            TYPE_REFERENCE => Cow::Owned(format!("@0x{}", signed_hex(self.raw))),
            TYPE_INT_DEC => Cow::Owned(self.raw.to_string()),
            _ => Cow::Owned(self.raw.to_string()),
        }
    }
}

/// Lowercase hex with a leading `-` for negative values, so `-1` is `-1`
/// rather than `ffffffff`.
fn signed_hex(value: i32) -> String {
    let magnitude = i64::from(value).unsigned_abs();
    if value < 0 {
        format!("-{magnitude:x}")
    } else {
        format!("{magnitude:x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(type_tag: u8, raw: i32) -> String {
        let pool = StringPool::from(vec!["hello".to_string()]);
        TypedValue { raw, type_tag }.render(0, &pool).into_owned()
    }

    #[test]
    fn renders_each_type() {
        assert_eq!(render(TYPE_STRING, 0), "hello");
        assert_eq!(render(TYPE_INT_BOOLEAN, 0), "false");
        assert_eq!(render(TYPE_INT_BOOLEAN, -1), "true");
        assert_eq!(render(TYPE_INT_HEX, 0x7f), "0x7f");
        assert_eq!(render(TYPE_REFERENCE, 0x7f04_0001), "@0x7f040001");
        assert_eq!(render(TYPE_INT_DEC, -12), "-12");
        assert_eq!(render(0x04, 1_065_353_216), "1065353216");
    }

    #[test]
    fn negative_hex_keeps_its_sign() {
        assert_eq!(render(TYPE_INT_HEX, -1), "0x-1");
        assert_eq!(render(TYPE_INT_HEX, -255), "0x-ff");
        assert_eq!(render(TYPE_INT_HEX, i32::MIN), "0x-80000000");
        assert_eq!(render(TYPE_REFERENCE, -16), "@0x-10");
    }

    #[test]
    fn unresolved_string_renders_placeholder() {
        let pool = StringPool::default();
        let value = TypedValue::from_packed(0x0300_0008, 5);
        assert_eq!(value.type_tag, TYPE_STRING);
        assert_eq!(value.render(5, &pool), "?");
    }
}
