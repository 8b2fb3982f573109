//! Struct blocks embedded in script bytecode
//!
//! A struct block is a linked list of typed key/value entries. Every offset
//! is relative to the block start and every field is big-endian, whatever
//! the container's byte order.
//!
//! Entry layout:
//! - Bytes 0-3: Value type tag
//! - Bytes 4-7: Key checksum
//! - Bytes 8-11: Value, or offset of the value
//! - Bytes 12-15: Offset of the next entry (0 ends the list)

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt::Write as _;

use byteorder::{BigEndian, ByteOrder};
use memchr::memchr;

use crate::key::QbKey;
use crate::names::Names;

/// Header word in front of every (nested) struct
pub const STRUCT_HEADER: u32 = 0x0000_0100;

/// Indentation unit for struct entries
const INDENT: &str = "    ";

/// Nested structs and arrays deeper than this are not followed
const MAX_NESTING: usize = 32;

/// Output budget for one block, in bytes
const MAX_OUTPUT: usize = 1 << 20;

/// Charged against the budget for every value, on top of its text
const VALUE_COST: usize = 16;

/// Value types of struct entries (`0x00XX0000` with the high bit of `XX` set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Integer,
    Float,
    String,
    WString,
    Vector2,
    Vector3,
    Struct,
    Array,
    Key,
    KeyRef,
    StrPtr,
    StrQs,
}

impl ValueType {
    pub fn from_tag(tag: u32) -> Option<Self> {
        let ty = match tag {
            0x0081_0000 => ValueType::Integer,
            0x0082_0000 => ValueType::Float,
            0x0083_0000 => ValueType::String,
            0x0084_0000 => ValueType::WString,
            0x0085_0000 => ValueType::Vector2,
            0x0086_0000 => ValueType::Vector3,
            0x008a_0000 => ValueType::Struct,
            0x008c_0000 => ValueType::Array,
            0x008d_0000 => ValueType::Key,
            0x009a_0000 => ValueType::KeyRef,
            0x009b_0000 => ValueType::StrPtr,
            0x009c_0000 => ValueType::StrQs,
            _ => return None,
        };
        Some(ty)
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueType::Integer => "int",
            ValueType::Float => "float",
            ValueType::String => "string",
            ValueType::WString => "wstring",
            ValueType::Vector2 => "vector2",
            ValueType::Vector3 => "vector3",
            ValueType::Struct => "struct",
            ValueType::Array => "array",
            ValueType::Key => "qbkey",
            ValueType::KeyRef => "qbkeyref",
            ValueType::StrPtr => "strptr",
            ValueType::StrQs => "strqs",
        }
    }

    /// Value type of an array's elements
    pub fn from_array_type(ty: ArrayType) -> Option<Self> {
        ARRAY_ELEMENT_TYPES
            .iter()
            .find(|(array, _)| *array == ty)
            .map(|&(_, value)| value)
    }
}

/// Element types of arrays (`0x0001XX00`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayType {
    Integer,
    Float,
    String,
    WString,
    Vector2,
    Vector3,
    Struct,
    Array,
    Key,
    KeyRef,
    StrPtr,
    StrQs,
}

impl ArrayType {
    pub fn from_tag(tag: u32) -> Option<Self> {
        let ty = match tag {
            0x0001_0100 => ArrayType::Integer,
            0x0001_0200 => ArrayType::Float,
            0x0001_0300 => ArrayType::String,
            0x0001_0400 => ArrayType::WString,
            0x0001_0500 => ArrayType::Vector2,
            0x0001_0600 => ArrayType::Vector3,
            0x0001_0a00 => ArrayType::Struct,
            0x0001_0c00 => ArrayType::Array,
            0x0001_0d00 => ArrayType::Key,
            0x0001_1a00 => ArrayType::KeyRef,
            0x0001_1b00 => ArrayType::StrPtr,
            0x0001_1c00 => ArrayType::StrQs,
            _ => return None,
        };
        Some(ty)
    }
}

const ARRAY_ELEMENT_TYPES: [(ArrayType, ValueType); 12] = [
    (ArrayType::Integer, ValueType::Integer),
    (ArrayType::Float, ValueType::Float),
    (ArrayType::String, ValueType::String),
    (ArrayType::WString, ValueType::WString),
    (ArrayType::Vector2, ValueType::Vector2),
    (ArrayType::Vector3, ValueType::Vector3),
    (ArrayType::Struct, ValueType::Struct),
    (ArrayType::Array, ValueType::Array),
    (ArrayType::Key, ValueType::Key),
    (ArrayType::KeyRef, ValueType::KeyRef),
    (ArrayType::StrPtr, ValueType::StrPtr),
    (ArrayType::StrQs, ValueType::StrQs),
];

/// Renders one struct block
pub struct StructDecoder<'a> {
    data: &'a [u8],
    block_start: usize,
    names: &'a Names<'a>,
    /// Structs and arrays on the current render path, by header position
    active: RefCell<HashSet<usize>>,
    budget: Cell<usize>,
}

impl<'a> StructDecoder<'a> {
    /// `block_start` is the position of the block's `00 00 01 00` header
    pub fn new(data: &'a [u8], block_start: usize, names: &'a Names<'a>) -> Self {
        Self {
            data,
            block_start,
            names,
            active: RefCell::new(HashSet::new()),
            budget: Cell::new(MAX_OUTPUT),
        }
    }

    /// Render the whole block, entries indented one unit past `indent`
    pub fn render(&self, indent: &str) -> String {
        let text = self.guarded(self.block_start, || {
            self.render_struct(self.block_start + 4, indent, 0)
        });
        text.trim().to_string()
    }

    /// Render the struct or array at `at` unless it is already being rendered
    fn guarded(&self, at: usize, render: impl FnOnce() -> String) -> String {
        if !self.active.borrow_mut().insert(at) {
            return format!("{{loop at offset {:04X}}}", at.saturating_sub(self.block_start));
        }
        let text = render();
        self.active.borrow_mut().remove(&at);
        text
    }

    /// Take `cost` bytes from the output budget, false once it runs out
    fn charge(&self, cost: usize) -> bool {
        let remaining = self.budget.get();
        self.budget.set(remaining.saturating_sub(cost));
        remaining > 0
    }

    fn read_u32(&self, at: usize) -> Option<u32> {
        self.data.get(at..at.checked_add(4)?).map(BigEndian::read_u32)
    }

    fn read_f32(&self, at: usize) -> Option<f32> {
        self.read_u32(at).map(f32::from_bits)
    }

    fn resolve(&self, at: usize) -> Option<usize> {
        let offset = self.read_u32(at)? as usize;
        self.block_start.checked_add(offset)
    }

    /// Struct whose first-entry offset is stored at `first_at`
    fn render_struct(&self, first_at: usize, indent: &str, level: usize) -> String {
        let mut out = String::from("(QbStruct) {\n");
        let inner = format!("{}{}", indent, INDENT);

        let mut visited = HashSet::new();
        let mut offset = self.read_u32(first_at).unwrap_or(0) as usize;

        while offset != 0 {
            if !visited.insert(offset) {
                let _ = writeln!(out, "{}{{loop at offset {:04X}}}", inner, offset);
                break;
            }

            let entry = self.block_start + offset;
            let (Some(tag), Some(key)) = (self.read_u32(entry), self.read_u32(entry + 4)) else {
                let _ = writeln!(out, "{}{{truncated entry at {:04X}}}", inner, entry);
                break;
            };

            let key = self.names.resolve(QbKey(key));
            let (type_name, value) = match ValueType::from_tag(tag) {
                Some(ty) => (
                    ty.name().to_string(),
                    self.render_value(ty, entry + 8, &inner, level),
                ),
                None => (
                    format!("{{unk type {:08x}}}", tag),
                    self.unknown_value(entry + 8),
                ),
            };
            let _ = writeln!(out, "{}{} {} = {};", inner, type_name, key, value);

            offset = self.read_u32(entry + 12).unwrap_or(0) as usize;
        }

        let _ = write!(out, "{}}}", indent);
        out
    }

    /// Value whose 4-byte slot (immediate or offset) is at `slot`
    fn render_value(&self, ty: ValueType, slot: usize, indent: &str, level: usize) -> String {
        if level >= MAX_NESTING {
            return "{nesting too deep}".to_string();
        }
        if !self.charge(VALUE_COST) {
            return "{output limit reached}".to_string();
        }

        let rendered = match ty {
            ValueType::Integer => self.read_u32(slot).map(|v| (v as i32).to_string()),
            ValueType::Float => self.read_f32(slot).map(|v| format!("{:.2}", v)),
            ValueType::String => self.resolve(slot).map(|at| self.narrow_string(at)),
            ValueType::WString => self.resolve(slot).map(|at| self.wide_string(at)),
            ValueType::Vector2 => self.resolve(slot).and_then(|at| self.floats(at + 4, 2)),
            ValueType::Vector3 => self.resolve(slot).and_then(|at| self.floats(at + 4, 3)),
            ValueType::Struct => self.resolve(slot).map(|at| {
                self.guarded(at, || {
                    let warning = if self.read_u32(at) == Some(STRUCT_HEADER) {
                        ""
                    } else {
                        "{warning: struct header not found}"
                    };
                    format!("{}{}", warning, self.render_struct(at + 4, indent, level + 1))
                })
            }),
            ValueType::Array => self.resolve(slot).map(|at| {
                self.guarded(at, || self.render_array(at, indent, level + 1))
            }),
            ValueType::Key | ValueType::KeyRef | ValueType::StrPtr | ValueType::StrQs => self
                .read_u32(slot)
                .map(|v| self.names.resolve(QbKey(v)).into_owned()),
        };

        let text =
            rendered.unwrap_or_else(|| format!("{{truncated {} at {:04X}}}", ty.name(), slot));
        if !matches!(ty, ValueType::Struct | ValueType::Array) {
            self.charge(text.len());
        }
        text
    }

    fn unknown_value(&self, slot: usize) -> String {
        match self.read_u32(slot) {
            Some(v) => format!("{{unknown value: {:08x}}}", v),
            None => "{unknown value}".to_string(),
        }
    }

    /// Array whose header (element type, count) is at `at`
    fn render_array(&self, at: usize, indent: &str, level: usize) -> String {
        let Some(tag) = self.read_u32(at) else {
            return format!("[{{truncated array at {:04X}}}]", at);
        };
        let Some(ty) = ArrayType::from_tag(tag).and_then(ValueType::from_array_type) else {
            return "[{unknown element type}]".to_string();
        };
        let Some(count) = self.read_u32(at + 4).map(|c| c as usize) else {
            return format!("[{{truncated array at {:04X}}}]", at);
        };

        let elements: Vec<String> = match count {
            0 => Vec::new(),
            1 => vec![self.render_value(ty, at + 8, indent, level)],
            _ => {
                let Some(list) = self.resolve(at + 8) else {
                    return format!("[{{truncated array at {:04X}}}]", at);
                };
                // Each element slot is 4 bytes; never walk past the data
                let available = self.data.len().saturating_sub(list) / 4;
                let mut elements: Vec<String> = (0..count.min(available))
                    .map(|i| self.render_value(ty, list + 4 * i, indent, level))
                    .collect();
                if count > available {
                    elements.push(format!("{{{} more elements truncated}}", count - available));
                }
                elements
            }
        };

        format!("[{}]", elements.join(", "))
    }

    fn narrow_string(&self, at: usize) -> String {
        let bytes = self.data.get(at..).unwrap_or_default();
        let end = memchr(0, bytes).unwrap_or(bytes.len());
        let text: String = bytes[..end]
            .iter()
            .map(|&b| if b.is_ascii() { b as char } else { '?' })
            .collect();
        format!("'{}'", text)
    }

    fn wide_string(&self, at: usize) -> String {
        let bytes = self.data.get(at..).unwrap_or_default();
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(BigEndian::read_u16)
            .take_while(|&u| u != 0)
            .collect();
        format!("\"{}\"", String::from_utf16_lossy(&units))
    }

    fn floats(&self, at: usize, count: usize) -> Option<String> {
        let values = (0..count)
            .map(|i| self.read_f32(at + 4 * i).map(|v| format!("{:.2}", v)))
            .collect::<Option<Vec<_>>>()?;
        Some(format!("({})", values.join(", ")))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::names::NameTable;

    /// Builds a struct block image with big-endian fields
    pub(crate) struct BlockBuilder {
        pub bytes: Vec<u8>,
    }

    impl BlockBuilder {
        /// Header plus a first-entry offset placeholder
        pub fn new() -> Self {
            Self {
                bytes: vec![0x00, 0x00, 0x01, 0x00, 0, 0, 0, 0],
            }
        }

        pub fn pos(&self) -> usize {
            self.bytes.len()
        }

        pub fn put_u32(&mut self, v: u32) -> usize {
            let at = self.pos();
            self.bytes.extend_from_slice(&v.to_be_bytes());
            at
        }

        pub fn patch(&mut self, at: usize, v: u32) {
            self.bytes[at..at + 4].copy_from_slice(&v.to_be_bytes());
        }

        /// Append an entry, returning (entry offset, value slot, next slot)
        pub fn entry(&mut self, tag: u32, key: u32, value: u32) -> (usize, usize, usize) {
            let at = self.put_u32(tag);
            self.put_u32(key);
            let slot = self.put_u32(value);
            let next = self.put_u32(0);
            (at, slot, next)
        }

        /// Append entries linked in order from the first-entry slot at `head`
        pub fn list(&mut self, head: usize, entries: &[(u32, u32, u32)]) -> Vec<usize> {
            let mut link = head;
            let mut slots = Vec::new();
            for &(tag, key, value) in entries {
                let (at, slot, next) = self.entry(tag, key, value);
                self.patch(link, at as u32);
                link = next;
                slots.push(slot);
            }
            slots
        }
    }

    fn render(bytes: &[u8], names: &Names) -> String {
        StructDecoder::new(bytes, 0, names).render("")
    }

    #[test]
    fn test_array_type_mapping() {
        assert_eq!(
            ValueType::from_array_type(ArrayType::Struct),
            Some(ValueType::Struct)
        );
        assert_eq!(
            ArrayType::from_tag(0x0001_0100).and_then(ValueType::from_array_type),
            Some(ValueType::Integer)
        );
        assert_eq!(ArrayType::from_tag(0x0001_0700), None);
        for (array, value) in ARRAY_ELEMENT_TYPES {
            assert_eq!(ValueType::from_array_type(array), Some(value));
        }
    }

    #[test]
    fn test_value_type_tags() {
        assert_eq!(ValueType::from_tag(0x0081_0000), Some(ValueType::Integer));
        assert_eq!(ValueType::from_tag(0x009c_0000), Some(ValueType::StrQs));
        assert_eq!(ValueType::from_tag(0x0087_0000), None);
        assert_eq!(ValueType::Key.name(), "qbkey");
    }

    #[test]
    fn test_empty_struct() {
        let b = BlockBuilder::new();
        assert_eq!(render(&b.bytes, &Names::none()), "(QbStruct) {\n}");
    }

    #[test]
    fn test_scalar_entries() {
        let mut b = BlockBuilder::new();
        b.list(
            4,
            &[
                (0x0081_0000, 0x10, (-5i32) as u32),
                (0x0082_0000, 0x20, 1.5f32.to_bits()),
                (0x008d_0000, 0x30, 0xabcdef01),
            ],
        );

        let table: NameTable = [(QbKey(0x10), "count")].into_iter().collect();
        let names = Names::none().with_global(&table);
        let text = render(&b.bytes, &names);

        assert!(text.starts_with("(QbStruct) {"));
        assert!(text.contains("    int count = -5;"));
        assert!(text.contains("float $00000020 = 1.50;"));
        assert!(text.contains("qbkey $00000030 = $ABCDEF01;"));
        assert!(text.ends_with('}'));
    }

    #[test]
    fn test_pointer_entries() {
        let mut b = BlockBuilder::new();
        let slots = b.list(
            4,
            &[
                (0x0083_0000, 1, 0),
                (0x0084_0000, 2, 0),
                (0x0086_0000, 3, 0),
            ],
        );

        let s = b.pos();
        b.bytes.extend_from_slice(b"intro\0\0\0");
        let w = b.pos();
        b.bytes.extend_from_slice(&[0, b'H', 0, b'i', 0, 0]);
        while b.pos() % 4 != 0 {
            b.bytes.push(0);
        }
        let v = b.put_u32(0x0001_0000);
        for f in [1.0f32, 2.5, -3.0] {
            b.put_u32(f.to_bits());
        }

        b.patch(slots[0], s as u32);
        b.patch(slots[1], w as u32);
        b.patch(slots[2], v as u32);

        let text = render(&b.bytes, &Names::none());
        assert!(text.contains("string $00000001 = 'intro';"));
        assert!(text.contains("wstring $00000002 = \"Hi\";"));
        assert!(text.contains("vector3 $00000003 = (1.00, 2.50, -3.00);"));
    }

    #[test]
    fn test_nested_struct() {
        let mut b = BlockBuilder::new();
        let slots = b.list(4, &[(0x008a_0000, 0x77, 0)]);

        let nested = b.pos();
        b.put_u32(STRUCT_HEADER);
        let head = b.put_u32(0);
        b.list(head, &[(0x0081_0000, 0x78, 9)]);
        b.patch(slots[0], nested as u32);

        let text = render(&b.bytes, &Names::none());
        assert!(text.contains("struct $00000077 = (QbStruct) {"));
        assert!(text.contains("        int $00000078 = 9;"));
        assert!(!text.contains("warning"));
    }

    #[test]
    fn test_nested_struct_missing_header() {
        let mut b = BlockBuilder::new();
        let slots = b.list(4, &[(0x008a_0000, 0x77, 0)]);
        let nested = b.put_u32(0x1234_5678);
        b.put_u32(0);
        b.patch(slots[0], nested as u32);

        let text = render(&b.bytes, &Names::none());
        assert!(text.contains("{warning: struct header not found}(QbStruct) {"));
    }

    #[test]
    fn test_arrays() {
        let mut b = BlockBuilder::new();
        let slots = b.list(
            4,
            &[
                (0x008c_0000, 1, 0),
                (0x008c_0000, 2, 0),
                (0x008c_0000, 3, 0),
                (0x008c_0000, 4, 0),
            ],
        );

        // Single element stored inline
        let one = b.put_u32(0x0001_0100);
        b.put_u32(1);
        b.put_u32(42);

        // Three elements reached through an element list
        let many = b.put_u32(0x0001_0d00);
        b.put_u32(3);
        let list_slot = b.put_u32(0);
        let list = b.pos();
        for k in [0xa, 0xb, 0xc] {
            b.put_u32(k);
        }
        b.patch(list_slot, list as u32);

        let bad = b.put_u32(0x0001_0700);
        b.put_u32(1);
        b.put_u32(0);

        let empty = b.put_u32(0x0001_0100);
        b.put_u32(0);

        b.patch(slots[0], one as u32);
        b.patch(slots[1], many as u32);
        b.patch(slots[2], bad as u32);
        b.patch(slots[3], empty as u32);

        let text = render(&b.bytes, &Names::none());
        assert!(text.contains("array $00000001 = [42];"));
        assert!(text.contains("array $00000002 = [$0000000A, $0000000B, $0000000C];"));
        assert!(text.contains("array $00000003 = [{unknown element type}];"));
        assert!(text.contains("array $00000004 = [];"));
    }

    #[test]
    fn test_unknown_type() {
        let mut b = BlockBuilder::new();
        b.list(4, &[(0x0099_0000, 5, 0xcafe)]);
        let text = render(&b.bytes, &Names::none());
        assert!(text.contains("{unk type 00990000} $00000005 = {unknown value: 0000cafe};"));
    }

    #[test]
    fn test_cycle_terminates() {
        let mut b = BlockBuilder::new();
        let (at, _, next) = b.entry(0x0081_0000, 1, 1);
        b.patch(4, at as u32);
        b.patch(next, at as u32);
        let text = render(&b.bytes, &Names::none());
        assert_eq!(text.matches("int $00000001 = 1;").count(), 1);
        assert!(text.contains("{loop at offset"));
    }

    #[test]
    fn test_self_referencing_array() {
        let mut b = BlockBuilder::new();
        let slots = b.list(4, &[(0x008c_0000, 1, 0)]);

        let header = b.put_u32(0x0001_0c00);
        b.put_u32(2);
        let list_slot = b.put_u32(0);
        let list = b.put_u32(header as u32);
        b.put_u32(header as u32);
        b.patch(list_slot, list as u32);
        b.patch(slots[0], header as u32);

        let text = render(&b.bytes, &Names::none());
        let looped = format!("{{loop at offset {:04X}}}", header);
        assert!(text.contains(&format!("array $00000001 = [{}, {}];", looped, looped)));
    }

    #[test]
    fn test_self_referencing_struct() {
        let mut b = BlockBuilder::new();
        b.list(4, &[(0x008a_0000, 1, 0), (0x008a_0000, 2, 0)]);

        let text = render(&b.bytes, &Names::none());
        assert!(text.contains("struct $00000001 = {loop at offset 0000};"));
        assert!(text.contains("struct $00000002 = {loop at offset 0000};"));
    }

    #[test]
    fn test_shared_arrays_stay_bounded() {
        // Each level lists the next level twice: 2^24 paths without a budget
        let mut b = BlockBuilder::new();
        let slots = b.list(4, &[(0x008c_0000, 1, 0)]);

        let mut headers = Vec::new();
        for _ in 0..24 {
            let header = b.put_u32(0x0001_0c00);
            b.put_u32(2);
            b.put_u32(header as u32 + 12);
            b.put_u32(0);
            b.put_u32(0);
            headers.push(header);
        }
        let leaf = b.put_u32(0x0001_0100);
        b.put_u32(0);

        for (i, &header) in headers.iter().enumerate() {
            let child = headers.get(i + 1).copied().unwrap_or(leaf) as u32;
            b.patch(header + 12, child);
            b.patch(header + 16, child);
        }
        b.patch(slots[0], headers[0] as u32);

        let text = render(&b.bytes, &Names::none());
        assert!(text.contains("{output limit reached}"));
        assert!(text.len() < 2 * MAX_OUTPUT);
        assert!(text.ends_with('}'));
    }

    #[test]
    fn test_offsets_past_end() {
        let mut b = BlockBuilder::new();
        b.patch(4, 0x1000);
        let text = render(&b.bytes, &Names::none());
        assert!(text.contains("{truncated entry at 1000}"));

        let mut b = BlockBuilder::new();
        b.list(4, &[(0x0083_0000, 1, 0xffff_fff0)]);
        let text = render(&b.bytes, &Names::none());
        assert!(text.contains("string $00000001 = '';"));
    }
}
