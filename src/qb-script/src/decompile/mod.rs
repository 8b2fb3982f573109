//! Script bytecode decompiler
//!
//! A linear annotator: one forward pass over the payload that turns each
//! opcode into a text fragment. Lines are prefixed with the payload offset
//! of the newline opcode that started them. Unknown opcodes are reported
//! inline and skipped; the only fatal condition is a struct block whose
//! `01 00` sentinel is missing.

pub mod opcode;
pub mod structure;

use std::io::{self, Cursor, Seek, SeekFrom};

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};

use crate::key::QbKey;
use crate::names::Names;
use crate::{Error, Result};

pub use opcode::{Opcode, Operand};
pub use structure::{ArrayType, StructDecoder, ValueType};

/// One indentation level
const INDENT: &str = "    ";

/// Render a payload as pseudo-source
///
/// Checksums resolve through `names`, falling back to `$XXXXXXXX`.
pub fn decompile(payload: &[u8], names: &Names) -> Result<String> {
    let mut decompiler = Decompiler::new(payload, names);
    decompiler.run()?;
    Ok(decompiler.finish())
}

/// Output line under construction
#[derive(Debug)]
struct LineBuffer {
    /// Payload offset of the newline opcode, absent for the first line
    offset: Option<usize>,
    indent: usize,
    text: String,
}

impl LineBuffer {
    fn new(offset: Option<usize>, indent: usize) -> Self {
        Self {
            offset,
            indent,
            text: String::new(),
        }
    }

    fn push(&mut self, c: char) {
        self.text.push(c);
    }

    fn push_str(&mut self, s: &str) {
        self.text.push_str(s);
    }

    /// Remove one indentation unit, used by keywords that close or split a block
    fn strip_indent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    /// Column at which the line's text starts
    fn text_column(&self) -> usize {
        match self.offset {
            Some(_) => 4 + self.indent * INDENT.len(),
            None => 0,
        }
    }

    fn render_into(&self, out: &mut String) {
        if let Some(offset) = self.offset {
            out.push_str(&format!("{:04X}", offset));
            for _ in 0..self.indent {
                out.push_str(INDENT);
            }
        }
        out.push_str(&self.text);
        out.push('\n');
    }
}

struct Decompiler<'a> {
    data: &'a [u8],
    cursor: Cursor<&'a [u8]>,
    names: &'a Names<'a>,
    depth: i32,
    line: LineBuffer,
    out: String,
}

impl<'a> Decompiler<'a> {
    fn new(data: &'a [u8], names: &'a Names<'a>) -> Self {
        Self {
            data,
            cursor: Cursor::new(data),
            names,
            depth: 0,
            line: LineBuffer::new(None, 0),
            out: String::new(),
        }
    }

    fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    fn run(&mut self) -> Result<()> {
        while self.position() < self.data.len() {
            let start = self.position();
            let byte = self.cursor.read_u8()?;

            match Opcode::from_byte(byte) {
                Some(op) => match self.opcode(op, start) {
                    Ok(()) => {}
                    Err(Error::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                        tracing::trace!(offset = start, opcode = byte, "operand runs past end");
                        self.line
                            .push_str(&format!("{{[TRUNCATED OPCODE {:02X}]}}", byte));
                        break;
                    }
                    Err(e) => return Err(e),
                },
                None => {
                    tracing::trace!(offset = start, opcode = byte, "unknown opcode");
                    self.line
                        .push_str(&format!("{{[UNKNOWN OPCODE {:02X}]}}", byte));
                }
            }

            self.line.push(' ');
        }

        Ok(())
    }

    fn finish(mut self) -> String {
        self.line.render_into(&mut self.out);
        tracing::debug!(
            bytes = self.data.len(),
            lines = self.out.lines().count(),
            "Decompiled script"
        );
        self.out.trim_matches(&[' ', '\n', '\r'][..]).to_string()
    }

    fn opcode(&mut self, op: Opcode, start: usize) -> Result<()> {
        if op == Opcode::EndOfLine {
            let next = LineBuffer::new(Some(start), self.depth.max(0) as usize);
            std::mem::replace(&mut self.line, next).render_into(&mut self.out);
            return Ok(());
        }

        if op.outdents() {
            self.line.strip_indent();
        }
        self.depth += op.depth_change();
        self.line.push_str(op.text());

        let text = match op.operand() {
            Operand::None => return Ok(()),
            Operand::Skip(n) => {
                self.read_bytes(n)?;
                return Ok(());
            }
            Operand::Key => {
                let key = QbKey(self.cursor.read_u32::<LittleEndian>()?);
                self.names.resolve(key).into_owned()
            }
            Operand::Integer => self.cursor.read_i32::<LittleEndian>()?.to_string(),
            Operand::Hex => format!("0x{:X}", self.cursor.read_u32::<LittleEndian>()?),
            Operand::Float => format!("{:.2}", self.cursor.read_f32::<LittleEndian>()?),
            Operand::Vector2 => self.vector(2)?,
            Operand::Vector3 => self.vector(3)?,
            Operand::String => {
                let bytes = self.length_prefixed()?;
                let text: String = bytes
                    .iter()
                    .map(|&b| if b.is_ascii() { b as char } else { '?' })
                    .collect();
                format!("'{}'", text.trim_end_matches('\0'))
            }
            Operand::WideString => {
                let bytes = self.length_prefixed()?;
                let units: Vec<u16> = bytes.chunks_exact(2).map(BigEndian::read_u16).collect();
                let text = String::from_utf16_lossy(&units);
                format!("\"{}\"", text.trim_end_matches('\0'))
            }
            Operand::Jump => {
                let rel = self.cursor.read_u32::<LittleEndian>()? as u64;
                format!("{:04X}", start as u64 + rel + 5)
            }
            Operand::ChoiceTable => self.choice_table()?,
            Operand::StructBlock => self.struct_block()?,
        };

        self.line.push_str(&text);
        Ok(())
    }

    /// Borrow the next `len` bytes, failing without allocation when short
    fn read_bytes(&mut self, len: usize) -> io::Result<&'a [u8]> {
        let start = self.position();
        let data: &'a [u8] = self.data;
        let bytes = start
            .checked_add(len)
            .and_then(|end| data.get(start..end))
            .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))?;
        self.cursor.set_position((start + len) as u64);
        Ok(bytes)
    }

    fn length_prefixed(&mut self) -> io::Result<&'a [u8]> {
        let len = self.cursor.read_i32::<LittleEndian>()?.max(0) as usize;
        self.read_bytes(len)
    }

    fn vector(&mut self, count: usize) -> io::Result<String> {
        let mut parts = Vec::with_capacity(count);
        for _ in 0..count {
            parts.push(format!("{:.2}", self.cursor.read_f32::<LittleEndian>()?));
        }
        Ok(format!("({})", parts.join(", ")))
    }

    /// `(target#weight, ...)`, targets relative to the end of their own field
    fn choice_table(&mut self) -> io::Result<String> {
        let count = self.cursor.read_u32::<LittleEndian>()? as usize;
        let remaining = self.data.len() - self.position();
        if count.saturating_mul(6) > remaining {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }

        let mut weights = Vec::with_capacity(count);
        for _ in 0..count {
            weights.push(self.cursor.read_u16::<LittleEndian>()?);
        }

        let mut choices = Vec::with_capacity(count);
        for weight in weights {
            let rel = self.cursor.read_u32::<LittleEndian>()? as u64;
            let target = rel + self.cursor.position();
            choices.push(format!("{:04X}#{}", target, weight));
        }

        Ok(format!("({})", choices.join(", ")))
    }

    /// Embedded struct block: i16 length, zero fill, `01 00` sentinel
    fn struct_block(&mut self) -> Result<String> {
        let length = match self.cursor.read_i16::<LittleEndian>() {
            Ok(length) => length,
            Err(_) => return Err(self.sentinel_error(Vec::new())),
        };

        let rest = &self.data[self.position()..];
        let zeros = rest.iter().take_while(|&&b| b == 0).count();
        self.cursor.seek(SeekFrom::Current(zeros as i64))?;

        let found_at = self.position();
        let found = &self.data[found_at..(found_at + 2).min(self.data.len())];
        if found != [0x01, 0x00] {
            return Err(self.sentinel_error(found.to_vec()));
        }

        let sentinel_end = found_at + 2;
        let block_start = sentinel_end.saturating_sub(4);
        let indent = " ".repeat(self.line.text_column() + 1);
        let text = StructDecoder::new(self.data, block_start, self.names).render(&indent);

        // A bogus length must still move the scan forward
        let resume = (block_start as i64 + i64::from(length)).max(sentinel_end as i64);
        self.cursor.set_position(resume as u64);

        Ok(text)
    }

    fn sentinel_error(&self, found: Vec<u8>) -> Error {
        Error::StructSentinel {
            offset: self.position(),
            found,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::structure::tests::BlockBuilder;
    use super::*;
    use crate::names::NameTable;
    use crate::ErrorKind;

    fn render(payload: &[u8]) -> String {
        decompile(payload, &Names::none()).unwrap()
    }

    fn lines(text: &str) -> Vec<&str> {
        text.lines().map(str::trim_end).collect()
    }

    #[test]
    fn test_minimal_program() {
        assert_eq!(render(&[0x01, 0x24]), "0000 endscript");
    }

    #[test]
    fn test_empty_payload() {
        assert_eq!(render(&[]), "");
    }

    #[test]
    fn test_unknown_opcode_continues() {
        let text = render(&[0x63, 0x01, 0x24]);
        assert!(text.contains("{[UNKNOWN OPCODE 63]}"));
        assert!(text.ends_with("0001 endscript"));
    }

    #[test]
    fn test_script_body_indentation() {
        let payload = [0x01, 0x23, 0x16, 0x01, 0x00, 0x00, 0x00, 0x01, 0x22, 0x01, 0x24];

        let text = render(&payload);
        assert_eq!(
            lines(&text),
            ["0000 script $00000001", "0007     break", "0009 endscript"]
        );

        let table: NameTable = [(QbKey(1), "intro")].into_iter().collect();
        let text = decompile(&payload, &Names::none().with_global(&table)).unwrap();
        assert!(text.starts_with("0000 script intro"));
    }

    #[test]
    fn test_switch_indentation() {
        // newline switch, newline case, newline break, newline endswitch
        let payload = [0x01, 0x3c, 0x01, 0x3e, 0x01, 0x22, 0x01, 0x3d];
        let text = render(&payload);
        assert_eq!(
            lines(&text),
            [
                "0000 switch",
                "0002     case",
                "0004         break",
                "0006     endswitch"
            ]
        );
    }

    #[test]
    fn test_goto() {
        assert_eq!(render(&[0x2e, 0x10, 0x00, 0x00, 0x00]), "goto 0015");
    }

    #[test]
    fn test_choice_table() {
        let payload = [
            0x2f, 0x02, 0x00, 0x00, 0x00, 0x03, 0x00, 0x05, 0x00, 0x10, 0x00, 0x00, 0x00, 0x20,
            0x00, 0x00, 0x00,
        ];
        assert_eq!(render(&payload), "random (001D#3, 0031#5)");
        assert_eq!(render(&[0x2f, 0x00, 0x00, 0x00, 0x00]), "random ()");
    }

    #[test]
    fn test_literals() {
        let mut payload = vec![0x17];
        payload.extend_from_slice(&(-2i32).to_le_bytes());
        payload.push(0x09);
        payload.push(0x18);
        payload.extend_from_slice(&0xffu32.to_le_bytes());
        payload.push(0x09);
        payload.push(0x1a);
        payload.extend_from_slice(&1.5f32.to_le_bytes());
        payload.push(0x1f);
        payload.extend_from_slice(&1.0f32.to_le_bytes());
        payload.extend_from_slice(&(-0.25f32).to_le_bytes());

        let text = render(&payload);
        assert!(text.starts_with("-2"));
        assert!(text.contains("0xFF"));
        assert!(text.contains("1.50"));
        assert!(text.ends_with("(1.00, -0.25)"));
    }

    #[test]
    fn test_string_literals() {
        let mut payload = vec![0x1b, 0x06, 0x00, 0x00, 0x00];
        payload.extend_from_slice(b"intro\0");
        payload.extend_from_slice(&[0x4c, 0x06, 0x00, 0x00, 0x00]);
        payload.extend_from_slice(&[0x00, b'H', 0x00, b'i', 0x00, 0x00]);

        assert_eq!(render(&payload), "'intro' \"Hi\"");
    }

    #[test]
    fn test_truncated_operand() {
        let text = render(&[0x01, 0x16, 0x01, 0x02]);
        assert!(text.ends_with("{[TRUNCATED OPCODE 16]}"));

        let text = render(&[0x1b, 0xff, 0x00, 0x00, 0x00, b'a']);
        assert_eq!(text, "{[TRUNCATED OPCODE 1B]}");
    }

    #[test]
    fn test_struct_block() {
        let mut block = BlockBuilder::new();
        block.list(4, &[(0x0081_0000, 0x10, 7)]);

        let mut payload = vec![0x01, 0x4a];
        payload.extend_from_slice(&(block.bytes.len() as i16).to_le_bytes());
        payload.extend_from_slice(&block.bytes);
        payload.extend_from_slice(&[0x01, 0x24]);

        let text = render(&payload);
        assert!(text.starts_with("0000 (QbStruct) {"));
        assert!(text.contains("int $00000010 = 7;"));
        assert!(text.ends_with("endscript"));
        assert!(!text.contains("UNKNOWN"));
    }

    #[test]
    fn test_struct_sentinel_missing() {
        let err = decompile(&[0x4a, 0x04, 0x00, 0x00, 0x00, 0x02, 0x00], &Names::none())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert!(matches!(
            err,
            Error::StructSentinel { offset: 5, ref found } if found == &[0x02, 0x00]
        ));

        let err = decompile(&[0x4a, 0x04, 0x00, 0x00, 0x00], &Names::none()).unwrap_err();
        assert!(matches!(err, Error::StructSentinel { .. }));

        let err = decompile(&[0x4a, 0x04], &Names::none()).unwrap_err();
        assert!(matches!(err, Error::StructSentinel { .. }));
    }

    #[test]
    fn test_total_on_noise() {
        let mut state = 0x2545_f491u32;
        for len in [1usize, 7, 64, 512, 4096] {
            let payload: Vec<u8> = (0..len)
                .map(|_| {
                    state ^= state << 13;
                    state ^= state >> 17;
                    state ^= state << 5;
                    match state as u8 {
                        0x4a => 0x00,
                        b => b,
                    }
                })
                .collect();
            assert!(decompile(&payload, &Names::none()).is_ok());
        }
    }
}
