//! Hex + character view of a payload

use std::fmt::Write as _;

/// Bytes per row
pub const ROW_WIDTH: usize = 16;

/// Render `bytes` as rows of `XX ` pairs followed by `: ` and the characters
///
/// Each byte maps to the Latin-1 character of the same value; control
/// characters and tab show as `.`. The last row is padded so its character
/// column lines up.
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().div_ceil(ROW_WIDTH) * (ROW_WIDTH * 4 + 3));

    for row in bytes.chunks(ROW_WIDTH) {
        for b in row {
            let _ = write!(out, "{:02X} ", b);
        }
        for _ in row.len()..ROW_WIDTH {
            out.push_str("   ");
        }

        out.push_str(": ");
        out.extend(row.iter().map(|&b| printable(b)));
        for _ in row.len()..ROW_WIDTH {
            out.push(' ');
        }
        out.push('\n');
    }

    out
}

fn printable(byte: u8) -> char {
    let c = char::from(byte);
    if c.is_control() {
        '.'
    } else {
        c
    }
}
