//! Editable text inside script bytecode
//!
//! Script payloads are opaque bytecode with text embedded at offsets that
//! other bytecode refers to. Strings are found heuristically and may only be
//! rewritten in place with the same byte width: an edit never moves a string
//! or changes the payload size.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use encoding_rs::WINDOWS_1252;
use serde::{Deserialize, Serialize};

use crate::config::{ContainerConfig, Endian};
use crate::{Error, Result};

/// Narrow runs must be longer than this many bytes
pub const MIN_NARROW_RUN: usize = 4;

/// Wide runs must be longer than this many bytes
pub const MIN_WIDE_RUN: usize = 8;

/// A trailing run ending in this byte does not absorb it
const SENTINEL: u8 = b'$';

/// View of one text run inside a payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptString {
    /// Decoded text; edit this and commit to change the payload
    pub text: String,
    /// Byte offset of the run in the payload
    pub pos: usize,
    /// Slot size in characters
    pub length: usize,
    /// Two bytes per character in the container's byte order
    pub is_unicode: bool,
}

impl ScriptString {
    #[inline]
    pub fn char_width(&self) -> usize {
        if self.is_unicode {
            2
        } else {
            1
        }
    }

    /// Slot size in bytes
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.length * self.char_width()
    }

    /// `text` fitted to the slot: right-padded with spaces, then truncated
    pub fn fitted_text(&self) -> String {
        self.text
            .chars()
            .chain(std::iter::repeat(' '))
            .take(self.length)
            .collect()
    }
}

/// Find all text runs in a payload
pub fn extract(payload: &[u8], config: &ContainerConfig) -> Vec<ScriptString> {
    let strings: Vec<ScriptString> = scan_runs(payload, config)
        .into_iter()
        .map(|(start, end, is_unicode)| {
            let text = decode(&payload[start..end], is_unicode, config.endian);
            let length = if is_unicode {
                text.encode_utf16().count()
            } else {
                text.chars().count()
            };
            ScriptString {
                text,
                pos: start,
                length,
                is_unicode,
            }
        })
        .collect();

    tracing::debug!(
        payload_len = payload.len(),
        count = strings.len(),
        "scanned script strings"
    );

    strings
}

/// Scan state for one forward pass
struct Run {
    start: Option<usize>,
    unicode: bool,
    ended: bool,
}

impl Run {
    fn reset(&mut self) {
        self.start = None;
        self.unicode = false;
        self.ended = false;
    }
}

/// Locate runs as `(start, end, is_unicode)` byte ranges
fn scan_runs(data: &[u8], config: &ContainerConfig) -> Vec<(usize, usize, bool)> {
    let mut runs = Vec::new();
    let len = data.len();
    if len == 0 {
        return runs;
    }

    let allow_wide = config.allows_wide_strings();
    let wide_big_endian = !allow_wide || config.endian == Endian::Big;
    let charset = &config.charset;

    let mut run = Run {
        start: None,
        unicode: false,
        ended: false,
    };

    let mut i = 0;
    while i < len {
        let mut c = data[i];

        // A zero with another zero two bytes on: high bytes of big-endian text
        if allow_wide
            && wide_big_endian
            && run.start.is_none()
            && c == 0
            && i + 2 < len
            && data[i + 2] == 0
        {
            run.start = Some(i);
            run.unicode = true;
            i += 1;
            c = data[i];
        }

        if run.start.is_some() {
            if !charset.contains_byte(c) {
                run.ended = true;
            }
        } else if charset.contains_byte(c) {
            run.start = Some(i);
            if allow_wide && !wide_big_endian && i + 2 < len && data[i + 1] == 0 {
                run.unicode = true;
            }
        }

        if run.unicode && !run.ended {
            if i + 1 < len && data[i + 1] == 0 {
                i += 1;
            } else {
                run.ended = true;
            }
        }

        if let Some(start) = run.start {
            let at_last = i == len - 1;
            if run.ended || at_last {
                let span = i - start;
                let min = if run.unicode { MIN_WIDE_RUN } else { MIN_NARROW_RUN };
                if span > min {
                    if run.unicode && span % 2 != 0 {
                        i -= 1;
                    }

                    let mut end = i;
                    if !run.ended && i == len - 1 && c != SENTINEL {
                        end += 1;
                    }
                    runs.push((start, end, run.unicode));
                }
                run.reset();
            }
        }

        i += 1;
    }

    runs
}

fn decode(bytes: &[u8], is_unicode: bool, endian: Endian) -> String {
    if !is_unicode {
        let (text, _, _) = WINDOWS_1252.decode(bytes);
        return text.into_owned();
    }

    let mut units = vec![0u16; bytes.len() / 2];
    match endian {
        Endian::Big => BigEndian::read_u16_into(&bytes[..units.len() * 2], &mut units),
        Endian::Little => LittleEndian::read_u16_into(&bytes[..units.len() * 2], &mut units),
    }
    String::from_utf16_lossy(&units)
}

/// Encode text with a string's width and the container's byte order
///
/// Returns `None` when a character has no single-byte Windows-1252 form.
fn encode(text: &str, is_unicode: bool, endian: Endian) -> Option<Vec<u8>> {
    if !is_unicode {
        let (bytes, _, unmappable) = WINDOWS_1252.encode(text);
        return (!unmappable).then(|| bytes.into_owned());
    }

    let units: Vec<u16> = text.encode_utf16().collect();
    let mut bytes = vec![0u8; units.len() * 2];
    match endian {
        Endian::Big => BigEndian::write_u16_into(&units, &mut bytes),
        Endian::Little => LittleEndian::write_u16_into(&units, &mut bytes),
    }
    Some(bytes)
}

/// Write every string back into the payload
///
/// Each text is fitted to its slot and checked against the container's
/// charset before anything is written; one bad string rejects the whole
/// batch and leaves the payload untouched.
pub fn commit(
    payload: &mut [u8],
    strings: &[ScriptString],
    config: &ContainerConfig,
) -> Result<()> {
    let mut encoded = Vec::with_capacity(strings.len());

    for (index, s) in strings.iter().enumerate() {
        let text = s.fitted_text();

        if let Some(ch) = text.chars().find(|&c| !config.charset.contains(c)) {
            return Err(Error::InvalidStringChar { index, ch });
        }

        let bytes = encode(&text, s.is_unicode, config.endian).ok_or(Error::StringWidth {
            index,
            expected: s.byte_len(),
            actual: 0,
        })?;
        if bytes.len() != s.byte_len() {
            return Err(Error::StringWidth {
                index,
                expected: s.byte_len(),
                actual: bytes.len(),
            });
        }

        if s.pos + bytes.len() > payload.len() {
            return Err(Error::StringOutOfBounds {
                index,
                pos: s.pos,
                len: bytes.len(),
                payload_len: payload.len(),
            });
        }

        encoded.push((s.pos, bytes));
    }

    for (pos, bytes) in encoded {
        payload[pos..pos + bytes.len()].copy_from_slice(&bytes);
    }

    Ok(())
}
