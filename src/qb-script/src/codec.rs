//! Script payload compression
//!
//! Provides a trait-based interface so hosts can plug in the exact scheme
//! their data was produced with. The default backend is `Lzss`.
//!
//! The store-raw fallback (keeping data uncompressed when compression does
//! not shrink it) belongs to the record codec, not to implementations here.

use memchr::memrchr_iter;

use crate::{Error, Result};

/// Trait for payload compression backends
pub trait Codec: Send + Sync {
    /// Compress a payload; the result may be larger than the input
    fn compress(&self, data: &[u8]) -> Vec<u8>;

    /// Decompress a payload to exactly `decompressed_size` bytes
    ///
    /// Any other output size is an error.
    fn decompress(&self, compressed: &[u8], decompressed_size: usize) -> Result<Vec<u8>>;

    /// Get the backend name for diagnostics
    fn name(&self) -> &'static str;
}

/// Ring buffer size
pub const WINDOW_SIZE: usize = 4096;

/// Longest match a single token can encode
pub const MAX_MATCH: usize = 18;

/// Shortest match worth encoding
pub const MIN_MATCH: usize = 3;

/// Value the ring buffer is pre-filled with
pub const WINDOW_FILL: u8 = b' ';

/// Ring position the first output byte is written to
const WINDOW_START: usize = WINDOW_SIZE - MAX_MATCH;

/// Farthest back a match may reach while its bytes are still in the ring
const MAX_DISTANCE: usize = WINDOW_SIZE - MAX_MATCH;

/// LZSS with a 4 KiB space-filled ring
///
/// Each group of up to eight tokens is preceded by a flag byte, read least
/// significant bit first: a set bit is a literal byte, a clear bit a two-byte
/// match holding a 12-bit ring position and a 4-bit `length - 3`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Lzss;

impl Lzss {
    pub fn new() -> Self {
        Self
    }

    /// Longest earlier occurrence of `data[pos..]`, as (distance, length)
    fn find_match(data: &[u8], pos: usize) -> Option<(usize, usize)> {
        let max_len = MAX_MATCH.min(data.len() - pos);
        if max_len < MIN_MATCH {
            return None;
        }

        let mut best: Option<(usize, usize)> = None;
        let lowest = pos.saturating_sub(MAX_DISTANCE);

        for candidate in memrchr_iter(data[pos], &data[lowest..pos]).map(|i| lowest + i) {
            let len = data[candidate..]
                .iter()
                .zip(&data[pos..pos + max_len])
                .take_while(|(a, b)| a == b)
                .count();
            if len >= MIN_MATCH && best.filter(|&(_, l)| l >= len).is_none() {
                best = Some((pos - candidate, len));
                if len == max_len {
                    break;
                }
            }
        }

        best
    }
}

impl Codec for Lzss {
    fn compress(&self, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len() / 2 + 16);
        let mut flag_index = 0;
        let mut flag_bit = 8;
        let mut pos = 0;

        while pos < data.len() {
            if flag_bit == 8 {
                flag_index = out.len();
                out.push(0);
                flag_bit = 0;
            }

            match Self::find_match(data, pos) {
                Some((distance, len)) => {
                    let ring = (WINDOW_START + pos - distance) % WINDOW_SIZE;
                    out.push((ring & 0xff) as u8);
                    out.push((((ring >> 4) & 0xf0) | (len - MIN_MATCH)) as u8);
                    pos += len;
                }
                None => {
                    out[flag_index] |= 1 << flag_bit;
                    out.push(data[pos]);
                    pos += 1;
                }
            }
            flag_bit += 1;
        }

        out
    }

    fn decompress(&self, compressed: &[u8], decompressed_size: usize) -> Result<Vec<u8>> {
        let mut window = [WINDOW_FILL; WINDOW_SIZE];
        let mut ring = WINDOW_START;
        let capacity = decompressed_size.min(compressed.len().saturating_mul(MAX_MATCH));
        let mut out = Vec::with_capacity(capacity);
        let mut input = compressed.iter().copied();

        'tokens: while let Some(flags) = input.next() {
            for bit in 0..8 {
                if flags & (1 << bit) != 0 {
                    let Some(byte) = input.next() else {
                        break 'tokens;
                    };
                    out.push(byte);
                    window[ring] = byte;
                    ring = (ring + 1) % WINDOW_SIZE;
                } else {
                    let (Some(lo), Some(hi)) = (input.next(), input.next()) else {
                        break 'tokens;
                    };
                    let start = lo as usize | ((hi as usize & 0xf0) << 4);
                    let len = (hi as usize & 0x0f) + MIN_MATCH;
                    for k in 0..len {
                        let byte = window[(start + k) % WINDOW_SIZE];
                        out.push(byte);
                        window[ring] = byte;
                        ring = (ring + 1) % WINDOW_SIZE;
                    }
                }

                if out.len() > decompressed_size {
                    return Err(Error::DecompressionSize {
                        expected: decompressed_size,
                        actual: out.len(),
                    });
                }
            }
        }

        if out.len() != decompressed_size {
            return Err(Error::DecompressionSize {
                expected: decompressed_size,
                actual: out.len(),
            });
        }

        Ok(out)
    }

    fn name(&self) -> &'static str {
        "lzss"
    }
}

/// Create the default codec backend
pub fn default_codec() -> Box<dyn Codec> {
    Box::new(Lzss::new())
}
