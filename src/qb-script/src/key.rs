//! QB key checksums
//!
//! Names in QB data are stored as 32-bit checksums of the lowercased name.

use std::fmt;

use serde::{Deserialize, Serialize};

/// CRC-32 polynomial (reflected)
pub const QBKEY_POLYNOMIAL: u32 = 0xedb88320;

/// Initial CRC register value; no final xor is applied
pub const QBKEY_INITIAL: u32 = 0xffffffff;

const TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ QBKEY_POLYNOMIAL
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// 32-bit name checksum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QbKey(pub u32);

impl QbKey {
    pub const fn new(crc: u32) -> Self {
        Self(crc)
    }

    /// Checksum a name the way QB data does
    ///
    /// Matching is case-insensitive and treats `/` as `\`.
    ///
    /// # Example
    ///
    /// ```
    /// use qb_script::QbKey;
    ///
    /// assert_eq!(QbKey::from_name("Foo/Bar"), QbKey::from_name("foo\\bar"));
    /// ```
    pub fn from_name(name: &str) -> Self {
        let mut crc = QBKEY_INITIAL;
        for c in name.chars() {
            let c = if c == '/' { '\\' } else { c.to_ascii_lowercase() };
            let mut buf = [0u8; 4];
            for &byte in c.encode_utf8(&mut buf).as_bytes() {
                crc = (crc >> 8) ^ TABLE[((crc ^ byte as u32) & 0xff) as usize];
            }
        }
        Self(crc)
    }

    #[inline]
    pub fn crc(self) -> u32 {
        self.0
    }

    /// Stable hex form, `XXXXXXXX`
    pub fn to_hex(self) -> String {
        format!("{:08X}", self.0)
    }

    /// Parse `XXXXXXXX` or `0xXXXXXXXX`
    pub fn parse_hex(s: &str) -> Option<Self> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if digits.is_empty() || digits.len() > 8 {
            return None;
        }
        u32::from_str_radix(digits, 16).ok().map(Self)
    }
}

impl From<u32> for QbKey {
    fn from(crc: u32) -> Self {
        Self(crc)
    }
}

impl fmt::Display for QbKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}
