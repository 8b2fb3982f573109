//! Per-container configuration
//!
//! Everything the codec, string extractor and decompiler need to know about
//! the container a record came from. Passed explicitly into each operation.

use std::fmt;
use std::str::FromStr;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

/// Default characters allowed inside extracted script strings
pub const DEFAULT_STRING_CHARS: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ01234567890\\/?!\"\u{a3}$%^&*()-+{}[]'#@~?><,. =\u{ae}\u{a9}_";

/// Platform a container was built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Wii,
    Pc,
    Xbox,
    XboxXbx,
    Ps2,
    PcWpc,
}

impl Platform {
    pub const ALL: [Platform; 6] = [
        Platform::Wii,
        Platform::Pc,
        Platform::Xbox,
        Platform::XboxXbx,
        Platform::Ps2,
        Platform::PcWpc,
    ];

    /// Byte order the platform's containers are normally written in
    pub fn default_endian(self) -> Endian {
        match self {
            Platform::Ps2 | Platform::PcWpc => Endian::Little,
            Platform::Wii | Platform::Pc | Platform::Xbox | Platform::XboxXbx => Endian::Big,
        }
    }

    /// Whether scripts on this platform may carry 16-bit text
    pub fn allows_wide_strings(self) -> bool {
        matches!(self, Platform::Pc | Platform::Xbox)
    }

    pub fn name(self) -> &'static str {
        match self {
            Platform::Wii => "wii",
            Platform::Pc => "pc",
            Platform::Xbox => "xbox",
            Platform::XboxXbx => "xbox_xbx",
            Platform::Ps2 => "ps2",
            Platform::PcWpc => "pc_wpc",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase().replace('-', "_");
        Platform::ALL
            .into_iter()
            .find(|p| p.name() == lower)
            .ok_or_else(|| format!("unknown platform '{}'", s))
    }
}

/// Byte order of container integers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endian {
    Big,
    Little,
}

impl Endian {
    #[inline]
    pub fn read_u32(self, buf: &[u8]) -> u32 {
        match self {
            Endian::Big => BigEndian::read_u32(buf),
            Endian::Little => LittleEndian::read_u32(buf),
        }
    }

    #[inline]
    pub fn write_u32(self, buf: &mut [u8], value: u32) {
        match self {
            Endian::Big => BigEndian::write_u32(buf, value),
            Endian::Little => LittleEndian::write_u32(buf, value),
        }
    }

    #[inline]
    pub fn read_u16(self, buf: &[u8]) -> u16 {
        match self {
            Endian::Big => BigEndian::read_u16(buf),
            Endian::Little => LittleEndian::read_u16(buf),
        }
    }

    #[inline]
    pub fn write_u16(self, buf: &mut [u8], value: u16) {
        match self {
            Endian::Big => BigEndian::write_u16(buf, value),
            Endian::Little => LittleEndian::write_u16(buf, value),
        }
    }
}

impl FromStr for Endian {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "big" | "be" => Ok(Endian::Big),
            "little" | "le" => Ok(Endian::Little),
            _ => Err(format!("unknown endianness '{}'", s)),
        }
    }
}

/// Set of characters legal inside extracted strings
///
/// Payload bytes are tested as Latin-1 code points, so only characters up to
/// U+00FF can ever be members.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Charset {
    allowed: [bool; 256],
}

impl Charset {
    pub fn new(chars: &str) -> Self {
        let mut allowed = [false; 256];
        for c in chars.chars() {
            if let Ok(byte) = u8::try_from(u32::from(c)) {
                allowed[byte as usize] = true;
            }
        }
        Self { allowed }
    }

    #[inline]
    pub fn contains_byte(&self, byte: u8) -> bool {
        self.allowed[byte as usize]
    }

    #[inline]
    pub fn contains(&self, c: char) -> bool {
        u8::try_from(u32::from(c)).is_ok_and(|b| self.allowed[b as usize])
    }

    pub fn len(&self) -> usize {
        self.allowed.iter().filter(|&&a| a).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Member characters in code point order
    pub fn chars(&self) -> impl Iterator<Item = char> + '_ {
        (0u8..=255)
            .filter(|&b| self.allowed[b as usize])
            .map(char::from)
    }
}

impl Default for Charset {
    fn default() -> Self {
        Self::new(DEFAULT_STRING_CHARS)
    }
}

impl fmt::Debug for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Charset")
            .field(&self.chars().collect::<String>())
            .finish()
    }
}

impl From<String> for Charset {
    fn from(s: String) -> Self {
        if s.is_empty() {
            Self::default()
        } else {
            Self::new(&s)
        }
    }
}

impl From<Charset> for String {
    fn from(c: Charset) -> Self {
        c.chars().collect()
    }
}

/// Configuration of the container owning a script record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    pub platform: Platform,
    pub endian: Endian,
    pub charset: Charset,
}

impl ContainerConfig {
    /// Configuration with the platform's usual byte order and default charset
    pub fn for_platform(platform: Platform) -> Self {
        Self {
            platform,
            endian: platform.default_endian(),
            charset: Charset::default(),
        }
    }

    pub fn with_endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    pub fn with_charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    #[inline]
    pub fn allows_wide_strings(&self) -> bool {
        self.platform.allows_wide_strings()
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self::for_platform(Platform::Pc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_charset() {
        let cs = Charset::default();
        assert!(cs.contains('a'));
        assert!(cs.contains('Z'));
        assert!(cs.contains(' '));
        assert!(cs.contains('$'));
        assert!(cs.contains('\u{a3}'));
        assert!(cs.contains_byte(0xa9));
        assert!(!cs.contains('\0'));
        assert!(!cs.contains('\t'));
        assert!(!cs.contains('|'));
        assert!(!cs.contains('\u{263a}'));
    }

    #[test]
    fn test_charset_string_round_trip() {
        let cs = Charset::new("cba");
        let s: String = cs.clone().into();
        assert_eq!(s, "abc");
        assert_eq!(Charset::from(s), cs);
        assert_eq!(cs.len(), 3);
    }

    #[test]
    fn test_empty_charset_string_means_default() {
        assert_eq!(Charset::from(String::new()), Charset::default());
    }

    #[test]
    fn test_platform_rules() {
        assert!(Platform::Pc.allows_wide_strings());
        assert!(Platform::Xbox.allows_wide_strings());
        assert!(!Platform::Wii.allows_wide_strings());
        assert!(!Platform::Ps2.allows_wide_strings());
        assert_eq!(Platform::Ps2.default_endian(), Endian::Little);
        assert_eq!(Platform::Xbox.default_endian(), Endian::Big);
    }

    #[test]
    fn test_platform_parse() {
        assert_eq!("PC".parse::<Platform>(), Ok(Platform::Pc));
        assert_eq!("xbox-xbx".parse::<Platform>(), Ok(Platform::XboxXbx));
        assert!("dreamcast".parse::<Platform>().is_err());
        for p in Platform::ALL {
            assert_eq!(p.to_string().parse::<Platform>(), Ok(p));
        }
    }

    #[test]
    fn test_endian_helpers() {
        let mut buf = [0u8; 4];
        Endian::Big.write_u32(&mut buf, 0x01020304);
        assert_eq!(buf, [1, 2, 3, 4]);
        assert_eq!(Endian::Little.read_u32(&buf), 0x04030201);
        assert_eq!("le".parse::<Endian>(), Ok(Endian::Little));
    }

    #[test]
    fn test_config_builders() {
        let cfg = ContainerConfig::for_platform(Platform::Wii).with_endian(Endian::Little);
        assert_eq!(cfg.platform, Platform::Wii);
        assert_eq!(cfg.endian, Endian::Little);
        assert!(!cfg.allows_wide_strings());
    }

    #[test]
    fn test_config_serde() {
        let cfg: ContainerConfig =
            serde_json::from_str(r#"{"platform":"ps2","endian":"little"}"#).unwrap();
        assert_eq!(cfg.platform, Platform::Ps2);
        assert_eq!(cfg.endian, Endian::Little);
        assert_eq!(cfg.charset, Charset::default());

        let cfg = ContainerConfig::for_platform(Platform::XboxXbx).with_charset(Charset::new("BA"));
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains(r#""platform":"xbox_xbx""#));
        assert!(json.contains(r#""charset":"AB""#));
        assert_eq!(serde_json::from_str::<ContainerConfig>(&json).unwrap(), cfg);
    }
}
