//! Checksum to name tables
//!
//! Tables are plain values owned by the caller and queried read-only. The
//! decompiler resolves a checksum through an optional per-call override table
//! first, then an optional global table, and otherwise prints it as
//! `$XXXXXXXX`.

use std::borrow::Cow;
use std::collections::HashMap;

use crate::key::QbKey;

/// Map from checksum to human-readable name
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    names: HashMap<u32, String>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a name list
    ///
    /// Each line is `0xXXXXXXXX name`, `XXXXXXXX name`, or a bare `name`
    /// whose checksum is computed. Blank lines and `#` comments are skipped.
    pub fn parse(text: &str) -> Self {
        let mut table = Self::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match line.split_once(char::is_whitespace) {
                Some((first, rest)) => match QbKey::parse_hex(first) {
                    Some(key) => table.insert(key, rest.trim()),
                    None => {
                        table.insert_name(line);
                    }
                },
                None => {
                    table.insert_name(line);
                }
            }
        }

        table
    }

    pub fn insert(&mut self, key: QbKey, name: impl Into<String>) {
        self.names.insert(key.crc(), name.into());
    }

    /// Insert a name under its own checksum
    pub fn insert_name(&mut self, name: &str) -> QbKey {
        let key = QbKey::from_name(name);
        self.insert(key, name);
        key
    }

    pub fn get(&self, key: QbKey) -> Option<&str> {
        self.names.get(&key.crc()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(QbKey, S)> for NameTable {
    fn from_iter<I: IntoIterator<Item = (QbKey, S)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (key, name) in iter {
            table.insert(key, name);
        }
        table
    }
}

/// Override-then-global checksum resolver
#[derive(Debug, Clone, Copy, Default)]
pub struct Names<'a> {
    overrides: Option<&'a NameTable>,
    global: Option<&'a NameTable>,
}

impl<'a> Names<'a> {
    /// Resolver that knows no names
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(overrides: Option<&'a NameTable>, global: Option<&'a NameTable>) -> Self {
        Self { overrides, global }
    }

    pub fn with_overrides(mut self, table: &'a NameTable) -> Self {
        self.overrides = Some(table);
        self
    }

    pub fn with_global(mut self, table: &'a NameTable) -> Self {
        self.global = Some(table);
        self
    }

    pub fn lookup(&self, key: QbKey) -> Option<&'a str> {
        self.overrides
            .and_then(|t| t.get(key))
            .or_else(|| self.global.and_then(|t| t.get(key)))
    }

    /// Name for a checksum, or `$XXXXXXXX`
    pub fn resolve(&self, key: QbKey) -> Cow<'a, str> {
        match self.lookup(key) {
            Some(name) => Cow::Borrowed(name),
            None => Cow::Owned(format!("${}", key.to_hex())),
        }
    }
}
