//! Script record codec
//!
//! Reads and writes the `SectionScript` item: generic header, unknown field,
//! both payload sizes, the (possibly compressed) payload and alignment
//! padding. The decompressed payload is the single source of truth; string
//! views are derived from it on demand.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::OnceLock;

use crate::codec::{Codec, Lzss};
use crate::config::ContainerConfig;
use crate::header::{ItemHeader, ItemType};
use crate::key::QbKey;
use crate::names::Names;
use crate::strings::{self, ScriptString};
use crate::{Error, Result, DEFAULT_PROGRAM, RECORD_ALIGNMENT, SCRIPT_FIELDS_SIZE};

/// A script item with its decompressed payload
#[derive(Debug)]
pub struct ScriptItem {
    header: ItemHeader,
    payload: Vec<u8>,
    unknown: u32,
    config: ContainerConfig,
    /// Lazily extracted strings; reset whenever the payload changes
    strings: OnceLock<Vec<ScriptString>>,
}

impl ScriptItem {
    /// Fresh script holding the minimal program
    pub fn new(config: ContainerConfig) -> Self {
        Self {
            header: ItemHeader::new(ItemType::SectionScript),
            payload: DEFAULT_PROGRAM.to_vec(),
            unknown: 0,
            config,
            strings: OnceLock::new(),
        }
    }

    /// Fresh script of the given item type, which must be a script type
    pub fn create(item_type: ItemType, config: ContainerConfig) -> Result<Self> {
        if !item_type.is_script() {
            return Err(Error::NotScriptItem(item_type));
        }
        Ok(Self::new(config))
    }

    /// Read a record using the default codec
    pub fn read<R: Read + Seek>(reader: &mut R, config: &ContainerConfig) -> Result<Self> {
        Self::read_with(reader, config, &Lzss)
    }

    /// Read a record, header included
    pub fn read_with<R: Read + Seek>(
        reader: &mut R,
        config: &ContainerConfig,
        codec: &dyn Codec,
    ) -> Result<Self> {
        let header = ItemHeader::read(reader, config.endian)?;
        Self::read_body(reader, header, config, codec)
    }

    /// Read the fields following an already-read header
    fn read_body<R: Read + Seek>(
        reader: &mut R,
        header: ItemHeader,
        config: &ContainerConfig,
        codec: &dyn Codec,
    ) -> Result<Self> {
        if !header.item_type.is_script() {
            return Err(Error::NotScriptItem(header.item_type));
        }

        let endian = config.endian;
        let mut fields = [0u8; SCRIPT_FIELDS_SIZE];
        reader.read_exact(&mut fields)?;
        let unknown = endian.read_u32(&fields[0..4]);
        let decompressed_size = endian.read_u32(&fields[4..8]) as usize;
        let compressed_size = endian.read_u32(&fields[8..12]) as usize;

        let offset = reader.stream_position()?;
        let mut stored = Vec::new();
        reader
            .by_ref()
            .take(compressed_size as u64)
            .read_to_end(&mut stored)?;
        if stored.len() != compressed_size {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }

        let payload = if compressed_size < decompressed_size {
            codec
                .decompress(&stored, decompressed_size)
                .map_err(|e| match e {
                    Error::DecompressionSize { actual, .. } => Error::DecompressedLength {
                        offset,
                        expected: decompressed_size,
                        actual,
                    },
                    other => other,
                })?
        } else {
            stored
        };

        if payload.len() != decompressed_size {
            return Err(Error::DecompressedLength {
                offset,
                expected: decompressed_size,
                actual: payload.len(),
            });
        }

        let position = reader.stream_position()?;
        let misalignment = position % RECORD_ALIGNMENT as u64;
        if misalignment != 0 {
            reader.seek(SeekFrom::Current((RECORD_ALIGNMENT as u64 - misalignment) as i64))?;
        }

        tracing::debug!(
            key = %header.item_key,
            decompressed_size,
            compressed_size,
            codec = codec.name(),
            "Read script item"
        );

        Ok(Self {
            header,
            payload,
            unknown,
            config: config.clone(),
            strings: OnceLock::new(),
        })
    }

    /// Write the record using the default codec
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<usize> {
        self.write_with(writer, &Lzss)
    }

    /// Write the record, returning the number of bytes written
    ///
    /// The payload is stored raw when compression does not shrink it. The
    /// byte count is checked against [`ScriptItem::length_with`].
    pub fn write_with<W: Write>(&self, writer: &mut W, codec: &dyn Codec) -> Result<usize> {
        let endian = self.config.endian;
        let compressed = codec.compress(&self.payload);
        let stored: &[u8] = if compressed.len() < self.payload.len() {
            &compressed
        } else {
            tracing::trace!(
                size = self.payload.len(),
                compressed = compressed.len(),
                "Storing script payload uncompressed"
            );
            &self.payload
        };

        let mut out = CountingWriter::new(writer);
        self.header.write(&mut out, endian)?;

        let mut fields = [0u8; SCRIPT_FIELDS_SIZE];
        endian.write_u32(&mut fields[0..4], self.unknown);
        endian.write_u32(&mut fields[4..8], self.payload.len() as u32);
        endian.write_u32(&mut fields[8..12], stored.len() as u32);
        out.write_all(&fields)?;
        out.write_all(stored)?;

        let padding = out.written.next_multiple_of(RECORD_ALIGNMENT) - out.written;
        out.write_all(&[0u8; RECORD_ALIGNMENT][..padding])?;

        let predicted = self.length_with(codec);
        if predicted != out.written {
            return Err(Error::LengthMismatch {
                predicted,
                written: out.written,
            });
        }

        Ok(out.written)
    }

    /// Serialized size with the default codec
    pub fn length(&self) -> usize {
        self.length_with(&Lzss)
    }

    /// Serialized size, computed without writing
    pub fn length_with(&self, codec: &dyn Codec) -> usize {
        let stored = codec.compress(&self.payload).len().min(self.payload.len());
        (self.header.len() + SCRIPT_FIELDS_SIZE + stored).next_multiple_of(RECORD_ALIGNMENT)
    }

    pub fn header(&self) -> &ItemHeader {
        &self.header
    }

    pub fn item_key(&self) -> QbKey {
        self.header.item_key
    }

    pub fn set_item_key(&mut self, key: QbKey) {
        self.header.item_key = key;
    }

    pub fn unknown(&self) -> u32 {
        self.unknown
    }

    pub fn set_unknown(&mut self, unknown: u32) {
        self.unknown = unknown;
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// Decompressed bytecode
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Replace the bytecode; previously extracted strings are discarded
    pub fn set_payload(&mut self, payload: Vec<u8>) {
        self.payload = payload;
        self.strings = OnceLock::new();
    }

    /// Text runs in the payload, extracted on first access
    pub fn strings(&self) -> &[ScriptString] {
        self.strings
            .get_or_init(|| strings::extract(&self.payload, &self.config))
    }

    /// Editable text runs; call [`ScriptItem::commit_strings`] to apply edits
    pub fn strings_mut(&mut self) -> &mut [ScriptString] {
        self.strings();
        match self.strings.get_mut() {
            Some(strings) => strings,
            None => &mut [],
        }
    }

    /// Write edited strings into the payload
    ///
    /// All or nothing: on error the payload and the edits are left as they
    /// were. On success the string list is re-extracted on next access.
    pub fn commit_strings(&mut self) -> Result<()> {
        let Some(edited) = self.strings.get() else {
            return Ok(());
        };
        strings::commit(&mut self.payload, edited, &self.config)?;
        self.strings = OnceLock::new();
        Ok(())
    }

    /// Render the payload as pseudo-source
    pub fn decompile(&self, names: &Names) -> Result<String> {
        crate::decompile::decompile(&self.payload, names)
    }
}

impl Clone for ScriptItem {
    fn clone(&self) -> Self {
        Self {
            header: self.header,
            payload: self.payload.clone(),
            unknown: self.unknown,
            config: self.config.clone(),
            strings: OnceLock::new(),
        }
    }
}

/// QB items this crate can handle
#[derive(Debug, Clone)]
pub enum Item {
    Script(ScriptItem),
}

impl Item {
    /// Read one item using the default codec
    pub fn read<R: Read + Seek>(reader: &mut R, config: &ContainerConfig) -> Result<Self> {
        Self::read_with(reader, config, &Lzss)
    }

    /// Read one item, dispatching on the header's type tag
    pub fn read_with<R: Read + Seek>(
        reader: &mut R,
        config: &ContainerConfig,
        codec: &dyn Codec,
    ) -> Result<Self> {
        let header = ItemHeader::read(reader, config.endian)?;
        match header.item_type {
            ItemType::SectionScript => Ok(Item::Script(ScriptItem::read_body(
                reader, header, config, codec,
            )?)),
            other => Err(Error::UnsupportedItemType(other)),
        }
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<usize> {
        match self {
            Item::Script(script) => script.write(writer),
        }
    }

    pub fn length(&self) -> usize {
        match self {
            Item::Script(script) => script.length(),
        }
    }

    pub fn header(&self) -> &ItemHeader {
        match self {
            Item::Script(script) => script.header(),
        }
    }

    pub fn as_script(&self) -> Option<&ScriptItem> {
        match self {
            Item::Script(script) => Some(script),
        }
    }
}

/// Writer wrapper that counts bytes
struct CountingWriter<W> {
    inner: W,
    written: usize,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
