//! A script record located inside a file
//!
//! Edits are written back by splicing the re-encoded record over the old
//! one; bytes before and after it are kept as they were.

use anyhow::{bail, Context, Result};
use qb_script::{ContainerConfig, ScriptItem};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

pub struct RecordFile {
    pub path: PathBuf,
    bytes: Vec<u8>,
    offset: usize,
    /// Bytes the record occupied when loaded
    len: usize,
}

impl RecordFile {
    /// Read the file and decode the script record at `offset`
    pub fn open(path: &Path, offset: u64, config: &ContainerConfig) -> Result<(Self, ScriptItem)> {
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

        let offset = usize::try_from(offset).context("Offset out of range")?;
        if offset > bytes.len() {
            bail!(
                "Offset 0x{:X} is past the end of {} ({} bytes)",
                offset,
                path.display(),
                bytes.len()
            );
        }

        let mut cursor = Cursor::new(&bytes[offset..]);
        let item = ScriptItem::read(&mut cursor, config).with_context(|| {
            format!(
                "Failed to read script record at 0x{:X} in {}",
                offset,
                path.display()
            )
        })?;
        let len = (cursor.position() as usize).min(bytes.len() - offset);

        tracing::debug!(
            path = %path.display(),
            offset,
            len,
            "Loaded script record"
        );

        Ok((
            Self {
                path: path.to_path_buf(),
                bytes,
                offset,
                len,
            },
            item,
        ))
    }

    /// Encode `item` over the original record and write the file
    ///
    /// Writes to `output` when given, otherwise back to the source file.
    pub fn save(&self, item: &ScriptItem, output: Option<&Path>, backup: bool) -> Result<PathBuf> {
        let mut record = Vec::with_capacity(item.length());
        item.write(&mut record)
            .context("Failed to encode script record")?;

        let mut out = Vec::with_capacity(self.bytes.len() + record.len());
        out.extend_from_slice(&self.bytes[..self.offset]);
        out.extend_from_slice(&record);
        out.extend_from_slice(&self.bytes[self.offset + self.len..]);

        if record.len() != self.len {
            tracing::warn!(
                old = self.len,
                new = record.len(),
                "Record size changed; offsets of later items are not adjusted"
            );
        }

        let target = output.unwrap_or(&self.path);
        if backup && target.exists() {
            let backup_path = backup_path(target);
            fs::copy(target, &backup_path)
                .with_context(|| format!("Failed to create backup {}", backup_path.display()))?;
            println!("Backup: {}", backup_path.display());
        }

        fs::write(target, &out)
            .with_context(|| format!("Failed to write {}", target.display()))?;

        Ok(target.to_path_buf())
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}
