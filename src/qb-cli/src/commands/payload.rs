//! Raw payload export and import

use crate::cli::RecordArgs;
use crate::config::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Write the decompressed payload to `output`
pub fn export(config: &Config, args: &RecordArgs, output: &Path) -> Result<()> {
    let (_, item) = super::open_record(config, args)?;

    fs::write(output, item.payload())
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "Exported {} bytes to {}",
        item.payload().len(),
        output.display()
    );
    Ok(())
}

/// Replace the payload with the bytes of `payload` and save the record
pub fn import(
    config: &Config,
    args: &RecordArgs,
    payload: &Path,
    output: Option<&Path>,
    backup: bool,
) -> Result<()> {
    let (file, mut item) = super::open_record(config, args)?;

    let bytes =
        fs::read(payload).with_context(|| format!("Failed to read {}", payload.display()))?;
    let size = bytes.len();
    item.set_payload(bytes);

    let written = file.save(&item, output, backup)?;
    println!("Imported {} bytes from {}", size, payload.display());
    println!("Saved: {}", written.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use qb_script::{ContainerConfig, Platform, ScriptItem};

    #[test]
    fn test_export_then_import() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("script.qbs");
        let exported = dir.path().join("script.bin");

        let config = Config {
            platform: Some(Platform::Ps2),
            ..Default::default()
        };
        let item = ScriptItem::new(ContainerConfig::for_platform(Platform::Ps2));
        let mut bytes = Vec::new();
        item.write(&mut bytes).unwrap();
        fs::write(&input, bytes).unwrap();

        let args = RecordArgs {
            input: input.clone(),
            offset: 0,
            platform: None,
            endian: None,
        };
        export(&config, &args, &exported).unwrap();
        assert_eq!(fs::read(&exported).unwrap(), vec![0x01, 0x24]);

        let replacement: Vec<u8> = b"\x01\x22".repeat(40);
        fs::write(&exported, &replacement).unwrap();
        import(&config, &args, &exported, None, false).unwrap();

        let (_, reloaded) = crate::commands::open_record(&config, &args).unwrap();
        assert_eq!(reloaded.payload(), replacement.as_slice());
        assert_eq!(reloaded.config().platform, Platform::Ps2);
    }
}
