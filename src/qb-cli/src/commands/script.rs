//! Script inspection commands: info, decompile, dump

use crate::cli::RecordArgs;
use crate::config::{load_names, Config};
use anyhow::{Context, Result};
use qb_script::{hex_dump, Codec, Lzss, Names, ScriptItem};
use std::fs;
use std::path::Path;

/// Show the record's fields
pub fn info(config: &Config, args: &RecordArgs) -> Result<()> {
    let (file, item) = super::open_record(config, args)?;
    print!("{}", describe(&item));
    println!("File:           {} @ 0x{:X}", file.path.display(), args.offset);
    Ok(())
}

fn describe(item: &ScriptItem) -> String {
    let header = item.header();
    let container = item.config();
    let compressed = Lzss.compress(item.payload()).len();
    let stored = compressed.min(item.payload().len());

    let mut out = String::new();
    out.push_str(&format!("Item type:      {}\n", header.item_type));
    out.push_str(&format!("Item key:       {}\n", header.item_key));
    out.push_str(&format!("File key:       {}\n", header.file_key));
    out.push_str(&format!("Unknown:        0x{:08X}\n", item.unknown()));
    out.push_str(&format!(
        "Platform:       {} ({:?} endian)\n",
        container.platform, container.endian
    ));
    out.push_str(&format!("Payload:        {} bytes\n", item.payload().len()));
    out.push_str(&format!(
        "Stored:         {} bytes{}\n",
        stored,
        if stored == item.payload().len() {
            " (raw)"
        } else {
            ""
        }
    ));
    out.push_str(&format!("Record length:  {} bytes\n", item.length()));
    out.push_str(&format!("Strings:        {}\n", item.strings().len()));
    out
}

/// Decompile the payload, writing to `output` or stdout
pub fn decompile(
    config: &Config,
    args: &RecordArgs,
    names: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let (_, item) = super::open_record(config, args)?;

    let global = config.global_names()?;
    let overrides = names.map(load_names).transpose()?;
    let resolver = Names::new(overrides.as_ref(), global.as_ref());

    let text = item
        .decompile(&resolver)
        .context("Failed to decompile script")?;

    match output {
        Some(path) => {
            fs::write(path, format!("{}\n", text))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => println!("{}", text),
    }

    Ok(())
}

/// Hex + character dump of the payload
pub fn dump(config: &Config, args: &RecordArgs) -> Result<()> {
    let (_, item) = super::open_record(config, args)?;
    print!("{}", hex_dump(item.payload()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use qb_script::{ContainerConfig, Platform, QbKey};

    #[test]
    fn test_describe() {
        let mut item = ScriptItem::new(ContainerConfig::for_platform(Platform::Ps2));
        item.set_item_key(QbKey(0x1234));

        let text = describe(&item);
        assert!(text.contains("Item type:      SectionScript"));
        assert!(text.contains("Item key:       00001234"));
        assert!(text.contains("ps2 (Little endian)"));
        assert!(text.contains("Payload:        2 bytes"));
        assert!(text.contains("Stored:         2 bytes (raw)"));
        assert!(text.contains("Record length:  28 bytes"));
    }

    #[test]
    fn test_decompile_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("script.qbs");
        let output = dir.path().join("script.txt");

        let item = ScriptItem::new(ContainerConfig::default());
        let mut bytes = Vec::new();
        item.write(&mut bytes).unwrap();
        fs::write(&input, bytes).unwrap();

        let args = RecordArgs {
            input,
            offset: 0,
            platform: None,
            endian: None,
        };
        decompile(&Config::default(), &args, None, Some(&output)).unwrap();
        assert_eq!(fs::read_to_string(&output).unwrap(), "0000 endscript\n");
    }
}
