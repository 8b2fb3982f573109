//! String listing and editing commands

use crate::cli::{RecordArgs, StringsFormat};
use crate::config::Config;
use anyhow::{bail, Context, Result};
use qb_script::ScriptString;
use std::path::Path;

/// List the strings found in the payload
pub fn list(config: &Config, args: &RecordArgs, format: StringsFormat) -> Result<()> {
    let (_, item) = super::open_record(config, args)?;
    let strings = item.strings();

    match format {
        StringsFormat::Json => println!("{}", serde_json::to_string_pretty(strings)?),
        StringsFormat::Table => print!("{}", table(strings)),
    }

    Ok(())
}

fn table(strings: &[ScriptString]) -> String {
    if strings.is_empty() {
        return "No strings found\n".to_string();
    }

    let mut out = format!(
        "{:>5}  {:>6}  {:>5}  {:<6}  Text\n",
        "Index", "Offset", "Chars", "Width"
    );
    for (index, s) in strings.iter().enumerate() {
        out.push_str(&format!(
            "{:>5}    {:04X}  {:>5}  {:<6}  {}\n",
            index,
            s.pos,
            s.length,
            if s.is_unicode { "wide" } else { "narrow" },
            s.text
        ));
    }
    out
}

/// Replace string `index` and save the record
pub fn set(
    config: &Config,
    args: &RecordArgs,
    index: usize,
    text: &str,
    output: Option<&Path>,
    backup: bool,
) -> Result<()> {
    let (file, mut item) = super::open_record(config, args)?;

    let count = item.strings().len();
    let Some(slot) = item.strings_mut().get_mut(index) else {
        bail!("String index {} out of range ({} strings)", index, count);
    };

    if text.chars().count() > slot.length {
        println!(
            "Warning: text truncated to {} characters to fit the slot",
            slot.length
        );
    }
    slot.text = text.to_string();
    let fitted = slot.fitted_text();

    item.commit_strings()
        .with_context(|| format!("Failed to update string {}", index))?;

    let written = file.save(&item, output, backup)?;
    println!("String {} set to {:?}", index, fitted);
    println!("Saved: {}", written.display());

    Ok(())
}
