//! Core CLI definitions

use clap::{Args, Parser, Subcommand};
use qb_script::{Endian, Platform};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "qbs")]
#[command(about = "QB script record inspector and string editor", long_about = None)]
pub struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where the script record lives and how its container is laid out
#[derive(Args, Debug, Clone)]
pub struct RecordArgs {
    /// File holding the script record
    pub input: PathBuf,

    /// Byte offset of the record inside the file
    #[arg(long, default_value_t = 0)]
    pub offset: u64,

    /// Container platform (wii, pc, xbox, xbox_xbx, ps2, pc_wpc)
    #[arg(short, long)]
    pub platform: Option<Platform>,

    /// Container byte order (big, little), defaults to the platform's
    #[arg(short, long)]
    pub endian: Option<Endian>,
}

/// Output format for the strings listing
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum StringsFormat {
    #[default]
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show record fields and payload sizes
    #[command(visible_alias = "i")]
    Info {
        #[command(flatten)]
        record: RecordArgs,
    },

    /// Decompile the script bytecode to pseudo-source
    #[command(visible_alias = "d")]
    Decompile {
        #[command(flatten)]
        record: RecordArgs,

        /// Extra checksum name list, consulted before the configured one
        #[arg(short, long)]
        names: Option<PathBuf>,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List text strings embedded in the bytecode
    #[command(visible_alias = "s")]
    Strings {
        #[command(flatten)]
        record: RecordArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = StringsFormat::Table)]
        format: StringsFormat,
    },

    /// Replace one embedded string in place (padded or truncated to fit)
    SetString {
        #[command(flatten)]
        record: RecordArgs,

        /// Index from the strings listing
        index: usize,

        /// New text
        text: String,

        /// Write to a different file instead of editing in place
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep a copy of the original file
        #[arg(long)]
        backup: bool,
    },

    /// Save the decompressed payload to a file
    Export {
        #[command(flatten)]
        record: RecordArgs,

        /// Destination for the raw payload
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Replace the payload with the contents of a file
    Import {
        #[command(flatten)]
        record: RecordArgs,

        /// Raw payload to import
        payload: PathBuf,

        /// Write to a different file instead of editing in place
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep a copy of the original file
        #[arg(long)]
        backup: bool,
    },

    /// Hex + character dump of the decompressed payload
    Dump {
        #[command(flatten)]
        record: RecordArgs,
    },

    /// Configure default settings
    #[command(visible_alias = "c")]
    Configure {
        /// Set default container platform
        #[arg(long)]
        platform: Option<Platform>,

        /// Set default byte order
        #[arg(long)]
        endian: Option<Endian>,

        /// Set characters allowed in script strings (empty restores the default set)
        #[arg(long)]
        charset: Option<String>,

        /// Set the global checksum name list
        #[arg(long)]
        names: Option<PathBuf>,

        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_set_string() {
        let cli = Cli::try_parse_from([
            "qbs",
            "set-string",
            "intro.qbs",
            "2",
            "HELLO",
            "--platform",
            "ps2",
            "--offset",
            "64",
        ])
        .unwrap();

        match cli.command {
            Commands::SetString {
                record,
                index,
                text,
                output,
                backup,
            } => {
                assert_eq!(record.input, PathBuf::from("intro.qbs"));
                assert_eq!(record.offset, 64);
                assert_eq!(record.platform, Some(Platform::Ps2));
                assert_eq!(record.endian, None);
                assert_eq!(index, 2);
                assert_eq!(text, "HELLO");
                assert!(output.is_none());
                assert!(!backup);
            }
            _ => panic!("expected set-string"),
        }
    }

    #[test]
    fn test_parse_rejects_bad_platform() {
        assert!(Cli::try_parse_from(["qbs", "info", "a.bin", "--platform", "n64"]).is_err());
    }
}
