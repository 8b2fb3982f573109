//! Command handlers for qbs
//!
//! Each subcommand has its own module with handler functions.

pub mod configure;
pub mod payload;
pub mod script;
pub mod strings;

use crate::cli::RecordArgs;
use crate::config::Config;
use crate::record_file::RecordFile;
use anyhow::Result;
use qb_script::ScriptItem;

/// Open the record named on the command line with the effective container settings
pub fn open_record(config: &Config, args: &RecordArgs) -> Result<(RecordFile, ScriptItem)> {
    let container = config.container(args.platform, args.endian);
    RecordFile::open(&args.input, args.offset, &container)
}
