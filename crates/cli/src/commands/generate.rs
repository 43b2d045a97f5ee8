//! Factory slot metadata generation.

use anyhow::{bail, Context, Result};
use bootctl_core::{codec, SlotRecord};
use bootctl_storage::descriptor::backup_partition_path;
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct GenerateArgs {
    /// Output file for the primary copy
    output: PathBuf,

    /// Also write the backup copy to `<output>_b`
    #[arg(long)]
    with_backup: bool,

    /// Overwrite existing files
    #[arg(short, long)]
    force: bool,
}

pub fn run(args: GenerateArgs) -> Result<()> {
    let record = SlotRecord::factory();
    let bytes = codec::encode(&record);

    let mut outputs = vec![args.output.clone()];
    if args.with_backup {
        outputs.push(backup_partition_path(&args.output));
    }

    for path in &outputs {
        write_image(path, &bytes, args.force)?;
        println!("{}  Wrote {}", "✓".green().bold(), path.display());
    }

    println!();
    println!("  Checksum: {}", format!("{:#010x}", record.checksum).bright_yellow());
    println!("  Bytes:    {}", hex::encode(bytes).bright_black());
    Ok(())
}

fn write_image(path: &Path, bytes: &[u8], force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))
}
