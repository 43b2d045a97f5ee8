//! Raw slot state inspection.

use super::GlobalArgs;
use anyhow::{bail, Result};
use bootctl_control::register::{
    BOOT_CHAIN_FW_CURRENT, BOOT_CHAIN_FW_NEXT, ROOTFS_RETRY_COUNT_MAX, ROOTFS_STATUS_SLOT_A,
    ROOTFS_STATUS_SLOT_B,
};
use bootctl_control::{BlockSlotStore, RegisterSlotStore, SlotBackend};
use bootctl_core::{codec, SlotBits, SMD_MAGIC};
use clap::Args;
use colored::{ColoredString, Colorize};
use serde_json::json;

const VARIABLES: [&str; 5] = [
    BOOT_CHAIN_FW_CURRENT,
    BOOT_CHAIN_FW_NEXT,
    ROOTFS_RETRY_COUNT_MAX,
    ROOTFS_STATUS_SLOT_A,
    ROOTFS_STATUS_SLOT_B,
];

#[derive(Args)]
pub struct DumpArgs {
    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

pub fn verify(global: &GlobalArgs) -> Result<()> {
    let control = global.open()?;
    let SlotBackend::Block(store) = control.slot_backend() else {
        bail!("verify needs the block backend; this device keeps slot state in firmware");
    };

    let report = store.validate()?;
    let status = |intact: bool| if intact { "ok".green() } else { "corrupt".red() };

    println!(
        "  Primary: {} (stored {:#010x}, computed {:#010x})",
        status(report.primary.is_intact()),
        report.primary.stored,
        report.primary.computed
    );
    println!(
        "  Backup:  {} (stored {:#010x}, computed {:#010x})",
        status(report.backup.is_intact()),
        report.backup.stored,
        report.backup.computed
    );

    if !report.is_consistent() {
        bail!("slot metadata check failed: {}", report);
    }
    println!("{}  {}", "✓".green().bold(), report);
    Ok(())
}

pub fn dump(global: &GlobalArgs, args: DumpArgs) -> Result<()> {
    let control = global.open()?;
    match control.slot_backend() {
        SlotBackend::Block(store) => dump_block(store, args.json),
        SlotBackend::Register(store) => dump_register(store, args.json),
    }
}

/// Register slot bits for display, or the reason they could not be read.
pub(super) fn describe_state(state: &bootctl_control::Result<SlotBits>) -> ColoredString {
    match state {
        Ok(bits) => format!("{:#06x}", bits.0).normal(),
        Err(e) => format!("unavailable ({})", e).red(),
    }
}

fn dump_block(store: &BlockSlotStore, as_json: bool) -> Result<()> {
    let record = store.record()?;
    let raw = codec::encode_raw(&record);
    let computed = codec::checksum(&record);

    if as_json {
        let value = json!({
            "backend": "block",
            "record": record,
            "computed_checksum": computed,
            "raw": hex::encode(raw),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let magic = if record.has_valid_magic() {
        format!("{:#010x}", record.magic).green()
    } else {
        format!("{:#010x} (expected {:#010x})", record.magic, SMD_MAGIC).red()
    };
    let checksum = if record.checksum == computed {
        format!("{:#010x}", record.checksum).green()
    } else {
        format!("{:#010x} (computed {:#010x})", record.checksum, computed).red()
    };

    println!("{}", "Slot metadata (primary)".bold().cyan());
    println!();
    println!("  Magic:    {}", magic);
    println!("  Version:  {}", record.version);
    println!("  Slots:    {}", record.num_slots);
    println!("  Checksum: {}", checksum);
    println!();
    println!(
        "  {:<6} {:<8} {:<10} {:<8} {:<10}",
        "Slot".bold(),
        "Suffix".bold(),
        "Priority".bold(),
        "Retry".bold(),
        "Successful".bold()
    );
    for (index, slot) in record.slots.iter().enumerate() {
        println!(
            "  {:<6} {:<8} {:<10} {:<8} {:<10}",
            index, slot.suffix, slot.priority, slot.retry_count, slot.boot_successful
        );
    }
    println!();
    println!("  Raw: {}", hex::encode(raw).bright_black());
    Ok(())
}

fn dump_register(store: &RegisterSlotStore, as_json: bool) -> Result<()> {
    let state = store.read_state();
    let mut variables = Vec::with_capacity(VARIABLES.len());
    for name in VARIABLES {
        variables.push((name, store.variable(name)?));
    }

    if as_json {
        let vars: serde_json::Map<String, serde_json::Value> = variables
            .iter()
            .map(|(name, value)| (name.to_string(), json!(value)))
            .collect();
        let (state, error) = match &state {
            Ok(bits) => (Some(bits.0), None),
            Err(e) => (None, Some(e.to_string())),
        };
        let value = json!({
            "backend": "register",
            "address": store.register_address(),
            "state": state,
            "error": error,
            "variables": vars,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{}", "Scratch register".bold().cyan());
    println!();
    println!("  Address:  {:#010x}", store.register_address());
    println!("  State:    {}", describe_state(&state));
    println!();
    println!("{}", "Firmware variables".bold().cyan());
    println!();
    for (name, value) in variables {
        let value = match value {
            Some(value) => format!("{:#x}", value).normal(),
            None => "-".bright_black(),
        };
        println!("  {:<20} {}", name, value);
    }
    Ok(())
}
