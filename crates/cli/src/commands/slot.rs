//! Slot state queries and updates.

use super::GlobalArgs;
use anyhow::{Context, Result};
use bootctl_control::SlotStateStore;
use clap::Args;
use colored::Colorize;

#[derive(Args)]
pub struct SlotArg {
    /// Slot index (0 = A, 1 = B)
    slot: u32,
}

fn yes_no(value: bool) -> colored::ColoredString {
    if value {
        "yes".green()
    } else {
        "no".red()
    }
}

pub fn slots(global: &GlobalArgs) -> Result<()> {
    let control = global.open()?;
    println!("{}", control.number_slots()?);
    Ok(())
}

pub fn current(global: &GlobalArgs) -> Result<()> {
    let control = global.open()?;
    let slot = control.current_slot().context("Failed to determine the running slot")?;
    println!("{}", slot);
    Ok(())
}

pub fn suffix(global: &GlobalArgs, arg: SlotArg) -> Result<()> {
    let control = global.open()?;
    println!("{}", control.suffix(arg.slot)?);
    Ok(())
}

pub fn is_bootable(global: &GlobalArgs, arg: SlotArg) -> Result<()> {
    let control = global.open()?;
    println!("{}", yes_no(control.is_slot_bootable(arg.slot)?));
    Ok(())
}

pub fn is_successful(global: &GlobalArgs, arg: SlotArg) -> Result<()> {
    let control = global.open()?;
    println!("{}", yes_no(control.is_slot_marked_successful(arg.slot)?));
    Ok(())
}

pub fn mark_successful(global: &GlobalArgs) -> Result<()> {
    let control = global.open()?;
    control
        .mark_boot_successful()
        .context("Failed to mark boot successful")?;

    let slot = control.current_slot()?;
    println!(
        "{}  Slot {} ({}) marked successful",
        "✓".green().bold(),
        slot,
        control.suffix(slot)?.bright_yellow()
    );
    Ok(())
}

pub fn set_active(global: &GlobalArgs, arg: SlotArg) -> Result<()> {
    let control = global.open()?;
    control
        .set_active_boot_slot(arg.slot)
        .with_context(|| format!("Failed to activate slot {}", arg.slot))?;

    println!(
        "{}  Slot {} ({}) will be booted next",
        "✓".green().bold(),
        arg.slot,
        control.suffix(arg.slot)?.bright_yellow()
    );
    Ok(())
}

pub fn set_unbootable(global: &GlobalArgs, arg: SlotArg) -> Result<()> {
    let control = global.open()?;
    control
        .set_slot_as_unbootable(arg.slot)
        .with_context(|| format!("Failed to mark slot {} unbootable", arg.slot))?;

    println!(
        "{}  Slot {} ({}) marked unbootable",
        "✓".green().bold(),
        arg.slot,
        control.suffix(arg.slot)?.bright_yellow()
    );
    Ok(())
}
