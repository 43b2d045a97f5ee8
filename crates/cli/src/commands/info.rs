//! Platform and slot overview.

use super::metadata::describe_state;
use super::GlobalArgs;
use anyhow::Result;
use bootctl_control::{SlotBackend, SlotStateStore};
use bootctl_storage::StoreLayout;
use colored::Colorize;

pub fn run(global: &GlobalArgs) -> Result<()> {
    let control = global.open()?;

    println!("{}", "Boot control".bold().cyan());
    println!();
    println!("  Platform: {}", control.soc().to_string().bright_yellow());
    println!("  Backend:  {}", control.backend().to_string().bright_yellow());

    match control.slot_backend() {
        SlotBackend::Block(store) => {
            let descriptor = store.store().descriptor();
            match &descriptor.layout {
                StoreLayout::TwinPartition { primary, backup } => {
                    println!("  Primary:  {}", primary.display());
                    println!("  Backup:   {}", backup.display());
                }
                StoreLayout::OffsetPair { device, location } => {
                    println!("  Device:   {} ({})", device.display(), descriptor.device_type);
                    println!("  Primary:  {:#x}", location.primary_offset());
                    println!("  Backup:   {:#x}", location.backup_offset());
                }
            }
        }
        SlotBackend::Register(store) => {
            println!("  Register: {:#010x}", store.register_address());
            println!("  State:    {}", describe_state(&store.read_state()));
        }
    }

    println!();
    let slots = control.number_slots()?;
    let current = control.current_slot().ok();

    println!(
        "  {:<6} {:<8} {:<10} {:<10}",
        "Slot".bold(),
        "Suffix".bold(),
        "Bootable".bold(),
        "Successful".bold()
    );
    for slot in 0..slots {
        let marker = if current == Some(slot) { "*" } else { " " };
        println!(
            "{} {:<6} {:<8} {:<10} {:<10}",
            marker.green().bold(),
            slot,
            control.suffix(slot)?,
            control.is_slot_bootable(slot)?,
            control.is_slot_marked_successful(slot)?
        );
    }

    if current.is_none() {
        println!();
        println!("{}", "Running slot could not be determined".yellow());
    }

    Ok(())
}
