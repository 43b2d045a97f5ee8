//! CLI commands module.

use anyhow::{Context, Result};
use bootctl_control::{BackendChoice, BootControl, BootControlConfig, SLOT_SUFFIX_PROPERTY};
use clap::{Args, Subcommand};
use std::path::PathBuf;
use tracing::debug;

mod generate;
mod info;
mod metadata;
mod slot;

/// Options shared by every command.
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend to use (auto, block, register)
    #[arg(short, long, global = true)]
    pub backend: Option<BackendChoice>,

    /// Override the running slot suffix
    #[arg(long, global = true)]
    pub slot_suffix: Option<String>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl GlobalArgs {
    /// Load the config file, if any, and apply command-line overrides.
    pub fn load_config(&self) -> Result<BootControlConfig> {
        let mut config = match &self.config {
            Some(path) => BootControlConfig::load(path)
                .with_context(|| format!("Failed to load config: {:?}", path))?,
            None => BootControlConfig::default(),
        };

        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(suffix) = &self.slot_suffix {
            config
                .properties
                .insert(SLOT_SUFFIX_PROPERTY.to_string(), suffix.clone());
        }
        debug!(?config, "loaded configuration");
        Ok(config)
    }

    /// Open the slot store for this invocation.
    pub fn open(&self) -> Result<BootControl> {
        let config = self.load_config()?;
        BootControl::open(&config).context("Failed to open boot control")
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show platform, backend and slot overview
    Info,
    /// Print the number of slots
    Slots,
    /// Print the index of the running slot
    Current,
    /// Print the suffix of a slot
    Suffix(slot::SlotArg),
    /// Check whether a slot is bootable
    IsBootable(slot::SlotArg),
    /// Check whether a slot has booted successfully
    IsSuccessful(slot::SlotArg),
    /// Mark the running slot as successfully booted
    MarkSuccessful,
    /// Make a slot the preferred slot for the next boot
    SetActive(slot::SlotArg),
    /// Mark a slot as unbootable
    SetUnbootable(slot::SlotArg),
    /// Check both on-media copies of the slot metadata
    Verify,
    /// Print the raw slot state
    Dump(metadata::DumpArgs),
    /// Write a factory slot metadata record to a file
    GenerateSmd(generate::GenerateArgs),
}

pub fn run(cmd: Commands, global: &GlobalArgs) -> Result<()> {
    match cmd {
        Commands::Info => info::run(global),
        Commands::Slots => slot::slots(global),
        Commands::Current => slot::current(global),
        Commands::Suffix(arg) => slot::suffix(global, arg),
        Commands::IsBootable(arg) => slot::is_bootable(global, arg),
        Commands::IsSuccessful(arg) => slot::is_successful(global, arg),
        Commands::MarkSuccessful => slot::mark_successful(global),
        Commands::SetActive(arg) => slot::set_active(global, arg),
        Commands::SetUnbootable(arg) => slot::set_unbootable(global, arg),
        Commands::Verify => metadata::verify(global),
        Commands::Dump(args) => metadata::dump(global, args),
        Commands::GenerateSmd(args) => generate::run(args),
    }
}
