//! bootctl CLI entry point.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "bootctl")]
#[command(about = "Inspect and change A/B boot slot state", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: commands::GlobalArgs,

    #[command(subcommand)]
    command: Option<commands::Commands>,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact();
    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    match cli.command {
        Some(cmd) => {
            if let Err(e) = commands::run(cmd, &cli.global) {
                eprintln!("Error: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("bootctl - A/B boot slot control");
            println!("Run 'bootctl --help' for usage information.");
        }
    }
}
