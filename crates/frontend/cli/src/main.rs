use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use emu_c64::{load_cartridge, CartridgeKind, ExpansionSlot};
use emu_core::expansion::ExpansionCard;
use emu_core::logging::{LogConfig, LogLevel};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

mod script;
mod settings;

use settings::Settings;

#[derive(Parser)]
#[command(name = "c64cart", about = "C64 expansion-port cartridge emulator")]
struct Args {
    /// Settings file (JSON); defaults to c64cart.json next to the executable
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the core log level (off, error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Write core logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Cartridge kind for bare ROM dumps: "fc3" or "standard"
    #[arg(long, global = true)]
    raw_kind: Option<CartridgeKind>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print what a cartridge image contains
    Info {
        /// CRT image or bare ROM dump
        image: PathBuf,
    },
    /// Push a script of bus cycles through the cartridge
    Run {
        /// CRT image or bare ROM dump
        image: PathBuf,

        /// Comma-separated ops, e.g. "w:DFFF=02,r:8000,freeze,r:8000"
        #[arg(long)]
        script: String,

        /// Dump the final slot state to this file as JSON
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Write the effective settings to the settings file
    InitConfig,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(Settings::default_path);
    let mut settings = Settings::load(&config_path);
    if let Some(level) = args.log_level {
        settings.log_level = level;
    }
    if let Some(path) = args.log_file.clone() {
        settings.log_file = Some(path);
    }
    if let Some(kind) = args.raw_kind {
        settings.default_kind = kind;
    }
    settings
        .apply_logging(LogConfig::global())
        .context("failed to open log file")?;

    match args.command {
        Command::Info { image } => {
            let slot = load_slot(&image, settings.default_kind)?;
            if let Some(cart) = slot.cartridge() {
                println!("Cartridge: {}", cart.name());
                println!("Memory config: {:?}", cart.memory_config());
            }
            println!("{}", serde_json::to_string_pretty(&slot.debug_state())?);
        }
        Command::Run {
            image,
            script,
            save,
        } => {
            let ops = script::parse(&script)?;
            let mut slot = load_slot(&image, settings.default_kind)?;
            for step in script::run(&mut slot, &ops) {
                let read = match (step.data, step.driven) {
                    (Some(data), Some(true)) => format!(" -> {:02X}", data),
                    (Some(_), Some(false)) => " -> (open bus)".to_string(),
                    _ => String::new(),
                };
                println!(
                    "{:<12}{:<16} nmi={} {}",
                    step.op,
                    read,
                    u8::from(step.nmi),
                    step.memory_config
                );
            }
            if let Some(path) = save {
                let mut f = File::create(&path)
                    .with_context(|| format!("cannot create {}", path.display()))?;
                write!(f, "{}", serde_json::to_string_pretty(&slot.debug_state())?)?;
            }
        }
        Command::InitConfig => {
            settings.save(&config_path)?;
            println!("Wrote {}", config_path.display());
        }
    }

    LogConfig::global().clear_log_file();
    Ok(())
}

fn load_slot(image: &Path, raw_kind: CartridgeKind) -> Result<ExpansionSlot> {
    let data = std::fs::read(image).with_context(|| format!("cannot read {}", image.display()))?;
    let cart = load_cartridge(&data, raw_kind)
        .with_context(|| format!("cannot load {}", image.display()))?;
    log::info!("Loaded {} from {}", cart.name(), image.display());

    let mut slot = ExpansionSlot::new();
    slot.insert(cart);
    Ok(slot)
}
