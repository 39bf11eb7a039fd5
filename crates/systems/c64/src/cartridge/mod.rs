//! C64 expansion-port cartridges
//!
//! Each cartridge kind lives in its own module; [`Cartridge`] is the tagged
//! variant the slot holds and dispatches through.

mod final3;
mod standard;

pub use final3::{Final3, Final3State, FINAL3_ROM_SIZE, HIDDEN_RAM_SIZE};
pub use standard::Standard;

use emu_core::expansion::{BusRead, ControlLines, ExpansionCard, HostLines, MemoryConfig};
use serde::{Deserialize, Serialize};

use crate::crt::{CrtError, CrtImage};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartridgeError {
    #[error("invalid ROM size for {kind} cartridge: {len} bytes")]
    InvalidSize { kind: &'static str, len: usize },
}

/// Cartridge hardware kinds this crate emulates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CartridgeKind {
    Standard,
    Final3,
}

impl std::str::FromStr for CartridgeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" | "normal" => Ok(CartridgeKind::Standard),
            "final3" | "fc3" => Ok(CartridgeKind::Final3),
            other => Err(format!("unknown cartridge kind: {}", other)),
        }
    }
}

/// Unified cartridge enum that dispatches to specific implementations
#[derive(Debug, Clone)]
pub enum Cartridge {
    Standard(Standard),
    Final3(Final3),
}

impl Cartridge {
    /// Create a cartridge from a bare ROM dump of the given kind
    pub fn from_raw(kind: CartridgeKind, rom: Vec<u8>) -> Result<Self, CartridgeError> {
        match kind {
            CartridgeKind::Standard => Standard::new(rom).map(Cartridge::Standard),
            CartridgeKind::Final3 => Final3::new(rom).map(Cartridge::Final3),
        }
    }

    /// Assemble a cartridge from a parsed CRT image
    pub fn from_crt(image: CrtImage) -> Result<Self, CrtError> {
        image.into_cartridge()
    }

    pub fn kind(&self) -> CartridgeKind {
        match self {
            Cartridge::Standard(_) => CartridgeKind::Standard,
            Cartridge::Final3(_) => CartridgeKind::Final3,
        }
    }

    pub fn debug_state(&self) -> serde_json::Value {
        match self {
            Cartridge::Standard(c) => c.debug_state(),
            Cartridge::Final3(c) => c.debug_state(),
        }
    }
}

impl ExpansionCard for Cartridge {
    fn read(&self, addr: u16, lines: ControlLines) -> BusRead {
        match self {
            Cartridge::Standard(c) => c.read(addr, lines),
            Cartridge::Final3(c) => c.read(addr, lines),
        }
    }

    fn write(&mut self, addr: u16, data: u8, lines: ControlLines, host: &mut dyn HostLines) {
        match self {
            Cartridge::Standard(c) => c.write(addr, data, lines),
            Cartridge::Final3(c) => c.write(addr, data, lines, host),
        }
    }

    fn freeze(&mut self, host: &mut dyn HostLines) {
        match self {
            Cartridge::Standard(c) => c.freeze(),
            Cartridge::Final3(c) => c.freeze(host),
        }
    }

    fn reset(&mut self) {
        match self {
            Cartridge::Standard(c) => c.reset(),
            Cartridge::Final3(c) => c.reset(),
        }
    }

    fn memory_config(&self) -> MemoryConfig {
        match self {
            Cartridge::Standard(c) => c.memory_config(),
            Cartridge::Final3(c) => c.memory_config(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Cartridge::Standard(_) => "Standard",
            Cartridge::Final3(_) => "Final Cartridge III",
        }
    }
}
