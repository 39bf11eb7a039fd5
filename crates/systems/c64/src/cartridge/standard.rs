//! Standard 8K/16K cartridge (no banking)
//!
//! - 8K: ROML only, EXROM low, GAME high
//! - 16K: ROML + ROMH, EXROM and GAME low

use emu_core::expansion::{BusRead, ControlLines, MemoryConfig};

use super::CartridgeError;

const HALF_SIZE: usize = 0x2000;

#[derive(Debug, Clone)]
pub struct Standard {
    rom: Vec<u8>,
}

impl Standard {
    pub fn new(rom: Vec<u8>) -> Result<Self, CartridgeError> {
        match rom.len() {
            0x2000 | 0x4000 => Ok(Self { rom }),
            len => Err(CartridgeError::InvalidSize {
                kind: "standard",
                len,
            }),
        }
    }

    pub fn read(&self, addr: u16, lines: ControlLines) -> BusRead {
        lines.assert_valid();

        let offset = (addr as usize) & (HALF_SIZE - 1);
        if lines.roml {
            BusRead::driven(self.rom[offset])
        } else if lines.romh && self.rom.len() > HALF_SIZE {
            BusRead::driven(self.rom[HALF_SIZE + offset])
        } else {
            BusRead::open()
        }
    }

    pub fn write(&mut self, _addr: u16, _data: u8, lines: ControlLines) {
        // Plain ROM, nothing to latch
        lines.assert_valid();
    }

    /// No freeze button; the host lines are left alone
    pub fn freeze(&mut self) {}

    pub fn reset(&mut self) {}

    pub fn memory_config(&self) -> MemoryConfig {
        if self.rom.len() > HALF_SIZE {
            MemoryConfig::Standard16k
        } else {
            MemoryConfig::Standard8k
        }
    }

    pub fn debug_state(&self) -> serde_json::Value {
        serde_json::json!({
            "kind": "standard",
            "size": self.rom.len(),
            "memory_config": self.memory_config(),
        })
    }
}
