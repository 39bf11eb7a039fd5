//! Final Cartridge III
//!
//! Freezer cartridge with 64KB of ROM in four 16KB banks, 256 bytes of
//! private RAM and a freeze button wired to NMI.
//!
//! # Memory Map
//!
//! Normal mode (16KB window, bank selected by the control register):
//! - ROML $8000-$9FFF: bank N, offset $0000-$1FFF
//! - ROMH $A000-$BFFF: bank N, offset $2000-$3FFF
//!
//! Hidden mode (entered by the freeze button):
//! - ROML $8000-$9FFF: bank 0, offset $0000-$1FFF (monitor code, fixed)
//! - ROMH $A000-$BFFF / $E000-$FFFF: hidden RAM, 256 bytes mirrored
//!
//! # Control Register ($DFFF, any IO2 address with low byte $FF)
//!
//! ```text
//! bit 0-1  bank (A14/A15 of the ROM)
//! bit 4    EXROM line level
//! bit 5    GAME line level
//! bit 6    NMI acknowledge (1 releases a held NMI)
//! bit 7    mode: 1 = hidden, 0 = normal
//! ```
//!
//! Reads of the control register are not driven; the host sees open bus.

use emu_core::expansion::{BusRead, ControlLines, HostLines, MemoryConfig};
use emu_core::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};

use super::CartridgeError;

const BANK_SIZE: usize = 0x4000;
const BANK_COUNT: usize = 4;
/// Exact image size accepted at load time
pub const FINAL3_ROM_SIZE: usize = BANK_SIZE * BANK_COUNT;
/// Size of the private RAM visible in hidden mode
pub const HIDDEN_RAM_SIZE: usize = 0x100;

/// Offset within the 16KB window where the hidden-RAM half begins
const HIDDEN_RAM_HALF: u16 = 0x2000;

const REG_BANK_MASK: u8 = 0x03;
const REG_EXROM: u8 = 0x10;
const REG_GAME: u8 = 0x20;
const REG_NMI_ACK: u8 = 0x40;
const REG_HIDDEN: u8 = 0x80;

/// Snapshot of the controller registers for debugging/introspection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Final3State {
    pub bank: u8,
    pub hidden: bool,
    pub exrom: bool,
    pub game: bool,
    pub nmi: bool,
}

/// Final Cartridge III controller
#[derive(Debug, Clone)]
pub struct Final3 {
    rom: Vec<u8>,
    hidden_ram: [u8; HIDDEN_RAM_SIZE],
    bank: u8,
    hidden: bool,
    exrom: bool,
    game: bool,
    nmi: bool,
}

impl Final3 {
    /// Build from a 64KB image. Shorter or longer images are rejected, never padded.
    pub fn new(rom: Vec<u8>) -> Result<Self, CartridgeError> {
        if rom.len() != FINAL3_ROM_SIZE {
            return Err(CartridgeError::InvalidSize {
                kind: "Final Cartridge III",
                len: rom.len(),
            });
        }

        Ok(Self {
            rom,
            hidden_ram: [0; HIDDEN_RAM_SIZE],
            bank: 0,
            hidden: false,
            exrom: false,
            game: false,
            nmi: false,
        })
    }

    pub fn read(&self, addr: u16, lines: ControlLines) -> BusRead {
        lines.assert_valid();

        if !lines.rom_selected() {
            // IO1, IO2 (including the control register) and unselected cycles stay off the bus
            return BusRead::open();
        }

        let offset = addr & 0x3FFF;
        if self.hidden {
            if offset < HIDDEN_RAM_HALF {
                BusRead::driven(self.rom[offset as usize])
            } else {
                BusRead::driven(self.hidden_ram[Self::hidden_ram_index(offset)])
            }
        } else {
            BusRead::driven(self.rom[self.bank as usize * BANK_SIZE + offset as usize])
        }
    }

    pub fn write(&mut self, addr: u16, data: u8, lines: ControlLines, host: &mut dyn HostLines) {
        lines.assert_valid();

        if lines.io2 && (addr & 0xFF) == 0xFF {
            self.write_control(data, host);
            return;
        }

        let offset = addr & 0x3FFF;
        if lines.romh && self.hidden && offset >= HIDDEN_RAM_HALF {
            self.hidden_ram[Self::hidden_ram_index(offset)] = data;
        }
        // Anything else, including every ROM write, is ignored
    }

    fn write_control(&mut self, data: u8, host: &mut dyn HostLines) {
        let old_config = self.memory_config();
        let was_hidden = self.hidden;

        self.bank = data & REG_BANK_MASK;
        self.hidden = data & REG_HIDDEN != 0;
        self.exrom = data & REG_EXROM != 0;
        self.game = data & REG_GAME != 0;

        log(LogCategory::Cartridge, LogLevel::Debug, || {
            format!(
                "FC3: control <- {:02X} (bank {}, {})",
                data,
                self.bank,
                if self.hidden { "hidden" } else { "normal" }
            )
        });
        if was_hidden && !self.hidden {
            log(LogCategory::Cartridge, LogLevel::Info, || {
                "FC3: monitor exited hidden mode".to_string()
            });
        }

        let new_config = self.memory_config();
        if new_config != old_config {
            host.set_memory_config(new_config);
        }

        if data & REG_NMI_ACK != 0 && self.nmi {
            self.nmi = false;
            log(LogCategory::Interrupts, LogLevel::Debug, || {
                "FC3: NMI released".to_string()
            });
            host.set_nmi(false);
        }
    }

    /// Freeze button edge: enter hidden mode and hand control to the monitor.
    ///
    /// Every call asserts NMI and forces Ultimax, even when already frozen.
    /// Hidden RAM is left as it is.
    pub fn freeze(&mut self, host: &mut dyn HostLines) {
        self.hidden = true;
        self.bank = 0;
        self.exrom = true;
        self.game = false;
        self.nmi = true;

        log(LogCategory::Interrupts, LogLevel::Info, || {
            "FC3: freeze, NMI asserted".to_string()
        });

        host.set_nmi(true);
        host.set_memory_config(MemoryConfig::Ultimax);
    }

    /// Power-on register state. Hidden RAM survives a reset.
    pub fn reset(&mut self) {
        self.bank = 0;
        self.hidden = false;
        self.exrom = false;
        self.game = false;
        self.nmi = false;
    }

    pub fn memory_config(&self) -> MemoryConfig {
        MemoryConfig::from_lines(self.exrom, self.game)
    }

    pub fn state(&self) -> Final3State {
        Final3State {
            bank: self.bank,
            hidden: self.hidden,
            exrom: self.exrom,
            game: self.game,
            nmi: self.nmi,
        }
    }

    pub fn bank(&self) -> u8 {
        self.bank
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn hidden_ram(&self) -> &[u8] {
        &self.hidden_ram
    }

    pub fn rom(&self) -> &[u8] {
        &self.rom
    }

    pub fn debug_state(&self) -> serde_json::Value {
        serde_json::json!({
            "kind": "final3",
            "bank": self.bank,
            "hidden": self.hidden,
            "exrom": self.exrom,
            "game": self.game,
            "nmi": self.nmi,
            "memory_config": self.memory_config(),
            "hidden_ram_sample": &self.hidden_ram[..16],
            "hidden_ram_nonzero": self.hidden_ram.iter().filter(|&&b| b != 0).count(),
        })
    }

    fn hidden_ram_index(offset: u16) -> usize {
        (offset as usize) & (HIDDEN_RAM_SIZE - 1)
    }
}
