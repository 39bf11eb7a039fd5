//! CRT cartridge image loader
//!
//! # File Layout
//!
//! ```text
//! $00-$0F  "C64 CARTRIDGE   " signature
//! $10-$13  header length (big-endian, at least $40)
//! $14-$15  version
//! $16-$17  hardware type (0 = standard, 3 = Final Cartridge III, ...)
//! $18      EXROM line level
//! $19      GAME line level
//! $1A-$1F  reserved
//! $20-$3F  cartridge name, NUL padded
//! ```
//!
//! followed by CHIP packets:
//!
//! ```text
//! $00-$03  "CHIP"
//! $04-$07  packet length including this 16-byte header
//! $08-$09  chip type (0 = ROM, 1 = RAM, 2 = flash)
//! $0A-$0B  bank number
//! $0C-$0D  load address
//! $0E-$0F  image size
//! $10-     image data
//! ```
//!
//! All multi-byte fields are big-endian.

use std::path::Path;

use emu_core::expansion::MemoryConfig;
use emu_core::logging::{log, LogCategory, LogLevel};
use thiserror::Error;

use crate::cartridge::{Cartridge, CartridgeError, Final3, Standard, FINAL3_ROM_SIZE};

const SIGNATURE: &[u8; 16] = b"C64 CARTRIDGE   ";
const MIN_HEADER_LEN: usize = 0x40;
const CHIP_SIGNATURE: &[u8; 4] = b"CHIP";
const CHIP_HEADER_LEN: usize = 0x10;
const CHIP_ROM: u16 = 0;

const HW_STANDARD: u16 = 0;
const HW_FINAL3: u16 = 3;

#[derive(Debug, Error)]
pub enum CrtError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a CRT image (bad signature)")]
    BadSignature,
    #[error("image truncated at offset {offset:#X} while reading {what}")]
    Truncated { offset: usize, what: &'static str },
    #[error("unsupported cartridge hardware type {0}")]
    UnsupportedHardware(u16),
    #[error("CHIP packet at offset {offset:#X} is malformed: {reason}")]
    InvalidChip { offset: usize, reason: &'static str },
    #[error("standard cartridges in {0:?} mode are not supported")]
    UnsupportedConfig(MemoryConfig),
    #[error("bank {0} is missing")]
    MissingBank(u16),
    #[error("bank {0} appears more than once")]
    DuplicateBank(u16),
    #[error("bank {0} is out of range for this cartridge")]
    BankOutOfRange(u16),
    #[error(transparent)]
    Cartridge(#[from] CartridgeError),
}

/// Cartridge hardware named in the CRT header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hardware {
    Standard,
    Final3,
}

impl Hardware {
    fn from_id(id: u16) -> Result<Self, CrtError> {
        match id {
            HW_STANDARD => Ok(Hardware::Standard),
            HW_FINAL3 => Ok(Hardware::Final3),
            other => Err(CrtError::UnsupportedHardware(other)),
        }
    }
}

/// One CHIP packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chip {
    /// File offset of the packet header
    pub offset: usize,
    pub chip_type: u16,
    pub bank: u16,
    pub load_address: u16,
    pub data: Vec<u8>,
}

/// A parsed CRT file
#[derive(Debug, Clone)]
pub struct CrtImage {
    pub name: String,
    pub version: u16,
    pub hardware: Hardware,
    pub exrom: bool,
    pub game: bool,
    pub chips: Vec<Chip>,
}

fn be_u16(data: &[u8], offset: usize, what: &'static str) -> Result<u16, CrtError> {
    data.get(offset..offset + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or(CrtError::Truncated { offset, what })
}

fn be_u32(data: &[u8], offset: usize, what: &'static str) -> Result<u32, CrtError> {
    data.get(offset..offset + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(CrtError::Truncated { offset, what })
}

impl CrtImage {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CrtError> {
        let data = std::fs::read(path)?;
        Self::parse(&data)
    }

    pub fn parse(data: &[u8]) -> Result<Self, CrtError> {
        if data.len() < SIGNATURE.len() || &data[..SIGNATURE.len()] != SIGNATURE {
            return Err(CrtError::BadSignature);
        }
        if data.len() < MIN_HEADER_LEN {
            return Err(CrtError::Truncated {
                offset: data.len(),
                what: "header",
            });
        }

        let header_len = (be_u32(data, 0x10, "header length")? as usize).max(MIN_HEADER_LEN);
        let version = be_u16(data, 0x14, "version")?;
        let hardware = Hardware::from_id(be_u16(data, 0x16, "hardware type")?)?;
        let exrom = data[0x18] != 0;
        let game = data[0x19] != 0;
        let name = String::from_utf8_lossy(&data[0x20..0x40])
            .trim_end_matches('\0')
            .to_string();

        let mut chips = Vec::new();
        let mut offset = header_len;
        while offset < data.len() {
            let chip = Self::parse_chip(data, offset)?;
            offset += chip.1;
            chips.push(chip.0);
        }

        log(LogCategory::Loader, LogLevel::Info, || {
            format!(
                "CRT: \"{}\" v{}.{:02} {:?}, {} chip(s)",
                name,
                version >> 8,
                version & 0xFF,
                hardware,
                chips.len()
            )
        });

        Ok(Self {
            name,
            version,
            hardware,
            exrom,
            game,
            chips,
        })
    }

    /// Parse the packet at `offset`, returning it with its total length
    fn parse_chip(data: &[u8], offset: usize) -> Result<(Chip, usize), CrtError> {
        let sig = data
            .get(offset..offset + CHIP_SIGNATURE.len())
            .ok_or(CrtError::Truncated {
                offset,
                what: "CHIP signature",
            })?;
        if sig != CHIP_SIGNATURE {
            return Err(CrtError::InvalidChip {
                offset,
                reason: "missing CHIP signature",
            });
        }

        let packet_len = be_u32(data, offset + 0x04, "CHIP length")? as usize;
        let chip_type = be_u16(data, offset + 0x08, "chip type")?;
        let bank = be_u16(data, offset + 0x0A, "bank number")?;
        let load_address = be_u16(data, offset + 0x0C, "load address")?;
        let size = be_u16(data, offset + 0x0E, "image size")? as usize;

        if packet_len < CHIP_HEADER_LEN + size {
            return Err(CrtError::InvalidChip {
                offset,
                reason: "packet shorter than its image",
            });
        }

        let start = offset + CHIP_HEADER_LEN;
        let image = data.get(start..start + size).ok_or(CrtError::Truncated {
            offset: start,
            what: "chip data",
        })?;

        log(LogCategory::Loader, LogLevel::Debug, || {
            format!(
                "CRT: CHIP type {} bank {} at ${:04X}, {} bytes",
                chip_type, bank, load_address, size
            )
        });

        Ok((
            Chip {
                offset,
                chip_type,
                bank,
                load_address,
                data: image.to_vec(),
            },
            packet_len,
        ))
    }

    /// Assemble the chips into a cartridge of the header's hardware type
    pub fn into_cartridge(self) -> Result<Cartridge, CrtError> {
        let result = match self.hardware {
            Hardware::Final3 => Self::assemble_final3(&self.chips).map(Cartridge::Final3),
            Hardware::Standard => match MemoryConfig::from_lines(self.exrom, self.game) {
                MemoryConfig::Ultimax => Err(CrtError::UnsupportedConfig(MemoryConfig::Ultimax)),
                _ => Self::assemble_standard(&self.chips).map(Cartridge::Standard),
            },
        };
        if let Err(e) = &result {
            log(LogCategory::Loader, LogLevel::Warn, || {
                format!("CRT: rejected \"{}\": {}", self.name, e)
            });
        }
        result
    }

    fn require_rom(chip: &Chip) -> Result<(), CrtError> {
        if chip.chip_type != CHIP_ROM {
            return Err(CrtError::InvalidChip {
                offset: chip.offset,
                reason: "only ROM chips are supported",
            });
        }
        Ok(())
    }

    fn assemble_final3(chips: &[Chip]) -> Result<Final3, CrtError> {
        const BANK_SIZE: usize = 0x4000;
        const BANKS: u16 = (FINAL3_ROM_SIZE / BANK_SIZE) as u16;

        let mut rom = vec![0u8; FINAL3_ROM_SIZE];
        let mut seen = [false; BANKS as usize];
        for chip in chips {
            Self::require_rom(chip)?;
            if chip.bank >= BANKS {
                return Err(CrtError::BankOutOfRange(chip.bank));
            }
            if seen[chip.bank as usize] {
                return Err(CrtError::DuplicateBank(chip.bank));
            }
            if chip.data.len() != BANK_SIZE {
                return Err(CartridgeError::InvalidSize {
                    kind: "Final Cartridge III bank",
                    len: chip.data.len(),
                }
                .into());
            }
            seen[chip.bank as usize] = true;
            let start = chip.bank as usize * BANK_SIZE;
            rom[start..start + BANK_SIZE].copy_from_slice(&chip.data);
        }

        if let Some(missing) = seen.iter().position(|&present| !present) {
            return Err(CrtError::MissingBank(missing as u16));
        }

        Ok(Final3::new(rom)?)
    }

    fn assemble_standard(chips: &[Chip]) -> Result<Standard, CrtError> {
        let mut roml: Option<&[u8]> = None;
        let mut romh: Option<&[u8]> = None;
        for chip in chips {
            Self::require_rom(chip)?;
            if chip.bank != 0 {
                return Err(CrtError::BankOutOfRange(chip.bank));
            }
            let slot = match chip.load_address {
                0x8000 => &mut roml,
                0xA000 => &mut romh,
                _ => {
                    return Err(CrtError::InvalidChip {
                        offset: chip.offset,
                        reason: "unexpected load address",
                    })
                }
            };
            if slot.is_some() {
                return Err(CrtError::DuplicateBank(chip.bank));
            }
            *slot = Some(chip.data.as_slice());
        }

        let mut rom = roml.ok_or(CrtError::MissingBank(0))?.to_vec();
        if let Some(high) = romh {
            rom.extend_from_slice(high);
        }
        Ok(Standard::new(rom)?)
    }
}
