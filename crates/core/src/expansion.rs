//! C64 expansion port primitives.
//!
//! Everything a cartridge needs to take part in a bus cycle lives here: the
//! region selects decoded by the host PLA, the EXROM/GAME memory-map lines a
//! cartridge drives back, and the [`ExpansionCard`] capability trait that the
//! host dispatches through.
//!
//! # Port Map
//!
//! ```text
//! $8000-$9FFF  ROML   (8K, low half of the 16K cartridge window)
//! $A000-$BFFF  ROMH   (8K, high half; $E000-$FFFF in Ultimax)
//! $DE00-$DEFF  IO1    (cartridge I/O page 1)
//! $DF00-$DFFF  IO2    (cartridge I/O page 2)
//! ```
//!
//! Control lines on the real connector are active-low. The model stores
//! them active-high (`true` = asserted) so call sites read naturally.

use serde::{Deserialize, Serialize};

/// Region selects and qualifiers for a single bus cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlLines {
    /// ROML select ($8000-$9FFF)
    pub roml: bool,
    /// ROMH select ($A000-$BFFF, or $E000-$FFFF in Ultimax)
    pub romh: bool,
    /// IO1 select ($DE00-$DEFF)
    pub io1: bool,
    /// IO2 select ($DF00-$DFFF)
    pub io2: bool,
    /// Bus available (low while the VIC-II holds the bus)
    pub ba: bool,
}

impl ControlLines {
    /// Cycle with no cartridge region selected
    pub fn none() -> Self {
        Self {
            ba: true,
            ..Self::default()
        }
    }

    pub fn roml() -> Self {
        Self {
            roml: true,
            ..Self::none()
        }
    }

    pub fn romh() -> Self {
        Self {
            romh: true,
            ..Self::none()
        }
    }

    pub fn io1() -> Self {
        Self {
            io1: true,
            ..Self::none()
        }
    }

    pub fn io2() -> Self {
        Self {
            io2: true,
            ..Self::none()
        }
    }

    /// Decode the region selects the PLA would assert for `addr` under the
    /// given memory configuration.
    ///
    /// Only the cartridge-visible regions are decoded; everything else
    /// (RAM, KERNAL, VIC, SID, CIA) yields [`ControlLines::none`].
    pub fn decode(addr: u16, config: MemoryConfig) -> Self {
        match addr {
            0x8000..=0x9FFF if config != MemoryConfig::Off => Self::roml(),
            0xA000..=0xBFFF if config == MemoryConfig::Standard16k => Self::romh(),
            0xE000..=0xFFFF if config == MemoryConfig::Ultimax => Self::romh(),
            0xDE00..=0xDEFF => Self::io1(),
            0xDF00..=0xDFFF => Self::io2(),
            _ => Self::none(),
        }
    }

    /// Number of region selects asserted this cycle (`ba` is a qualifier, not a region)
    pub fn active_regions(&self) -> usize {
        [self.roml, self.romh, self.io1, self.io2]
            .iter()
            .filter(|&&line| line)
            .count()
    }

    /// Either cartridge ROM window is selected
    pub fn rom_selected(&self) -> bool {
        self.roml || self.romh
    }

    /// Panic if the host asserted more than one region select.
    ///
    /// The PLA never does this, so seeing it means the bus simulator driving
    /// the card is broken. There is nothing sensible to recover to.
    #[track_caller]
    pub fn assert_valid(&self) {
        assert!(
            self.active_regions() <= 1,
            "expansion port contract violation: multiple region selects asserted ({:?})",
            self
        );
    }
}

/// Host memory map selected by the cartridge's EXROM/GAME lines.
///
/// | EXROM | GAME | configuration |
/// |-------|------|---------------|
/// | 1     | 1    | Off           |
/// | 0     | 1    | 8K            |
/// | 0     | 0    | 16K           |
/// | 1     | 0    | Ultimax       |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryConfig {
    /// No cartridge ROM visible
    Off,
    /// ROML at $8000
    Standard8k,
    /// ROML at $8000, ROMH at $A000
    Standard16k,
    /// ROML at $8000, ROMH at $E000, most of the host's RAM/ROM unmapped
    Ultimax,
}

impl MemoryConfig {
    /// Build from raw line levels (`true` = high)
    pub fn from_lines(exrom: bool, game: bool) -> Self {
        match (exrom, game) {
            (true, true) => MemoryConfig::Off,
            (false, true) => MemoryConfig::Standard8k,
            (false, false) => MemoryConfig::Standard16k,
            (true, false) => MemoryConfig::Ultimax,
        }
    }

    pub fn exrom(self) -> bool {
        matches!(self, MemoryConfig::Off | MemoryConfig::Ultimax)
    }

    pub fn game(self) -> bool {
        matches!(self, MemoryConfig::Off | MemoryConfig::Standard8k)
    }
}

/// Result of a read cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusRead {
    pub data: u8,
    /// Whether the card drove the data bus; when false the host keeps its own value
    pub drives: bool,
}

impl BusRead {
    pub fn driven(data: u8) -> Self {
        Self { data, drives: true }
    }

    /// Card stays off the bus
    pub fn open() -> Self {
        Self {
            data: 0xFF,
            drives: false,
        }
    }
}

/// Lines a cartridge drives back into the host.
///
/// Implemented by the host's interrupt controller / PLA glue. Cards call
/// into it synchronously from `write` and `freeze`.
pub trait HostLines {
    /// Drive the NMI line (`true` = asserted)
    fn set_nmi(&mut self, asserted: bool);

    /// Change the memory configuration seen by the host
    fn set_memory_config(&mut self, config: MemoryConfig);
}

/// Capability interface every expansion-port card implements.
///
/// The host serializes all calls: one cycle is dispatched at a time, and
/// `freeze` must be marshaled onto the same thread as `read`/`write`.
pub trait ExpansionCard {
    /// Respond to a read cycle. Never has side effects.
    fn read(&self, addr: u16, lines: ControlLines) -> BusRead;

    /// Respond to a write cycle
    fn write(&mut self, addr: u16, data: u8, lines: ControlLines, host: &mut dyn HostLines);

    /// Freeze button pressed (edge)
    fn freeze(&mut self, host: &mut dyn HostLines);

    /// Return registers to their power-on state
    fn reset(&mut self);

    /// Memory configuration the card currently requests
    fn memory_config(&self) -> MemoryConfig;

    /// Human-readable cartridge kind
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_config_line_mapping() {
        assert_eq!(MemoryConfig::from_lines(true, true), MemoryConfig::Off);
        assert_eq!(
            MemoryConfig::from_lines(false, true),
            MemoryConfig::Standard8k
        );
        assert_eq!(
            MemoryConfig::from_lines(false, false),
            MemoryConfig::Standard16k
        );
        assert_eq!(MemoryConfig::from_lines(true, false), MemoryConfig::Ultimax);

        for config in [
            MemoryConfig::Off,
            MemoryConfig::Standard8k,
            MemoryConfig::Standard16k,
            MemoryConfig::Ultimax,
        ] {
            assert_eq!(MemoryConfig::from_lines(config.exrom(), config.game()), config);
        }
    }

    #[test]
    fn test_single_region_constructors() {
        assert_eq!(ControlLines::none().active_regions(), 0);
        assert_eq!(ControlLines::roml().active_regions(), 1);
        assert_eq!(ControlLines::romh().active_regions(), 1);
        assert_eq!(ControlLines::io1().active_regions(), 1);
        assert_eq!(ControlLines::io2().active_regions(), 1);
        assert!(ControlLines::roml().ba);
        assert!(ControlLines::romh().rom_selected());
        assert!(!ControlLines::io2().rom_selected());
    }

    #[test]
    fn test_decode_16k() {
        let config = MemoryConfig::Standard16k;
        assert_eq!(ControlLines::decode(0x8000, config), ControlLines::roml());
        assert_eq!(ControlLines::decode(0x9FFF, config), ControlLines::roml());
        assert_eq!(ControlLines::decode(0xA000, config), ControlLines::romh());
        assert_eq!(ControlLines::decode(0xE000, config), ControlLines::none());
        assert_eq!(ControlLines::decode(0xDE10, config), ControlLines::io1());
        assert_eq!(ControlLines::decode(0xDFFF, config), ControlLines::io2());
        assert_eq!(ControlLines::decode(0x0801, config), ControlLines::none());
    }

    #[test]
    fn test_decode_ultimax_and_off() {
        let ultimax = MemoryConfig::Ultimax;
        assert_eq!(ControlLines::decode(0xE000, ultimax), ControlLines::romh());
        assert_eq!(ControlLines::decode(0xA000, ultimax), ControlLines::none());

        let off = MemoryConfig::Off;
        assert_eq!(ControlLines::decode(0x8000, off), ControlLines::none());
        // I/O pages are decoded regardless of EXROM/GAME
        assert_eq!(ControlLines::decode(0xDFFF, off), ControlLines::io2());
    }

    #[test]
    fn test_decode_8k_has_no_romh() {
        let config = MemoryConfig::Standard8k;
        assert_eq!(ControlLines::decode(0x8000, config), ControlLines::roml());
        assert_eq!(ControlLines::decode(0xA000, config), ControlLines::none());
    }

    #[test]
    #[should_panic(expected = "multiple region selects")]
    fn test_assert_valid_rejects_overlap() {
        let lines = ControlLines {
            roml: true,
            io2: true,
            ..ControlLines::none()
        };
        lines.assert_valid();
    }

    #[test]
    fn test_memory_config_serialization() {
        let json = serde_json::to_string(&MemoryConfig::Ultimax).expect("serialize");
        let back: MemoryConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, MemoryConfig::Ultimax);
    }

    #[test]
    fn test_open_bus_read() {
        let r = BusRead::open();
        assert!(!r.drives);
        assert!(BusRead::driven(0x42).drives);
        assert_eq!(BusRead::driven(0x42).data, 0x42);
    }
}
