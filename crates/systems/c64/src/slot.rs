//! Host side of the expansion port
//!
//! The slot owns the inserted cartridge, records the lines it drives back
//! (NMI, EXROM/GAME), and is the single dispatch path for bus cycles.
//!
//! The freeze button may be pressed from another thread (a UI event loop,
//! say). Presses are queued through a [`FreezeButton`] handle and applied
//! at the start of the next dispatch, so a cycle never sees a half-applied
//! freeze.

use std::sync::mpsc::{channel, Receiver, Sender};

use emu_core::expansion::{BusRead, ControlLines, ExpansionCard, HostLines, MemoryConfig};
use emu_core::logging::{log, LogCategory, LogLevel};

use crate::cartridge::Cartridge;

/// Out-of-band input queued for the dispatch thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotEvent {
    Freeze,
}

/// Cloneable handle that queues freeze presses for the slot
#[derive(Debug, Clone)]
pub struct FreezeButton {
    sender: Sender<SlotEvent>,
}

impl FreezeButton {
    /// Queue a press. Returns false when the slot has been dropped.
    pub fn press(&self) -> bool {
        self.sender.send(SlotEvent::Freeze).is_ok()
    }
}

/// Line levels the cartridge has driven into the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotLines {
    nmi: bool,
    nmi_edge: bool,
    nmi_assertions: u32,
    config: MemoryConfig,
}

impl SlotLines {
    fn new(config: MemoryConfig) -> Self {
        Self {
            nmi: false,
            nmi_edge: false,
            nmi_assertions: 0,
            config,
        }
    }
}

impl HostLines for SlotLines {
    fn set_nmi(&mut self, asserted: bool) {
        if asserted {
            self.nmi_edge = true;
            self.nmi_assertions += 1;
        }
        self.nmi = asserted;
    }

    fn set_memory_config(&mut self, config: MemoryConfig) {
        self.config = config;
    }
}

/// The C64 expansion port
pub struct ExpansionSlot {
    cart: Option<Cartridge>,
    lines: SlotLines,
    events: Receiver<SlotEvent>,
    button: FreezeButton,
}

impl Default for ExpansionSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpansionSlot {
    pub fn new() -> Self {
        let (sender, events) = channel();
        Self {
            cart: None,
            lines: SlotLines::new(MemoryConfig::Off),
            events,
            button: FreezeButton { sender },
        }
    }

    /// Handle for pressing freeze from any thread
    pub fn freeze_button(&self) -> FreezeButton {
        self.button.clone()
    }

    /// Plug in a cartridge; the slot is reset around it
    pub fn insert(&mut self, cart: Cartridge) {
        log(LogCategory::Bus, LogLevel::Info, || {
            format!("Slot: inserted {}", cart.name())
        });
        self.cart = Some(cart);
        self.reset();
    }

    pub fn eject(&mut self) -> Option<Cartridge> {
        let cart = self.cart.take();
        self.lines = SlotLines::new(MemoryConfig::Off);
        cart
    }

    pub fn cartridge(&self) -> Option<&Cartridge> {
        self.cart.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.cart.is_some()
    }

    /// Apply queued freeze presses. Called at the start of every dispatch.
    pub fn service_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                SlotEvent::Freeze => self.freeze(),
            }
        }
    }

    /// Dispatch a read cycle with explicit control lines
    pub fn read(&mut self, addr: u16, lines: ControlLines) -> BusRead {
        self.service_events();
        self.dispatch_read(addr, lines)
    }

    /// Dispatch a write cycle with explicit control lines
    pub fn write(&mut self, addr: u16, data: u8, lines: ControlLines) {
        self.service_events();
        self.dispatch_write(addr, data, lines);
    }

    /// Read a CPU address, decoding the region selects from the current memory map
    pub fn cpu_read(&mut self, addr: u16) -> BusRead {
        // A queued freeze switches the map before this cycle is decoded
        self.service_events();
        let lines = ControlLines::decode(addr, self.lines.config);
        self.dispatch_read(addr, lines)
    }

    /// Write a CPU address, decoding the region selects from the current memory map
    pub fn cpu_write(&mut self, addr: u16, data: u8) {
        self.service_events();
        let lines = ControlLines::decode(addr, self.lines.config);
        self.dispatch_write(addr, data, lines);
    }

    fn dispatch_read(&self, addr: u16, lines: ControlLines) -> BusRead {
        let result = match &self.cart {
            Some(cart) => cart.read(addr, lines),
            None => BusRead::open(),
        };
        log(LogCategory::Bus, LogLevel::Trace, || {
            format!("Slot: read  ${:04X} {:?} -> {:?}", addr, lines, result)
        });
        result
    }

    fn dispatch_write(&mut self, addr: u16, data: u8, lines: ControlLines) {
        log(LogCategory::Bus, LogLevel::Trace, || {
            format!("Slot: write ${:04X} <- {:02X} {:?}", addr, data, lines)
        });
        if let Some(cart) = self.cart.as_mut() {
            cart.write(addr, data, lines, &mut self.lines);
        }
    }

    /// Freeze on the dispatch thread
    pub fn freeze(&mut self) {
        match self.cart.as_mut() {
            Some(cart) => cart.freeze(&mut self.lines),
            None => log(LogCategory::Interrupts, LogLevel::Warn, || {
                "Slot: freeze pressed with no cartridge".to_string()
            }),
        }
    }

    /// Reset the cartridge and resample its lines. NMI is released.
    pub fn reset(&mut self) {
        let config = match self.cart.as_mut() {
            Some(cart) => {
                cart.reset();
                cart.memory_config()
            }
            None => MemoryConfig::Off,
        };
        self.lines = SlotLines::new(config);
    }

    /// Current NMI line level
    pub fn nmi(&self) -> bool {
        self.lines.nmi
    }

    /// Check and clear a pending NMI assertion
    pub fn take_nmi_edge(&mut self) -> bool {
        std::mem::take(&mut self.lines.nmi_edge)
    }

    /// Total NMI assertions since insert/reset
    pub fn nmi_assertions(&self) -> u32 {
        self.lines.nmi_assertions
    }

    pub fn memory_config(&self) -> MemoryConfig {
        self.lines.config
    }

    pub fn debug_state(&self) -> serde_json::Value {
        serde_json::json!({
            "loaded": self.is_loaded(),
            "nmi": self.lines.nmi,
            "nmi_assertions": self.lines.nmi_assertions,
            "memory_config": self.lines.config,
            "cartridge": self.cart.as_ref().map(Cartridge::debug_state),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::{CartridgeKind, FINAL3_ROM_SIZE};

    fn fc3_slot() -> ExpansionSlot {
        let mut rom = vec![0; FINAL3_ROM_SIZE];
        for bank in 0..4 {
            rom[bank * 0x4000] = 0xC0 | bank as u8;
        }
        let mut slot = ExpansionSlot::new();
        slot.insert(Cartridge::from_raw(CartridgeKind::Final3, rom).unwrap());
        slot
    }

    #[test]
    fn test_empty_slot() {
        let mut slot = ExpansionSlot::new();
        assert!(!slot.is_loaded());
        assert_eq!(slot.memory_config(), MemoryConfig::Off);
        assert!(!slot.read(0x8000, ControlLines::roml()).drives);
        slot.write(0xDFFF, 0x01, ControlLines::io2());
        slot.freeze();
        assert!(!slot.nmi());
    }

    #[test]
    fn test_insert_samples_memory_config() {
        let slot = fc3_slot();
        assert_eq!(slot.memory_config(), MemoryConfig::Standard16k);
        assert_eq!(slot.debug_state()["cartridge"]["kind"], "final3");
    }

    #[test]
    fn test_cpu_accesses_follow_memory_map() {
        let mut slot = fc3_slot();
        slot.cpu_write(0xDFFF, 0x02);
        assert_eq!(slot.cpu_read(0x8000).data, 0xC2);

        slot.freeze();
        assert_eq!(slot.memory_config(), MemoryConfig::Ultimax);
        // Ultimax puts ROMH at $E000, where the hidden RAM now lives
        slot.cpu_write(0xE000, 0x5A);
        assert_eq!(slot.cpu_read(0xE000).data, 0x5A);
        // $A000 is unmapped in Ultimax
        assert!(!slot.cpu_read(0xA000).drives);
    }

    #[test]
    fn test_nmi_edge_reported_once() {
        let mut slot = fc3_slot();
        slot.freeze();
        assert!(slot.nmi());
        assert!(slot.take_nmi_edge());
        assert!(!slot.take_nmi_edge());
        assert_eq!(slot.nmi_assertions(), 1);

        // Monitor acknowledges and exits
        slot.cpu_write(0xDFFF, 0x40);
        assert!(!slot.nmi());
        assert_eq!(slot.memory_config(), MemoryConfig::Standard16k);
    }

    #[test]
    fn test_freeze_button_applied_on_next_dispatch() {
        let mut slot = fc3_slot();
        slot.cpu_write(0xDFFF, 0x03);
        let button = slot.freeze_button();

        assert!(button.press());
        // Not applied until the dispatch loop runs
        assert!(!slot.nmi());

        assert_eq!(slot.cpu_read(0x8000).data, 0xC0);
        assert!(slot.nmi());
        assert_eq!(slot.nmi_assertions(), 1);
    }

    #[test]
    fn test_queued_freeze_decodes_cycle_in_ultimax() {
        let mut slot = fc3_slot();
        assert!(!slot.cpu_read(0xE000).drives);

        slot.freeze_button().press();
        // Hidden RAM answers at $E000 only once the freeze has switched the map
        let read = slot.cpu_read(0xE000);
        assert!(read.drives);
        assert_eq!(slot.memory_config(), MemoryConfig::Ultimax);
        assert_eq!(slot.nmi_assertions(), 1);
    }

    #[test]
    fn test_freeze_button_from_other_thread() {
        let mut slot = fc3_slot();
        let button = slot.freeze_button();

        std::thread::spawn(move || {
            button.press();
        })
        .join()
        .unwrap();

        slot.service_events();
        assert!(slot.nmi());
        assert_eq!(slot.memory_config(), MemoryConfig::Ultimax);
    }

    #[test]
    fn test_reset_releases_lines() {
        let mut slot = fc3_slot();
        slot.freeze();
        slot.reset();
        assert!(!slot.nmi());
        assert_eq!(slot.nmi_assertions(), 0);
        assert_eq!(slot.memory_config(), MemoryConfig::Standard16k);
    }

    #[test]
    fn test_eject() {
        let mut slot = fc3_slot();
        let cart = slot.eject();
        assert!(matches!(cart, Some(Cartridge::Final3(_))));
        assert!(!slot.is_loaded());
        assert_eq!(slot.memory_config(), MemoryConfig::Off);
    }
}
