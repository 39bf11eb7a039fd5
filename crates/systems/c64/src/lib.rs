//! C64 expansion-port cartridge emulation

pub mod cartridge;
pub mod crt;
pub mod slot;

pub use cartridge::{Cartridge, CartridgeError, CartridgeKind, Final3, Final3State, Standard};
pub use crt::{CrtError, CrtImage};
pub use slot::{ExpansionSlot, FreezeButton};

/// Build a cartridge from a file's contents.
///
/// Data starting with the CRT signature is parsed as a CRT image and its
/// header picks the hardware. Anything else is a bare ROM dump of `raw_kind`.
pub fn load_cartridge(data: &[u8], raw_kind: CartridgeKind) -> Result<Cartridge, CrtError> {
    if data.starts_with(b"C64 CARTRIDGE") {
        CrtImage::parse(data)?.into_cartridge()
    } else {
        Ok(Cartridge::from_raw(raw_kind, data.to_vec())?)
    }
}
