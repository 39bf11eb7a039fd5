//! Core expansion-port primitives and traits.

pub mod expansion;
pub mod logging;

pub use expansion::{BusRead, ControlLines, ExpansionCard, HostLines, MemoryConfig};
