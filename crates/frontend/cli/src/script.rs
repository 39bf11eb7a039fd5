//! Bus scripts: a comma-separated list of cycles to push through the slot.
//!
//! ```text
//! r:8000        read a CPU address
//! w:DFFF=02     write a byte
//! freeze        press the freeze button
//! reset         reset the slot
//! ```
//!
//! Addresses and values are hex, with or without a `$` prefix.

use anyhow::{anyhow, bail, Context, Result};
use emu_c64::ExpansionSlot;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Read(u16),
    Write(u16, u8),
    Freeze,
    Reset,
}

/// Outcome of one op, printed by the CLI
#[derive(Debug, Clone, Serialize)]
pub struct Step {
    pub op: String,
    pub data: Option<u8>,
    pub driven: Option<bool>,
    pub nmi: bool,
    pub memory_config: String,
}

fn parse_hex<T>(s: &str, what: &str) -> Result<T>
where
    T: TryFrom<u32>,
{
    let s = s.trim().trim_start_matches('$');
    let value = u32::from_str_radix(s, 16).with_context(|| format!("bad {} {:?}", what, s))?;
    T::try_from(value).map_err(|_| anyhow!("{} {:?} out of range", what, s))
}

pub fn parse(script: &str) -> Result<Vec<Op>> {
    script
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_op)
        .collect()
}

fn parse_op(s: &str) -> Result<Op> {
    match s.to_lowercase().as_str() {
        "freeze" => return Ok(Op::Freeze),
        "reset" => return Ok(Op::Reset),
        _ => {}
    }

    if let Some(addr) = s.strip_prefix("r:") {
        return Ok(Op::Read(parse_hex(addr, "address")?));
    }
    if let Some(rest) = s.strip_prefix("w:") {
        let (addr, value) = rest
            .split_once('=')
            .ok_or_else(|| anyhow!("write {:?} needs ADDR=VALUE", s))?;
        return Ok(Op::Write(
            parse_hex(addr, "address")?,
            parse_hex(value, "value")?,
        ));
    }
    bail!("unknown script op {:?}", s)
}

pub fn run(slot: &mut ExpansionSlot, ops: &[Op]) -> Vec<Step> {
    ops.iter()
        .map(|&op| {
            let (label, read) = match op {
                Op::Read(addr) => (format!("r:{:04X}", addr), Some(slot.cpu_read(addr))),
                Op::Write(addr, value) => {
                    slot.cpu_write(addr, value);
                    (format!("w:{:04X}={:02X}", addr, value), None)
                }
                Op::Freeze => {
                    slot.freeze();
                    ("freeze".to_string(), None)
                }
                Op::Reset => {
                    slot.reset();
                    ("reset".to_string(), None)
                }
            };
            Step {
                op: label,
                data: read.map(|r| r.data),
                driven: read.map(|r| r.drives),
                nmi: slot.nmi(),
                memory_config: format!("{:?}", slot.memory_config()),
            }
        })
        .collect()
}
