use criterion::{black_box, criterion_group, criterion_main, Criterion};
use emu_c64::cartridge::{Cartridge, CartridgeKind, FINAL3_ROM_SIZE};
use emu_c64::ExpansionSlot;
use emu_core::expansion::{ControlLines, ExpansionCard};

fn final3() -> Cartridge {
    let rom: Vec<u8> = (0..FINAL3_ROM_SIZE).map(|i| i as u8).collect();
    Cartridge::from_raw(CartridgeKind::Final3, rom).expect("64K image")
}

/// Sweep the 16K window the way a ROM-resident routine would
fn bench_rom_window_reads(c: &mut Criterion) {
    let cart = final3();
    c.bench_function("final3_rom_window_16k", |b| {
        b.iter(|| {
            let mut sum = 0u32;
            for addr in 0x8000u16..0xC000 {
                let lines = if addr < 0xA000 {
                    ControlLines::roml()
                } else {
                    ControlLines::romh()
                };
                sum = sum.wrapping_add(cart.read(black_box(addr), lines).data as u32);
            }
            black_box(sum)
        })
    });
}

/// Full slot path: event drain, region decode, dispatch
fn bench_slot_cpu_reads(c: &mut Criterion) {
    let mut slot = ExpansionSlot::new();
    slot.insert(final3());
    slot.cpu_write(0xDFFF, 0x02);

    c.bench_function("slot_cpu_read_16k", |b| {
        b.iter(|| {
            let mut sum = 0u32;
            for addr in 0x8000u16..0xC000 {
                sum = sum.wrapping_add(slot.cpu_read(black_box(addr)).data as u32);
            }
            black_box(sum)
        })
    });
}

criterion_group!(benches, bench_rom_window_reads, bench_slot_cpu_reads);
criterion_main!(benches);
