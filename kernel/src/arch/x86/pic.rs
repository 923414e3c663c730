//! Cascaded 8259 Programmable Interrupt Controller.
//!
//! Byte-for-byte the same ICW1-4 bring-up sequence as
//! `original_source/student-distrib/i8259.c`'s `i8259_init`, with the same
//! shadow-mask-byte bookkeeping for `enable_irq`/`disable_irq` and the same
//! master/slave EOI split.

use spin::Mutex;

use crate::arch::x86::io::{inb, outb};

const MASTER_CMD: u16 = 0x20;
const MASTER_DATA: u16 = 0x21;
const SLAVE_CMD: u16 = 0xA0;
const SLAVE_DATA: u16 = 0xA1;

const ICW1_INIT: u8 = 0x11; // ICW4 present, cascade mode, edge triggered
const ICW2_MASTER: u8 = 0x20; // master vector offset: IRQ0 -> INT 0x20
const ICW2_SLAVE: u8 = 0x28; // slave vector offset: IRQ8 -> INT 0x28
const ICW3_MASTER: u8 = 0x04; // slave attached to master's IRQ2
const ICW3_SLAVE: u8 = 0x02; // slave's own cascade identity
const ICW4_8086: u8 = 0x01;

const MASK_ALL: u8 = 0xFF;
const EOI: u8 = 0x20;
const SLAVE_CONNECTION: u8 = 2;

struct Masks {
    master: u8,
    slave: u8,
}

static MASKS: Mutex<Masks> = Mutex::new(Masks {
    master: MASK_ALL,
    slave: MASK_ALL,
});

/// Runs the master/slave ICW1-4 sequence and leaves every line masked
/// except IRQ2 (the slave cascade), mirroring `i8259_init`.
pub fn init() {
    // SAFETY: programming the 8259 pair through its documented command/data
    // ports during one-time bring-up, before interrupts are enabled.
    unsafe {
        let saved_master = inb(MASTER_DATA);
        let saved_slave = inb(SLAVE_DATA);

        outb(MASTER_CMD, ICW1_INIT);
        outb(SLAVE_CMD, ICW1_INIT);
        outb(MASTER_DATA, ICW2_MASTER);
        outb(SLAVE_DATA, ICW2_SLAVE);
        outb(MASTER_DATA, ICW3_MASTER);
        outb(SLAVE_DATA, ICW3_SLAVE);
        outb(MASTER_DATA, ICW4_8086);
        outb(SLAVE_DATA, ICW4_8086);

        outb(MASTER_DATA, saved_master);
        outb(SLAVE_DATA, saved_slave);
    }

    enable_irq(SLAVE_CONNECTION);
}

/// Unmasks `irq` (0-15). IRQs 8-15 also require the master's cascade line
/// (IRQ2) to be unmasked, which `init` already does unconditionally.
pub fn enable_irq(irq: u8) {
    if irq >= 16 {
        return;
    }
    let mut masks = MASKS.lock();
    if irq < 8 {
        masks.master &= !(1 << irq);
        // SAFETY: writing a previously-computed mask byte to the master's
        // data port is the documented way to (un)mask an IRQ line.
        unsafe { outb(MASTER_DATA, masks.master) };
    } else {
        let bit = irq - 8;
        masks.slave &= !(1 << bit);
        // SAFETY: see above, slave's data port.
        unsafe { outb(SLAVE_DATA, masks.slave) };
    }
}

/// Masks `irq` (0-15).
pub fn disable_irq(irq: u8) {
    if irq >= 16 {
        return;
    }
    let mut masks = MASKS.lock();
    if irq < 8 {
        masks.master |= 1 << irq;
        // SAFETY: see `enable_irq`.
        unsafe { outb(MASTER_DATA, masks.master) };
    } else {
        let bit = irq - 8;
        masks.slave |= 1 << bit;
        // SAFETY: see `enable_irq`.
        unsafe { outb(SLAVE_DATA, masks.slave) };
    }
}

/// Sends end-of-interrupt for `irq` (0-15). IRQs >= 8 need an EOI on both
/// controllers since the slave's output is itself wired through the
/// master's IRQ2 input.
pub fn eoi(irq: u8) {
    if irq >= 16 {
        return;
    }
    if irq < 8 {
        // SAFETY: EOI write to the master command port.
        unsafe { outb(MASTER_CMD, EOI | irq) };
    } else {
        // SAFETY: EOI write to both controllers; the master's EOI is offset
        // by the slave's cascade identity, matching `send_eoi`.
        unsafe {
            outb(SLAVE_CMD, EOI | (irq - 8));
            outb(MASTER_CMD, EOI | SLAVE_CONNECTION);
        }
    }
}
