//! Programmable Interval Timer: programs channel 0 for the scheduler's
//! periodic tick.
//!
//! Not grounded in a dedicated original-source file — the reference
//! `student-distrib` tree drives its round robin straight off the RTC and
//! never touches the 8253/8254 — so this follows the same
//! register-programming idiom as [`crate::arch::x86::pic`] applied to the
//! standard PIT mode-3 (square wave) bring-up sequence.

use crate::{
    arch::x86::{io, pic},
    config,
};

const CHANNEL0_DATA: u16 = 0x40;
const COMMAND: u16 = 0x43;
/// Channel 0, lobyte/hibyte access, mode 3 (square wave), binary count.
const MODE_CHANNEL0_SQUARE_WAVE: u8 = 0x36;

/// Programs channel 0 to fire at `config::PIT_FREQUENCY_HZ` and unmasks
/// IRQ0. Must run once during bring-up.
pub fn init() {
    let divisor = divisor_for(config::PIT_FREQUENCY_HZ);
    // SAFETY: one-time PIT channel 0 programming during bring-up, before
    // interrupts are enabled.
    unsafe {
        io::outb(COMMAND, MODE_CHANNEL0_SQUARE_WAVE);
        io::outb(CHANNEL0_DATA, (divisor & 0xFF) as u8);
        io::outb(CHANNEL0_DATA, (divisor >> 8) as u8);
    }
    pic::enable_irq(config::IRQ_PIT);
}

fn divisor_for(hz: u32) -> u16 {
    (config::PIT_BASE_FREQUENCY_HZ / hz) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hundred_hz_divisor_matches_base_clock() {
        assert_eq!(divisor_for(100), 11931);
    }
}
