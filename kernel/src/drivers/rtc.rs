//! Real-time clock: one shared hardware periodic-interrupt source, exposed
//! through a single "a tick occurred" flag rather than per-process virtual
//! frequencies.
//!
//! CMOS register layout and the rate-select table are one-for-one with
//! `original_source/student-distrib/rtc.c`; `rtc_open`/`rtc_close` both
//! reprogram the 2 Hz default there too.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::{
    arch::x86::{io, pic},
    config,
    error::{DeviceError, KernelResult},
};

const RTC_PORT: u16 = 0x70;
const CMOS_PORT: u16 = 0x71;
const REGISTER_A: u8 = 0x0A;
const REGISTER_B: u8 = 0x0B;
const REGISTER_C: u8 = 0x0C;
const DISABLE_NMI: u8 = 0x80;
const PERIODIC_INTERRUPT_ENABLE: u8 = 0x40;
const FREQ_MASK: u8 = 0xF0;

/// Register-A rate-select nibble for each accepted frequency, indexed by
/// `log2(hz) - 1` (2 Hz at index 0, up to 1024 Hz at index 9).
const RATE_FOR_LOG2: [u8; 10] = [0x0F, 0x0E, 0x0D, 0x0C, 0x0B, 0x0A, 0x09, 0x08, 0x07, 0x06];
const DEFAULT_RATE: u8 = RATE_FOR_LOG2[0];

static TICK_OCCURRED: AtomicBool = AtomicBool::new(false);

fn validate_frequency(hz: u32) -> KernelResult<u8> {
    if !hz.is_power_of_two() || !(2..=1024).contains(&hz) {
        return Err(DeviceError::BadRtcFrequency.into());
    }
    let log2 = hz.trailing_zeros() as usize;
    Ok(RATE_FOR_LOG2[log2 - 1])
}

fn set_rate(rate_bits: u8) {
    // SAFETY: standard CMOS register-A read-modify-write sequence.
    unsafe {
        io::outb(RTC_PORT, DISABLE_NMI | REGISTER_A);
        let prev = io::inb(CMOS_PORT);
        io::outb(RTC_PORT, DISABLE_NMI | REGISTER_A);
        io::outb(CMOS_PORT, (prev & FREQ_MASK) | rate_bits);
    }
}

/// Runs once during bring-up: enables periodic interrupts at the default
/// 2 Hz rate and unmasks IRQ 8.
pub fn init() {
    // SAFETY: standard CMOS register-B read-modify-write, one-time bring-up.
    unsafe {
        io::outb(RTC_PORT, DISABLE_NMI | REGISTER_B);
        let prev = io::inb(CMOS_PORT);
        io::outb(RTC_PORT, DISABLE_NMI | REGISTER_B);
        io::outb(CMOS_PORT, prev | PERIODIC_INTERRUPT_ENABLE);
    }
    set_rate(DEFAULT_RATE);
    pic::enable_irq(config::IRQ_RTC);
}

/// `rtc_open`: every open reprograms the shared clock back to 2 Hz.
pub fn open() {
    set_rate(DEFAULT_RATE);
}

/// `rtc_read`: busy-waits (with interrupts enabled) for the next periodic
/// interrupt, then clears the flag. Always consumes exactly one tick.
pub fn read() {
    TICK_OCCURRED.store(false, Ordering::SeqCst);
    while !TICK_OCCURRED.load(Ordering::SeqCst) {
        core::hint::spin_loop();
    }
    TICK_OCCURRED.store(false, Ordering::SeqCst);
}

/// `rtc_write`: `buf` must be exactly a little-endian `u32` naming the new
/// shared interrupt rate, a power of 2 in `[2, 1024]`.
pub fn write(buf: &[u8]) -> KernelResult<()> {
    if buf.len() != 4 {
        return Err(DeviceError::BadRtcFrequency.into());
    }
    let hz = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let rate = validate_frequency(hz)?;
    set_rate(rate);
    Ok(())
}

/// `rtc_close`: reprograms the shared clock back to 2 Hz.
pub fn close() {
    set_rate(DEFAULT_RATE);
}

#[no_mangle]
extern "C" fn rtc_interrupt_handler() {
    // SAFETY: standard register-C acknowledge sequence, run with interrupts
    // masked by the IDT gate for the duration of the handler.
    unsafe {
        io::outb(RTC_PORT, REGISTER_C);
        io::inb(CMOS_PORT);
    }
    TICK_OCCURRED.store(true, Ordering::SeqCst);
    pic::eoi(config::IRQ_RTC);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_power_of_two() {
        assert!(validate_frequency(3).is_err());
    }

    #[test]
    fn rejects_out_of_range_power_of_two() {
        assert!(validate_frequency(2048).is_err());
        assert!(validate_frequency(1).is_err());
    }

    #[test]
    fn accepts_every_documented_rate() {
        for hz in [2u32, 4, 8, 16, 32, 64, 128, 256, 512, 1024] {
            assert!(validate_frequency(hz).is_ok());
        }
    }

    #[test]
    fn write_rejects_wrong_length() {
        assert!(write(&[1, 2, 3]).is_err());
    }
}
