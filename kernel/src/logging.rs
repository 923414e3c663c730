//! The kernel's single `log::Log` implementation.
//!
//! Installed once during early bring-up, before the PIC/IDT come up, so
//! every later stage — and the exception/panic paths, which log before
//! transferring control to `halt` — can reach it. Formats records onto the
//! VGA console through the `print!` family; under `cfg(test)` (the
//! `kernel/tests/*.rs` integration binaries, which report results over the
//! serial/QEMU harness described in §10.4) records go to the serial port
//! instead, next to the rest of that harness's output.

use log::{LevelFilter, Log, Metadata, Record};

struct KernelLogger;

impl Log for KernelLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        #[cfg(test)]
        crate::serial_println!("[{}] {}", record.level(), record.args());
        #[cfg(not(test))]
        crate::println!("[{}] {}", record.level(), record.args());
    }

    fn flush(&self) {}
}

static LOGGER: KernelLogger = KernelLogger;

/// Installs [`KernelLogger`] as the `log` crate's global logger. Called
/// exactly once, from `bootstrap::kernel_entry`, before any other
/// subsystem (including the PIC and IDT) is brought up.
pub fn init() {
    log::set_logger(&LOGGER).expect("logger installed more than once");
    log::set_max_level(LevelFilter::Trace);
}
