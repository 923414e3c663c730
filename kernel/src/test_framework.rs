//! Support for the bare-metal integration binaries under `kernel/tests/`.
//!
//! Those binaries each bring themselves up far enough to exercise one
//! subsystem, report over serial, and exit QEMU through the
//! `isa-debug-exit` device — there is no collected-test-case harness here
//! (no `#[test_case]`/`custom_test_frameworks`), just plain `assert_eq!`
//! calls in a hand-written `_start`/`test_entry`, wired to this module's
//! panic handler and exit helper.

use core::panic::PanicInfo;

use crate::serial_println;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum QemuExitCode {
    Success = 0x10,
    Failed = 0x11,
}

/// Panic handler for test mode.
pub fn test_panic_handler(info: &PanicInfo) -> ! {
    serial_println!("[failed]\n");
    serial_println!("Error: {}\n", info);
    exit_qemu(QemuExitCode::Failed);
}

/// Exit QEMU with a specific exit code.
///
/// Writes the exit code to the `isa-debug-exit` device at port `0xf4`
/// (the `-device isa-debug-exit,iobase=0xf4,iosize=0x04` QEMU flag this
/// kernel's test harness is run with), which terminates the emulator with
/// status `(exit_code << 1) | 1`. There is only one target here, so this
/// always goes through `arch::x86::io::outw`.
pub fn exit_qemu(exit_code: QemuExitCode) -> ! {
    // SAFETY: port 0xf4 is the QEMU debug-exit device configured for this
    // kernel's test runs; QEMU exits before the instruction after the
    // write would ever execute.
    unsafe {
        crate::arch::x86::io::outw(0xf4, exit_code as u32 as u16);
        core::hint::unreachable_unchecked();
    }
}
