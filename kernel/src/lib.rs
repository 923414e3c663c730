//! Kernel library crate.
//!
//! Split from `main.rs` so that the hosted `#[cfg(test)]` unit tests (fs
//! stride arithmetic, the fd allocator, the scancode table, the getargs
//! parser, the PID allocator) can run on the host target with the standard
//! `#[test]` harness, while the bare-metal binary links the same code
//! against the custom `i686-kernel.json` target.

#![no_std]
#![cfg_attr(target_os = "none", no_main)]

#[macro_use]
pub mod print;

pub mod arch;
pub mod bootstrap;
pub mod config;
pub mod drivers;
pub mod elf;
pub mod error;
pub mod fs;
mod intrinsics;
pub mod logging;
pub mod process;
pub mod sched;
pub mod serial;
pub mod syscall;
pub mod test_framework;

// Only the non-test bare-metal build gets a panic handler from the library:
// the `kernel/tests/*.rs` integration binaries (built under `cargo test`,
// so `cfg(test)` holds for them too) each supply their own through
// `test_framework::test_panic_handler`, and the production binary
// (`main.rs`) links against this one.
#[cfg(all(not(test), target_os = "none"))]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    log::error!("kernel panic: {}", info);
    // SAFETY: halting with interrupts disabled is always safe; there is no
    // further forward progress possible after a kernel panic.
    unsafe { arch::x86::io::cli() };
    loop {
        // SAFETY: `hlt` with interrupts masked just parks the CPU.
        unsafe { core::arch::asm!("hlt") };
    }
}
