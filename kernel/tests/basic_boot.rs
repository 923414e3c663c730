//! Smoke test: the bring-up stages `bootstrap::kernel_entry` runs before
//! handing off to the scheduler all succeed against a real Multiboot1
//! loader, up through an enabled IDT and a populated page directory.
//!
//! Deliberately stops short of `sched::init`/`spawn_shell` — those never
//! return on real hardware, which is correct for the kernel binary but
//! would hang this test instead of letting it report a result.

#![no_std]
#![no_main]

use core::arch::global_asm;
use core::panic::PanicInfo;

use student_kernel::arch::x86::{gdt, idt, multiboot, paging, pic};
use student_kernel::test_framework::{exit_qemu, test_panic_handler, QemuExitCode};
use student_kernel::{config, fs, serial_println};

global_asm!(
    ".intel_syntax noprefix",
    ".section .multiboot_header, \"a\"",
    ".align 4",
    "multiboot_header:",
    ".long {magic}",
    ".long {flags}",
    ".long -({magic} + {flags})",
    ".section .bss",
    ".align 16",
    "boot_stack_bottom:",
    ".skip {stack_size}",
    "boot_stack_top:",
    ".section .text",
    ".global _start",
    "_start:",
    "mov esp, offset boot_stack_top",
    "mov ebp, esp",
    "push ebx",
    "push eax",
    "call test_entry",
    "cli",
    "2:",
    "hlt",
    "jmp 2b",
    ".att_syntax",
    magic = const config::MULTIBOOT1_HEADER_MAGIC,
    flags = const config::MULTIBOOT1_HEADER_FLAGS,
    stack_size = const config::BOOT_TRAMPOLINE_STACK_SIZE,
);

#[no_mangle]
pub extern "C" fn test_entry(magic: u32, multiboot_info_addr: u32) -> ! {
    serial_println!("Starting basic boot tests...");

    test_multiboot_magic(magic);
    test_descriptor_tables();
    test_paging();
    test_filesystem_image(multiboot_info_addr);

    serial_println!("All tests passed!");
    exit_qemu(QemuExitCode::Success)
}

fn test_multiboot_magic(magic: u32) {
    assert_eq!(magic, multiboot::MAGIC, "loader did not hand off via Multiboot1");
}

fn test_descriptor_tables() {
    gdt::init();
    idt::init();
    pic::init();
    serial_println!("GDT, IDT, and PIC initialized");
}

fn test_paging() {
    paging::init();
    serial_println!("Paging enabled");
}

fn test_filesystem_image(multiboot_info_addr: u32) {
    let fs_base = multiboot::fs_image_base(multiboot_info_addr)
        .expect("multiboot module table did not supply a filesystem image");
    fs::init(fs_base);
    // `.` is present in every filesystem image this kernel ships with.
    fs::lookup_by_name(b".").expect("root directory entry missing from mounted image");
    serial_println!("Filesystem image mounted and readable");
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    test_panic_handler(info)
}
