//! 256-entry Interrupt Descriptor Table: CPU exceptions, the three wired
//! IRQs (PIT, keyboard, RTC), and the `int 0x80` syscall gate.
//!
//! Gate layout and the set of vectors wired up follow
//! `original_source/student-distrib/idt.c`/`idt.h` one-for-one, with one
//! deliberate change: the original's per-exception handler prints a
//! diagnostic and then spins forever (`while(1){}`); here
//! [`exception_dispatch`] terminates the offending process with
//! `syscall::halt(256)` instead, so a user-program fault no longer wedges
//! the whole machine. `interrupt_linkage.h`'s three `extern` trampoline
//! declarations and `syscall.c`'s `HALT_RET`-style "push state, call,
//! don't expect a return" trampoline shape are mirrored in the `global_asm!`
//! block below instead of hand-linked assembly files.

use core::arch::global_asm;

use lazy_static::lazy_static;

use crate::{arch::x86::gdt::KERNEL_CODE_SELECTOR, config};

const GATE_INTERRUPT_32: u8 = 0x0E;
const PRESENT: u8 = 0x80;

fn type_attr(dpl: u8, gate_type: u8) -> u8 {
    PRESENT | ((dpl & 0x3) << 5) | gate_type
}

#[repr(C, packed)]
#[derive(Clone, Copy)]
struct IdtEntry {
    offset_low: u16,
    selector: u16,
    zero: u8,
    type_attr: u8,
    offset_high: u16,
}

impl IdtEntry {
    const fn missing() -> Self {
        Self {
            offset_low: 0,
            selector: 0,
            zero: 0,
            type_attr: 0,
            offset_high: 0,
        }
    }

    fn new(handler: u32, dpl: u8) -> Self {
        Self {
            offset_low: (handler & 0xFFFF) as u16,
            selector: KERNEL_CODE_SELECTOR,
            zero: 0,
            type_attr: type_attr(dpl, GATE_INTERRUPT_32),
            offset_high: ((handler >> 16) & 0xFFFF) as u16,
        }
    }
}

#[repr(C, packed)]
struct IdtPointer {
    limit: u16,
    base: u32,
}

struct Idt {
    entries: [IdtEntry; config::IDT_ENTRIES],
}

extern "C" {
    fn isr0();
    fn isr1();
    fn isr2();
    fn isr3();
    fn isr4();
    fn isr5();
    fn isr6();
    fn isr7();
    fn isr8();
    fn isr9();
    fn isr10();
    fn isr11();
    fn isr12();
    fn isr13();
    fn isr14();
    fn isr15();
    fn isr16();
    fn isr17();
    fn isr18();
    fn isr19();
    fn pit_stub();
    fn keyboard_stub();
    fn rtc_stub();
    fn syscall_stub();
}

lazy_static! {
    static ref IDT: Idt = {
        let mut idt = Idt {
            entries: [IdtEntry::missing(); config::IDT_ENTRIES],
        };

        let exceptions: [unsafe extern "C" fn(); 20] = [
            isr0, isr1, isr2, isr3, isr4, isr5, isr6, isr7, isr8, isr9, isr10, isr11, isr12,
            isr13, isr14, isr15, isr16, isr17, isr18, isr19,
        ];
        for (vector, handler) in exceptions.into_iter().enumerate() {
            idt.entries[vector] = IdtEntry::new(handler as usize as u32, 0);
        }

        idt.entries[config::VECTOR_PIT as usize] = IdtEntry::new(pit_stub as usize as u32, 0);
        idt.entries[config::VECTOR_KEYBOARD as usize] =
            IdtEntry::new(keyboard_stub as usize as u32, 0);
        idt.entries[config::VECTOR_RTC as usize] = IdtEntry::new(rtc_stub as usize as u32, 0);
        // Only gate in the whole table reachable from ring 3.
        idt.entries[config::VECTOR_SYSCALL as usize] =
            IdtEntry::new(syscall_stub as usize as u32, 3);

        idt
    };
}

/// Builds and loads the IDT. Must run after [`crate::arch::x86::gdt::init`]
/// (gates reference `KERNEL_CODE_SELECTOR`) and before `sti`.
pub fn init() {
    let idt = &*IDT;
    let pointer = IdtPointer {
        limit: (core::mem::size_of::<[IdtEntry; config::IDT_ENTRIES]>() - 1) as u16,
        base: idt.entries.as_ptr() as u32,
    };
    // SAFETY: `pointer` describes the `'static` table built above.
    unsafe {
        core::arch::asm!(
            "lidt [{0}]",
            in(reg) &pointer,
            options(readonly, nostack, preserves_flags)
        );
    }
}

/// Exception vectors 0-19, dispatched from the `isrN` stubs below. Replaces
/// the original's "print and spin forever" tail with killing the faulting
/// process; see the module doc comment.
#[no_mangle]
extern "C" fn exception_dispatch(vector: u32, error_code: u32) -> ! {
    log::error!("cpu exception {vector} (error code {error_code:#x}), halting process");
    crate::syscall::halt_current(256);
}

global_asm!(
    ".intel_syntax noprefix",
    // Exceptions 0-7, 9, 15-16, 18-19: CPU pushes no error code, push a
    // dummy 0 so every stub lands on `exception_common` with the same
    // [errcode, vector] stack shape.
    ".macro exc_noerr vector",
    ".global isr\\vector",
    "isr\\vector:",
    "push 0",
    "push \\vector",
    "jmp exception_common",
    ".endm",
    // Exceptions 8, 10-14, 17: CPU already pushed a real error code.
    ".macro exc_err vector",
    ".global isr\\vector",
    "isr\\vector:",
    "push \\vector",
    "jmp exception_common",
    ".endm",
    "exc_noerr 0",
    "exc_noerr 1",
    "exc_noerr 2",
    "exc_noerr 3",
    "exc_noerr 4",
    "exc_noerr 5",
    "exc_noerr 6",
    "exc_noerr 7",
    "exc_err   8",
    "exc_noerr 9",
    "exc_err   10",
    "exc_err   11",
    "exc_err   12",
    "exc_err   13",
    "exc_err   14",
    "exc_noerr 15",
    "exc_noerr 16",
    "exc_err   17",
    "exc_noerr 18",
    "exc_noerr 19",
    "exception_common:",
    // Stack here: [esp]=vector, [esp+4]=error_code. cdecl wants the first
    // parameter nearest the top, which it already is.
    "call exception_dispatch",
    // exception_dispatch never returns.
    "2:",
    "hlt",
    "jmp 2b",
    ".global pit_stub",
    "pit_stub:",
    "pusha",
    "push esp",
    "call pit_interrupt_handler",
    "add esp, 4",
    "mov esp, eax",
    "popa",
    "iretd",
    ".global keyboard_stub",
    "keyboard_stub:",
    "pusha",
    "call keyboard_interrupt_handler",
    "popa",
    "iretd",
    ".global rtc_stub",
    "rtc_stub:",
    "pusha",
    "call rtc_interrupt_handler",
    "popa",
    "iretd",
    ".global syscall_stub",
    "syscall_stub:",
    "push edx",
    "push ecx",
    "push ebx",
    "push eax",
    "call syscall_dispatch",
    "add esp, 16",
    "iretd",
    ".att_syntax",
);

extern "C" {
    fn keyboard_interrupt_handler();
    fn rtc_interrupt_handler();
}

#[no_mangle]
extern "C" fn pit_interrupt_handler(current_esp: u32) -> u32 {
    crate::sched::on_tick(current_esp)
}

#[no_mangle]
extern "C" fn syscall_dispatch(num: u32, a1: u32, a2: u32, a3: u32) -> i32 {
    crate::syscall::dispatch(num, a1, a2, a3)
}
