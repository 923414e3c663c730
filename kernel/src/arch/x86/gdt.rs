//! 32-bit Global Descriptor Table and Task State Segment.
//!
//! No crate wraps `GlobalDescriptorTable`/`TaskStateSegment` for IA-32, so
//! the descriptors here are raw bytes behind a `lazy_static`, exposing a
//! `Selectors` struct and a `set_kernel_stack` entry point the scheduler
//! calls on every context switch.

use core::arch::asm;

use lazy_static::lazy_static;
use spin::Mutex;

pub const KERNEL_CODE_SELECTOR: u16 = 0x08;
pub const KERNEL_DATA_SELECTOR: u16 = 0x10;
pub const USER_CODE_SELECTOR: u16 = 0x18 | 3;
pub const USER_DATA_SELECTOR: u16 = 0x20 | 3;
pub const TSS_SELECTOR: u16 = 0x28;

#[repr(C, packed)]
#[derive(Clone, Copy)]
struct GdtEntry {
    limit_low: u16,
    base_low: u16,
    base_mid: u8,
    access: u8,
    granularity: u8,
    base_high: u8,
}

impl GdtEntry {
    const fn new(base: u32, limit: u32, access: u8, flags: u8) -> Self {
        Self {
            limit_low: (limit & 0xFFFF) as u16,
            base_low: (base & 0xFFFF) as u16,
            base_mid: ((base >> 16) & 0xFF) as u8,
            access,
            granularity: (((limit >> 16) & 0x0F) as u8) | (flags << 4),
            base_high: ((base >> 24) & 0xFF) as u8,
        }
    }

    const fn null() -> Self {
        Self {
            limit_low: 0,
            base_low: 0,
            base_mid: 0,
            access: 0,
            granularity: 0,
            base_high: 0,
        }
    }
}

#[repr(C, packed)]
struct GdtPointer {
    limit: u16,
    base: u32,
}

/// Task State Segment, 32-bit layout. Only `ss0`/`esp0` are used by this
/// kernel (the ring0 stack to load on a privilege-level change via
/// interrupt/syscall); every other field is zeroed and unused because there
/// is no hardware task-switching here.
#[repr(C, packed)]
pub struct Tss {
    prev_task: u16,
    reserved0: u16,
    pub esp0: u32,
    pub ss0: u16,
    reserved1: u16,
    esp1: u32,
    ss1: u16,
    reserved2: u16,
    esp2: u32,
    ss2: u16,
    reserved3: u16,
    cr3: u32,
    eip: u32,
    eflags: u32,
    eax: u32,
    ecx: u32,
    edx: u32,
    ebx: u32,
    esp: u32,
    ebp: u32,
    esi: u32,
    edi: u32,
    es: u16,
    reserved4: u16,
    cs: u16,
    reserved5: u16,
    ss: u16,
    reserved6: u16,
    ds: u16,
    reserved7: u16,
    fs: u16,
    reserved8: u16,
    gs: u16,
    reserved9: u16,
    ldt: u16,
    reserved10: u16,
    trap: u16,
    iomap_base: u16,
}

impl Tss {
    const fn new() -> Self {
        Self {
            prev_task: 0,
            reserved0: 0,
            esp0: 0,
            ss0: KERNEL_DATA_SELECTOR,
            reserved1: 0,
            esp1: 0,
            ss1: 0,
            reserved2: 0,
            esp2: 0,
            ss2: 0,
            reserved3: 0,
            cr3: 0,
            eip: 0,
            eflags: 0,
            eax: 0,
            ecx: 0,
            edx: 0,
            ebx: 0,
            esp: 0,
            ebp: 0,
            esi: 0,
            edi: 0,
            es: 0,
            reserved4: 0,
            cs: 0,
            reserved5: 0,
            ss: 0,
            reserved6: 0,
            ds: 0,
            reserved7: 0,
            fs: 0,
            reserved8: 0,
            gs: 0,
            reserved9: 0,
            ldt: 0,
            reserved10: 0,
            trap: 0,
            iomap_base: core::mem::size_of::<Tss>() as u16,
        }
    }
}

static TSS: Mutex<Tss> = Mutex::new(Tss::new());

struct Gdt {
    entries: [GdtEntry; 6],
}

lazy_static! {
    static ref GDT: Gdt = {
        let tss_addr = {
            let tss = TSS.lock();
            &*tss as *const Tss as u32
        };
        let tss_size = core::mem::size_of::<Tss>() as u32;
        Gdt {
            entries: [
                GdtEntry::null(),
                GdtEntry::new(0, 0xFFFFF, 0x9A, 0xC), // kernel code, ring0
                GdtEntry::new(0, 0xFFFFF, 0x92, 0xC), // kernel data, ring0
                GdtEntry::new(0, 0xFFFFF, 0xFA, 0xC), // user code, ring3
                GdtEntry::new(0, 0xFFFFF, 0xF2, 0xC), // user data, ring3
                GdtEntry::new(tss_addr, tss_size - 1, 0x89, 0x0), // TSS, available 32-bit
            ],
        }
    };
}

/// Builds the GDT/TSS and loads them. Must run before the IDT is installed
/// (interrupt gates reference `KERNEL_CODE_SELECTOR`) and before any ring
/// transition is attempted (the TSS must hold a valid `esp0` by then).
pub fn init() {
    let gdt = &*GDT;
    let pointer = GdtPointer {
        limit: (core::mem::size_of::<[GdtEntry; 6]>() - 1) as u16,
        base: gdt.entries.as_ptr() as u32,
    };

    // SAFETY: `pointer` describes the static GDT built above, whose lifetime
    // is `'static`; loading it and reloading every segment register to a
    // selector that GDT actually defines is the standard 32-bit GDT
    // bring-up sequence.
    unsafe {
        asm!(
            "lgdt [{0}]",
            in(reg) &pointer,
            options(readonly, nostack, preserves_flags)
        );
        reload_segments();
        asm!(
            "ltr {0:x}",
            in(reg) TSS_SELECTOR,
            options(nostack, preserves_flags)
        );
    }
}

/// # Safety
/// Must only run immediately after `lgdt`, with `KERNEL_CODE_SELECTOR`/
/// `KERNEL_DATA_SELECTOR` pointing at valid ring-0 descriptors.
unsafe fn reload_segments() {
    // SAFETY: far-jumping to the freshly-loaded kernel code selector and
    // reloading the data segment registers to the kernel data selector is
    // required after every `lgdt` that changes selector layout. This kernel
    // is statically linked at a fixed address with `relocation-model:
    // static`, so `2f`'s address is a plain link-time absolute value; `retf`
    // is fed that absolute label address pushed straight onto the stack.
    unsafe {
        asm!(
            "push {code_sel}",
            "push 2f",
            "retf",
            "2:",
            "mov ax, {data_sel:x}",
            "mov ds, ax",
            "mov es, ax",
            "mov fs, ax",
            "mov gs, ax",
            "mov ss, ax",
            code_sel = in(reg) KERNEL_CODE_SELECTOR as u32,
            data_sel = in(reg) KERNEL_DATA_SELECTOR,
            options(preserves_flags)
        );
    }
}

/// Reprograms the TSS's ring-0 stack. Called by the scheduler on every
/// context switch: each process's kernel stack only exists for the
/// duration it is running, so `esp0` must point at the incoming process's
/// stack top before `iret`/the next interrupt can safely use it.
pub fn set_kernel_stack(esp0: u32) {
    TSS.lock().esp0 = esp0;
}
