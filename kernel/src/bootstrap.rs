//! Bring-up sequence: the one path from `_start` to "terminal 0 is running a
//! shell with interrupts live".
//!
//! Staged `log::info!` banners bracket each subsystem's `init`: the
//! logger itself, descriptor tables, paging, the filesystem image,
//! devices, and the scheduler. There is no `alloc` feature and no
//! VFS/shell/package-manager stage here (see `DESIGN.md`'s "dropped
//! dependencies" section) — once devices and the scheduler are up, bring-up
//! ends by handing control to terminal 0's root shell exactly the way every
//! later `execute("shell")` call would.

use crate::{
    arch::x86::{gdt, idt, multiboot, paging, pic},
    drivers::{keyboard, pit, rtc, terminal},
    fs, logging, sched, serial, syscall,
};

/// Entry point called by the `_start` trampoline in
/// [`crate::arch::x86::multiboot`] with the registers GRUB left in `eax`/
/// `ebx`, already pushed onto the freshly-established boot stack in that
/// order. Never returns: the last stage hands off into terminal 0's shell,
/// which itself never returns (`syscall::halt_impl`'s parentless branch
/// keeps respawning it).
#[no_mangle]
pub extern "C" fn kernel_entry(magic: u32, multiboot_info_addr: u32) -> ! {
    serial::init();
    logging::init();
    log::info!("multiboot magic = {:#x}", magic);

    if magic != multiboot::MAGIC {
        panic!("not booted by a multiboot1-compliant loader (magic was {:#x})", magic);
    }

    log::info!("Starting kernel initialization...");

    log::info!("Stage 1: descriptor tables and interrupt controller");
    gdt::init();
    idt::init();
    pic::init();
    log::info!("Descriptor tables and PIC initialized");

    log::info!("Stage 2: paging");
    paging::init();
    log::info!("Paging enabled");

    log::info!("Stage 3: filesystem image");
    let fs_base = multiboot::fs_image_base(multiboot_info_addr)
        .expect("multiboot module table did not supply a filesystem image");
    fs::init(fs_base);
    log::info!("Filesystem image mounted");

    log::info!("Stage 4: devices");
    terminal::init();
    keyboard::init();
    rtc::init();
    pit::init();
    log::info!("VGA/terminal, keyboard, RTC, and PIT initialized");

    log::info!("Stage 5: scheduler");
    sched::init();
    log::info!("Scheduler activated");

    log::info!("Stage 6: launching terminal 0's shell");
    terminal::mark_hosted(0);
    // `spawn_shell` transitions to ring 3 with IF set in the pushed
    // eflags, which is this kernel's only `sti` — there is nothing left
    // to preempt before interrupts come on with the very first process.
    // A halt with no parent respawns in place (see `syscall::halt_impl`),
    // so this call never returns; the loop is a belt-and-suspenders
    // backstop, not a real retry path.
    loop {
        let _ = syscall::spawn_shell(0);
    }
}
