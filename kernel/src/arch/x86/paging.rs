//! Two-level x86 paging: a 1024-entry page directory mixing 4MiB pages
//! (kernel image, per-process user frames) with one 4KiB-paged entry
//! (the low 4MiB, covering VGA text memory and the per-terminal shadow
//! video pages) and a second 4KiB page table for the user video mapping.
//!
//! Field-for-field the same directory/table layout as
//! `original_source/student-distrib/paging.c`/`paging.h`; the packed C
//! bitfield structs are replaced with plain `u32` entries built from
//! `bitflags`, matching how the rest of this kernel represents hardware bit
//! fields.

use bitflags::bitflags;
use spin::Mutex;

use crate::{
    arch::x86::io,
    config,
    error::{KernelResult, PagingError},
};

bitflags! {
    #[derive(Clone, Copy)]
    struct PageFlags: u32 {
        const PRESENT        = 1 << 0;
        const WRITABLE       = 1 << 1;
        const USER           = 1 << 2;
        const WRITE_THROUGH  = 1 << 3;
        const CACHE_DISABLE  = 1 << 4;
        const ACCESSED       = 1 << 5;
        const PAGE_SIZE_4MB  = 1 << 7; // directory entries only
        const GLOBAL         = 1 << 8;
    }
}

fn entry(phys_addr: u32, flags: PageFlags) -> u32 {
    (phys_addr & 0xFFFF_F000) | flags.bits()
}

#[repr(align(4096))]
struct PageDirectory([u32; 1024]);

#[repr(align(4096))]
struct PageTable([u32; 1024]);

static PAGE_DIRECTORY: Mutex<PageDirectory> = Mutex::new(PageDirectory([0; 1024]));
static LOW_PAGE_TABLE: Mutex<PageTable> = Mutex::new(PageTable([0; 1024]));
static VIDMAP_PAGE_TABLE: Mutex<PageTable> = Mutex::new(PageTable([0; 1024]));

/// Builds the directory described above and turns paging on. Must run
/// after the kernel's own image/data/bss (all below 8 MiB) are in their
/// final link locations, since directory entry 1 identity-maps them.
pub fn init() {
    let mut dir = PAGE_DIRECTORY.lock();
    let mut low_table = LOW_PAGE_TABLE.lock();

    // Every directory entry defaults to a (non-present) identity 4MiB page;
    // only entries 0 and 1 are marked present below. This mirrors the
    // original's "initialize all 1024, then override the two that matter"
    // structure rather than leaving the unused 1022 entries zeroed.
    for (i, slot) in dir.0.iter_mut().enumerate() {
        *slot = entry(
            (i as u32) << 22,
            PageFlags::WRITABLE | PageFlags::PAGE_SIZE_4MB | PageFlags::GLOBAL,
        );
    }

    for (i, slot) in low_table.0.iter_mut().enumerate() {
        *slot = entry((i as u32) << 12, PageFlags::WRITABLE);
    }

    // VGA text-mode plane: the only present page below the 1MiB mark the
    // kernel itself touches directly.
    let vga_index = config::VGA_PHYS_ADDR >> 12;
    low_table.0[vga_index] = entry(
        config::VGA_PHYS_ADDR as u32,
        PageFlags::PRESENT | PageFlags::WRITABLE,
    );

    // Per-terminal shadow video buffers (CP5 alt-video scheme): present,
    // user-accessible, matching `original_source/student-distrib/paging.c`'s
    // CP5 block (`user_supervisor = 1` on these same five pages).
    for offset in 0..config::NUM_ALT_VIDEO_PAGES {
        let index = config::ALT_VIDEO_PAGE_START + offset;
        let phys = (index as u32) << 12;
        low_table.0[index] = entry(
            phys,
            PageFlags::PRESENT | PageFlags::WRITABLE | PageFlags::USER,
        );
    }

    let low_table_addr = low_table.0.as_ptr() as u32;
    dir.0[0] = entry(low_table_addr, PageFlags::PRESENT | PageFlags::WRITABLE);
    dir.0[1] = entry(
        config::KERNEL_START_ADDR as u32,
        PageFlags::PRESENT | PageFlags::WRITABLE | PageFlags::PAGE_SIZE_4MB | PageFlags::GLOBAL,
    );

    let dir_addr = dir.0.as_ptr() as u32;
    drop(low_table);
    drop(dir);

    // SAFETY: `dir_addr` is the address of `PAGE_DIRECTORY`, fully
    // populated above and identity-mapped by its own entry 1 (it lives in
    // kernel `.bss`, below 8MiB); PSE must be enabled before PG since
    // entry 1 is a 4MiB page.
    unsafe {
        io::load_cr3(dir_addr);
        io::enable_pse();
        io::enable_paging();
    }
}

/// Maps directory index [`config::PDE_USER_PROCESS`] to `pid`'s 4MiB user
/// frame and flushes the TLB. Called by `execute`/the scheduler on every
/// switch into a different process.
pub fn map_process(pid: u8) -> KernelResult<()> {
    if pid as usize >= config::MAX_PROCESSES {
        return Err(PagingError::BadDirectoryIndex.into());
    }
    let phys = config::USER_FRAME_BASE as u32 + pid as u32 * config::USER_FRAME_SIZE as u32;
    let mut dir = PAGE_DIRECTORY.lock();
    dir.0[config::PDE_USER_PROCESS] = entry(
        phys,
        PageFlags::PRESENT
            | PageFlags::WRITABLE
            | PageFlags::USER
            | PageFlags::PAGE_SIZE_4MB
            | PageFlags::GLOBAL,
    );
    drop(dir);
    // SAFETY: directory still describes a fully-populated mapping; only
    // entry `PDE_USER_PROCESS` changed.
    unsafe { io::flush_tlb() };
    Ok(())
}

/// Installs a user-accessible 4KiB mapping of the live VGA plane at
/// directory index [`config::PDE_USER_VIDEO`] and returns the virtual
/// address it is mapped at. Used by `syscall::vidmap`.
pub fn map_user_video() -> u32 {
    let mut vidmap_table = VIDMAP_PAGE_TABLE.lock();
    vidmap_table.0[0] = entry(
        config::VGA_PHYS_ADDR as u32,
        PageFlags::PRESENT | PageFlags::WRITABLE | PageFlags::USER,
    );
    let table_addr = vidmap_table.0.as_ptr() as u32;
    drop(vidmap_table);

    let mut dir = PAGE_DIRECTORY.lock();
    dir.0[config::PDE_USER_VIDEO] = entry(
        table_addr,
        PageFlags::PRESENT | PageFlags::WRITABLE | PageFlags::USER,
    );
    drop(dir);

    // SAFETY: directory still fully populated; only entry
    // `PDE_USER_VIDEO` changed.
    unsafe { io::flush_tlb() };
    config::USER_VIDMAP_VIRT as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_masks_flags_into_low_bits() {
        let e = entry(0x0040_0000, PageFlags::PRESENT | PageFlags::WRITABLE);
        assert_eq!(e & 0xFFF, 0b11);
        assert_eq!(e & 0xFFFF_F000, 0x0040_0000);
    }

    #[test]
    fn map_process_rejects_out_of_range_pid() {
        assert!(map_process(config::MAX_PROCESSES as u8).is_err());
    }
}
