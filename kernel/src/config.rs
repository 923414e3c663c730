//! Compile-time kernel configuration.
//!
//! Every magic number the boot sequence and the modules built on top of it
//! would otherwise re-derive locally lives here instead. Nothing in this
//! kernel is configurable past compile time: the process ceiling, terminal
//! count, and physical memory layout are all fixed by the hardware contract
//! described in the design docs, not read from a config file.

/// Number of virtual terminals multiplexed onto the VGA hardware.
pub const NUM_TERMINALS: usize = 3;

/// Maximum number of simultaneously running user processes.
pub const MAX_PROCESSES: usize = 6;

/// Size in bytes of each process's kernel stack (and the PCB that sits atop
/// it).
pub const KERNEL_STACK_SIZE: usize = 0x2000; // 8 KiB

/// Physical address at which the kernel image is linked.
pub const KERNEL_START_ADDR: usize = 0x0040_0000; // 4 MiB

/// Multiboot1 header magic, checked by GRUB against the loaded image.
pub const MULTIBOOT1_HEADER_MAGIC: u32 = 0x1BAD_B002;

/// Multiboot1 header flags: align loaded modules on page boundaries and
/// request the `mem_*`/`mods_*` fields this kernel reads out of `Info`.
pub const MULTIBOOT1_HEADER_FLAGS: u32 = 0x0000_0003;

/// Size of the throwaway stack each bootable binary's `_start` trampoline
/// sets up for itself before calling into Rust.
pub const BOOT_TRAMPOLINE_STACK_SIZE: u32 = 0x4000; // 16 KiB

/// Physical address marking the end of the kernel's 4 MiB image region and
/// the base from which per-process kernel stack slots are carved downward.
pub const KERNEL_STACK_BASE: usize = 0x0080_0000; // 8 MiB

/// Physical base of the first process's 4 MiB user frame; process `pid`
/// occupies `[USER_FRAME_BASE + pid * 4MiB, USER_FRAME_BASE + (pid+1) * 4MiB)`.
pub const USER_FRAME_BASE: usize = 0x0080_0000; // 8 MiB
pub const USER_FRAME_SIZE: usize = 0x0040_0000; // 4 MiB

/// Virtual address at which the active process's user frame is mapped.
pub const USER_VIRT_BASE: usize = 0x0800_0000; // 128 MiB
/// Virtual address at which the per-process video page is mapped.
pub const USER_VIDMAP_VIRT: usize = 0x0880_0000; // 136 MiB

/// Page directory indices touched by map_process / map_user_video.
pub const PDE_USER_PROCESS: usize = 32;
pub const PDE_USER_VIDEO: usize = 34;

/// Where user programs are loaded and where their stack starts.
pub const USER_IMAGE_VIRT: usize = 0x0804_8000;
pub const USER_STACK_TOP: usize = 0x083F_FFFC;

/// Physical address of the VGA text-mode plane.
pub const VGA_PHYS_ADDR: usize = 0xB_8000;
/// Physical pages reserved for per-terminal shadow video buffers (CP5 alt
/// video scheme): 0xB8000 is the live plane; 0xB9000..0xBC000 back the
/// three terminals' shadow copies (one spare page beyond that).
pub const ALT_VIDEO_PAGE_START: usize = 0xB8; // page-table index (>> 12)
pub const NUM_ALT_VIDEO_PAGES: usize = 5;

/// Filesystem block size.
pub const BLOCK_SIZE: usize = 4096;
/// Maximum dentries in the boot block.
pub const MAX_DENTRIES: usize = 63;
/// Maximum data-block indices per inode.
pub const MAX_INODE_BLOCKS: usize = 1023;
/// Maximum bytes in a filename.
pub const NAME_LEN: usize = 32;

/// Open-file-table size per process; slots 0/1 are pinned to stdin/stdout.
pub const FD_TABLE_SIZE: usize = 8;

/// Maximum length of a raw command line passed to execute().
pub const MAX_COMMAND_LEN: usize = 128;

/// PIT frequency the scheduler tick is programmed to, in Hz.
pub const PIT_FREQUENCY_HZ: u32 = 100;
/// PIT input oscillator frequency.
pub const PIT_BASE_FREQUENCY_HZ: u32 = 1_193_182;

/// RTC default periodic-interrupt rate on open/close.
pub const RTC_DEFAULT_HZ: u32 = 2;

/// Line-discipline buffer size, including the terminating '\n'.
pub const LINE_BUFFER_SIZE: usize = 128;

/// VGA text-mode geometry.
pub const VGA_WIDTH: usize = 80;
pub const VGA_HEIGHT: usize = 25;
pub const VGA_DEFAULT_ATTR: u8 = 0x07;

/// ELF-ish magic bytes required at the start of an executable image.
pub const EXEC_MAGIC: [u8; 4] = [0x7F, 0x45, 0x4C, 0x46];
/// Offset of the little-endian entry-point EIP within the executable header.
pub const EXEC_ENTRY_OFFSET: usize = 24;
/// Number of header bytes execute() reads to validate the magic/entry point.
pub const EXEC_HEADER_LEN: usize = 40;

/// Interrupt vectors.
pub const IDT_ENTRIES: usize = 256;
pub const IRQ_BASE_MASTER: u8 = 0x20;
pub const IRQ_BASE_SLAVE: u8 = 0x28;
pub const VECTOR_PIT: u8 = IRQ_BASE_MASTER; // IRQ0
pub const VECTOR_KEYBOARD: u8 = IRQ_BASE_MASTER + 1; // IRQ1
pub const VECTOR_RTC: u8 = IRQ_BASE_SLAVE; // IRQ8
pub const VECTOR_SYSCALL: u8 = 0x80;

pub const IRQ_KEYBOARD: u8 = 1;
pub const IRQ_CASCADE: u8 = 2;
pub const IRQ_RTC: u8 = 8;
pub const IRQ_PIT: u8 = 0;
