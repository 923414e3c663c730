//! VGA text-mode primitives: the raw cell/cursor operations shared by the
//! kernel's own diagnostic console ([`_print`]/[`_print_direct`], backing
//! the `print!`/`println!` macros) and by [`crate::drivers::terminal`]'s
//! per-terminal buffers, plus a small scrolling `Writer` for the former.
//!
//! Register semantics (0x3D4/0x3D5 CRTC cursor ports, the `(row*80+col)<<1`
//! cell addressing) match `original_source/student-distrib/keyboard.c`'s
//! `terminal_print_cursor`/`scroll_screen`, generalized so both the boot
//! console and every per-terminal buffer can call through the same code.

use core::fmt;

use spin::Mutex;

use crate::{arch::x86::io, config};

const CURSOR_LOW: u8 = 0x0F;
const CURSOR_HIGH: u8 = 0x0E;
const VGA_INDEX_PORT: u16 = 0x3D4;
const VGA_DATA_PORT: u16 = 0x3D5;

/// Byte offset of cell (row, col) within any 80x25 text-mode buffer.
fn cell_offset(row: usize, col: usize) -> usize {
    (config::VGA_WIDTH * row + col) << 1
}

/// Writes `ch`/`attr` into cell (row, col) of the buffer starting at `base`.
///
/// # Safety
/// `base` must point at a writable 80x25 (4000-byte) text-mode buffer.
pub unsafe fn write_cell(base: *mut u8, row: usize, col: usize, ch: u8, attr: u8) {
    let off = cell_offset(row, col);
    // SAFETY: caller guarantees `base` covers the full 80x25 plane; `off`
    // is always < 80*25*2 for row < 25, col < 80.
    unsafe {
        base.add(off).write_volatile(ch);
        base.add(off + 1).write_volatile(attr);
    }
}

/// Blanks every cell of the buffer starting at `base` with `' '`/default
/// attribute.
///
/// # Safety
/// `base` must point at a writable 80x25 text-mode buffer.
pub unsafe fn clear_buffer(base: *mut u8) {
    for row in 0..config::VGA_HEIGHT {
        for col in 0..config::VGA_WIDTH {
            // SAFETY: forwarded from the caller's guarantee on `base`.
            unsafe { write_cell(base, row, col, b' ', config::VGA_DEFAULT_ATTR) };
        }
    }
}

/// Shifts rows `1..HEIGHT` up by one and blanks the last row, the `\n`-at-
/// bottom-of-screen scrolling behavior every terminal (and the boot
/// console) shares.
///
/// # Safety
/// `base` must point at a writable 80x25 text-mode buffer.
pub unsafe fn scroll_buffer(base: *mut u8) {
    for row in 0..config::VGA_HEIGHT - 1 {
        for col in 0..config::VGA_WIDTH {
            let src = cell_offset(row + 1, col);
            let dst = cell_offset(row, col);
            // SAFETY: both offsets are within the 80x25 plane `base` covers.
            unsafe {
                let ch = base.add(src).read_volatile();
                let attr = base.add(src + 1).read_volatile();
                base.add(dst).write_volatile(ch);
                base.add(dst + 1).write_volatile(attr);
            }
        }
    }
    let last = config::VGA_HEIGHT - 1;
    for col in 0..config::VGA_WIDTH {
        // SAFETY: forwarded from the caller's guarantee on `base`.
        unsafe { write_cell(base, last, col, b' ', config::VGA_DEFAULT_ATTR) };
    }
}

/// Copies the full 80x25 plane from `src` to `dst`. Used by the terminal
/// switch path to swap the live VGA plane with a shadow buffer.
///
/// # Safety
/// Both `src` and `dst` must point at distinct, fully-sized 80x25 planes.
pub unsafe fn copy_plane(dst: *mut u8, src: *const u8) {
    // SAFETY: forwarded from the caller's guarantees; the planes do not
    // overlap (live VGA vs. a per-terminal shadow page).
    unsafe { core::ptr::copy_nonoverlapping(src, dst, config::VGA_WIDTH * config::VGA_HEIGHT * 2) };
}

/// Repositions the hardware text-mode cursor to (row, col).
pub fn move_cursor(row: usize, col: usize) {
    let position = (config::VGA_WIDTH * row + col) as u16;
    // SAFETY: standard CRTC cursor-location programming sequence; both
    // ports are dedicated VGA index/data registers.
    unsafe {
        io::outb(VGA_INDEX_PORT, CURSOR_LOW);
        io::outb(VGA_DATA_PORT, (position & 0xFF) as u8);
        io::outb(VGA_INDEX_PORT, CURSOR_HIGH);
        io::outb(VGA_DATA_PORT, ((position >> 8) & 0xFF) as u8);
    }
}

/// The kernel's own diagnostic console: a simple scrolling writer onto the
/// live VGA plane, used for boot-time banners and `log` output, entirely
/// distinct from the per-terminal buffers in `drivers::terminal`.
struct Writer {
    row: usize,
    col: usize,
}

impl Writer {
    const fn new() -> Self {
        Self { row: 0, col: 0 }
    }

    fn vga_base(&self) -> *mut u8 {
        config::VGA_PHYS_ADDR as *mut u8
    }

    fn new_line(&mut self) {
        if self.row + 1 >= config::VGA_HEIGHT {
            // SAFETY: `vga_base()` is always the live, fully-sized VGA plane.
            unsafe { scroll_buffer(self.vga_base()) };
        } else {
            self.row += 1;
        }
        self.col = 0;
    }

    fn write_byte(&mut self, byte: u8) {
        match byte {
            b'\n' => self.new_line(),
            byte => {
                if self.col >= config::VGA_WIDTH {
                    self.new_line();
                }
                // SAFETY: `vga_base()` is always the live, fully-sized VGA
                // plane; `self.row`/`self.col` stay within bounds by
                // construction.
                unsafe {
                    write_cell(self.vga_base(), self.row, self.col, byte, config::VGA_DEFAULT_ATTR)
                };
                self.col += 1;
            }
        }
        move_cursor(self.row, self.col.min(config::VGA_WIDTH - 1));
    }
}

impl fmt::Write for Writer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            self.write_byte(byte);
        }
        Ok(())
    }
}

static WRITER: Mutex<Writer> = Mutex::new(Writer::new());

/// Backs the `print!`/`println!` macros.
pub fn _print(args: fmt::Arguments) {
    use fmt::Write;
    let _ = WRITER.lock().write_fmt(args);
}

/// Backs [`crate::print::force_print`]: bypasses `WRITER`'s lock entirely
/// (a panic may fire with it already held, which would otherwise deadlock)
/// at the cost of restarting from the top-left corner.
pub fn _print_direct(args: fmt::Arguments) {
    use fmt::Write;
    let mut direct = Writer::new();
    let _ = direct.write_fmt(args);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_offset_is_row_major_word_addressed() {
        assert_eq!(cell_offset(0, 0), 0);
        assert_eq!(cell_offset(0, 1), 2);
        assert_eq!(cell_offset(1, 0), config::VGA_WIDTH * 2);
    }
}
