//! PS/2 keyboard driver: Set-1 scancode translation, modifier tracking, and
//! the hot-combination (Ctrl+L, Alt+F1/F2/F3) layer sitting in front of
//! [`crate::drivers::terminal`]'s line discipline.
//!
//! The scancode table and modifier state machine are one-for-one with
//! `original_source/student-distrib/keyboard.c`'s `scan_code_table`/
//! `shift_scan_code_table` pair and its shift/ctrl/alt/capslock bookkeeping;
//! unlike the original's single `keyboard_interrupt_handler` doing table
//! lookup, modifier tracking, hot-combo dispatch, and line-buffer mutation
//! all inline, those last two responsibilities are split out into
//! `drivers::terminal` so this module owns only "scancode in, resolved byte
//! (or modifier update, or hot combo) out".

use spin::Mutex;

use crate::{arch::x86::io, drivers::terminal};

const DATA_PORT: u16 = 0x60;

const BREAK_BIT: u8 = 0x80;

const LEFT_SHIFT: u8 = 0x2A;
const RIGHT_SHIFT: u8 = 0x36;
const LEFT_CTRL: u8 = 0x1D;
const LEFT_ALT: u8 = 0x38;
const CAPS_LOCK: u8 = 0x3A;
const F1: u8 = 0x3B;
const F3: u8 = 0x3D;

const KEY_L: u8 = 0x26;

/// `(unshifted, shifted)` output byte pair for each of the 59 recognised
/// Set-1 make codes, indexed directly by scancode. Entries for modifier and
/// function-key scancodes (shift/ctrl/alt/capslock/F1-F3) are `(0, 0)`:
/// those are intercepted by [`handle_scancode`] before this table is ever
/// consulted.
#[rustfmt::skip]
const SCANCODE_TABLE: [(u8, u8); 0x3C] = {
    let mut table = [(0u8, 0u8); 0x3C];
    table[0x02] = (b'1', b'!'); table[0x03] = (b'2', b'@'); table[0x04] = (b'3', b'#');
    table[0x05] = (b'4', b'$'); table[0x06] = (b'5', b'%'); table[0x07] = (b'6', b'^');
    table[0x08] = (b'7', b'&'); table[0x09] = (b'8', b'*'); table[0x0A] = (b'9', b'(');
    table[0x0B] = (b'0', b')'); table[0x0C] = (b'-', b'_'); table[0x0D] = (b'=', b'+');
    table[0x0E] = (0x08, 0x08); // backspace
    table[0x0F] = (b'\t', b'\t');
    table[0x10] = (b'q', b'Q'); table[0x11] = (b'w', b'W'); table[0x12] = (b'e', b'E');
    table[0x13] = (b'r', b'R'); table[0x14] = (b't', b'T'); table[0x15] = (b'y', b'Y');
    table[0x16] = (b'u', b'U'); table[0x17] = (b'i', b'I'); table[0x18] = (b'o', b'O');
    table[0x19] = (b'p', b'P'); table[0x1A] = (b'[', b'{'); table[0x1B] = (b']', b'}');
    table[0x1C] = (b'\n', b'\n');
    table[0x1E] = (b'a', b'A'); table[0x1F] = (b's', b'S'); table[0x20] = (b'd', b'D');
    table[0x21] = (b'f', b'F'); table[0x22] = (b'g', b'G'); table[0x23] = (b'h', b'H');
    table[0x24] = (b'j', b'J'); table[0x25] = (b'k', b'K'); table[0x26] = (b'l', b'L');
    table[0x27] = (b';', b':'); table[0x28] = (b'\'', b'"'); table[0x29] = (b'`', b'~');
    table[0x2B] = (b'\\', b'|');
    table[0x2C] = (b'z', b'Z'); table[0x2D] = (b'x', b'X'); table[0x2E] = (b'c', b'C');
    table[0x2F] = (b'v', b'V'); table[0x30] = (b'b', b'B'); table[0x31] = (b'n', b'N');
    table[0x32] = (b'm', b'M'); table[0x33] = (b',', b'<'); table[0x34] = (b'.', b'>');
    table[0x35] = (b'/', b'?');
    table[0x39] = (b' ', b' ');
    table
};

fn is_alpha_scancode(code: u8) -> bool {
    matches!(code, 0x10..=0x19 | 0x1E..=0x26 | 0x2C..=0x32)
}

#[derive(Clone, Copy, Default)]
struct Modifiers {
    shift: bool,
    ctrl: bool,
    alt: bool,
    capslock: bool,
}

static MODIFIERS: Mutex<Modifiers> = Mutex::new(Modifiers {
    shift: false,
    ctrl: false,
    alt: false,
    capslock: false,
});

/// Resets all modifier state. Run once during bring-up.
pub fn init() {
    *MODIFIERS.lock() = Modifiers::default();
}

/// Decodes one Set-1 scancode byte, updating modifier state, dispatching
/// hot combinations, or feeding a resolved ASCII byte to the foreground
/// terminal's line discipline.
pub fn handle_scancode(code: u8) {
    let is_break = code & BREAK_BIT != 0;
    let make_code = code & !BREAK_BIT;

    match make_code {
        LEFT_SHIFT | RIGHT_SHIFT => {
            MODIFIERS.lock().shift = !is_break;
            return;
        }
        LEFT_CTRL => {
            MODIFIERS.lock().ctrl = !is_break;
            return;
        }
        LEFT_ALT => {
            MODIFIERS.lock().alt = !is_break;
            return;
        }
        CAPS_LOCK => {
            if !is_break {
                let mut m = MODIFIERS.lock();
                m.capslock = !m.capslock;
            }
            return;
        }
        _ => {}
    }

    if is_break {
        return;
    }

    let m = *MODIFIERS.lock();

    if (F1..=F3).contains(&make_code) && m.alt {
        terminal::switch_terminal((make_code - F1) as usize);
        return;
    }

    if m.ctrl && make_code == KEY_L {
        terminal::clear_and_reset_screen();
        return;
    }

    let Some(&(unshifted, shifted)) = SCANCODE_TABLE.get(make_code as usize) else {
        return;
    };
    if unshifted == 0 {
        return;
    }

    let effective_shift = if is_alpha_scancode(make_code) {
        m.shift ^ m.capslock
    } else {
        m.shift
    };
    let resolved = if effective_shift { shifted } else { unshifted };
    terminal::keyboard_echo(resolved);
}

#[no_mangle]
extern "C" fn keyboard_interrupt_handler() {
    // SAFETY: reading the PS/2 data port in response to IRQ1 is the
    // documented way to retrieve the pending scancode.
    let code = unsafe { io::inb(DATA_PORT) };
    handle_scancode(code);
    crate::arch::x86::pic::eoi(crate::config::IRQ_KEYBOARD);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_modifies_letter_case_only_on_alpha() {
        assert!(is_alpha_scancode(0x1E)); // 'a'
        assert!(!is_alpha_scancode(0x02)); // '1'
    }

    #[test]
    fn table_has_no_character_for_modifier_scancodes() {
        assert_eq!(SCANCODE_TABLE[LEFT_SHIFT as usize], (0, 0));
        assert_eq!(SCANCODE_TABLE[CAPS_LOCK as usize], (0, 0));
    }

    #[test]
    fn digit_and_shifted_symbol_pair_up() {
        assert_eq!(SCANCODE_TABLE[0x02], (b'1', b'!'));
        assert_eq!(SCANCODE_TABLE[0x0B], (b'0', b')'));
    }

    #[test]
    fn backspace_and_enter_resolve_to_control_bytes() {
        assert_eq!(SCANCODE_TABLE[0x0E], (0x08, 0x08));
        assert_eq!(SCANCODE_TABLE[0x1C], (b'\n', b'\n'));
    }
}
