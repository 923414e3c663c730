//! Device drivers: VGA text output, per-terminal multiplexing, the PS/2
//! keyboard, the real-time clock, and the PIT tick source.

pub mod keyboard;
pub mod pit;
pub mod rtc;
pub mod terminal;
pub mod vga;
