//! Round-robin terminal scheduler driven off the PIT tick.
//!
//! Not grounded in a dedicated original-source scheduler file — the
//! reference `student-distrib` tree runs its three shells cooperatively off
//! keypresses and terminal switches with no preemptive tick at all — so
//! this implements preemptive round-robin directly: each PIT interrupt
//! rotates which terminal owns the CPU (independent of which terminal is
//! currently *displayed* — that stays under Alt+F1/F2/F3's control), lazily
//! spawning a shell the first time a terminal comes up for its turn.
//!
//! The switch itself is a kernel-stack swap, not a register swap:
//! `arch::x86::idt::pit_interrupt_handler`'s `pit_stub` trampoline saves
//! every GPR onto the interrupted process's own kernel stack (`pusha`) and
//! passes the resulting `esp` to [`on_tick`]; `on_tick` records that value
//! against the outgoing terminal and returns the incoming terminal's own
//! previously-saved `esp` for the trampoline to load before its `popa`/
//! `iretd` — each terminal always resumes into exactly the trap frame it
//! was last interrupted out of.

use spin::Mutex;

use crate::{
    arch::x86::{gdt, paging},
    config,
    drivers::terminal,
    process::pcb,
    syscall,
};

/// Which terminal's turn it currently is, independent of
/// `terminal::display_terminal()`.
static SCHEDULED: Mutex<usize> = Mutex::new(0);

/// Runs once during bring-up, after `terminal::init` and before interrupts
/// are enabled.
pub fn init() {
    *SCHEDULED.lock() = 0;
}

/// Called from `pit_interrupt_handler` with the kernel `esp` the
/// interrupted process's trap frame sits at. Returns the `esp` the
/// trampoline's epilogue should resume instead.
pub fn on_tick(current_esp: u32) -> u32 {
    let outgoing = *SCHEDULED.lock();
    // The trampoline's own `popa` restores every GPR, `ebp` included,
    // straight off whichever stack `esp` points at on return — nothing
    // beyond `esp` itself needs to survive here.
    terminal::save_sched_context(outgoing, current_esp, 0);

    let incoming = (outgoing + 1) % config::NUM_TERMINALS;
    *SCHEDULED.lock() = incoming;

    if !terminal::has_hosted(incoming) {
        terminal::mark_hosted(incoming);
        // First turn this terminal has ever had: launch its root shell
        // inline. `spawn_shell` never returns for a parentless process
        // (`syscall::halt_impl`'s root-shell branch respawns forever), which
        // is fine here — this tick's own `(esp, ebp)` are already saved
        // above, so nothing needs this call chain to come back.
        let _ = syscall::spawn_shell(incoming);
    }

    if let Some(pid) = terminal::pid_of(incoming) {
        let _ = paging::map_process(pid);
        gdt::set_kernel_stack(pcb::kernel_stack_top(pid));
    }
    terminal::sched_context(incoming).0
}
