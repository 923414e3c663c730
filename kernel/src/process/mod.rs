//! Process table: PID allocation and current-process tracking.
//!
//! Six fixed slots, lowest-free allocation — one-for-one with
//! `original_source/student-distrib/syscall.c`'s `pid_array` scan loop
//! rather than the general-purpose allocator/tree this module used to have.

pub mod pcb;

use spin::Mutex;

pub use pcb::{FileKind, OpenFile, Pcb};

use crate::{
    config,
    error::{KernelResult, ProcError},
};

static PID_IN_USE: Mutex<[bool; config::MAX_PROCESSES]> = Mutex::new([false; config::MAX_PROCESSES]);
static CURRENT_PID: Mutex<Option<u8>> = Mutex::new(None);

/// Allocates the lowest-numbered free PID.
pub fn alloc_pid() -> KernelResult<u8> {
    let mut used = PID_IN_USE.lock();
    for (i, slot) in used.iter_mut().enumerate() {
        if !*slot {
            *slot = true;
            return Ok(i as u8);
        }
    }
    Err(ProcError::NoFreeSlot.into())
}

pub fn free_pid(pid: u8) {
    PID_IN_USE.lock()[pid as usize] = false;
}

pub fn current_pid() -> Option<u8> {
    *CURRENT_PID.lock()
}

pub fn set_current_pid(pid: Option<u8>) {
    *CURRENT_PID.lock() = pid;
}

/// The PCB of whichever process is presently executing kernel code on its
/// behalf (servicing a syscall, or about to be resumed by the scheduler).
pub fn current_pcb() -> Option<&'static mut Pcb> {
    // SAFETY: `current_pid()` only ever holds a PID between its `alloc_pid`
    // and `free_pid`, so the slot is live for the duration of this borrow.
    current_pid().map(|pid| unsafe { pcb::get_pcb(pid) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_lowest_free_slot_and_frees_it() {
        // Slots are process-global state; snapshot and restore so this test
        // does not leak into others run in the same binary.
        let snapshot = *PID_IN_USE.lock();
        for slot in PID_IN_USE.lock().iter_mut() {
            *slot = false;
        }
        let a = alloc_pid().unwrap();
        let b = alloc_pid().unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        free_pid(a);
        let c = alloc_pid().unwrap();
        assert_eq!(c, 0);
        *PID_IN_USE.lock() = snapshot;
    }

    #[test]
    fn exhausting_all_slots_errors() {
        let snapshot = *PID_IN_USE.lock();
        for slot in PID_IN_USE.lock().iter_mut() {
            *slot = true;
        }
        assert!(alloc_pid().is_err());
        *PID_IN_USE.lock() = snapshot;
    }
}
