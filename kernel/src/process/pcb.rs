//! Fixed-layout Process Control Block.
//!
//! Each of the six process slots gets a PCB at the bottom of its own 8 KiB
//! kernel-stack region (`config::KERNEL_STACK_BASE - (pid+1)*STACK_SIZE`);
//! the stack itself grows down from the top of that same region towards
//! the PCB. One-for-one with `original_source/student-distrib/syscall.c`'s
//! `get_pcb`/`pcb_t`, replacing the raw `fops_table_t*` jump table (see
//! `fops.c`) with a tagged [`FileKind`] dispatched explicitly in
//! [`OpenFile::read`]/[`OpenFile::write`], per the design note on arbitrary
//! function pointers per fd.

use crate::{
    config,
    drivers::{rtc, terminal},
    error::{KernelResult, SyscallError},
    fs,
};

/// Which kind of file a [`OpenFile`] slot currently refers to, chosen at
/// open time and dispatched on every subsequent read/write/close.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FileKind {
    Rtc,
    Directory,
    Regular,
    Stdin,
    Stdout,
    Terminal,
}

/// One entry of a process's open-file table.
#[derive(Clone, Copy)]
pub struct OpenFile {
    pub kind: FileKind,
    pub inode: u32,
    pub offset: u32,
    pub in_use: bool,
}

impl OpenFile {
    pub const fn closed() -> Self {
        Self {
            kind: FileKind::Regular,
            inode: 0,
            offset: 0,
            in_use: false,
        }
    }

    pub fn open(&mut self, kind: FileKind, inode: u32) {
        self.kind = kind;
        self.inode = inode;
        self.offset = 0;
        self.in_use = true;
    }

    fn close(&mut self) {
        *self = Self::closed();
    }

    /// Closes this slot, first running the file kind's own close handler
    /// (only the RTC has one: reprogramming back to the 2 Hz default).
    pub fn dispatch_close(&mut self) {
        if self.in_use && self.kind == FileKind::Rtc {
            rtc::close();
        }
        self.close();
    }

    pub fn read(&mut self, term_idx: usize, buf: &mut [u8]) -> KernelResult<usize> {
        match self.kind {
            FileKind::Rtc => {
                rtc::read();
                Ok(0)
            }
            FileKind::Directory => {
                let n = fs::dir_read_at(self.offset, buf);
                if n > 0 {
                    self.offset += 1;
                }
                Ok(n)
            }
            FileKind::Regular => {
                let n = fs::read_data(self.inode, self.offset, buf)?;
                self.offset += n as u32;
                Ok(n)
            }
            FileKind::Stdin | FileKind::Terminal => Ok(terminal::blocking_read(buf)),
            FileKind::Stdout => Err(SyscallError::BadFd.into()),
        }
    }

    pub fn write(&mut self, term_idx: usize, buf: &[u8]) -> KernelResult<usize> {
        match self.kind {
            FileKind::Rtc => {
                rtc::write(buf)?;
                Ok(0)
            }
            FileKind::Directory | FileKind::Regular => Err(SyscallError::BadFd.into()),
            FileKind::Stdout | FileKind::Terminal => Ok(terminal::write_bytes(term_idx, buf)),
            FileKind::Stdin => Err(SyscallError::BadFd.into()),
        }
    }
}

/// The per-process state `execute`/`halt`/the syscall layer all operate on.
#[repr(C)]
pub struct Pcb {
    pub pid: u8,
    pub parent_pid: Option<u8>,
    pub fd_table: [OpenFile; config::FD_TABLE_SIZE],
    pub command: [u8; config::MAX_COMMAND_LEN],
    pub command_len: usize,
    /// The calling process's kernel esp/ebp at the moment it invoked
    /// `execute`, captured so `halt` can fake a normal return into it.
    /// Meaningless when `parent_pid` is `None`.
    pub exec_esp: u32,
    pub exec_ebp: u32,
    /// The parent's TSS `esp0` at the same moment, restored by `halt`.
    pub parent_esp0: u32,
    pub active: bool,
}

/// Physical address of the (lowest address of the) 8 KiB kernel-stack
/// region reserved for `pid`; the PCB lives at this address, with the
/// process's own kernel stack occupying the rest of the region above it.
pub fn pcb_addr(pid: u8) -> usize {
    config::KERNEL_STACK_BASE - (pid as usize + 1) * config::KERNEL_STACK_SIZE
}

/// Top of `pid`'s 8 KiB kernel-stack region (the initial esp0/esp value
/// for a freshly executed process).
pub fn kernel_stack_top(pid: u8) -> u32 {
    (config::KERNEL_STACK_BASE - pid as usize * config::KERNEL_STACK_SIZE) as u32
}

/// Returns the PCB for `pid`.
///
/// # Safety
/// `pid` must be `< config::MAX_PROCESSES`; the caller must not alias this
/// reference with another live `&mut Pcb` for the same `pid`.
pub unsafe fn get_pcb(pid: u8) -> &'static mut Pcb {
    // SAFETY: forwarded from the caller; `pcb_addr` always lands inside the
    // fixed kernel-stack region reserved for process control blocks.
    unsafe { &mut *(pcb_addr(pid) as *mut Pcb) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcb_regions_are_disjoint_and_stack_ordered() {
        for pid in 0..config::MAX_PROCESSES as u8 {
            let pcb = pcb_addr(pid);
            let top = kernel_stack_top(pid) as usize;
            assert!(pcb < top);
            assert_eq!(top - pcb, config::KERNEL_STACK_SIZE);
        }
    }

    #[test]
    fn open_file_round_trips_kind_and_inode() {
        let mut f = OpenFile::closed();
        assert!(!f.in_use);
        f.open(FileKind::Regular, 7);
        assert!(f.in_use);
        assert_eq!(f.inode, 7);
        assert_eq!(f.offset, 0);
        f.close();
        assert!(!f.in_use);
    }
}
