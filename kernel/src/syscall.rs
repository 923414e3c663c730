//! UNIX-like syscall surface reached through `int 0x80`: `halt`, `execute`,
//! `read`, `write`, `open`, `close`, `getargs`, `vidmap`, and the
//! permanently-unsupported `set_handler`/`sigreturn` pair.
//!
//! `execute`/`halt` are grounded in `original_source/student-distrib/
//! syscall.c`'s `EXECUTE_RETURN`/`HALT_RET` trampoline: rather than hand-
//! linking a separate assembly file, the same "build an iret frame, jump to
//! ring 3, and let a *later, unrelated* call stack jump back in with a
//! status already in eax" shape lives in the `global_asm!` block below,
//! addressed from safe-looking `extern "C"` functions the way
//! `arch::x86::idt`'s stubs are.

use core::arch::global_asm;

use crate::{
    arch::x86::{gdt, io, paging},
    config,
    drivers::{rtc, terminal},
    elf,
    error::{FsError, KernelError, KernelResult, SyscallError},
    fs,
    process::{
        self,
        pcb::{self, FileKind, OpenFile, Pcb},
    },
};

/// Top-level syscall dispatch, called from `idt`'s `syscall_stub` trampoline
/// with the four GPRs `int 0x80` was invoked with (`eax`=number,
/// `ebx`=arg1, `ecx`=arg2, `edx`=arg3).
pub fn dispatch(num: u32, a1: u32, a2: u32, a3: u32) -> i32 {
    // SAFETY: the syscall gate (like every other gate in this IDT) is an
    // interrupt gate, so it always arrives with IF cleared even though the
    // calling process was running with interrupts enabled. `read` on a
    // terminal/RTC fd busy-waits on a flag only an ISR sets, so IF has to
    // come back on before any blocking syscall can ever make progress.
    unsafe { io::sti() };
    match num {
        1 => halt(a1 as u8),
        2 => execute(a1),
        3 => read(a1, a2, a3),
        4 => write(a1, a2, a3),
        5 => open(a1),
        6 => close(a1),
        7 => getargs(a1, a2),
        8 => vidmap(a1),
        9 => set_handler(),
        10 => sigreturn(),
        _ => KernelError::from(SyscallError::NoSuchSyscall).to_syscall_return(),
    }
}

// ---------------------------------------------------------------------
// User-memory validation
// ---------------------------------------------------------------------

/// Confirms `[ptr, ptr+len)` lies entirely inside the calling process's own
/// 4 MiB frame or its (optional) vidmap page — the only regions a user
/// process may legally hand the kernel a pointer into.
fn validate_user_range(ptr: u32, len: u32) -> KernelResult<()> {
    if ptr == 0 {
        return Err(SyscallError::BadPointer.into());
    }
    let end = ptr.checked_add(len).ok_or(SyscallError::BadPointer)?;
    let in_frame = ptr as usize >= config::USER_VIRT_BASE
        && end as usize <= config::USER_VIRT_BASE + config::USER_FRAME_SIZE;
    let in_vidmap = ptr as usize >= config::USER_VIDMAP_VIRT
        && end as usize <= config::USER_VIDMAP_VIRT + config::BLOCK_SIZE;
    if in_frame || in_vidmap {
        Ok(())
    } else {
        Err(SyscallError::BadPointer.into())
    }
}

fn user_slice(ptr: u32, len: u32) -> KernelResult<&'static [u8]> {
    validate_user_range(ptr, len)?;
    // SAFETY: `validate_user_range` confirmed this range sits inside the
    // current process's own mapped memory, live for as long as it runs.
    Ok(unsafe { core::slice::from_raw_parts(ptr as *const u8, len as usize) })
}

fn user_slice_mut(ptr: u32, len: u32) -> KernelResult<&'static mut [u8]> {
    validate_user_range(ptr, len)?;
    // SAFETY: see `user_slice`.
    Ok(unsafe { core::slice::from_raw_parts_mut(ptr as *mut u8, len as usize) })
}

/// Reads a NUL- or newline-terminated string out of user memory starting at
/// `ptr`, one validated byte at a time, up to `config::MAX_COMMAND_LEN`.
fn read_user_cstr(ptr: u32) -> KernelResult<([u8; config::MAX_COMMAND_LEN], usize)> {
    let mut out = [0u8; config::MAX_COMMAND_LEN];
    let mut len = 0usize;
    loop {
        if len >= config::MAX_COMMAND_LEN {
            return Err(SyscallError::CommandTooLong.into());
        }
        let addr = ptr.checked_add(len as u32).ok_or(SyscallError::BadPointer)?;
        validate_user_range(addr, 1)?;
        // SAFETY: validated above.
        let byte = unsafe { *(addr as *const u8) };
        if byte == 0 || byte == b'\n' {
            break;
        }
        out[len] = byte;
        len += 1;
    }
    Ok((out, len))
}

/// Splits a raw command line into `(program name, trimmed argument string)`,
/// tolerating leading/embedded runs of spaces the way a shell's own
/// tokenizer would collapse.
fn split_command(command: &[u8]) -> (&[u8], &[u8]) {
    let start = command.iter().position(|&b| b != b' ').unwrap_or(command.len());
    let command = &command[start..];
    match command.iter().position(|&b| b == b' ') {
        Some(i) => {
            let rest = &command[i..];
            let args_start = rest.iter().position(|&b| b != b' ').unwrap_or(rest.len());
            (&command[..i], &rest[args_start..])
        }
        None => (command, &[]),
    }
}

fn current_pcb_mut() -> KernelResult<&'static mut Pcb> {
    process::current_pcb().ok_or(SyscallError::BadFd.into())
}

// ---------------------------------------------------------------------
// halt / execute and the ring-3 entry/return trampoline
// ---------------------------------------------------------------------

extern "C" {
    /// Builds an `iretd` frame for `(eip, user_esp)` running at
    /// `(user_code_sel, user_data_sel)` and transfers control to ring 3.
    /// Writes this call's own `(esp, ebp)` — the state that must be restored
    /// to make it look like this call returned — into `ctx_out[0]`/
    /// `ctx_out[1]` before doing so.
    ///
    /// Never returns via its own fall-through (the `iretd` diverges); its
    /// apparent `i32` return value only materializes once [`resume_parent`]
    /// is invoked against the saved context, arbitrarily later, from a
    /// completely different call stack.
    fn execute_enter_user(
        eip: u32,
        user_esp: u32,
        user_data_sel: u32,
        user_code_sel: u32,
        ctx_out: *mut u32,
    ) -> i32;

    /// Restores a context `execute_enter_user` saved and makes its call
    /// site observe `status` as that call's return value.
    fn resume_parent(esp: u32, ebp: u32, status: i32) -> !;
}

global_asm!(
    ".intel_syntax noprefix",
    ".global execute_enter_user",
    "execute_enter_user:",
    // No prologue: the caller's own esp/ebp (as of the `call` that brought
    // us here) are exactly the context a later `resume_parent` must
    // restore, so they must be captured before this function disturbs
    // either register.
    "mov eax, [esp+20]", // ctx_out
    "mov [eax], esp",
    "mov [eax+4], ebp",
    "mov ecx, [esp+4]",  // eip
    "mov edx, [esp+8]",  // user_esp
    "mov ebx, [esp+12]", // user_data_sel
    "mov esi, [esp+16]", // user_code_sel
    "mov ds, bx",
    "mov es, bx",
    "mov fs, bx",
    "mov gs, bx",
    "push ebx", // ss
    "push edx", // esp
    "pushfd",
    "pop edi",
    "or edi, 0x200", // IF
    "push edi",      // eflags
    "push esi",      // cs
    "push ecx",      // eip
    "iretd",
    ".global execute_return",
    "execute_return:",
    "ret",
    ".global resume_parent",
    "resume_parent:",
    "mov eax, [esp+12]", // status
    "mov ecx, [esp+4]",  // target esp
    "mov edx, [esp+8]",  // target ebp
    "mov esp, ecx",
    "mov ebp, edx",
    "jmp execute_return",
    ".att_syntax",
);

/// `syscall_halt`: tears down the calling process and resumes whoever is
/// waiting for it — its `execute` caller if it has one, or a freshly
/// respawned shell if it was the root of its terminal.
pub fn halt(status: u8) -> ! {
    // Status 37 signals "killed by exception" from a user program that
    // raises it itself rather than through `exception_dispatch`; remapped
    // to the same 256 every other exception death reports.
    let status = if status == 37 { 256 } else { status as i32 };
    halt_impl(status)
}

/// Kills the current process outright (an unhandled CPU exception), per
/// `arch::x86::idt::exception_dispatch`.
pub fn halt_current(status: i32) -> ! {
    halt_impl(status)
}

fn halt_impl(status: i32) -> ! {
    let pid = process::current_pid().expect("halt with no running process");
    let term_idx = terminal::terminal_for_pid(pid);
    // SAFETY: `pid` names the process currently executing kernel code on
    // its own behalf; its PCB is live for the duration of this call.
    let pcb = unsafe { pcb::get_pcb(pid) };
    for fd in pcb.fd_table.iter_mut() {
        fd.dispatch_close();
    }
    let parent_pid = pcb.parent_pid;
    let exec_esp = pcb.exec_esp;
    let exec_ebp = pcb.exec_ebp;
    process::free_pid(pid);

    match parent_pid {
        Some(parent) => {
            process::set_current_pid(Some(parent));
            let _ = paging::map_process(parent);
            gdt::set_kernel_stack(pcb::kernel_stack_top(parent));
            if let Some(idx) = term_idx {
                terminal::set_pid(idx, Some(parent));
            }
            // SAFETY: `exec_esp`/`exec_ebp` are exactly the values
            // `execute_enter_user` saved for this child's launch.
            unsafe { resume_parent(exec_esp, exec_ebp, status) }
        }
        None => {
            // Root shell of a terminal halting: there is no caller to
            // return to, so keep the terminal alive by respawning rather
            // than leaving it dead (see the design note on boundary
            // scenario 1).
            process::set_current_pid(None);
            let idx = term_idx.unwrap_or(0);
            loop {
                let _ = spawn(b"shell", None, idx);
            }
        }
    }
}

/// `syscall_execute`: parses `command`, loads it as a child of the calling
/// process, and — unlike every other syscall here — blocks until that
/// entire subtree has halted before finally returning its exit status.
pub fn execute(command_ptr: u32) -> i32 {
    let (buf, len) = match read_user_cstr(command_ptr) {
        Ok(v) => v,
        Err(e) => return e.to_syscall_return(),
    };
    let parent_pid = process::current_pid();
    let term_idx = parent_pid.and_then(terminal::terminal_for_pid).unwrap_or(0);
    spawn(&buf[..len], parent_pid, term_idx)
}

/// Spawns `command` as a child of `parent_pid` (`None` for a terminal's
/// root shell) on terminal `term_idx`. Called directly by the scheduler
/// and bootstrap for the no-parent case, bypassing the user-pointer
/// command read `execute` itself has to do.
pub fn spawn_shell(term_idx: usize) -> i32 {
    spawn(b"shell", None, term_idx)
}

fn spawn(command: &[u8], parent_pid: Option<u8>, term_idx: usize) -> i32 {
    match try_spawn(command, parent_pid, term_idx) {
        Ok(status) => status,
        Err(e) => e.to_syscall_return(),
    }
}

fn try_spawn(command: &[u8], parent_pid: Option<u8>, term_idx: usize) -> KernelResult<i32> {
    let (name, args) = split_command(command);
    // Rejected before the dentry scan ever runs: an over-length filename
    // must not silently truncate to a same-length prefix match against some
    // unrelated dentry.
    if name.is_empty() || name.len() > config::NAME_LEN {
        return Err(FsError::NameTooLong.into());
    }
    let dentry = fs::lookup_by_name(name)?;
    if dentry.file_type != fs::FileType::Regular {
        return Err(SyscallError::BadMagic.into());
    }
    let mut header = [0u8; config::EXEC_HEADER_LEN];
    fs::read_data(dentry.inode, 0, &mut header)?;
    let entry_eip = elf::entry_point(&header)?;

    let new_pid = process::alloc_pid()?;
    // SAFETY: `new_pid` was just allocated; no other code holds a
    // reference to this PCB.
    let pcb = unsafe { pcb::get_pcb(new_pid) };
    pcb.pid = new_pid;
    pcb.parent_pid = parent_pid;
    pcb.active = true;
    pcb.parent_esp0 = parent_pid.map(pcb::kernel_stack_top).unwrap_or(0);
    pcb.fd_table = [OpenFile::closed(); config::FD_TABLE_SIZE];
    pcb.fd_table[0].open(FileKind::Stdin, 0);
    pcb.fd_table[1].open(FileKind::Stdout, 0);
    pcb.command = [0; config::MAX_COMMAND_LEN];
    pcb.command_len = args.len().min(config::MAX_COMMAND_LEN);
    pcb.command[..pcb.command_len].copy_from_slice(&args[..pcb.command_len]);

    paging::map_process(new_pid)?;
    copy_image_into_user_frame(dentry.inode)?;

    process::set_current_pid(Some(new_pid));
    terminal::set_pid(term_idx, Some(new_pid));
    terminal::mark_hosted(term_idx);
    gdt::set_kernel_stack(pcb::kernel_stack_top(new_pid));

    // SAFETY: `pcb.exec_esp`/`exec_ebp` are contiguous `u32` fields, giving
    // `execute_enter_user` a valid two-word output slot; the entry point
    // and selectors above all come from data this function itself just
    // validated or owns.
    let status = unsafe {
        execute_enter_user(
            entry_eip,
            config::USER_STACK_TOP as u32,
            gdt::USER_DATA_SELECTOR as u32,
            gdt::USER_CODE_SELECTOR as u32,
            &mut pcb.exec_esp as *mut u32,
        )
    };
    Ok(status)
}

fn copy_image_into_user_frame(inode: u32) -> KernelResult<()> {
    let size = fs::file_size(inode)?;
    let dest = config::USER_IMAGE_VIRT as *mut u8;
    let mut offset = 0u32;
    let mut buf = [0u8; config::BLOCK_SIZE];
    while offset < size {
        let n = fs::read_data(inode, offset, &mut buf)?;
        if n == 0 {
            break;
        }
        // SAFETY: `paging::map_process` has already remapped the user
        // process directory entry to this pid's frame, and no executable
        // this filesystem can hold exceeds the frame's 4 MiB.
        unsafe { core::ptr::copy_nonoverlapping(buf.as_ptr(), dest.add(offset as usize), n) };
        offset += n as u32;
    }
    Ok(())
}

// ---------------------------------------------------------------------
// read / write / open / close
// ---------------------------------------------------------------------

pub fn read(fd: u32, buf_ptr: u32, nbytes: u32) -> i32 {
    match try_read(fd, buf_ptr, nbytes) {
        Ok(n) => n as i32,
        Err(e) => e.to_syscall_return(),
    }
}

fn try_read(fd: u32, buf_ptr: u32, nbytes: u32) -> KernelResult<usize> {
    let fd = fd as usize;
    if fd >= config::FD_TABLE_SIZE {
        return Err(SyscallError::BadFd.into());
    }
    let pid = process::current_pid().ok_or(SyscallError::BadFd)?;
    let term_idx = terminal::terminal_for_pid(pid).unwrap_or(0);
    let buf = user_slice_mut(buf_ptr, nbytes)?;
    let pcb = current_pcb_mut()?;
    let entry = &mut pcb.fd_table[fd];
    if !entry.in_use {
        return Err(SyscallError::BadFd.into());
    }
    entry.read(term_idx, buf)
}

pub fn write(fd: u32, buf_ptr: u32, nbytes: u32) -> i32 {
    match try_write(fd, buf_ptr, nbytes) {
        Ok(n) => n as i32,
        Err(e) => e.to_syscall_return(),
    }
}

fn try_write(fd: u32, buf_ptr: u32, nbytes: u32) -> KernelResult<usize> {
    let fd = fd as usize;
    if fd >= config::FD_TABLE_SIZE {
        return Err(SyscallError::BadFd.into());
    }
    let pid = process::current_pid().ok_or(SyscallError::BadFd)?;
    let term_idx = terminal::terminal_for_pid(pid).unwrap_or(0);
    let buf = user_slice(buf_ptr, nbytes)?;
    let pcb = current_pcb_mut()?;
    let entry = &mut pcb.fd_table[fd];
    if !entry.in_use {
        return Err(SyscallError::BadFd.into());
    }
    entry.write(term_idx, buf)
}

pub fn open(path_ptr: u32) -> i32 {
    match try_open(path_ptr) {
        Ok(fd) => fd as i32,
        Err(e) => e.to_syscall_return(),
    }
}

fn try_open(path_ptr: u32) -> KernelResult<usize> {
    let (name, len) = read_user_cstr(path_ptr)?;
    let dentry = fs::lookup_by_name(&name[..len])?;
    let pcb = current_pcb_mut()?;
    let slot = pcb.fd_table[2..]
        .iter()
        .position(|f| !f.in_use)
        .ok_or(SyscallError::FdTableFull)?;
    let fd = slot + 2;
    let kind = match dentry.file_type {
        fs::FileType::Rtc => {
            rtc::open();
            FileKind::Rtc
        }
        fs::FileType::Directory => FileKind::Directory,
        fs::FileType::Regular => FileKind::Regular,
    };
    pcb.fd_table[fd].open(kind, dentry.inode);
    Ok(fd)
}

pub fn close(fd: u32) -> i32 {
    match try_close(fd) {
        Ok(()) => 0,
        Err(e) => e.to_syscall_return(),
    }
}

fn try_close(fd: u32) -> KernelResult<()> {
    let fd = fd as usize;
    if !(2..config::FD_TABLE_SIZE).contains(&fd) {
        return Err(SyscallError::BadFd.into());
    }
    let pcb = current_pcb_mut()?;
    if !pcb.fd_table[fd].in_use {
        return Err(SyscallError::BadFd.into());
    }
    pcb.fd_table[fd].dispatch_close();
    Ok(())
}

// ---------------------------------------------------------------------
// getargs / vidmap / set_handler / sigreturn
// ---------------------------------------------------------------------

pub fn getargs(buf_ptr: u32, nbytes: u32) -> i32 {
    match try_getargs(buf_ptr, nbytes) {
        Ok(()) => 0,
        Err(e) => e.to_syscall_return(),
    }
}

fn try_getargs(buf_ptr: u32, nbytes: u32) -> KernelResult<()> {
    let pcb = current_pcb_mut()?;
    if pcb.command_len == 0 {
        return Err(SyscallError::BadPointer.into());
    }
    if pcb.command_len + 1 > nbytes as usize {
        return Err(SyscallError::BadPointer.into());
    }
    let buf = user_slice_mut(buf_ptr, nbytes)?;
    buf[..pcb.command_len].copy_from_slice(&pcb.command[..pcb.command_len]);
    buf[pcb.command_len] = 0;
    Ok(())
}

pub fn vidmap(out_ptr: u32) -> i32 {
    match try_vidmap(out_ptr) {
        Ok(()) => 0,
        Err(e) => e.to_syscall_return(),
    }
}

fn try_vidmap(out_ptr: u32) -> KernelResult<()> {
    let out = user_slice_mut(out_ptr, 4)?;
    let virt = paging::map_user_video();
    out.copy_from_slice(&virt.to_le_bytes());
    Ok(())
}

/// Signal handlers are out of scope (see spec Non-goals); both syscalls
/// always fail.
pub fn set_handler() -> i32 {
    KernelError::from(SyscallError::NotSupported).to_syscall_return()
}

pub fn sigreturn() -> i32 {
    KernelError::from(SyscallError::NotSupported).to_syscall_return()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_command_separates_name_and_trims_args() {
        assert_eq!(split_command(b"ls"), (&b"ls"[..], &b""[..]));
        assert_eq!(split_command(b"grep  foo bar"), (&b"grep"[..], &b"foo bar"[..]));
        assert_eq!(split_command(b"  cat x"), (&b"cat"[..], &b"x"[..]));
    }

    #[test]
    fn validate_user_range_rejects_null_and_overflow() {
        assert!(validate_user_range(0, 4).is_err());
        assert!(validate_user_range(u32::MAX - 1, 4).is_err());
    }

    #[test]
    fn validate_user_range_accepts_frame_and_vidmap_bounds() {
        assert!(validate_user_range(config::USER_VIRT_BASE as u32, 4).is_ok());
        assert!(validate_user_range(config::USER_VIDMAP_VIRT as u32, 4).is_ok());
        assert!(validate_user_range(
            (config::USER_VIRT_BASE - 4) as u32,
            8
        )
        .is_err());
    }
}
