//! Pipe-backed fault-free memory probe.
//!
//! Writing from an unreadable buffer into a pipe fails with `EFAULT` in the
//! kernel instead of raising `SIGSEGV` in the caller. A successful write is
//! then drained from the read end, so the pipe is empty between probes.

use std::ffi::{c_int, c_void};
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use gcguard_membrane::oracle::{MemoryProbe, PREFIX_LEN, ProbeRead};

/// A private pipe used to copy 8 bytes from an arbitrary address.
///
/// Never shared between threads: interleaved writes would mix words.
#[derive(Debug)]
pub struct PipeProbe {
    read_end: OwnedFd,
    write_end: OwnedFd,
}

impl PipeProbe {
    fn create_pipe() -> io::Result<[c_int; 2]> {
        let mut fds: [c_int; 2] = [-1, -1];
        #[cfg(any(target_os = "linux", target_os = "android"))]
        // SAFETY: `fds` is a valid two-element array.
        let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) };
        #[cfg(not(any(target_os = "linux", target_os = "android")))]
        // SAFETY: `fds` is a valid two-element array.
        let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(fds)
    }
}

impl MemoryProbe for PipeProbe {
    fn open() -> io::Result<Self> {
        let [read_fd, write_fd] = Self::create_pipe()?;
        // SAFETY: both descriptors were just created and are owned by nobody else.
        let (read_end, write_end) =
            unsafe { (OwnedFd::from_raw_fd(read_fd), OwnedFd::from_raw_fd(write_fd)) };
        Ok(Self {
            read_end,
            write_end,
        })
    }

    fn read_word(&mut self, addr: usize) -> ProbeRead {
        // SAFETY: the kernel validates `addr`; an unreadable source yields -1/EFAULT.
        let written = unsafe {
            libc::write(
                self.write_end.as_raw_fd(),
                addr as *const c_void,
                PREFIX_LEN,
            )
        };
        if written != PREFIX_LEN as isize {
            return ProbeRead::Unreadable;
        }

        let mut word = [0u8; PREFIX_LEN];
        // SAFETY: `word` is a writable buffer of PREFIX_LEN bytes.
        let read = unsafe {
            libc::read(
                self.read_end.as_raw_fd(),
                word.as_mut_ptr().cast::<c_void>(),
                PREFIX_LEN,
            )
        };
        if read != PREFIX_LEN as isize {
            return ProbeRead::ShortRead { read };
        }
        ProbeRead::Word(u64::from_ne_bytes(word))
    }
}
