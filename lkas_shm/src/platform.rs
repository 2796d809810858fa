//! Linux-specific backing-file and process-liveness helpers.

use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;

use memmap2::{MmapMut, MmapOptions};
use nix::sys::signal::kill;
use nix::unistd::{Pid, getpid};

use crate::error::{ShmError, ShmResult};

/// Directory backing named regions. `/dev/shm` is a tmpfs on Linux and is
/// the conventional location POSIX shared memory objects surface at.
pub const SHM_DIR: &str = "/dev/shm";

/// Create (or truncate-and-replace) the backing file for a region and map
/// it. Fails if a file already exists at `path` — callers unlink first via
/// [`destroy_backing_file`] when recreating after a crash.
pub fn create_mapped_file(path: &str, size: usize) -> ShmResult<MmapMut> {
    let file = OpenOptions::new()
        .create_new(true)
        .read(true)
        .write(true)
        .mode(0o600)
        .open(path)?;
    file.set_len(size as u64)?;

    let mut options = MmapOptions::new();
    options.populate();
    let mmap = unsafe { options.map_mut(&file)? };
    Ok(mmap)
}

/// Attach to an existing backing file read-write (readers still need write
/// access to take the process-shared mutex).
pub fn attach_mapped_file(path: &str) -> ShmResult<MmapMut> {
    let file = OpenOptions::new().read(true).write(true).open(path)?;
    let mmap = unsafe { MmapOptions::new().map_mut(&file)? };
    Ok(mmap)
}

/// Remove a region's backing file. Missing-file is not an error — the
/// region may already have been cleaned up by another process.
pub fn destroy_backing_file(path: &str) -> ShmResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ShmError::Io { source: e }),
    }
}

/// Check whether `pid` names a live process, using a null signal
/// (`kill(pid, None)`) rather than an actual signal delivery.
pub fn is_process_alive(pid: u32) -> bool {
    match kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        Err(nix::Error::EPERM) => true, // exists, just not signalable by us
        Err(_) => false,
    }
}

/// The calling process's PID.
pub fn current_pid() -> u32 {
    getpid().as_raw() as u32
}
