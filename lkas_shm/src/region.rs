//! The generic mapped region: a process-shared mutex followed by one
//! fixed-size record slot. [`crate::image`] and [`crate::detection`] lay
//! out their specific record formats in the slot this module provides.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use memmap2::MmapMut;

use crate::error::{ShmError, ShmResult};
use crate::mutex::ProcessMutex;

const MAGIC: u64 = 0x4C_4B_41_53_52_4E_47_31; // "LKASRNG1"

/// Fixed-size control prefix written once by the creator and shared by
/// every attached process. Cache-line aligned so the mutex and the atomics
/// around it do not straddle a reader's cache line with the record data.
#[repr(C, align(64))]
pub struct RegionHeader {
    pub magic: u64,
    pub mutex: ProcessMutex,
    pub writer_pid: u32,
    pub reader_count: AtomicU32,
    pub created_ts_ns: u64,
    _padding: [u8; 16],
}

impl RegionHeader {
    fn init_in_place(this: *mut Self, writer_pid: u32) -> ShmResult<()> {
        unsafe {
            (*this).magic = MAGIC;
            (*this).writer_pid = writer_pid;
            (*this).reader_count = AtomicU32::new(0);
            (*this).created_ts_ns = now_ns();
            ProcessMutex::init_in_place(std::ptr::addr_of_mut!((*this).mutex))?;
        }
        Ok(())
    }

    fn validate(&self) -> ShmResult<()> {
        if self.magic != MAGIC {
            return Err(ShmError::InvalidHeader {
                name: "<unnamed>".to_string(),
            });
        }
        Ok(())
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64
}

/// A mapped region: `RegionHeader` followed by a fixed-size record slot.
pub struct Region {
    name: String,
    path: String,
    slot_size: usize,
    mmap: MmapMut,
}

impl Region {
    pub fn header_size() -> usize {
        std::mem::size_of::<RegionHeader>()
    }

    /// Create a brand-new region at `path`, unlinking any stale file of the
    /// same name first (a producer restart after a crash).
    pub fn create(name: &str, path: &str, slot_size: usize, writer_pid: u32) -> ShmResult<Self> {
        crate::platform::destroy_backing_file(path)?;
        let total_size = Self::header_size() + slot_size;
        let mut mmap = crate::platform::create_mapped_file(path, total_size)?;
        RegionHeader::init_in_place(mmap.as_mut_ptr() as *mut RegionHeader, writer_pid)?;
        Ok(Self {
            name: name.to_string(),
            path: path.to_string(),
            slot_size,
            mmap,
        })
    }

    /// Attach to an existing region. Validates the header magic.
    pub fn attach(name: &str, path: &str, slot_size: usize) -> ShmResult<Self> {
        let mmap = crate::platform::attach_mapped_file(path)?;
        let region = Self {
            name: name.to_string(),
            path: path.to_string(),
            slot_size,
            mmap,
        };
        region.header().validate()?;
        Ok(region)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn header(&self) -> &RegionHeader {
        unsafe { &*(self.mmap.as_ptr() as *const RegionHeader) }
    }

    /// Slot bytes (the record format owned by `image`/`detection`).
    pub fn slot(&self) -> &[u8] {
        unsafe {
            std::slice::from_raw_parts(self.mmap.as_ptr().add(Self::header_size()), self.slot_size)
        }
    }

    pub fn slot_mut(&mut self) -> &mut [u8] {
        let header_size = Self::header_size();
        unsafe {
            std::slice::from_raw_parts_mut(
                self.mmap.as_mut_ptr().add(header_size),
                self.slot_size,
            )
        }
    }

    pub fn destroy(self) -> ShmResult<()> {
        crate::platform::destroy_backing_file(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn create_then_attach_round_trips_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("region_test").to_string_lossy().to_string();
        let writer = Region::create("region_test", &path, 256, 1234).unwrap();
        assert_eq!(writer.header().writer_pid, 1234);

        let reader = Region::attach("region_test", &path, 256).unwrap();
        assert_eq!(reader.header().magic, writer.header().magic);
    }

    #[test]
    fn attach_to_missing_region_fails() {
        let result = Region::attach("missing", "/tmp/definitely_not_a_real_lkas_region", 64);
        assert!(result.is_err());
    }
}
