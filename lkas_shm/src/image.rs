//! The image ring: one RGB camera frame per slot, written by the
//! orchestrator and consumed by the detector worker.
//!
//! Wire layout (`SPEC_FULL.md` §3): a 32-byte header followed by
//! `width * height * channels` bytes of interleaved RGB8 pixel data.

use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::error::{ShmError, ShmResult};
use crate::region::Region;

/// 32-byte fixed header preceding the pixel payload.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ImageHeader {
    pub frame_id: u64,
    pub timestamp: f64,
    pub width: i32,
    pub height: i32,
    pub channels: i32,
    pub ready: i32,
}

const HEADER_SIZE: usize = std::mem::size_of::<ImageHeader>();

impl ImageHeader {
    const fn zeroed() -> Self {
        Self {
            frame_id: 0,
            timestamp: 0.0,
            width: 0,
            height: 0,
            channels: 0,
            ready: 0,
        }
    }

    fn payload_len(&self) -> usize {
        (self.width as usize) * (self.height as usize) * (self.channels as usize)
    }
}

static_assertions::const_assert_eq!(HEADER_SIZE, 32);

/// One decoded image frame, owned by the caller (copied out of the ring).
#[derive(Debug, Clone)]
pub struct ImageFrame {
    pub frame_id: u64,
    pub timestamp: f64,
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub pixels: Vec<u8>,
}

/// Required slot capacity for a ring carrying frames up to `width x height x
/// channels` bytes.
pub fn slot_capacity(width: u32, height: u32, channels: u32) -> usize {
    HEADER_SIZE + (width as usize) * (height as usize) * (channels as usize)
}

/// Producer side of the image ring. Owned by the orchestrator.
pub struct ImageRingWriter {
    region: Region,
    frame_id: u64,
}

impl ImageRingWriter {
    pub fn create(name: &str, path: &str, capacity: usize, writer_pid: u32) -> ShmResult<Self> {
        let region = Region::create(name, path, capacity, writer_pid)?;
        Ok(Self { region, frame_id: 0 })
    }

    /// Publish one frame, overwriting whatever was previously in the slot.
    /// `frame_id` auto-increments; the orchestrator does not supply it.
    pub fn write(
        &mut self,
        timestamp: f64,
        width: u32,
        height: u32,
        channels: u32,
        pixels: &[u8],
    ) -> ShmResult<u64> {
        let capacity = self.region.slot().len();
        let needed = slot_capacity(width, height, channels);
        if needed > capacity {
            return Err(ShmError::InvalidSize {
                size: needed,
                capacity,
            });
        }

        let guard = self.region.header().mutex.lock()?;
        if guard.recovered {
            tracing::warn!(region = self.region.name(), "recovered poisoned image ring lock");
        }

        let frame_id = self.frame_id;
        let slot = self.region.slot_mut();
        write_header(
            slot,
            &ImageHeader {
                frame_id,
                timestamp,
                width: width as i32,
                height: height as i32,
                channels: channels as i32,
                ready: 0,
            },
        );
        slot[HEADER_SIZE..HEADER_SIZE + pixels.len()].copy_from_slice(pixels);
        let mut header = read_header(slot);
        header.ready = 1;
        write_header(slot, &header);

        self.frame_id += 1;
        Ok(frame_id)
    }

    pub fn destroy(self) -> ShmResult<()> {
        self.region.destroy()
    }
}

/// Consumer side of the image ring. Owned by the detector worker.
pub struct ImageRingReader {
    region: Region,
    last_seen_frame_id: Option<u64>,
}

impl ImageRingReader {
    pub fn attach(name: &str, path: &str, capacity: usize) -> ShmResult<Self> {
        let region = Region::attach(name, path, capacity)?;
        region.header().reader_count.fetch_add(1, Ordering::AcqRel);
        Ok(Self {
            region,
            last_seen_frame_id: None,
        })
    }

    /// Poll until a frame newer than the last one observed appears, or
    /// `timeout` elapses.
    pub fn read(&mut self, timeout: Duration) -> ShmResult<Option<ImageFrame>> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if let Some(frame) = self.try_read()? {
                return Ok(Some(frame));
            }
            if std::time::Instant::now() >= deadline {
                return Ok(None);
            }
            std::thread::sleep(Duration::from_micros(200));
        }
    }

    fn try_read(&mut self) -> ShmResult<Option<ImageFrame>> {
        let guard = self.region.header().mutex.lock()?;
        if guard.recovered {
            tracing::warn!(region = self.region.name(), "recovered poisoned image ring lock");
        }

        let slot = self.region.slot();
        let header = read_header(slot);
        if header.ready == 0 {
            return Ok(None);
        }
        if self.last_seen_frame_id == Some(header.frame_id) {
            return Ok(None);
        }

        let payload_len = header.payload_len();
        let pixels = slot[HEADER_SIZE..HEADER_SIZE + payload_len].to_vec();
        self.last_seen_frame_id = Some(header.frame_id);

        Ok(Some(ImageFrame {
            frame_id: header.frame_id,
            timestamp: header.timestamp,
            width: header.width as u32,
            height: header.height as u32,
            channels: header.channels as u32,
            pixels,
        }))
    }
}

impl Drop for ImageRingReader {
    fn drop(&mut self) {
        self.region.header().reader_count.fetch_sub(1, Ordering::AcqRel);
    }
}

fn read_header(slot: &[u8]) -> ImageHeader {
    let mut header = ImageHeader::zeroed();
    let bytes = unsafe {
        std::slice::from_raw_parts_mut(&mut header as *mut ImageHeader as *mut u8, HEADER_SIZE)
    };
    bytes.copy_from_slice(&slot[..HEADER_SIZE]);
    header
}

fn write_header(slot: &mut [u8], header: &ImageHeader) {
    let bytes = unsafe {
        std::slice::from_raw_parts(header as *const ImageHeader as *const u8, HEADER_SIZE)
    };
    slot[..HEADER_SIZE].copy_from_slice(bytes);
}
