//! The detection ring: one frame's lane-detection result per slot, written
//! by the detector worker and consumed by the orchestrator.
//!
//! Wire layout (`SPEC_FULL.md` §6): a 40-byte header followed by two
//! 24-byte lane records (left, then right). A lane record with
//! `has_left`/`has_right` false still occupies its slot with undefined
//! contents; readers must check the flag before trusting it.

use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::error::ShmResult;
use crate::region::Region;

/// 40-byte fixed header preceding the two lane records.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DetectionHeader {
    pub frame_id: u64,
    pub timestamp: f64,
    pub processing_time_ms: f64,
    pub has_left: i32,
    pub has_right: i32,
    pub ready: i32,
}

const HEADER_SIZE: usize = std::mem::size_of::<DetectionHeader>();
const LANE_RECORD_SIZE: usize = std::mem::size_of::<LaneRecord>();

static_assertions::const_assert_eq!(HEADER_SIZE, 40);
static_assertions::const_assert_eq!(LANE_RECORD_SIZE, 24);

/// 24-byte endpoint-plus-confidence encoding of one detected lane boundary.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct LaneRecord {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    pub confidence: f64,
}

impl LaneRecord {
    const fn zeroed() -> Self {
        Self {
            x1: 0,
            y1: 0,
            x2: 0,
            y2: 0,
            confidence: 0.0,
        }
    }
}

/// Required slot capacity for one detection-ring record: header plus two
/// lane records.
pub const SLOT_CAPACITY: usize = HEADER_SIZE + 2 * LANE_RECORD_SIZE;

/// One decoded detection result, owned by the caller.
#[derive(Debug, Clone)]
pub struct DetectionFrame {
    pub frame_id: u64,
    pub timestamp: f64,
    pub processing_time_ms: f64,
    pub left: Option<LaneRecord>,
    pub right: Option<LaneRecord>,
}

/// Producer side of the detection ring. Owned by the detector worker.
pub struct DetectionRingWriter {
    region: Region,
}

impl DetectionRingWriter {
    pub fn create(name: &str, path: &str, writer_pid: u32) -> ShmResult<Self> {
        let region = Region::create(name, path, SLOT_CAPACITY, writer_pid)?;
        Ok(Self { region })
    }

    /// Publish one detection result for `frame_id`.
    pub fn write(
        &mut self,
        frame_id: u64,
        timestamp: f64,
        processing_time_ms: f64,
        left: Option<LaneRecord>,
        right: Option<LaneRecord>,
    ) -> ShmResult<()> {
        let guard = self.region.header().mutex.lock()?;
        if guard.recovered {
            tracing::warn!(
                region = self.region.name(),
                "recovered poisoned detection ring lock"
            );
        }

        let slot = self.region.slot_mut();
        write_header(
            slot,
            &DetectionHeader {
                frame_id,
                timestamp,
                processing_time_ms,
                has_left: left.is_some() as i32,
                has_right: right.is_some() as i32,
                ready: 0,
            },
        );
        write_lane_record(slot, 0, &left.unwrap_or_else(LaneRecord::zeroed));
        write_lane_record(slot, 1, &right.unwrap_or_else(LaneRecord::zeroed));

        let mut header = read_header(slot);
        header.ready = 1;
        write_header(slot, &header);
        Ok(())
    }

    pub fn destroy(self) -> ShmResult<()> {
        self.region.destroy()
    }
}

/// Consumer side of the detection ring. Owned by the orchestrator.
pub struct DetectionRingReader {
    region: Region,
    last_seen_frame_id: Option<u64>,
}

impl DetectionRingReader {
    pub fn attach(name: &str, path: &str) -> ShmResult<Self> {
        let region = Region::attach(name, path, SLOT_CAPACITY)?;
        region.header().reader_count.fetch_add(1, Ordering::AcqRel);
        Ok(Self {
            region,
            last_seen_frame_id: None,
        })
    }

    pub fn read(&mut self, timeout: Duration) -> ShmResult<Option<DetectionFrame>> {
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

    fn try_read(&mut self) -> ShmResult<Option<DetectionFrame>> {
        let guard = self.region.header().mutex.lock()?;
        if guard.recovered {
            tracing::warn!(
                region = self.region.name(),
                "recovered poisoned detection ring lock"
            );
        }

        let slot = self.region.slot();
        let header = read_header(slot);
        if header.ready == 0 {
            return Ok(None);
        }
        if self.last_seen_frame_id == Some(header.frame_id) {
            return Ok(None);
        }

        let left = (header.has_left != 0).then(|| read_lane_record(slot, 0));
        let right = (header.has_right != 0).then(|| read_lane_record(slot, 1));
        self.last_seen_frame_id = Some(header.frame_id);

        Ok(Some(DetectionFrame {
            frame_id: header.frame_id,
            timestamp: header.timestamp,
            processing_time_ms: header.processing_time_ms,
            left,
            right,
        }))
    }
}

impl Drop for DetectionRingReader {
    fn drop(&mut self) {
        self.region.header().reader_count.fetch_sub(1, Ordering::AcqRel);
    }
}

fn read_header(slot: &[u8]) -> DetectionHeader {
    let mut header = DetectionHeader {
        frame_id: 0,
        timestamp: 0.0,
        processing_time_ms: 0.0,
        has_left: 0,
        has_right: 0,
        ready: 0,
    };
    let bytes = unsafe {
        std::slice::from_raw_parts_mut(
            &mut header as *mut DetectionHeader as *mut u8,
            HEADER_SIZE,
        )
    };
    bytes.copy_from_slice(&slot[..HEADER_SIZE]);
    header
}

fn write_header(slot: &mut [u8], header: &DetectionHeader) {
    let bytes = unsafe {
        std::slice::from_raw_parts(header as *const DetectionHeader as *const u8, HEADER_SIZE)
    };
    slot[..HEADER_SIZE].copy_from_slice(bytes);
}

fn lane_offset(index: usize) -> usize {
    HEADER_SIZE + index * LANE_RECORD_SIZE
}

fn read_lane_record(slot: &[u8], index: usize) -> LaneRecord {
    let mut record = LaneRecord::zeroed();
    let offset = lane_offset(index);
    let bytes = unsafe {
        std::slice::from_raw_parts_mut(&mut record as *mut LaneRecord as *mut u8, LANE_RECORD_SIZE)
    };
    bytes.copy_from_slice(&slot[offset..offset + LANE_RECORD_SIZE]);
    record
}

fn write_lane_record(slot: &mut [u8], index: usize, record: &LaneRecord) {
    let offset = lane_offset(index);
    let bytes = unsafe {
        std::slice::from_raw_parts(record as *const LaneRecord as *const u8, LANE_RECORD_SIZE)
    };
    slot[offset..offset + LANE_RECORD_SIZE].copy_from_slice(bytes);
}
