//! Enumerate live regions under `/dev/shm` without needing to know their
//! names in advance. Used by the viewer and by diagnostics tooling.

use std::time::SystemTime;

use crate::error::{ShmError, ShmResult};
use crate::platform::{is_process_alive, SHM_DIR};
use crate::region::Region;

/// One region found on disk, with enough information to decide whether it
/// is still in use.
#[derive(Debug, Clone)]
pub struct RegionInfo {
    pub name: String,
    pub path: String,
    pub size_bytes: u64,
    pub writer_pid: u32,
    pub created_at: SystemTime,
}

/// Scans `/dev/shm` for files carrying the `lkas_` prefix this crate's
/// regions are created with.
pub struct RegionDiscovery;

impl RegionDiscovery {
    pub fn new() -> Self {
        Self
    }

    /// List every `lkas_`-prefixed backing file currently under
    /// [`SHM_DIR`], regardless of whether its writer is still alive.
    pub fn list_regions(&self) -> ShmResult<Vec<RegionInfo>> {
        let dir = std::path::Path::new(SHM_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut regions = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let Ok(file_name) = entry.file_name().into_string() else {
                continue;
            };
            if !file_name.starts_with("lkas_") {
                continue;
            }
            if let Ok(info) = self.inspect(&file_name) {
                regions.push(info);
            }
        }

        regions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(regions)
    }

    /// Find one region by name, or `None` if it is not present.
    pub fn find_region(&self, name: &str) -> ShmResult<Option<RegionInfo>> {
        Ok(self
            .list_regions()?
            .into_iter()
            .find(|info| info.name == name))
    }

    /// Names of regions whose writer process is no longer alive.
    pub fn orphaned_region_names(&self) -> ShmResult<Vec<String>> {
        Ok(self
            .list_regions()?
            .into_iter()
            .filter(|info| !is_process_alive(info.writer_pid))
            .map(|info| info.name)
            .collect())
    }

    fn inspect(&self, file_name: &str) -> ShmResult<RegionInfo> {
        let path = format!("{SHM_DIR}/{file_name}");
        let file_meta = std::fs::metadata(&path)?;

        // Minimal capacity (header only) is enough to read `writer_pid`;
        // the slot's record layout is owned by `image`/`detection`, not
        // relevant here.
        let region = Region::attach(file_name, &path, 0).map_err(|_| ShmError::InvalidHeader {
            name: file_name.to_string(),
        })?;

        Ok(RegionInfo {
            name: file_name.to_string(),
            path,
            size_bytes: file_meta.len(),
            writer_pid: region.header().writer_pid,
            created_at: file_meta
                .created()
                .or_else(|_| file_meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH),
        })
    }
}

impl Default for RegionDiscovery {
    fn default() -> Self {
        Self::new()
    }
}
