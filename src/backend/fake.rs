//! In-memory fake backend for exercising region logic without kernel resources
//!
//! Regions are plain anonymous mappings tracked by a virtual id. Contents are
//! not retained across unmap/remap cycles, and the descriptors cannot cross a
//! process boundary; everything else follows the real backends, which makes
//! the fake suitable for testing the lifecycle state machine and the
//! bounds/permission checks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use memmap2::MmapOptions;

use super::{Descriptor, MappedView, ShmemBackend};
use crate::error::{AshmemError, Result};
use crate::protection::Protection;

#[derive(Debug)]
struct FakeRegion {
    #[allow(dead_code)]
    name: String,
    size: usize,
}

/// In-memory stand-in for the kernel shared memory primitive
#[derive(Debug, Default)]
pub struct FakeBackend {
    regions: Mutex<HashMap<u64, FakeRegion>>,
    next_id: AtomicU64,
    capacity: Option<usize>,
}

impl FakeBackend {
    /// Create an unbounded fake backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fake backend with a total byte budget, for exercising the
    /// resource exhaustion failure path
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            capacity: Some(bytes),
            ..Self::default()
        }
    }

    /// Number of live regions tracked by the backend
    pub fn region_count(&self) -> usize {
        self.regions.lock().unwrap().len()
    }

    fn virtual_id(descriptor: &Descriptor) -> Result<u64> {
        match descriptor {
            Descriptor::Virtual(id) => Ok(*id),
            Descriptor::Fd(_) => Err(AshmemError::platform(
                "kernel descriptor passed to the fake backend",
            )),
        }
    }
}

impl ShmemBackend for FakeBackend {
    fn create(&self, name: &str, size: usize) -> Result<Descriptor> {
        let mut regions = self.regions.lock().unwrap();
        if let Some(capacity) = self.capacity {
            let used: usize = regions.values().map(|r| r.size).sum();
            if used.saturating_add(size) > capacity {
                return Err(AshmemError::platform(format!(
                    "fake backend capacity exhausted: {} of {} bytes in use",
                    used, capacity
                )));
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        regions.insert(
            id,
            FakeRegion {
                name: name.to_string(),
                size,
            },
        );
        Ok(Descriptor::Virtual(id))
    }

    fn set_protection(&self, descriptor: &Descriptor, _protection: Protection) -> Result<()> {
        let id = Self::virtual_id(descriptor)?;
        let regions = self.regions.lock().unwrap();
        regions
            .get(&id)
            .map(|_| ())
            .ok_or_else(|| AshmemError::platform(format!("unknown virtual descriptor {}", id)))
    }

    fn region_size(&self, descriptor: &Descriptor) -> Result<usize> {
        let id = Self::virtual_id(descriptor)?;
        let regions = self.regions.lock().unwrap();
        regions
            .get(&id)
            .map(|region| region.size)
            .ok_or_else(|| AshmemError::platform(format!("unknown virtual descriptor {}", id)))
    }

    fn map(
        &self,
        descriptor: &Descriptor,
        size: usize,
        protection: Protection,
    ) -> Result<MappedView> {
        let region_size = self.region_size(descriptor)?;
        if size > region_size {
            return Err(AshmemError::mapping(format!(
                "requested {} bytes from a {} byte region",
                size, region_size
            )));
        }

        let view = MmapOptions::new()
            .len(size)
            .map_anon()
            .map_err(|e| AshmemError::from_io(e, "Failed to create anonymous mapping"))?;

        if protection.can_write() {
            Ok(MappedView::ReadWrite(view))
        } else {
            let view = view
                .make_read_only()
                .map_err(|e| AshmemError::from_io(e, "Failed to drop write access"))?;
            Ok(MappedView::ReadOnly(view))
        }
    }

    fn release(&self, descriptor: &Descriptor) -> Result<()> {
        let id = Self::virtual_id(descriptor)?;
        self.regions.lock().unwrap().remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_release_bookkeeping() {
        let backend = FakeBackend::new();
        let descriptor = backend.create("unit", 128).unwrap();
        assert_eq!(backend.region_count(), 1);
        assert_eq!(backend.region_size(&descriptor).unwrap(), 128);

        backend.release(&descriptor).unwrap();
        assert_eq!(backend.region_count(), 0);
        assert!(backend.region_size(&descriptor).is_err());
    }

    #[test]
    fn test_capacity_limit() {
        let backend = FakeBackend::with_capacity(4096);
        let first = backend.create("a", 4096).unwrap();
        assert!(backend.create("b", 1).is_err());

        backend.release(&first).unwrap();
        assert!(backend.create("b", 1).is_ok());
    }

    #[test]
    fn test_map_beyond_region_fails() {
        let backend = FakeBackend::new();
        let descriptor = backend.create("unit", 64).unwrap();
        assert!(backend
            .map(&descriptor, 128, Protection::ReadWrite)
            .is_err());
    }
}
