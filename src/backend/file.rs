//! File-backed fallback for platforms without an anonymous region primitive
//!
//! The backing file is unlinked immediately after creation, so the region
//! lives only as long as its descriptors and behaves like an anonymous one.

use std::fs::OpenOptions;
use std::os::fd::OwnedFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{fd_region_size, map_fd, require_fd, Descriptor, MappedView, ShmemBackend};
use crate::error::{AshmemError, Result};
use crate::protection::Protection;

/// Backend over unlinked temporary files
#[derive(Debug)]
pub struct FileBackend {
    dir: PathBuf,
    counter: AtomicU64,
}

impl FileBackend {
    /// Create a file backend rooted in the system temporary directory
    pub fn new() -> Self {
        Self::with_dir(std::env::temp_dir())
    }

    /// Create a file backend rooted in the given directory
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl Default for FileBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ShmemBackend for FileBackend {
    fn create(&self, name: &str, size: usize) -> Result<Descriptor> {
        let sanitized = name.replace(['/', '\\'], "_");
        let serial = self.counter.fetch_add(1, Ordering::Relaxed);
        let path = self.dir.join(format!(
            "ashmem_{}_{}_{}",
            std::process::id(),
            serial,
            sanitized
        ));

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(&path)
            .map_err(|e| AshmemError::from_io(e, "Failed to create backing file"))?;

        file.set_len(size as u64)
            .map_err(|e| AshmemError::from_io(e, "Failed to set backing file size"))?;

        // The path is only needed to create the inode; unlinking keeps the
        // region anonymous.
        let _ = std::fs::remove_file(&path);

        Ok(Descriptor::Fd(OwnedFd::from(file)))
    }

    fn set_protection(&self, descriptor: &Descriptor, _protection: Protection) -> Result<()> {
        // Plain files carry no kernel-side protection mask; the handle
        // records and enforces the narrowed mask itself.
        require_fd(descriptor)?;
        Ok(())
    }

    fn region_size(&self, descriptor: &Descriptor) -> Result<usize> {
        fd_region_size(require_fd(descriptor)?)
    }

    fn map(
        &self,
        descriptor: &Descriptor,
        size: usize,
        protection: Protection,
    ) -> Result<MappedView> {
        map_fd(require_fd(descriptor)?, size, protection)
    }
}
