//! Kernel shared-memory primitive backends
//!
//! The region handle consumes the platform's anonymous shared memory service
//! through the [`ShmemBackend`] capability trait: create a region of N bytes
//! named S, narrow its protection mask, query its size, and map it into the
//! process. One real implementation exists per target OS, plus an in-memory
//! fake for testing region logic without a live kernel resource.

mod fake;
mod file;
#[cfg(any(target_os = "linux", target_os = "android"))]
mod ashmem_dev;
#[cfg(any(target_os = "linux", target_os = "android"))]
mod memfd;

pub use fake::FakeBackend;
pub use file::FileBackend;
#[cfg(any(target_os = "linux", target_os = "android"))]
pub use ashmem_dev::AshmemDevBackend;
#[cfg(any(target_os = "linux", target_os = "android"))]
pub use memfd::MemfdBackend;

use std::fmt;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::sync::Arc;

use memmap2::{Mmap, MmapMut, MmapOptions};

use crate::error::{AshmemError, Result};
use crate::protection::Protection;

/// Kernel-issued identifier for a shared memory region
#[derive(Debug)]
pub enum Descriptor {
    /// A real kernel descriptor, transferable to other processes over IPC
    Fd(OwnedFd),
    /// Backend-local identifier used by the in-memory fake
    Virtual(u64),
}

impl Descriptor {
    /// Borrow the kernel descriptor, if this is a kernel-backed region
    pub fn as_fd(&self) -> Option<BorrowedFd<'_>> {
        match self {
            Descriptor::Fd(fd) => Some(fd.as_fd()),
            Descriptor::Virtual(_) => None,
        }
    }

    /// Get the raw kernel descriptor, if this is a kernel-backed region
    pub fn as_raw_fd(&self) -> Option<RawFd> {
        self.as_fd().map(|fd| fd.as_raw_fd())
    }
}

/// A live user-space mapping of a region
///
/// Dropping the view releases the virtual address range.
#[derive(Debug)]
pub enum MappedView {
    /// Mapping established without write access
    ReadOnly(Mmap),
    /// Mapping established with write access
    ReadWrite(MmapMut),
}

impl MappedView {
    /// Length of the mapped range in bytes
    pub fn len(&self) -> usize {
        match self {
            MappedView::ReadOnly(view) => view.len(),
            MappedView::ReadWrite(view) => view.len(),
        }
    }

    /// Check whether the mapped range is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Base address of the mapping
    pub fn as_ptr(&self) -> *const u8 {
        match self {
            MappedView::ReadOnly(view) => view.as_ptr(),
            MappedView::ReadWrite(view) => view.as_ptr(),
        }
    }

    /// The mapped bytes
    pub fn as_slice(&self) -> &[u8] {
        match self {
            MappedView::ReadOnly(view) => &view[..],
            MappedView::ReadWrite(view) => &view[..],
        }
    }

    /// The mapped bytes, mutable; `None` for read-only mappings
    pub fn as_mut_slice(&mut self) -> Option<&mut [u8]> {
        match self {
            MappedView::ReadOnly(_) => None,
            MappedView::ReadWrite(view) => Some(&mut view[..]),
        }
    }
}

/// Capability interface over the platform's anonymous shared memory primitive
pub trait ShmemBackend: fmt::Debug + Send + Sync {
    /// Create a region of `size` bytes named `name` in the kernel
    fn create(&self, name: &str, size: usize) -> Result<Descriptor>;

    /// Apply a protection mask to the kernel region
    fn set_protection(&self, descriptor: &Descriptor, protection: Protection) -> Result<()>;

    /// Query the size of the region identified by `descriptor`
    fn region_size(&self, descriptor: &Descriptor) -> Result<usize>;

    /// Map `size` bytes of the region into the process with the given access
    fn map(&self, descriptor: &Descriptor, size: usize, protection: Protection)
        -> Result<MappedView>;

    /// Release backend bookkeeping for a descriptor
    ///
    /// Kernel descriptors are released by dropping the owned fd; the fake
    /// backend uses this hook to retire virtual ids.
    fn release(&self, _descriptor: &Descriptor) -> Result<()> {
        Ok(())
    }
}

/// Pick the most capable backend for the current platform
pub fn default_backend() -> Arc<dyn ShmemBackend> {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        if AshmemDevBackend::is_available() {
            return Arc::new(AshmemDevBackend::new());
        }
        Arc::new(MemfdBackend::new())
    }
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    {
        Arc::new(FileBackend::new())
    }
}

/// Borrow the kernel fd from a descriptor, failing for virtual descriptors
pub(crate) fn require_fd(descriptor: &Descriptor) -> Result<BorrowedFd<'_>> {
    descriptor
        .as_fd()
        .ok_or_else(|| AshmemError::platform("descriptor is not backed by a kernel fd"))
}

/// Map a kernel-backed descriptor with the requested access
///
/// A `Protection::None` request is materialized as a read-only mapping; the
/// handle records the `None` mode and refuses every access to it.
pub(crate) fn map_fd(
    fd: BorrowedFd<'_>,
    size: usize,
    protection: Protection,
) -> Result<MappedView> {
    let mut options = MmapOptions::new();
    options.len(size);
    if protection.can_write() {
        let view = unsafe { options.map_mut(&fd) }
            .map_err(|e| AshmemError::from_io(e, "Failed to create writable mapping"))?;
        Ok(MappedView::ReadWrite(view))
    } else {
        let view = unsafe { options.map(&fd) }
            .map_err(|e| AshmemError::from_io(e, "Failed to create read-only mapping"))?;
        Ok(MappedView::ReadOnly(view))
    }
}

/// Query the size of a kernel-backed region through `fstat`
pub(crate) fn fd_region_size(fd: BorrowedFd<'_>) -> Result<usize> {
    let mut stat = unsafe { std::mem::zeroed::<libc::stat>() };
    // SAFETY: fd is a valid open descriptor and stat is a plain out parameter.
    let rc = unsafe { libc::fstat(fd.as_raw_fd(), &mut stat) };
    if rc < 0 {
        return Err(AshmemError::platform(format!(
            "fstat failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(stat.st_size as usize)
}
