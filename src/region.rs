//! Managed handle over an anonymous kernel-backed shared memory region

use std::os::fd::{BorrowedFd, RawFd};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::backend::{default_backend, Descriptor, MappedView, ShmemBackend};
use crate::error::{AshmemError, Result};
use crate::protection::Protection;

/// A managed handle over an anonymous kernel-backed shared memory region
///
/// The handle owns a kernel descriptor and drives the region through its
/// lifecycle: created (unmapped) → mapped ⇄ unmapped → closed. While mapped,
/// [`read`](Self::read) and [`write`](Self::write) give bounds- and
/// permission-checked access to the region's bytes. Closing is terminal and
/// idempotent; dropping the handle closes it.
///
/// Mapping an already-mapped handle replaces the existing mapping. The new
/// mapping is established before the old view is dropped, so a failed remap
/// leaves the previous mapping intact.
///
/// The handle performs no internal locking. To share it, wrap it in
/// `Arc<Mutex<Ashmem>>`; the last holder's drop closes the region. To share
/// the *region* with another process, transfer [`raw_fd`](Self::raw_fd) over
/// an IPC channel and adopt it there with
/// [`from_descriptor`](Self::from_descriptor).
#[derive(Debug)]
pub struct Ashmem {
    backend: Arc<dyn ShmemBackend>,
    descriptor: Option<Descriptor>,
    name: String,
    size: usize,
    protection: Protection,
    mapping: Option<Mapping>,
}

#[derive(Debug)]
struct Mapping {
    view: MappedView,
    protection: Protection,
}

impl Ashmem {
    /// Create a region of `size` bytes named `name` using the platform's
    /// default backend
    pub fn create(name: &str, size: usize) -> Result<Self> {
        Self::create_with_backend(default_backend(), name, size)
    }

    /// Create a region through an explicit backend
    pub fn create_with_backend(
        backend: Arc<dyn ShmemBackend>,
        name: &str,
        size: usize,
    ) -> Result<Self> {
        if size == 0 {
            return Err(AshmemError::creation("region size must be greater than 0"));
        }
        let descriptor = backend
            .create(name, size)
            .map_err(|e| AshmemError::creation(format!("platform call failed: {}", e)))?;

        debug!(name, size, "created shared memory region");
        Ok(Self {
            backend,
            descriptor: Some(descriptor),
            name: name.to_string(),
            size,
            protection: Protection::ReadWrite,
            mapping: None,
        })
    }

    /// Adopt a descriptor received from another process
    ///
    /// The descriptor must identify a region of at least `size` bytes;
    /// ownership transfers to the returned handle.
    pub fn from_descriptor(
        backend: Arc<dyn ShmemBackend>,
        descriptor: Descriptor,
        size: usize,
    ) -> Result<Self> {
        if size == 0 {
            return Err(AshmemError::creation("region size must be greater than 0"));
        }
        let reported = backend.region_size(&descriptor)?;
        if reported < size {
            return Err(AshmemError::creation(format!(
                "descriptor region is {} bytes, smaller than the declared {}",
                reported, size
            )));
        }

        Ok(Self {
            backend,
            descriptor: Some(descriptor),
            name: String::new(),
            size,
            protection: Protection::ReadWrite,
            mapping: None,
        })
    }

    /// Close the region
    ///
    /// Unmaps first if needed, releases the descriptor and resets every
    /// field. Idempotent: closing a closed handle is a no-op.
    pub fn close(&mut self) {
        if self.descriptor.is_none() {
            return;
        }
        self.unmap();
        if let Some(descriptor) = self.descriptor.take() {
            if let Err(e) = self.backend.release(&descriptor) {
                trace!(name = %self.name, "backend release failed: {}", e);
            }
            // Dropping a kernel descriptor closes it.
        }
        self.size = 0;
        self.protection = Protection::None;
        debug!(name = %self.name, "closed shared memory region");
    }

    /// Map the region into the process with the given access mode
    ///
    /// The requested mode must not exceed the region's kernel-side
    /// protection mask. On failure the prior mapping state is unchanged.
    pub fn map(&mut self, protection: Protection) -> Result<()> {
        let descriptor = self.descriptor.as_ref().ok_or(AshmemError::Closed)?;
        if !self.protection.contains(protection) {
            return Err(AshmemError::mapping(format!(
                "requested {} exceeds the region protection mask {}",
                protection, self.protection
            )));
        }

        let view = self
            .backend
            .map(descriptor, self.size, protection)
            .map_err(|e| AshmemError::mapping(format!("platform call failed: {}", e)))?;

        let previous = self.mapping.replace(Mapping { view, protection });
        if previous.is_some() {
            trace!(name = %self.name, "replaced existing mapping");
        }
        debug!(name = %self.name, protection = %protection, "mapped region");
        Ok(())
    }

    /// Map the region with read and write access
    pub fn map_read_write(&mut self) -> Result<()> {
        self.map(Protection::ReadWrite)
    }

    /// Map the region with read access only
    pub fn map_read_only(&mut self) -> Result<()> {
        self.map(Protection::ReadOnly)
    }

    /// Release the current mapping, if any
    ///
    /// The descriptor stays valid and the region can be mapped again.
    pub fn unmap(&mut self) {
        if self.mapping.take().is_some() {
            trace!(name = %self.name, "unmapped region");
        }
    }

    /// Narrow the kernel-side protection mask of the region
    ///
    /// Mask bits can be cleared but never set again, matching the kernel
    /// primitive. The mask constrains future [`map`](Self::map) requests.
    pub fn set_protection(&mut self, protection: Protection) -> Result<()> {
        let descriptor = self.descriptor.as_ref().ok_or(AshmemError::Closed)?;
        if !self.protection.contains(protection) {
            return Err(AshmemError::invalid_parameter(
                "protection",
                "protection mask bits can be cleared but never set",
            ));
        }
        self.backend.set_protection(descriptor, protection)?;
        self.protection = protection;
        Ok(())
    }

    /// The kernel-side protection mask (`Protection::None` once closed)
    pub fn protection(&self) -> Protection {
        self.protection
    }

    /// The access mode of the current mapping, if mapped
    pub fn active_protection(&self) -> Option<Protection> {
        self.mapping.as_ref().map(|mapping| mapping.protection)
    }

    /// Size of the region in bytes (0 once closed)
    pub fn size(&self) -> usize {
        self.size
    }

    /// Name the region was created with
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check whether the handle has been closed
    pub fn is_closed(&self) -> bool {
        self.descriptor.is_none()
    }

    /// Check whether the region is currently mapped
    pub fn is_mapped(&self) -> bool {
        self.mapping.is_some()
    }

    /// Borrow the kernel descriptor
    ///
    /// `None` when the handle is closed or the backend has no kernel
    /// descriptor (fake regions are process-local).
    pub fn fd(&self) -> Option<BorrowedFd<'_>> {
        self.descriptor.as_ref().and_then(Descriptor::as_fd)
    }

    /// The raw kernel descriptor, for transfer over IPC
    pub fn raw_fd(&self) -> Option<RawFd> {
        self.descriptor.as_ref().and_then(Descriptor::as_raw_fd)
    }

    /// Copy `data` into the mapped region at `offset`
    ///
    /// Fails without copying anything unless the handle is mapped with write
    /// access and `offset + data.len()` fits the region (the sum is checked
    /// for overflow).
    pub fn write(&mut self, data: &[u8], offset: usize) -> Result<()> {
        self.check_access(data.len(), offset, Protection::WriteOnly)?;
        let mapping = self.mapping.as_mut().ok_or(AshmemError::NotMapped)?;
        let slice = match mapping.view.as_mut_slice() {
            Some(slice) => slice,
            None => {
                return Err(AshmemError::protection_violation(
                    Protection::WriteOnly,
                    mapping.protection,
                ))
            }
        };
        slice[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Borrow `len` bytes of the mapped region at `offset`
    ///
    /// Same validation as [`write`](Self::write) with read access. The
    /// returned view borrows the handle, so it cannot outlive an unmap or
    /// close (both take `&mut self`).
    pub fn read(&self, len: usize, offset: usize) -> Result<&[u8]> {
        self.check_access(len, offset, Protection::ReadOnly)?;
        let mapping = self.mapping.as_ref().ok_or(AshmemError::NotMapped)?;
        Ok(&mapping.view.as_slice()[offset..offset + len])
    }

    /// Validate mapping state, access mode and bounds; mutates nothing
    fn check_access(&self, len: usize, offset: usize, wanted: Protection) -> Result<()> {
        if self.descriptor.is_none() {
            return Err(AshmemError::Closed);
        }
        let mapping = self.mapping.as_ref().ok_or(AshmemError::NotMapped)?;
        if !mapping.protection.contains(wanted) {
            return Err(AshmemError::protection_violation(
                wanted,
                mapping.protection,
            ));
        }
        let end = offset
            .checked_add(len)
            .ok_or_else(|| AshmemError::out_of_bounds(offset, len, self.size))?;
        if end > self.size {
            return Err(AshmemError::out_of_bounds(offset, len, self.size));
        }
        Ok(())
    }
}

impl Drop for Ashmem {
    fn drop(&mut self) {
        self.close();
    }
}
