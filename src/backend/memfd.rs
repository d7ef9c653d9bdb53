//! Anonymous memory file descriptor backend (Linux `memfd_create`)
//!
//! The descriptor is created sealable so that protection narrowing can be
//! enforced kernel-side: clearing write access adds `F_SEAL_FUTURE_WRITE`,
//! which refuses any new writable mapping of the descriptor.

use std::ffi::CString;
use std::os::fd::AsRawFd;

use nix::sys::memfd::{memfd_create, MemFdCreateFlag};
use nix::unistd::ftruncate;

use super::{fd_region_size, map_fd, require_fd, Descriptor, MappedView, ShmemBackend};
use crate::error::{AshmemError, Result};
use crate::protection::Protection;

/// Backend over anonymous memory file descriptors
#[derive(Debug, Default)]
pub struct MemfdBackend;

impl MemfdBackend {
    /// Create a new memfd backend
    pub fn new() -> Self {
        Self
    }
}

impl ShmemBackend for MemfdBackend {
    fn create(&self, name: &str, size: usize) -> Result<Descriptor> {
        let cname = CString::new(name)
            .map_err(|_| AshmemError::invalid_parameter("name", "Name contains null bytes"))?;

        let fd = memfd_create(
            &cname,
            MemFdCreateFlag::MFD_CLOEXEC | MemFdCreateFlag::MFD_ALLOW_SEALING,
        )
        .map_err(|e| AshmemError::platform(format!("Failed to create memfd: {}", e)))?;

        ftruncate(&fd, size as libc::off_t)
            .map_err(|e| AshmemError::platform(format!("Failed to set memfd size: {}", e)))?;

        Ok(Descriptor::Fd(fd))
    }

    fn set_protection(&self, descriptor: &Descriptor, protection: Protection) -> Result<()> {
        let fd = require_fd(descriptor)?;
        if !protection.can_write() {
            // SAFETY: fd is a valid open descriptor.
            let rc =
                unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_ADD_SEALS, libc::F_SEAL_FUTURE_WRITE) };
            if rc < 0 {
                return Err(AshmemError::platform(format!(
                    "F_ADD_SEALS failed: {}",
                    std::io::Error::last_os_error()
                )));
            }
        }
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
