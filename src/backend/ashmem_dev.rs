//! `/dev/ashmem` backend using the kernel's anonymous shared memory driver
//!
//! Regions are created by opening the ashmem device and configuring the new
//! descriptor with `ASHMEM_SET_NAME` and `ASHMEM_SET_SIZE`. The protection
//! mask ioctl only permits clearing bits, never setting them.

use std::ffi::CString;
use std::fs::OpenOptions;
use std::mem::size_of;
use std::os::fd::{AsRawFd, OwnedFd};
use std::path::Path;

use super::{fd_region_size, map_fd, require_fd, Descriptor, MappedView, ShmemBackend};
use crate::error::{AshmemError, Result};
use crate::protection::Protection;

const ASHMEM_DEVICE: &str = "/dev/ashmem";
const ASHMEM_NAME_LEN: usize = 256;

// Ioctl request codes mirroring <linux/ashmem.h>: magic 0x77, with the
// standard _IOC bit layout (nr 0..8, type 8..16, size 16..30, dir 30..32).
const ASHMEM_IOC_MAGIC: libc::c_ulong = 0x77;
const IOC_WRITE: libc::c_ulong = 1;

const fn ioc(dir: libc::c_ulong, nr: libc::c_ulong, size: libc::c_ulong) -> libc::c_ulong {
    (dir << 30) | (size << 16) | (ASHMEM_IOC_MAGIC << 8) | nr
}

const ASHMEM_SET_NAME: libc::c_ulong = ioc(IOC_WRITE, 1, ASHMEM_NAME_LEN as libc::c_ulong);
const ASHMEM_SET_SIZE: libc::c_ulong = ioc(IOC_WRITE, 3, size_of::<usize>() as libc::c_ulong);
const ASHMEM_GET_SIZE: libc::c_ulong = ioc(0, 4, 0);
const ASHMEM_SET_PROT_MASK: libc::c_ulong =
    ioc(IOC_WRITE, 5, size_of::<libc::c_ulong>() as libc::c_ulong);

/// Backend over the `/dev/ashmem` character device
#[derive(Debug, Default)]
pub struct AshmemDevBackend;

impl AshmemDevBackend {
    /// Create a new ashmem device backend
    pub fn new() -> Self {
        Self
    }

    /// Check whether the ashmem device exists on this system
    pub fn is_available() -> bool {
        Path::new(ASHMEM_DEVICE).exists()
    }
}

fn ioctl_error(call: &str) -> AshmemError {
    AshmemError::platform(format!(
        "{} failed: {}",
        call,
        std::io::Error::last_os_error()
    ))
}

impl ShmemBackend for AshmemDevBackend {
    fn create(&self, name: &str, size: usize) -> Result<Descriptor> {
        let cname = CString::new(name)
            .map_err(|_| AshmemError::invalid_parameter("name", "Name contains null bytes"))?;
        let bytes = cname.as_bytes_with_nul();
        if bytes.len() > ASHMEM_NAME_LEN {
            return Err(AshmemError::invalid_parameter(
                "name",
                "Name exceeds the ashmem name length limit",
            ));
        }

        let device = OpenOptions::new()
            .read(true)
            .write(true)
            .open(ASHMEM_DEVICE)
            .map_err(|e| AshmemError::from_io(e, "Failed to open /dev/ashmem"))?;
        let fd = OwnedFd::from(device);

        let mut raw_name = [0u8; ASHMEM_NAME_LEN];
        raw_name[..bytes.len()].copy_from_slice(bytes);

        // SAFETY: fd is a valid open descriptor and raw_name outlives the call.
        let rc = unsafe { libc::ioctl(fd.as_raw_fd(), ASHMEM_SET_NAME as _, raw_name.as_ptr()) };
        if rc < 0 {
            return Err(ioctl_error("ASHMEM_SET_NAME"));
        }
        // SAFETY: the size argument is passed by value.
        let rc = unsafe { libc::ioctl(fd.as_raw_fd(), ASHMEM_SET_SIZE as _, size) };
        if rc < 0 {
            return Err(ioctl_error("ASHMEM_SET_SIZE"));
        }

        Ok(Descriptor::Fd(fd))
    }

    fn set_protection(&self, descriptor: &Descriptor, protection: Protection) -> Result<()> {
        let fd = require_fd(descriptor)?;
        let mask = protection.prot_flags() as libc::c_ulong;
        // SAFETY: fd is a valid open descriptor; the mask is passed by value.
        let rc = unsafe { libc::ioctl(fd.as_raw_fd(), ASHMEM_SET_PROT_MASK as _, mask) };
        if rc < 0 {
            return Err(ioctl_error("ASHMEM_SET_PROT_MASK"));
        }
        Ok(())
    }

    fn region_size(&self, descriptor: &Descriptor) -> Result<usize> {
        let fd = require_fd(descriptor)?;
        // SAFETY: fd is a valid open descriptor; the ioctl takes no argument.
        let size = unsafe { libc::ioctl(fd.as_raw_fd(), ASHMEM_GET_SIZE as _) };
        if size < 0 {
            // Descriptors not created through ashmem report through fstat.
            return fd_region_size(fd);
        }
        Ok(size as usize)
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
