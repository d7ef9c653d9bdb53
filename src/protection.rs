//! Access protection modes for mapped shared memory regions

use std::fmt;

use serde::{Deserialize, Serialize};

/// Access mode granted to a region mapping, or recorded as the kernel-side
/// protection mask of the region itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protection {
    /// No access; a mapping with this mode permits neither reads nor writes
    None,
    /// Read access only
    ReadOnly,
    /// Write access only
    WriteOnly,
    /// Read and write access
    ReadWrite,
}

impl Default for Protection {
    fn default() -> Self {
        Self::ReadWrite
    }
}

impl Protection {
    /// Build a protection mode from individual read/write flags
    pub fn from_flags(read: bool, write: bool) -> Self {
        match (read, write) {
            (false, false) => Self::None,
            (true, false) => Self::ReadOnly,
            (false, true) => Self::WriteOnly,
            (true, true) => Self::ReadWrite,
        }
    }

    /// Check whether this mode permits reads
    pub fn can_read(self) -> bool {
        matches!(self, Self::ReadOnly | Self::ReadWrite)
    }

    /// Check whether this mode permits writes
    pub fn can_write(self) -> bool {
        matches!(self, Self::WriteOnly | Self::ReadWrite)
    }

    /// Check whether every access permitted by `other` is also permitted
    /// by this mode
    pub fn contains(self, other: Protection) -> bool {
        (!other.can_read() || self.can_read()) && (!other.can_write() || self.can_write())
    }

    /// Get a human-readable name for the protection mode
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ReadOnly => "read-only",
            Self::WriteOnly => "write-only",
            Self::ReadWrite => "read-write",
        }
    }

    /// Get the equivalent `PROT_*` bits for kernel protection masks
    pub fn prot_flags(self) -> libc::c_int {
        let mut flags = libc::PROT_NONE;
        if self.can_read() {
            flags |= libc::PROT_READ;
        }
        if self.can_write() {
            flags |= libc::PROT_WRITE;
        }
        flags
    }
}

impl fmt::Display for Protection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
