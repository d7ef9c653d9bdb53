//! # ashmem - anonymous shared memory region handles
//!
//! Managed handles over anonymous, kernel-backed shared memory regions:
//! creation, user-space mapping with access protection, bounds- and
//! permission-checked read/write, and deterministic teardown. Regions are
//! identified by kernel descriptors that can be transferred to other
//! processes over IPC for zero-copy sharing.
//!
//! ## Features
//!
//! - **Lifecycle state machine**: created → mapped ⇄ unmapped → closed, with
//!   idempotent close and close-on-drop
//! - **Checked access**: every read/write validates mapping state, active
//!   protection and overflow-safe bounds before touching memory
//! - **Protection narrowing**: the kernel-side mask can be reduced but never
//!   widened, constraining future mappings
//! - **Pluggable backends**: `/dev/ashmem`, `memfd_create`, a file-backed
//!   fallback, and an in-memory fake for tests
//!
//! ## Example
//!
//! ```no_run
//! use ashmem::Ashmem;
//!
//! # fn main() -> ashmem::Result<()> {
//! let mut region = Ashmem::create("buf", 4096)?;
//! region.map_read_write()?;
//! region.write(b"hello", 100)?;
//! assert_eq!(region.read(5, 100)?, b"hello");
//! region.unmap();
//! region.close();
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod error;
pub mod protection;
pub mod region;

pub use backend::{default_backend, Descriptor, FakeBackend, FileBackend, MappedView, ShmemBackend};
#[cfg(any(target_os = "linux", target_os = "android"))]
pub use backend::{AshmemDevBackend, MemfdBackend};
pub use error::{AshmemError, Result};
pub use protection::Protection;
pub use region::Ashmem;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
