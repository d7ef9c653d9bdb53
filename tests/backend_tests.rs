//! Smoke tests against the real platform backends
//!
//! These need a working kernel shared memory primitive, so they stick to
//! small regions and verify the behaviors the fake cannot model: descriptor
//! transfer, content persistence across remaps, and kernel-enforced seals.

use std::sync::Arc;

use ashmem::{Ashmem, Protection, ShmemBackend};

#[test]
fn test_default_backend_round_trip() {
    let mut region = Ashmem::create("backend_smoke", 4096).unwrap();
    assert_eq!(region.size(), 4096);
    assert!(region.raw_fd().is_some());

    region.map_read_write().unwrap();
    let payload = b"kernel backed bytes";
    region.write(payload, 512).unwrap();
    assert_eq!(region.read(payload.len(), 512).unwrap(), payload);

    // Contents survive an unmap/remap cycle on a real region.
    region.unmap();
    region.map_read_only().unwrap();
    assert_eq!(region.read(payload.len(), 512).unwrap(), payload);

    region.close();
    assert!(region.is_closed());
}

#[test]
fn test_file_backend_round_trip() {
    let dir = tempfile::TempDir::new().unwrap();
    let backend: Arc<dyn ShmemBackend> = Arc::new(ashmem::FileBackend::with_dir(dir.path()));

    let mut region = Ashmem::create_with_backend(backend, "file_smoke", 8192).unwrap();
    assert!(region.raw_fd().is_some());

    region.map_read_write().unwrap();
    region.write(b"unlinked", 0).unwrap();
    region.unmap();
    region.map_read_write().unwrap();
    assert_eq!(region.read(8, 0).unwrap(), b"unlinked");

    // The backing file was unlinked at creation.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_file_backend_sanitizes_names() {
    let dir = tempfile::TempDir::new().unwrap();
    let backend: Arc<dyn ShmemBackend> = Arc::new(ashmem::FileBackend::with_dir(dir.path()));
    let region = Ashmem::create_with_backend(backend, "nested/region/name", 64).unwrap();
    assert_eq!(region.size(), 64);
}

#[cfg(any(target_os = "linux", target_os = "android"))]
mod linux {
    use super::*;
    use ashmem::{Descriptor, MemfdBackend};

    #[test]
    fn test_memfd_backend_reports_size() {
        let backend: Arc<dyn ShmemBackend> = Arc::new(MemfdBackend::new());
        let descriptor = backend.create("memfd_size", 16384).unwrap();
        assert_eq!(backend.region_size(&descriptor).unwrap(), 16384);
    }

    #[test]
    fn test_memfd_descriptor_adoption() {
        let backend: Arc<dyn ShmemBackend> = Arc::new(MemfdBackend::new());
        let descriptor = backend.create("memfd_adopt", 4096).unwrap();

        // Write through one handle, read through a second one adopting the
        // same descriptor the way an IPC receiver would.
        let mut writer =
            Ashmem::from_descriptor(Arc::clone(&backend), descriptor, 4096).unwrap();
        writer.map_read_write().unwrap();
        writer.write(b"shared", 128).unwrap();

        let raw = writer.raw_fd().unwrap();
        // SAFETY: dup returns an independently owned duplicate of a valid fd.
        let duplicate = unsafe {
            use std::os::fd::{FromRawFd, OwnedFd};
            let fd = libc::dup(raw);
            assert!(fd >= 0);
            OwnedFd::from_raw_fd(fd)
        };

        let mut reader =
            Ashmem::from_descriptor(backend, Descriptor::Fd(duplicate), 4096).unwrap();
        reader.map_read_only().unwrap();
        assert_eq!(reader.read(6, 128).unwrap(), b"shared");
    }

    #[test]
    fn test_memfd_seal_blocks_new_writable_mappings() {
        let backend: Arc<dyn ShmemBackend> = Arc::new(MemfdBackend::new());
        let mut region =
            Ashmem::create_with_backend(backend, "memfd_seal", 4096).unwrap();

        region.set_protection(Protection::ReadOnly).unwrap();
        assert!(region.map_read_write().is_err());
        region.map_read_only().unwrap();
        assert_eq!(region.read(16, 0).unwrap(), &[0u8; 16]);
    }
}
