use std::fs::File;
use std::io;
use std::os::fd::AsRawFd;
use std::ptr::NonNull;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::backend::FramebufferMemory;

/// Shared `mmap` of the framebuffer memory, unmapped on drop.
pub(crate) struct FbMapping {
    ptr: NonNull<u8>,
    len: usize,
}

// The mapping is plain device memory; writers are serialized by handing
// out a single `FbMemoryView`.
unsafe impl Send for FbMapping {}
unsafe impl Sync for FbMapping {}

impl FbMapping {
    pub(crate) fn map(file: &File, len: usize) -> Result<Self> {
        if len == 0 {
            anyhow::bail!("framebuffer reports zero bytes of memory");
        }
        let addr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error())
                .with_context(|| format!("mmap of {len} framebuffer bytes failed"));
        }
        let ptr = NonNull::new(addr.cast::<u8>()).context("mmap returned a null mapping")?;
        Ok(Self { ptr, len })
    }

    pub(crate) fn base(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

impl Drop for FbMapping {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr.as_ptr().cast(), self.len);
        }
    }
}

/// The one writable view of an [`FbMapping`].
pub(crate) struct FbMemoryView {
    mapping: Arc<FbMapping>,
}

impl FbMemoryView {
    pub(crate) fn new(mapping: Arc<FbMapping>) -> Self {
        Self { mapping }
    }
}

impl FramebufferMemory for FbMemoryView {
    fn as_mut_bytes(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.mapping.ptr.as_ptr(), self.mapping.len) }
    }
}
