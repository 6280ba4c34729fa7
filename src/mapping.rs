//! Double mapping of one shared memory object
//!
//! 同一共享内存对象的双重映射
//!
//! ```text
//!   +---+---+---+---+---+---+---+---+
//!   | A | B | C | D | A | B | C | D |
//!   +---+---+---+---+---+---+---+---+
//!     ^               ^
//!     |               |
//!  primary          shadow = primary + len
//! ```
//!
//! Both halves are backed by the same memfd, so any window of up to `len` bytes that
//! starts inside `primary` is contiguous in the address space.
//!
//! 两半由同一个 memfd 支撑，因此任何起始于 `primary`、长度不超过 `len` 的窗口在
//! 地址空间中都是连续的。

use crate::error::{Result, RingError};
use rustix::fs::{MemfdFlags, ftruncate, memfd_create};
use rustix::io::Errno;
use rustix::mm::{MapFlags, ProtFlags, mmap, mmap_anonymous, munmap};
use std::ffi::c_void;
use std::ptr::{self, NonNull};
use tracing::{debug, warn};

/// Owner of the primary and shadow mappings
///
/// 主映射与影子映射的所有者
///
/// Dropping it unmaps the shadow first, then the primary.
///
/// drop 时先解除影子映射，再解除主映射。
pub(crate) struct DoubleMapping {
    primary: NonNull<u8>,
    len: usize,
}

// SAFETY: DoubleMapping exclusively owns both mappings and hands out no references of
// its own. Moving it to another thread moves that ownership with it.
unsafe impl Send for DoubleMapping {}

/// Unmaps an address range when dropped unless disarmed
struct Reservation {
    base: *mut c_void,
    len: usize,
}

impl Reservation {
    fn disarm(self) {
        std::mem::forget(self);
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        // SAFETY: the range was returned by mmap and nothing else references it yet.
        if let Err(errno) = unsafe { munmap(self.base, self.len) } {
            warn!(len = self.len, %errno, "failed to release ring reservation");
        }
    }
}

impl DoubleMapping {
    /// Map `len` bytes of fresh shared memory twice, back to back
    ///
    /// 将 `len` 字节的新共享内存连续映射两次
    ///
    /// `len` must be a non-zero multiple of the page size. Nothing is left mapped when
    /// this returns an error.
    ///
    /// `len` 必须是页大小的非零倍数。返回错误时不会遗留任何映射。
    pub(crate) fn new(len: usize) -> Result<Self> {
        debug_assert!(len > 0 && len % rustix::param::page_size() == 0);

        let total = len
            .checked_mul(2)
            .ok_or(RingError::InvalidArgument("ring does not fit the address space twice"))?;

        let fd = memfd_create(c"magicring", MemfdFlags::CLOEXEC)?;
        ftruncate(&fd, len as u64)?;

        // Reserve both halves up front so the fixed mapping of the shadow can only
        // replace address space we already own.
        //
        // SAFETY: a fresh anonymous PROT_NONE mapping at an address chosen by the kernel
        // does not alias anything.
        let base = unsafe {
            mmap_anonymous(
                ptr::null_mut(),
                total,
                ProtFlags::empty(),
                MapFlags::PRIVATE,
            )?
        };
        let reservation = Reservation { base, len: total };

        // SAFETY: [base, base + len) lies inside our reservation and is not referenced
        // by any Rust object.
        let primary = unsafe {
            mmap(
                base,
                len,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED | MapFlags::FIXED,
                &fd,
                0,
            )?
        };

        // SAFETY: [base + len, base + 2 * len) lies inside our reservation and is not
        // referenced by any Rust object.
        let shadow = unsafe {
            mmap(
                base.cast::<u8>().add(len).cast::<c_void>(),
                len,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED | MapFlags::FIXED,
                &fd,
                0,
            )?
        };
        debug_assert_eq!(shadow.cast::<u8>(), primary.cast::<u8>().wrapping_add(len));

        let primary = NonNull::new(primary.cast::<u8>()).ok_or(Errno::FAULT)?;

        reservation.disarm();
        // the mappings keep the storage alive
        drop(fd);

        debug!(
            primary = ?primary,
            shadow = ?shadow,
            len,
            "mapped ring"
        );

        Ok(Self { primary, len })
    }

    /// Base of the primary mapping
    ///
    /// 主映射的基地址
    #[inline]
    pub(crate) fn primary(&self) -> NonNull<u8> {
        self.primary
    }

    /// Base of the shadow mapping, `primary + len`
    ///
    /// 影子映射的基地址，即 `primary + len`
    #[inline]
    pub(crate) fn shadow(&self) -> NonNull<u8> {
        // SAFETY: primary + len is the start of the shadow half of our 2 * len mapping.
        unsafe { self.primary.add(self.len) }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

impl Drop for DoubleMapping {
    fn drop(&mut self) {
        // Release failures are not actionable here; log and keep going.
        //
        // SAFETY: both ranges were mapped in `new` and are owned by self. Every slice
        // borrowed from the ring ends before the ring can be destroyed or dropped.
        unsafe {
            if let Err(errno) = munmap(self.shadow().as_ptr().cast(), self.len) {
                warn!(len = self.len, %errno, "failed to unmap ring shadow");
            }
            if let Err(errno) = munmap(self.primary.as_ptr().cast(), self.len) {
                warn!(len = self.len, %errno, "failed to unmap ring primary");
            }
        }

        debug!(primary = ?self.primary, len = self.len, "unmapped ring");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> usize {
        rustix::param::page_size()
    }

    #[test]
    fn test_shadow_follows_primary() {
        let mapping = DoubleMapping::new(page()).unwrap();
        assert_eq!(mapping.len(), page());
        assert_eq!(
            mapping.shadow().as_ptr() as usize,
            mapping.primary().as_ptr() as usize + page()
        );
        assert_eq!(mapping.primary().as_ptr() as usize % page(), 0);
    }

    #[test]
    fn test_writes_alias() {
        let len = page() * 2;
        let mapping = DoubleMapping::new(len).unwrap();

        unsafe {
            mapping.primary().as_ptr().add(3).write(0xAB);
            assert_eq!(mapping.shadow().as_ptr().add(3).read(), 0xAB);

            mapping.shadow().as_ptr().add(len - 1).write(0xCD);
            assert_eq!(mapping.primary().as_ptr().add(len - 1).read(), 0xCD);
        }
    }

    #[test]
    fn test_fresh_memory_is_zeroed() {
        let mapping = DoubleMapping::new(page()).unwrap();
        let bytes = unsafe { std::slice::from_raw_parts(mapping.primary().as_ptr(), page() * 2) };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_many_create_drop_cycles() {
        for _ in 0..64 {
            let mapping = DoubleMapping::new(page() * 4).unwrap();
            drop(mapping);
        }
    }
}
