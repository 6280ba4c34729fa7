//! Double-mapped byte ring buffer
//!
//! 双重映射的字节环形缓冲区
//!
//! This module provides the ring itself:
//! - Lifecycle: create the double mapping, destroy it exactly once
//! - Occupancy queries over two monotonically increasing cursors
//! - Contiguous producer/consumer regions, even across the wrap point
//! - Commit operations that advance the cursors
//!
//! 本模块提供环形缓冲区本身：
//! - 生命周期：创建双重映射，并且只销毁一次
//! - 基于两个单调递增游标的占用查询
//! - 连续的生产者/消费者区域，即使跨越回绕点
//! - 推进游标的提交操作

use crate::error::{Result, RingError};
use crate::geometry::Geometry;
use crate::index::RingIndex;
use crate::mapping::DoubleMapping;
use std::fmt;
use std::io;
use std::slice;
use tracing::debug;

/// Single-threaded byte ring buffer over a double-mapped region
///
/// 基于双重映射区域的单线程字节环形缓冲区
///
/// # Type Parameters
/// - `I`: Cursor width, `u32` by default. `u16` limits the capacity to 32 KiB with 4 KiB pages.
///
/// # 类型参数
/// - `I`: 游标宽度，默认为 `u32`。使用 `u16` 时，在 4 KiB 页下容量上限为 32 KiB。
///
/// # Usage
///
/// Ask for the producer region, fill it through any I/O call, then commit the number of
/// bytes written. Drain the consumer region the same way.
///
/// 获取生产者区域，通过任意 I/O 调用填充，然后提交写入的字节数。消费者区域同理。
///
/// ```
/// use magicring::MagicRing;
///
/// let mut ring = MagicRing::<u32>::new(0).unwrap();
///
/// let region = ring.producer_region();
/// region[..5].copy_from_slice(b"hello");
/// ring.commit_produced(5);
///
/// assert_eq!(ring.consumer_region(), b"hello");
/// ring.commit_consumed(5);
/// assert!(ring.is_empty());
///
/// ring.destroy().unwrap();
/// ```
pub struct MagicRing<I: RingIndex = u32> {
    /// Capacity and mask, zeroed on destroy
    ///
    /// 容量与掩码，销毁时清零
    geometry: Geometry<I>,

    /// Total bytes consumed
    ///
    /// 已消费的总字节数
    start: I,

    /// Total bytes produced
    ///
    /// 已生产的总字节数
    end: I,

    /// `None` once destroyed
    ///
    /// 销毁后为 `None`
    mapping: Option<DoubleMapping>,
}

/// Ring with 16-bit cursors
///
/// 16 位游标的环形缓冲区
pub type MagicRing16 = MagicRing<u16>;

/// Ring with 32-bit cursors
///
/// 32 位游标的环形缓冲区
pub type MagicRing32 = MagicRing<u32>;

impl<I: RingIndex> MagicRing<I> {
    /// Create a ring of `2^extra_page_log2` pages
    ///
    /// 创建 `2^extra_page_log2` 个页大小的环形缓冲区
    ///
    /// # Errors
    ///
    /// - `RingError::Domain` if the capacity does not fit `I` with one bit of headroom.
    ///   No memory is allocated in that case.
    /// - `RingError::Os` if creating, sizing or mapping the shared memory fails.
    ///   Anything already mapped is released first.
    ///
    /// - 如果容量在保留一个高位后无法放入 `I`，返回 `RingError::Domain`，此时不分配内存。
    /// - 如果共享内存的创建、调整大小或映射失败，返回 `RingError::Os`，已映射的部分会先被释放。
    pub fn new(extra_page_log2: u8) -> Result<Self> {
        Self::with_geometry(Geometry::new(extra_page_log2)?)
    }

    /// Create a ring from a prepared geometry
    ///
    /// 使用已准备好的几何参数创建环形缓冲区
    ///
    /// # Errors
    ///
    /// `RingError::InvalidArgument` if the geometry is empty or its capacity is not a
    /// multiple of the system page size.
    ///
    /// 几何参数为空或容量不是系统页大小的倍数时，返回 `RingError::InvalidArgument`。
    pub fn with_geometry(geometry: Geometry<I>) -> Result<Self> {
        if geometry.is_empty() {
            return Err(RingError::InvalidArgument("geometry has zero capacity"));
        }
        if geometry.capacity_bytes() % rustix::param::page_size() != 0 {
            return Err(RingError::InvalidArgument(
                "capacity is not a multiple of the system page size",
            ));
        }

        let mapping = DoubleMapping::new(geometry.capacity_bytes())?;
        debug!(
            capacity = geometry.capacity_bytes(),
            index_bits = I::BITS,
            "created magic ring"
        );

        Ok(Self {
            geometry,
            start: I::ZERO,
            end: I::ZERO,
            mapping: Some(mapping),
        })
    }

    /// Release both mappings and zero the ring
    ///
    /// 释放两个映射并将环形缓冲区清零
    ///
    /// Dropping a live ring releases it as well. Calling `destroy` first only makes the
    /// release point explicit.
    ///
    /// drop 一个仍然有效的环形缓冲区同样会释放它，先调用 `destroy` 只是让释放点显式化。
    ///
    /// # Errors
    ///
    /// `RingError::NotInitialized` if the ring was already destroyed. Nothing happens then.
    ///
    /// 如果已销毁，返回 `RingError::NotInitialized`，且不执行任何操作。
    pub fn destroy(&mut self) -> Result<()> {
        if self.geometry.is_empty() {
            return Err(RingError::NotInitialized);
        }

        let capacity = self.geometry.capacity_bytes();
        // shadow, then primary
        drop(self.mapping.take());

        self.geometry = Geometry::EMPTY;
        self.start = I::ZERO;
        self.end = I::ZERO;

        debug!(capacity, "destroyed magic ring");
        Ok(())
    }

    /// Whether the ring still owns its mappings
    ///
    /// 环形缓冲区是否仍持有其映射
    #[inline]
    pub fn is_live(&self) -> bool {
        self.mapping.is_some()
    }

    #[inline]
    pub fn geometry(&self) -> &Geometry<I> {
        &self.geometry
    }

    /// Buffer size in bytes, 0 once destroyed
    ///
    /// 缓冲区字节数，销毁后为 0
    #[inline]
    pub fn capacity(&self) -> I {
        self.geometry.capacity()
    }

    /// Buffer size as `usize`
    ///
    /// 以 `usize` 表示的缓冲区字节数
    #[inline]
    pub fn capacity_bytes(&self) -> usize {
        self.geometry.capacity_bytes()
    }

    #[inline]
    pub fn mask(&self) -> I {
        self.geometry.mask()
    }

    /// Total bytes consumed so far (wrapping)
    ///
    /// 迄今为止已消费的总字节数（回绕）
    #[inline]
    pub fn start(&self) -> I {
        self.start
    }

    /// Total bytes produced so far (wrapping)
    ///
    /// 迄今为止已生产的总字节数（回绕）
    #[inline]
    pub fn end(&self) -> I {
        self.end
    }

    /// Bytes ready to be consumed
    ///
    /// 可供消费的字节数
    ///
    /// Wrapping subtraction recovers the distance no matter how often either cursor
    /// has wrapped, because the distance never exceeds the capacity.
    ///
    /// 无论游标回绕多少次，回绕减法都能恢复真实距离，因为该距离从不超过容量。
    #[inline]
    pub fn occupied(&self) -> I {
        self.sanity_check();
        self.end.wrapping_sub(self.start)
    }

    /// Bytes free to be produced into
    ///
    /// 可供生产写入的空闲字节数
    #[inline]
    pub fn available(&self) -> I {
        self.capacity().wrapping_sub(self.occupied())
    }

    /// Always `false` once destroyed
    ///
    /// 销毁后始终为 `false`
    #[inline]
    pub fn is_full(&self) -> bool {
        self.is_live() && self.occupied() == self.capacity()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sanity_check();
        self.start == self.end
    }

    /// Contiguous region to write new data into
    ///
    /// 用于写入新数据的连续区域
    ///
    /// Starts at offset `end & mask` and is exactly `available()` bytes long, even when it
    /// runs past the end of the primary mapping. Empty when the ring is full or destroyed.
    /// After an unchecked overcommit the length is clamped to stay inside the mapping.
    ///
    /// 起始于偏移 `end & mask`，长度恰好为 `available()`，即使越过主映射末尾也是如此。
    /// 缓冲区已满或已销毁时为空。未经检查的超额提交之后，长度会被截断以保持在映射之内。
    pub fn producer_region(&mut self) -> &mut [u8] {
        let capacity = self.capacity_bytes();
        let len = capacity.saturating_sub(self.occupied().to_usize());
        let offset = self.geometry.offset_of(self.end);

        match &self.mapping {
            Some(mapping) if len > 0 => {
                debug_assert!(offset + len <= mapping.len() * 2);
                // SAFETY: offset < capacity and len is clamped to capacity, so the slice lies
                // in the 2 * capacity bytes of primary + shadow. It is no longer than the
                // capacity, so no byte appears twice, and &mut self keeps it exclusive.
                unsafe { slice::from_raw_parts_mut(mapping.primary().as_ptr().add(offset), len) }
            }
            _ => &mut [],
        }
    }

    /// Contiguous region of data ready to be drained
    ///
    /// 可供读取的连续数据区域
    ///
    /// Starts at offset `start & mask` and is exactly `occupied()` bytes long, never more
    /// than the capacity. Empty when the ring is empty or destroyed.
    ///
    /// 起始于偏移 `start & mask`，长度恰好为 `occupied()`，且从不超过容量。
    /// 缓冲区为空或已销毁时为空。
    pub fn consumer_region(&self) -> &[u8] {
        let len = self.occupied().to_usize().min(self.capacity_bytes());
        let offset = self.geometry.offset_of(self.start);

        match &self.mapping {
            Some(mapping) if len > 0 => {
                debug_assert!(offset + len <= mapping.len() * 2);
                // SAFETY: as in producer_region; the shared borrow of self rules out any
                // concurrent producer_region slice.
                unsafe { slice::from_raw_parts(mapping.primary().as_ptr().add(offset), len) }
            }
            _ => &[],
        }
    }

    /// Declare `n` bytes written into the producer region
    ///
    /// 声明已向生产者区域写入 `n` 字节
    ///
    /// A negative `n` (the `-1` a failed `read(2)` returns) is handed back untouched and
    /// advances nothing. `n` is not checked against `available()`; use
    /// [`MagicRing::try_commit_produced`] for that.
    ///
    /// 负数 `n`（如失败的 `read(2)` 返回的 `-1`）原样返回且不推进游标。`n` 不会与
    /// `available()` 比较；如需检查请使用 [`MagicRing::try_commit_produced`]。
    #[inline]
    pub fn commit_produced(&mut self, n: isize) -> isize {
        if n < 0 {
            return n;
        }
        self.advance_end(n.unsigned_abs());
        n
    }

    /// Declare `n` bytes drained from the consumer region
    ///
    /// 声明已从消费者区域读取 `n` 字节
    ///
    /// Same conventions as [`MagicRing::commit_produced`].
    ///
    /// 约定与 [`MagicRing::commit_produced`] 相同。
    #[inline]
    pub fn commit_consumed(&mut self, n: isize) -> isize {
        if n < 0 {
            return n;
        }
        self.advance_start(n.unsigned_abs());
        n
    }

    /// [`MagicRing::commit_produced`] for `std::io` results
    ///
    /// 适用于 `std::io` 结果的 [`MagicRing::commit_produced`]
    ///
    /// ```
    /// use magicring::MagicRing;
    /// use std::io::Read;
    ///
    /// let mut ring = MagicRing::<u32>::new(0).unwrap();
    /// let mut source: &[u8] = b"payload";
    ///
    /// let result = source.read(ring.producer_region());
    /// let n = ring.commit_produced_io(result).unwrap();
    /// assert_eq!(n, 7);
    /// assert_eq!(ring.consumer_region(), b"payload");
    /// ```
    #[inline]
    pub fn commit_produced_io(&mut self, result: io::Result<usize>) -> io::Result<usize> {
        if let Ok(n) = result {
            self.advance_end(n);
        }
        result
    }

    /// [`MagicRing::commit_consumed`] for `std::io` results
    ///
    /// 适用于 `std::io` 结果的 [`MagicRing::commit_consumed`]
    #[inline]
    pub fn commit_consumed_io(&mut self, result: io::Result<usize>) -> io::Result<usize> {
        if let Ok(n) = result {
            self.advance_start(n);
        }
        result
    }

    /// Checked commit of `n` produced bytes
    ///
    /// 带检查地提交 `n` 个已生产字节
    ///
    /// # Errors
    ///
    /// - `RingError::NotInitialized` on a destroyed ring
    /// - `RingError::Overcommit` if `n > available()`; the cursors are left untouched
    ///
    /// - 环形缓冲区已销毁时返回 `RingError::NotInitialized`
    /// - `n > available()` 时返回 `RingError::Overcommit`，游标保持不变
    pub fn try_commit_produced(&mut self, n: usize) -> Result<()> {
        let limit = self.checked_limit(self.available())?;
        if n > limit {
            return Err(RingError::Overcommit {
                requested: n,
                limit,
            });
        }
        self.advance_end(n);
        Ok(())
    }

    /// Checked commit of `n` consumed bytes
    ///
    /// 带检查地提交 `n` 个已消费字节
    ///
    /// # Errors
    ///
    /// - `RingError::NotInitialized` on a destroyed ring
    /// - `RingError::Overcommit` if `n > occupied()`; the cursors are left untouched
    ///
    /// - 环形缓冲区已销毁时返回 `RingError::NotInitialized`
    /// - `n > occupied()` 时返回 `RingError::Overcommit`，游标保持不变
    pub fn try_commit_consumed(&mut self, n: usize) -> Result<()> {
        let limit = self.checked_limit(self.occupied())?;
        if n > limit {
            return Err(RingError::Overcommit {
                requested: n,
                limit,
            });
        }
        self.advance_start(n);
        Ok(())
    }

    /// Copy as much of `src` as fits and commit it
    ///
    /// 尽可能多地拷贝 `src` 并提交
    ///
    /// # Returns
    /// Number of bytes copied (0 to `src.len()`)
    ///
    /// # 返回值
    /// 拷贝的字节数（0 到 `src.len()`）
    pub fn push_slice(&mut self, src: &[u8]) -> usize {
        let region = self.producer_region();
        let n = region.len().min(src.len());
        region[..n].copy_from_slice(&src[..n]);
        self.advance_end(n);
        n
    }

    /// Copy as many buffered bytes as fit into `dst` and commit them
    ///
    /// 将尽可能多的已缓冲字节拷贝到 `dst` 并提交
    ///
    /// # Returns
    /// Number of bytes copied (0 to `dst.len()`)
    ///
    /// # 返回值
    /// 拷贝的字节数（0 到 `dst.len()`）
    pub fn pop_slice(&mut self, dst: &mut [u8]) -> usize {
        let region = self.consumer_region();
        let n = region.len().min(dst.len());
        dst[..n].copy_from_slice(&region[..n]);
        self.advance_start(n);
        n
    }

    /// Discard everything buffered
    ///
    /// 丢弃所有已缓冲数据
    #[inline]
    pub fn clear(&mut self) {
        self.start = self.end;
    }

    #[inline]
    fn advance_end(&mut self, n: usize) {
        debug_assert!(self.is_live(), "commit on a destroyed ring");
        debug_assert!(n <= self.geometry.capacity_bytes());
        self.end = self.end.wrapping_add(I::from_usize_truncating(n));
    }

    #[inline]
    fn advance_start(&mut self, n: usize) {
        debug_assert!(self.is_live(), "commit on a destroyed ring");
        debug_assert!(n <= self.geometry.capacity_bytes());
        self.start = self.start.wrapping_add(I::from_usize_truncating(n));
    }

    #[inline]
    fn checked_limit(&self, limit: I) -> Result<usize> {
        if self.is_live() {
            Ok(limit.to_usize())
        } else {
            Err(RingError::NotInitialized)
        }
    }

    /// Debug-only structural checks of a live ring
    #[inline]
    fn sanity_check(&self) {
        if cfg!(debug_assertions) && self.is_live() {
            let capacity = self.capacity();
            let mask = self.mask();
            debug_assert!(capacity != I::ZERO);
            debug_assert!(mask != I::ZERO);
            debug_assert!(capacity & mask == I::ZERO);
            debug_assert!(self.end.wrapping_sub(self.start) <= capacity);
        }
    }
}

/// Aliasing helpers: `peek` reads through the primary mapping, `poke` writes through
/// the shadow mapping.
///
/// 别名辅助方法：`peek` 通过主映射读取，`poke` 通过影子映射写入。
#[cfg(any(test, feature = "diagnostics"))]
impl<I: RingIndex> MagicRing<I> {
    /// Read the byte at `idx` through the primary mapping
    ///
    /// 通过主映射读取 `idx` 处的字节
    ///
    /// # Panics
    /// If `idx & mask != idx` or the ring is destroyed.
    ///
    /// # 恐慌
    /// 当 `idx & mask != idx` 或环形缓冲区已销毁时。
    pub fn peek(&self, idx: I) -> u8 {
        let Some(mapping) = &self.mapping else {
            panic!("peek on a destroyed ring");
        };
        assert!(idx & self.mask() == idx, "index {idx} outside the ring");
        // SAFETY: idx < capacity, inside the primary mapping.
        unsafe { mapping.primary().as_ptr().add(idx.to_usize()).read() }
    }

    /// Write `val` at `idx` through the shadow mapping
    ///
    /// 通过影子映射在 `idx` 处写入 `val`
    ///
    /// # Panics
    /// If `idx & mask != idx` or the ring is destroyed.
    ///
    /// # 恐慌
    /// 当 `idx & mask != idx` 或环形缓冲区已销毁时。
    pub fn poke(&mut self, idx: I, val: u8) {
        let Some(mapping) = &self.mapping else {
            panic!("poke on a destroyed ring");
        };
        assert!(idx & self.mask() == idx, "index {idx} outside the ring");
        // SAFETY: idx < capacity, inside the shadow mapping.
        unsafe { mapping.shadow().as_ptr().add(idx.to_usize()).write(val) }
    }
}

impl<I: RingIndex> fmt::Debug for MagicRing<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MagicRing")
            .field("capacity", &self.capacity())
            .field("start", &self.start)
            .field("end", &self.end)
            .field("live", &self.is_live())
            .finish()
    }
}

impl<I: RingIndex> io::Write for MagicRing<I> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.is_live() {
            return Err(RingError::NotInitialized.into());
        }
        Ok(self.push_slice(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<I: RingIndex> io::Read for MagicRing<I> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.is_live() {
            return Err(RingError::NotInitialized.into());
        }
        Ok(self.pop_slice(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_ring() {
        let ring = MagicRing::<u32>::new(0).unwrap();
        assert_eq!(ring.capacity_bytes(), rustix::param::page_size());
        assert_eq!(ring.occupied(), 0);
        assert_eq!(ring.available(), ring.capacity());
        assert!(ring.is_empty());
        assert!(!ring.is_full());
        assert!(ring.consumer_region().is_empty());
    }

    #[test]
    fn test_basic_produce_consume() {
        let mut ring = MagicRing::<u32>::new(0).unwrap();

        ring.producer_region()[..3].copy_from_slice(&[1, 2, 3]);
        assert_eq!(ring.commit_produced(3), 3);
        assert_eq!(ring.occupied(), 3);
        assert_eq!(ring.consumer_region(), &[1, 2, 3]);

        assert_eq!(ring.commit_consumed(2), 2);
        assert_eq!(ring.consumer_region(), &[3]);
    }

    #[test]
    fn test_sentinel_passthrough() {
        let mut ring = MagicRing::<u32>::new(0).unwrap();
        ring.commit_produced(10);

        assert_eq!(ring.commit_produced(-1), -1);
        assert_eq!(ring.occupied(), 10);
        assert_eq!(ring.commit_consumed(-1), -1);
        assert_eq!(ring.occupied(), 10);
    }

    #[test]
    fn test_double_destroy() {
        let mut ring = MagicRing::<u16>::new(0).unwrap();
        assert!(ring.destroy().is_ok());
        assert!(matches!(ring.destroy(), Err(RingError::NotInitialized)));
        assert_eq!(ring.capacity(), 0);
    }

    #[test]
    fn test_peek_poke_alias() {
        let mut ring = MagicRing::<u32>::new(0).unwrap();
        ring.poke(7, 0x5A);
        assert_eq!(ring.peek(7), 0x5A);
    }

    #[test]
    #[should_panic(expected = "outside the ring")]
    fn test_poke_out_of_range() {
        let mut ring = MagicRing::<u32>::new(0).unwrap();
        let capacity = ring.capacity();
        ring.poke(capacity, 1);
    }
}
