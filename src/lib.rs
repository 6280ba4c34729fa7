//! # Double-Mapped Byte Ring Buffer
//!
//! 双重映射字节环形缓冲区
//!
//! `magicring` is a single-threaded byte ring buffer whose storage is mapped twice at
//! adjacent virtual addresses. Any window into the ring, including one that wraps past
//! the end of the allocation, is a single contiguous slice.
//!
//! `magicring` 是一个单线程字节环形缓冲区，其存储被映射到两个相邻的虚拟地址上。
//! 任何窗口，包括越过分配末尾而回绕的窗口，都是单个连续切片。
//!
//! ## Features
//!
//! 特性
//!
//! - **No wrap handling** - Producer and consumer regions are always one slice
//! - **No scatter/gather** - Hand the region straight to `read(2)` / `write(2)`
//! - **Generic cursor width** - `u16` or `u32` cursors from one implementation
//! - **Safe views** - Regions are bounds-checked slices, the raw mappings stay private
//!
//! - **无需处理回绕** - 生产者与消费者区域始终是单个切片
//! - **无需分散/聚集 I/O** - 直接将区域交给 `read(2)` / `write(2)`
//! - **泛型游标宽度** - 同一实现支持 `u16` 或 `u32` 游标
//! - **安全视图** - 区域是带边界检查的切片，原始映射保持私有
//!
//! ## Layout
//!
//! 布局
//!
//! ```text
//!   +---+---+---+---+---+---+---+---+
//!   | A | B | C | D | A | B | C | D |
//!   +---+---+---+---+---+---+---+---+
//!     ^               ^
//!     |               |
//!  primary          shadow
//! ```
//!
//! Reading 3 bytes starting at `C` simply continues into the shadow mapping.
//!
//! 从 `C` 开始读取 3 个字节会直接延续到影子映射中。
//!
//! ## Quick Start
//!
//! 快速开始
//!
//! ```rust
//! use magicring::MagicRing;
//!
//! // One page of buffer with 32-bit cursors
//! // 一个页大小的缓冲区，使用 32 位游标
//! let mut ring = MagicRing::<u32>::new(0).unwrap();
//!
//! // Producer side: fill the region, commit what was written
//! // 生产者端：填充区域，提交写入的字节数
//! let region = ring.producer_region();
//! region[..4].copy_from_slice(b"ping");
//! ring.commit_produced(4);
//!
//! // Consumer side: drain the region, commit what was read
//! // 消费者端：读取区域，提交读取的字节数
//! assert_eq!(ring.consumer_region(), b"ping");
//! ring.commit_consumed(4);
//!
//! assert!(ring.is_empty());
//! ```
//!
//! ## Wrapping Regions
//!
//! 回绕区域
//!
//! ```rust
//! use magicring::MagicRing;
//!
//! let mut ring = MagicRing::<u32>::new(0).unwrap();
//! let capacity = ring.capacity_bytes();
//!
//! // Move both cursors to 6 bytes before the end of the allocation
//! // 将两个游标移动到分配末尾前 6 个字节处
//! ring.commit_produced((capacity - 6) as isize);
//! ring.commit_consumed((capacity - 6) as isize);
//!
//! // 10 bytes crossing the boundary land in one slice
//! // 跨越边界的 10 个字节位于同一个切片中
//! ring.push_slice(b"0123456789");
//! assert_eq!(ring.consumer_region(), b"0123456789");
//! ```
//!
//! ## Event Loop Usage
//!
//! 事件循环用法
//!
//! The commit operations pass a failed I/O result through unchanged, so the region can be
//! handed to the I/O call and its result committed directly.
//!
//! 提交操作会原样传递失败的 I/O 结果，因此可以将区域直接交给 I/O 调用并提交其结果。
//!
//! ```rust
//! use magicring::MagicRing;
//! use std::io::{Read, Write};
//!
//! let mut ring = MagicRing::<u16>::new(0).unwrap();
//! let mut socket: &[u8] = b"request";
//! let mut sink = Vec::new();
//!
//! let result = socket.read(ring.producer_region());
//! ring.commit_produced_io(result).unwrap();
//!
//! let result = sink.write(ring.consumer_region());
//! ring.commit_consumed_io(result).unwrap();
//!
//! assert_eq!(sink, b"request");
//! ```
//!
//! ## Capacity
//!
//! 容量
//!
//! Capacity is `page_size × 2^extra_page_log2` and must fit the cursor type with its top
//! bit unused. With 4 KiB pages:
//!
//! 容量为 `page_size × 2^extra_page_log2`，并且必须在保留最高位的前提下放入游标类型。
//! 在 4 KiB 页下：
//!
//! | Cursor | `extra_page_log2` | Capacity |
//! |--------|-------------------|----------|
//! | `u16`  | 0..=3             | 4 KiB - 32 KiB |
//! | `u32`  | 0..=19            | 4 KiB - 2 GiB  |
//!
//! ## Notes
//!
//! 注意事项
//!
//! - Single-threaded only. The ring is `Send` but not `Sync`.
//! - Commits are not validated against the region in release builds; use
//!   `try_commit_produced` / `try_commit_consumed` for checked commits.
//! - Dropping the ring releases the mappings. `destroy` releases them early and reports
//!   a second call as `RingError::NotInitialized`.
//! - Requires `memfd_create` and `mmap` with `MAP_FIXED` (Linux, Android, FreeBSD).
//!
//! - 仅限单线程使用。环形缓冲区实现了 `Send` 但未实现 `Sync`。
//! - release 构建下提交不会与区域进行比较；如需检查请使用
//!   `try_commit_produced` / `try_commit_consumed`。
//! - drop 环形缓冲区会释放映射。`destroy` 可提前释放，重复调用时返回
//!   `RingError::NotInitialized`。
//! - 需要 `memfd_create` 以及支持 `MAP_FIXED` 的 `mmap`（Linux、Android、FreeBSD）。

pub mod error;
pub mod geometry;
pub mod index;
pub mod ring;
mod mapping;

pub use error::{Result, RingError};
pub use geometry::Geometry;
pub use index::RingIndex;
pub use ring::{MagicRing, MagicRing16, MagicRing32};
