#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! A fixed-capacity pool of fixed-size memory blocks with O(1) acquire and release.
//!
//! This crate provides [`BlockPool`], which carves an inline byte array into `BLOCK_COUNT`
//! blocks of `BLOCK_SIZE` bytes and hands them out as raw pointers. It is meant for
//! environments where a general-purpose allocator is unavailable or undesirable, such as
//! embedded and real-time code, where the pool typically lives in a `static`.
//!
//! # Key features
//!
//! - **No fragmentation, no heap**: all blocks have the same size and live inside the pool.
//! - **O(1) operations**: acquire and release never search; (re)initialization is
//!   O(`BLOCK_COUNT`).
//! - **Out-of-band bookkeeping**: free blocks are chained through a separate table of 16-bit
//!   links, so blocks can be as small as one byte.
//! - **Misuse detection**: releasing a block twice, or an address that is not the start of one
//!   of the pool's blocks, is rejected without damaging the pool.
//! - **Pluggable exclusion**: a [`CriticalSection`] decides how the pool is protected when
//!   shared, from no protection at all ([`NoCriticalSection`]) to a mutex
//!   ([`MutexCriticalSection`]) or host-provided hooks ([`HookCriticalSection`]).
//! - **Pluggable diagnostics**: a [`PoolObserver`] is notified of every event.
//!   [`Diagnostics`] counts them and can call [`ErrorHooks`] on failures.
//!
//! # Example
//!
//! ```rust
//! use block_pool::{BlockPool, Diagnostics, Error, MutexCriticalSection};
//!
//! static POOL: BlockPool<4, 8, MutexCriticalSection, Diagnostics> =
//!     BlockPool::with_parts(false, MutexCriticalSection::new(), Diagnostics::new());
//!
//! POOL.initialize();
//!
//! let blocks = [
//!     POOL.acquire().unwrap(),
//!     POOL.acquire().unwrap(),
//!     POOL.acquire().unwrap(),
//!     POOL.acquire().unwrap(),
//! ];
//!
//! // All four blocks are handed out.
//! assert_eq!(POOL.acquire(), Err(Error::PoolExhausted));
//!
//! // SAFETY: Each block is 8 bytes and exclusively ours until released.
//! unsafe {
//!     blocks[1].cast::<u64>().write_unaligned(42);
//! }
//!
//! POOL.release(blocks[1].as_ptr()).unwrap();
//! assert!(matches!(
//!     POOL.release(blocks[1].as_ptr()),
//!     Err(Error::DoubleRelease { .. })
//! ));
//!
//! let snapshot = POOL.diagnostics();
//! assert_eq!(snapshot.acquisitions, 4);
//! assert_eq!(snapshot.double_release_failures, 1);
//! ```
//!
//! # Logging
//!
//! The pool emits `tracing` events: `debug` for (re)initialization and exhaustion, `warn` for
//! rejected releases and `trace` for every successful acquire and release. No subscriber is
//! installed by this crate.

mod builder;
mod critical_section;
mod diagnostics;
mod error;
mod free_list;
mod observer;
mod pool;

pub use builder::*;
pub use critical_section::*;
pub use diagnostics::*;
pub use error::Error;
pub(crate) use error::Result;
pub use free_list::MAX_BLOCK_COUNT;
pub(crate) use free_list::FreeList;
pub use observer::*;
pub use pool::*;
