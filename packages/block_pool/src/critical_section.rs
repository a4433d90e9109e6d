use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;

use parking_lot::RawMutex;
use parking_lot::lock_api::RawMutex as _;

/// Entry and exit points of the region in which a pool mutates its bookkeeping.
///
/// A [`BlockPool`][crate::BlockPool] calls [`enter()`][Self::enter] at the start of every
/// operation that reads or writes its free list and [`exit()`][Self::exit] on every path out of
/// that operation, including error paths. What "entering" means is up to the implementation:
/// disabling interrupts, taking a lock or nothing at all.
///
/// Implementing this trait alone does not let the pool be shared between threads. For that, the
/// implementation must also promise actual mutual exclusion via [`ExclusiveCriticalSection`].
pub trait CriticalSection {
    /// Enters the critical section.
    fn enter(&self);

    /// Leaves the critical section.
    ///
    /// # Safety
    ///
    /// The caller must have previously entered the critical section via [`enter()`][Self::enter]
    /// on the same thread and must not have left it yet.
    unsafe fn exit(&self);
}

/// Marks a [`CriticalSection`] that provides mutual exclusion between threads.
///
/// A pool whose critical section implements this trait (and is itself `Sync`) is `Sync`.
///
/// # Safety
///
/// Between `enter()` returning on one thread and the matching `exit()`, no other thread may
/// return from `enter()` on the same instance.
pub unsafe trait ExclusiveCriticalSection: CriticalSection {}

/// A critical section that does nothing.
///
/// This is the default for pools that are only ever used from a single thread. A pool using it
/// is not `Sync`, so the compiler rejects any attempt to share it.
///
/// # Examples
///
/// ```
/// use block_pool::{BlockPool, NoCriticalSection};
///
/// let pool = BlockPool::<4, 16, NoCriticalSection>::new();
/// pool.initialize();
/// ```
#[derive(Debug, Default)]
pub struct NoCriticalSection {
    _not_sync: PhantomData<Cell<()>>,
}

impl NoCriticalSection {
    /// Creates a new no-op critical section.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _not_sync: PhantomData,
        }
    }
}

impl CriticalSection for NoCriticalSection {
    #[inline]
    fn enter(&self) {}

    #[inline]
    unsafe fn exit(&self) {}
}

/// A critical section backed by a `parking_lot` raw mutex.
///
/// Suitable for sharing a pool between threads on a hosted target. The mutex is not reentrant,
/// so a pool operation must not be started from inside a pool observer callback.
///
/// # Examples
///
/// ```
/// use block_pool::{BlockPool, MutexCriticalSection, NoopObserver};
///
/// static POOL: BlockPool<8, 32, MutexCriticalSection, NoopObserver> =
///     BlockPool::with_parts(true, MutexCriticalSection::new(), NoopObserver);
///
/// let block = POOL.acquire().unwrap();
/// POOL.release(block.as_ptr()).unwrap();
/// ```
pub struct MutexCriticalSection {
    raw: RawMutex,
}

impl MutexCriticalSection {
    /// Creates a new unlocked critical section.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            raw: RawMutex::INIT,
        }
    }
}

impl Default for MutexCriticalSection {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MutexCriticalSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutexCriticalSection")
            .field("locked", &self.raw.is_locked())
            .finish()
    }
}

impl CriticalSection for MutexCriticalSection {
    #[inline]
    fn enter(&self) {
        self.raw.lock();
    }

    #[inline]
    unsafe fn exit(&self) {
        // SAFETY: Forwarding the caller's guarantee that we entered on this thread, which
        // means the mutex is held by this thread.
        unsafe {
            self.raw.unlock();
        }
    }
}

// SAFETY: The mutex admits a single holder at a time.
unsafe impl ExclusiveCriticalSection for MutexCriticalSection {}

/// A critical section that calls a pair of user-supplied hooks.
///
/// This is how a pool is hooked into a host environment, e.g. an RTOS whose "enter critical"
/// and "exit critical" primitives mask interrupts.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// use block_pool::{BlockPool, HookCriticalSection, NoopObserver};
///
/// static ENTERED: AtomicUsize = AtomicUsize::new(0);
///
/// fn enter() {
///     ENTERED.fetch_add(1, Ordering::Relaxed);
/// }
///
/// fn exit() {}
///
/// // SAFETY: This pool is only used from the current thread, so the hooks do not need to
/// // actually exclude anyone.
/// let hooks = unsafe { HookCriticalSection::new(enter, exit) };
/// let pool = BlockPool::<4, 8, _, _>::with_parts(true, hooks, NoopObserver);
///
/// _ = pool.acquire().unwrap();
/// assert_eq!(ENTERED.load(Ordering::Relaxed), 1);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct HookCriticalSection {
    enter: fn(),
    exit: fn(),
}

impl HookCriticalSection {
    /// Creates a critical section from an entry hook and an exit hook.
    ///
    /// # Safety
    ///
    /// Between a call to `enter` returning on one thread and the following call to `exit` on
    /// that thread, a call to `enter` on any other thread must not return. In other words, the
    /// hooks must implement mutual exclusion, because a pool using them can be shared between
    /// threads.
    #[must_use]
    pub const unsafe fn new(enter: fn(), exit: fn()) -> Self {
        Self { enter, exit }
    }
}

impl CriticalSection for HookCriticalSection {
    #[inline]
    fn enter(&self) {
        (self.enter)();
    }

    #[inline]
    unsafe fn exit(&self) {
        (self.exit)();
    }
}

// SAFETY: Guaranteed by the contract of `HookCriticalSection::new()`.
unsafe impl ExclusiveCriticalSection for HookCriticalSection {}
