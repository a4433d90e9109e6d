use std::any::type_name;
use std::borrow::Borrow;
use std::cell::UnsafeCell;
use std::fmt;
use std::ptr::NonNull;

use num_integer::Integer;
use scopeguard::ScopeGuard;
use tracing::{debug, trace, warn};

use crate::{
    BlockPoolBuilder, CriticalSection, Diagnostics, DiagnosticsSnapshot, Error,
    ExclusiveCriticalSection, FreeList, NoCriticalSection, NoopObserver, PoolObserver, Result,
};

/// A fixed-capacity pool of `BLOCK_COUNT` blocks of `BLOCK_SIZE` bytes each.
///
/// The pool owns its storage inline (no heap allocation) and hands out raw pointers to the
/// start of its blocks. Acquiring and releasing a block are O(1); (re)initializing is
/// O(`BLOCK_COUNT`). Bookkeeping is kept in a separate table of 16-bit links rather than inside
/// the free blocks, so blocks may be as small as a single byte.
///
/// All operations take `&self`. Mutations of the bookkeeping happen inside the critical section
/// `C`, which decides whether the pool can be shared between threads (see
/// [`ExclusiveCriticalSection`]). Every operation is reported to the observer `O`.
///
/// # Lifecycle
///
/// A new pool is uninitialized and hands out nothing until [`initialize()`][Self::initialize]
/// is called, unless it was configured to initialize itself on the first acquisition. A pool
/// can be returned to its pristine all-free state at any time via
/// [`reset_all()`][Self::reset_all].
///
/// # Block validity
///
/// A pointer returned by [`acquire()`][Self::acquire] is valid for reads and writes of
/// `BLOCK_SIZE` bytes for as long as all of the following hold:
///
/// * the block has not been released,
/// * the pool has not been reset,
/// * the pool has not been moved or dropped.
///
/// The pool never reads or writes block contents itself and does not zero blocks when handing
/// them out, so a block contains whatever was last written to it. Writing past the end of a
/// block is not detected. Pools meant to hand out blocks for a long time are typically placed
/// in a `static`, which the `const` constructors allow.
///
/// # Examples
///
/// ```
/// use block_pool::BlockPool;
///
/// let pool = BlockPool::<4, 8>::new();
/// pool.initialize();
///
/// let block = pool.acquire().unwrap();
///
/// // SAFETY: The block is 8 bytes and we have not released it.
/// unsafe {
///     block.cast::<u64>().write_unaligned(0xdead_beef);
/// }
///
/// pool.release(block.as_ptr()).unwrap();
///
/// // Releasing the same block again is detected.
/// assert!(pool.release(block.as_ptr()).is_err());
/// ```
pub struct BlockPool<
    const BLOCK_COUNT: usize,
    const BLOCK_SIZE: usize,
    C = NoCriticalSection,
    O = NoopObserver,
> {
    blocks: UnsafeCell<[[u8; BLOCK_SIZE]; BLOCK_COUNT]>,

    /// Only ever accessed via `with_free_list()`, inside the critical section.
    free_list: UnsafeCell<FreeList<BLOCK_COUNT>>,

    auto_initialize: bool,

    critical_section: C,
    observer: O,
}

impl<const BLOCK_COUNT: usize, const BLOCK_SIZE: usize> BlockPool<BLOCK_COUNT, BLOCK_SIZE> {
    /// Creates an uninitialized single-threaded pool without diagnostics.
    ///
    /// Call [`initialize()`][Self::initialize] before acquiring blocks, or use
    /// [`builder()`][Self::builder] to customize the pool.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_parts(false, NoCriticalSection::new(), NoopObserver)
    }

    /// Starts building a pool with a custom configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use block_pool::{BlockPool, Diagnostics, MutexCriticalSection};
    ///
    /// let pool = BlockPool::<16, 64>::builder()
    ///     .auto_initialize(true)
    ///     .critical_section(MutexCriticalSection::new())
    ///     .observer(Diagnostics::new())
    ///     .build();
    ///
    /// let block = pool.acquire().unwrap();
    /// assert_eq!(pool.diagnostics().acquisitions, 1);
    /// # pool.release(block.as_ptr()).unwrap();
    /// ```
    pub fn builder() -> BlockPoolBuilder<BLOCK_COUNT, BLOCK_SIZE> {
        BlockPoolBuilder::new()
    }
}

impl<const BLOCK_COUNT: usize, const BLOCK_SIZE: usize> Default
    for BlockPool<BLOCK_COUNT, BLOCK_SIZE>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<const BLOCK_COUNT: usize, const BLOCK_SIZE: usize, C, O> BlockPool<BLOCK_COUNT, BLOCK_SIZE, C, O>
where
    C: CriticalSection,
    O: PoolObserver,
{
    const POOL_SIZE: usize = {
        assert!(BLOCK_SIZE > 0, "a block pool must have a non-zero block size");

        match BLOCK_COUNT.checked_mul(BLOCK_SIZE) {
            Some(size) => size,
            None => panic!("block pool size overflows usize"),
        }
    };

    /// Creates an uninitialized pool from its parts.
    ///
    /// If `auto_initialize` is true, the first [`acquire()`][Self::acquire] initializes the pool
    /// if that has not happened yet, at O(`BLOCK_COUNT`) cost.
    ///
    /// Pool dimensions are checked at compile time: `BLOCK_COUNT` must be in
    /// `1..=`[`MAX_BLOCK_COUNT`][crate::MAX_BLOCK_COUNT] and `BLOCK_SIZE` must be non-zero.
    #[must_use]
    pub const fn with_parts(auto_initialize: bool, critical_section: C, observer: O) -> Self {
        const {
            assert!(Self::POOL_SIZE > 0);
        }

        Self {
            blocks: UnsafeCell::new([[0; BLOCK_SIZE]; BLOCK_COUNT]),
            free_list: UnsafeCell::new(FreeList::new()),
            auto_initialize,
            critical_section,
            observer,
        }
    }

    /// Number of blocks in the pool.
    #[must_use]
    #[inline]
    pub const fn block_count(&self) -> usize {
        BLOCK_COUNT
    }

    /// Size of each block in bytes.
    #[must_use]
    #[inline]
    pub const fn block_size(&self) -> usize {
        BLOCK_SIZE
    }

    /// Whether the pool initializes itself on the first acquisition.
    #[must_use]
    pub const fn auto_initialize(&self) -> bool {
        self.auto_initialize
    }

    /// The observer that receives pool events.
    #[must_use]
    pub const fn observer(&self) -> &O {
        &self.observer
    }

    /// Builds the free list with all blocks free.
    ///
    /// Calling this on an already initialized pool does nothing; use
    /// [`reset_all()`][Self::reset_all] to reclaim all blocks.
    pub fn initialize(&self) {
        let _exclusion = self.enter();

        if self.with_free_list(initialize_if_needed) {
            debug!(pool = type_name::<Self>(), "block pool initialized");
            self.observer.initialized(BLOCK_COUNT);
        }
    }

    /// Whether [`initialize()`][Self::initialize] has run (explicitly or automatically).
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        let _exclusion = self.enter();
        self.with_free_list(|list| list.is_initialized())
    }

    /// Number of blocks that can currently be acquired.
    #[must_use]
    pub fn available(&self) -> usize {
        let _exclusion = self.enter();
        self.with_free_list(|list| list.available())
    }

    /// Whether the next [`acquire()`][Self::acquire] would fail, not counting a pending
    /// automatic initialization.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        let _exclusion = self.enter();
        self.with_free_list(|list| list.is_exhausted())
    }

    /// Hands out a free block.
    ///
    /// The returned pointer addresses the first of `BLOCK_SIZE` bytes that belong exclusively
    /// to the caller until the block is released (see the type-level documentation for the
    /// exact validity rules). The block is not cleared.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolExhausted`] if no block is free. This is also the case for a pool
    /// that was never initialized and does not initialize itself automatically.
    pub fn acquire(&self) -> Result<NonNull<u8>> {
        let _exclusion = self.enter();

        let auto_initialize = self.auto_initialize;
        let (initialized_now, slot) = self.with_free_list(|list| {
            let initialized_now = auto_initialize && initialize_if_needed(list);
            (initialized_now, list.take())
        });

        if initialized_now {
            debug!(pool = type_name::<Self>(), "block pool initialized on first use");
            self.observer.initialized(BLOCK_COUNT);
        }

        let Some(slot) = slot else {
            debug!(pool = type_name::<Self>(), "block pool exhausted");
            self.observer.exhausted();
            return Err(Error::PoolExhausted);
        };

        trace!(slot, "acquired block");
        self.observer.acquired(slot);

        Ok(self.block_ptr(slot))
    }

    /// Returns a block to the pool.
    ///
    /// `block` must be a pointer previously returned by [`acquire()`][Self::acquire] on this
    /// pool. Anything else is detected and rejected without touching the pool's state. After a
    /// successful release the caller must no longer access the block.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidAddress`] if `block` does not point to the start of one of this pool's
    ///   blocks.
    /// * [`Error::DoubleRelease`] if the block is not currently handed out.
    pub fn release(&self, block: *const u8) -> Result<()> {
        let _exclusion = self.enter();

        let Some(slot) = self.slot_of(block) else {
            let address = block.addr();
            warn!(address, pool = type_name::<Self>(), "released address not owned by pool");
            self.observer.invalid_address(address);
            return Err(Error::InvalidAddress { address });
        };

        if let Err(e) = self.with_free_list(|list| list.put(slot)) {
            warn!(slot, pool = type_name::<Self>(), "released block that is not allocated");
            self.observer.double_release(slot);
            return Err(e);
        }

        trace!(slot, "released block");
        self.observer.released(slot);

        Ok(())
    }

    /// Reclaims all blocks and rebuilds the free list, as if the pool were freshly initialized.
    ///
    /// Every pointer handed out before the reset becomes invalid. Block contents are not
    /// cleared. Also initializes a pool that was never initialized.
    pub fn reset_all(&self) {
        let _exclusion = self.enter();

        self.with_free_list(FreeList::reset);

        debug!(pool = type_name::<Self>(), "block pool reset");
        self.observer.initialized(BLOCK_COUNT);
    }

    /// Whether `ptr` points to the start of one of this pool's blocks.
    ///
    /// This says nothing about whether the block is currently handed out.
    #[must_use]
    pub fn contains(&self, ptr: *const u8) -> bool {
        self.slot_of(ptr).is_some()
    }

    /// Index of the block that starts at `ptr`, if any.
    ///
    /// Addresses inside a block but not at its start do not map to a slot.
    #[must_use]
    pub fn slot_of(&self, ptr: *const u8) -> Option<usize> {
        let offset = ptr.addr().checked_sub(self.base_ptr().as_ptr().addr())?;

        if offset >= Self::POOL_SIZE {
            return None;
        }

        let (slot, offset_in_block) = offset.div_rem(&BLOCK_SIZE);

        (offset_in_block == 0).then_some(slot)
    }

    fn base_ptr(&self) -> NonNull<[u8; BLOCK_SIZE]> {
        // SAFETY: UnsafeCell::get() never returns null for a reference-derived cell.
        unsafe { NonNull::new_unchecked(self.blocks.get()) }.cast()
    }

    fn block_ptr(&self, slot: usize) -> NonNull<u8> {
        assert!(
            slot < BLOCK_COUNT,
            "slot {slot} out of bounds in {}",
            type_name::<Self>()
        );

        // SAFETY: Guarded by the bounds check above, so the result stays inside `blocks`.
        unsafe { self.base_ptr().add(slot) }.cast()
    }

    /// Enters the critical section. Leaving happens when the returned guard is dropped, so
    /// every return path (including unwinding) leaves the section.
    #[must_use]
    fn enter(&self) -> ScopeGuard<&C, fn(&C)> {
        self.critical_section.enter();

        let exit: fn(&C) = |critical_section| {
            // SAFETY: We entered on this thread right before creating the guard and the guard
            // is the only thing that leaves the section.
            unsafe {
                critical_section.exit();
            }
        };

        scopeguard::guard(&self.critical_section, exit)
    }

    /// Runs `f` with exclusive access to the free list.
    ///
    /// Must only be called while inside the critical section. `f` must not call back into the
    /// pool, which is why observers are notified only after this returns.
    fn with_free_list<R>(&self, f: impl FnOnce(&mut FreeList<BLOCK_COUNT>) -> R) -> R {
        // SAFETY: The free list is only ever accessed through this function, which is only
        // called inside the critical section. Either the critical section excludes other
        // threads or the pool is not `Sync` and thus only usable from one thread. The
        // reference does not outlive `f`, which does not reenter the pool, so it is unique.
        let free_list = unsafe { &mut *self.free_list.get() };

        f(free_list)
    }

    #[cfg(test)]
    fn integrity_check(&self) {
        let _exclusion = self.enter();
        self.with_free_list(|list| list.integrity_check());
    }
}

impl<const BLOCK_COUNT: usize, const BLOCK_SIZE: usize, C, O>
    BlockPool<BLOCK_COUNT, BLOCK_SIZE, C, O>
where
    C: CriticalSection,
    O: PoolObserver + Borrow<Diagnostics>,
{
    /// Current diagnostic counters of the pool.
    ///
    /// Available whether the pool owns its [`Diagnostics`] or borrows one. A borrowed
    /// [`Diagnostics`] shared by several pools reports their combined events.
    #[must_use]
    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.observer.borrow().snapshot()
    }
}

/// Returns whether the list was initialized by this call.
fn initialize_if_needed<const BLOCK_COUNT: usize>(list: &mut FreeList<BLOCK_COUNT>) -> bool {
    if list.is_initialized() {
        return false;
    }

    list.initialize();
    true
}

impl<const BLOCK_COUNT: usize, const BLOCK_SIZE: usize, C, O> fmt::Debug
    for BlockPool<BLOCK_COUNT, BLOCK_SIZE, C, O>
where
    C: fmt::Debug,
    O: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // We do not look at the free list here because that would require entering the
        // critical section, which may not be possible from wherever Debug is invoked.
        f.debug_struct(type_name::<Self>())
            .field("block_count", &BLOCK_COUNT)
            .field("block_size", &BLOCK_SIZE)
            .field("auto_initialize", &self.auto_initialize)
            .field("critical_section", &self.critical_section)
            .field("observer", &self.observer)
            .finish_non_exhaustive()
    }
}

// SAFETY: All access to the free list happens inside a critical section that excludes other
// threads. The pool itself never touches block contents, so sharing it only shares the
// bookkeeping. The observer is called concurrently from any thread, hence `O: Sync`.
unsafe impl<const BLOCK_COUNT: usize, const BLOCK_SIZE: usize, C, O> Sync
    for BlockPool<BLOCK_COUNT, BLOCK_SIZE, C, O>
where
    C: ExclusiveCriticalSection + Sync,
    O: Sync,
{
}
