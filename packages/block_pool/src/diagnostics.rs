use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::PoolObserver;

/// A [`PoolObserver`] that counts pool events and optionally calls error hooks.
///
/// Counters are reset whenever the pool is (re)initialized. The operation counters are 32-bit
/// and wrap around on overflow.
///
/// # Examples
///
/// ```
/// use block_pool::{BlockPool, Diagnostics, NoCriticalSection};
///
/// let pool = BlockPool::<2, 16, _, _>::with_parts(false, NoCriticalSection::new(), Diagnostics::new());
/// pool.initialize();
///
/// let a = pool.acquire().unwrap();
/// let _b = pool.acquire().unwrap();
/// assert!(pool.acquire().is_err());
///
/// pool.release(a.as_ptr()).unwrap();
///
/// let snapshot = pool.diagnostics();
/// assert_eq!(snapshot.acquisitions, 2);
/// assert_eq!(snapshot.releases, 1);
/// assert_eq!(snapshot.exhausted_failures, 1);
/// assert_eq!(snapshot.free_blocks, 1);
/// ```
#[derive(Debug, Default)]
pub struct Diagnostics {
    acquisitions: AtomicU32,
    releases: AtomicU32,
    free_blocks: AtomicUsize,
    exhausted_failures: AtomicU32,
    double_release_failures: AtomicU32,
    invalid_address_failures: AtomicU32,

    hooks: ErrorHooks,
}

impl Diagnostics {
    /// Creates diagnostics without any error hooks.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_hooks(ErrorHooks::new())
    }

    /// Creates diagnostics that call the given hooks when an operation fails.
    #[must_use]
    pub const fn with_hooks(hooks: ErrorHooks) -> Self {
        Self {
            acquisitions: AtomicU32::new(0),
            releases: AtomicU32::new(0),
            free_blocks: AtomicUsize::new(0),
            exhausted_failures: AtomicU32::new(0),
            double_release_failures: AtomicU32::new(0),
            invalid_address_failures: AtomicU32::new(0),
            hooks,
        }
    }

    /// Takes a copy of the current counter values.
    ///
    /// Each counter is read individually, so if the pool is used concurrently from other
    /// threads the values may not all belong to the same instant.
    #[must_use]
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            acquisitions: self.acquisitions.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            free_blocks: self.free_blocks.load(Ordering::Relaxed),
            exhausted_failures: self.exhausted_failures.load(Ordering::Relaxed),
            double_release_failures: self.double_release_failures.load(Ordering::Relaxed),
            invalid_address_failures: self.invalid_address_failures.load(Ordering::Relaxed),
        }
    }
}

impl PoolObserver for Diagnostics {
    fn initialized(&self, block_count: usize) {
        self.acquisitions.store(0, Ordering::Relaxed);
        self.releases.store(0, Ordering::Relaxed);
        self.free_blocks.store(block_count, Ordering::Relaxed);
        self.exhausted_failures.store(0, Ordering::Relaxed);
        self.double_release_failures.store(0, Ordering::Relaxed);
        self.invalid_address_failures.store(0, Ordering::Relaxed);
    }

    fn acquired(&self, _slot: usize) {
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
        self.free_blocks.fetch_sub(1, Ordering::Relaxed);
    }

    fn released(&self, _slot: usize) {
        self.releases.fetch_add(1, Ordering::Relaxed);
        self.free_blocks.fetch_add(1, Ordering::Relaxed);
    }

    fn exhausted(&self) {
        self.exhausted_failures.fetch_add(1, Ordering::Relaxed);

        if let Some(hook) = self.hooks.on_exhausted {
            hook();
        }
    }

    fn double_release(&self, _slot: usize) {
        self.double_release_failures.fetch_add(1, Ordering::Relaxed);

        if let Some(hook) = self.hooks.on_double_release {
            hook();
        }
    }

    fn invalid_address(&self, _address: usize) {
        self.invalid_address_failures.fetch_add(1, Ordering::Relaxed);

        if let Some(hook) = self.hooks.on_invalid_address {
            hook();
        }
    }
}

/// Zero-argument callbacks invoked by [`Diagnostics`] at the point of failure.
///
/// # Examples
///
/// ```
/// use block_pool::{Diagnostics, ErrorHooks};
///
/// fn out_of_blocks() {
///     eprintln!("block pool exhausted");
/// }
///
/// let diagnostics = Diagnostics::with_hooks(ErrorHooks::new().on_exhausted(out_of_blocks));
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct ErrorHooks {
    on_exhausted: Option<fn()>,
    on_double_release: Option<fn()>,
    on_invalid_address: Option<fn()>,
}

impl ErrorHooks {
    /// Creates a set of hooks with nothing registered.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            on_exhausted: None,
            on_double_release: None,
            on_invalid_address: None,
        }
    }

    /// Registers the hook called when an acquisition finds no free block.
    #[must_use]
    pub const fn on_exhausted(mut self, hook: fn()) -> Self {
        self.on_exhausted = Some(hook);
        self
    }

    /// Registers the hook called when a block that is not handed out is released.
    #[must_use]
    pub const fn on_double_release(mut self, hook: fn()) -> Self {
        self.on_double_release = Some(hook);
        self
    }

    /// Registers the hook called when an address not owned by the pool is released.
    #[must_use]
    pub const fn on_invalid_address(mut self, hook: fn()) -> Self {
        self.on_invalid_address = Some(hook);
        self
    }
}

/// Counter values captured by [`Diagnostics::snapshot()`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub struct DiagnosticsSnapshot {
    /// Successful acquisitions since the last (re)initialization.
    pub acquisitions: u32,

    /// Successful releases since the last (re)initialization.
    pub releases: u32,

    /// Blocks that are currently free.
    pub free_blocks: usize,

    /// Acquisitions that failed because the pool was exhausted.
    pub exhausted_failures: u32,

    /// Releases that failed because the block was not handed out.
    pub double_release_failures: u32,

    /// Releases that failed because the address did not belong to the pool.
    pub invalid_address_failures: u32,
}
