use std::any::type_name;
use std::fmt;

use crate::{BlockPool, CriticalSection, NoCriticalSection, NoopObserver, PoolObserver};

/// Builder for creating an instance of [`BlockPool`].
///
/// You only need to use this builder if you want to customize the pool configuration.
/// The default configuration used by [`BlockPool::new()`][1] gives a single-threaded pool that
/// must be initialized explicitly and collects no diagnostics.
///
/// The builder is not usable in `const` context. To place a customized pool in a `static`, use
/// [`BlockPool::with_parts()`][2] instead.
///
/// # Examples
///
/// ```
/// use block_pool::{BlockPool, Diagnostics};
///
/// let pool = BlockPool::<8, 16>::builder()
///     .auto_initialize(true)
///     .observer(Diagnostics::new())
///     .build();
///
/// assert_eq!(pool.available(), 0);
/// _ = pool.acquire().unwrap();
/// assert_eq!(pool.available(), 7);
/// ```
///
/// [1]: BlockPool::new
/// [2]: BlockPool::with_parts
#[must_use]
pub struct BlockPoolBuilder<
    const BLOCK_COUNT: usize,
    const BLOCK_SIZE: usize,
    C = NoCriticalSection,
    O = NoopObserver,
> {
    auto_initialize: bool,
    critical_section: C,
    observer: O,
}

impl<const BLOCK_COUNT: usize, const BLOCK_SIZE: usize, C, O> fmt::Debug
    for BlockPoolBuilder<BLOCK_COUNT, BLOCK_SIZE, C, O>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockPoolBuilder")
            .field("block_count", &BLOCK_COUNT)
            .field("block_size", &BLOCK_SIZE)
            .field("auto_initialize", &self.auto_initialize)
            .field("critical_section", &format_args!("{}", type_name::<C>()))
            .field("observer", &format_args!("{}", type_name::<O>()))
            .finish()
    }
}

impl<const BLOCK_COUNT: usize, const BLOCK_SIZE: usize>
    BlockPoolBuilder<BLOCK_COUNT, BLOCK_SIZE>
{
    pub(crate) fn new() -> Self {
        Self {
            auto_initialize: false,
            critical_section: NoCriticalSection::new(),
            observer: NoopObserver,
        }
    }
}

impl<const BLOCK_COUNT: usize, const BLOCK_SIZE: usize, C, O>
    BlockPoolBuilder<BLOCK_COUNT, BLOCK_SIZE, C, O>
{
    /// Sets whether the pool initializes itself on the first acquisition.
    ///
    /// Initialization costs O(`BLOCK_COUNT`), so with this enabled the first
    /// [`acquire()`][BlockPool::acquire] is slower than the rest. Disabled by default, in which
    /// case [`initialize()`][BlockPool::initialize] must be called before first use.
    pub fn auto_initialize(mut self, auto_initialize: bool) -> Self {
        self.auto_initialize = auto_initialize;
        self
    }

    /// Sets the [critical section][CriticalSection] the pool enters around every operation.
    ///
    /// # Examples
    ///
    /// ```
    /// use block_pool::{BlockPool, MutexCriticalSection};
    ///
    /// let pool = BlockPool::<8, 16>::builder()
    ///     .critical_section(MutexCriticalSection::new())
    ///     .build();
    ///
    /// // A mutex-protected pool can be shared between threads.
    /// std::thread::scope(|s| {
    ///     s.spawn(|| pool.initialize());
    /// });
    /// ```
    pub fn critical_section<C2>(
        self,
        critical_section: C2,
    ) -> BlockPoolBuilder<BLOCK_COUNT, BLOCK_SIZE, C2, O>
    where
        C2: CriticalSection,
    {
        BlockPoolBuilder {
            auto_initialize: self.auto_initialize,
            critical_section,
            observer: self.observer,
        }
    }

    /// Sets the [observer][PoolObserver] that is notified of pool events.
    pub fn observer<O2>(self, observer: O2) -> BlockPoolBuilder<BLOCK_COUNT, BLOCK_SIZE, C, O2>
    where
        O2: PoolObserver,
    {
        BlockPoolBuilder {
            auto_initialize: self.auto_initialize,
            critical_section: self.critical_section,
            observer,
        }
    }
}

impl<const BLOCK_COUNT: usize, const BLOCK_SIZE: usize, C, O>
    BlockPoolBuilder<BLOCK_COUNT, BLOCK_SIZE, C, O>
where
    C: CriticalSection,
    O: PoolObserver,
{
    /// Builds the block pool with the specified configuration.
    ///
    /// The pool is not initialized yet, even if auto-initialization was requested; that
    /// happens on the first acquisition.
    #[must_use]
    pub fn build(self) -> BlockPool<BLOCK_COUNT, BLOCK_SIZE, C, O> {
        BlockPool::with_parts(self.auto_initialize, self.critical_section, self.observer)
    }
}
