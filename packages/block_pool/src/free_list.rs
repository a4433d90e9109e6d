use crate::{Error, Result};

/// The largest number of blocks a pool can manage.
///
/// Link table entries are 16 bits wide and two values are reserved as sentinels: `0xFFFF` marks
/// a busy slot and `BLOCK_COUNT` itself marks the end of the free chain. A pool of 65535 blocks
/// would make the two sentinels collide.
pub const MAX_BLOCK_COUNT: usize = 0xFFFE;

/// Link table value of a slot that is currently handed out to a caller.
const BUSY: u16 = 0xFFFF;

/// Bookkeeping for which slots of a pool are free, kept outside the slots themselves.
///
/// Every slot has one 16-bit link table entry that is exactly one of:
///
/// * the index of the next free slot in the chain,
/// * [`Self::END`] - the slot is free and is the last entry of the chain,
/// * `BUSY` - the slot is handed out.
///
/// The free slots form a single chain from `head` to `tail`. New slots are taken from `head`,
/// released slots are appended at `tail`, so slots are recycled in FIFO order. The pool is
/// exhausted exactly when the slot at `tail` is busy.
///
/// This type does not touch any memory besides its own table. Mapping slots to addresses is
/// the job of the owning pool.
#[derive(Debug)]
pub(crate) struct FreeList<const BLOCK_COUNT: usize> {
    links: [u16; BLOCK_COUNT],

    /// Next slot to hand out. Holds [`Self::END`] while the pool is exhausted (or before the
    /// first initialization).
    head: u16,

    /// Most recently freed slot, the append point of the chain.
    tail: u16,

    /// Number of slots in the chain. Not needed by the algorithm itself but cheap to keep and
    /// callers want to know.
    available: u16,

    initialized: bool,
}

impl<const BLOCK_COUNT: usize> FreeList<BLOCK_COUNT> {
    /// Sentinel link value meaning "free, and nothing follows in the chain".
    #[expect(
        clippy::cast_possible_truncation,
        reason = "BLOCK_COUNT <= MAX_BLOCK_COUNT is asserted at compile time in new()"
    )]
    pub(crate) const END: u16 = BLOCK_COUNT as u16;

    /// Creates a free list in the uninitialized state, where no slot can be taken or put back
    /// until [`initialize()`][Self::initialize] has run.
    #[must_use]
    pub(crate) const fn new() -> Self {
        const {
            assert!(BLOCK_COUNT > 0, "a block pool must have at least one block");
            assert!(
                BLOCK_COUNT <= MAX_BLOCK_COUNT,
                "a block pool can have at most 65534 blocks"
            );
        }

        Self {
            // Not busy, so a release before initialization is rejected as a double release.
            links: [Self::END; BLOCK_COUNT],
            head: Self::END,
            tail: 0,
            available: 0,
            initialized: false,
        }
    }

    #[must_use]
    pub(crate) fn is_initialized(&self) -> bool {
        self.initialized
    }

    #[must_use]
    pub(crate) fn available(&self) -> usize {
        usize::from(self.available)
    }

    #[must_use]
    pub(crate) fn is_exhausted(&self) -> bool {
        !self.initialized || self.link(self.tail) == BUSY
    }

    /// Chains all slots together in index order. Does nothing if already initialized.
    pub(crate) fn initialize(&mut self) {
        if self.initialized {
            return;
        }

        for (index, link) in self.links.iter_mut().enumerate() {
            // For the last slot this is `END`, terminating the chain.
            *link = u16::try_from(
                index
                    .checked_add(1)
                    .expect("guarded by BLOCK_COUNT <= MAX_BLOCK_COUNT"),
            )
            .expect("guarded by BLOCK_COUNT <= MAX_BLOCK_COUNT");
        }

        self.head = 0;
        self.tail = Self::END
            .checked_sub(1)
            .expect("guarded by BLOCK_COUNT > 0");
        self.available = Self::END;
        self.initialized = true;
    }

    /// Forgets all outstanding slots and rebuilds the pristine chain.
    pub(crate) fn reset(&mut self) {
        self.initialized = false;
        self.initialize();
    }

    /// Takes the next free slot out of the chain and marks it busy.
    ///
    /// Returns `None` if no slot is free, including when the list is not initialized.
    pub(crate) fn take(&mut self) -> Option<usize> {
        if self.is_exhausted() {
            return None;
        }

        // With a single free slot left, `head` and `tail` refer to the same slot. We take `tail`
        // explicitly so `tail` keeps pointing at the slot we are about to mark busy, which is
        // what makes the next exhaustion check come out right.
        let slot = if self.link(self.head) == Self::END {
            self.tail
        } else {
            self.head
        };

        self.head = self.link(slot);
        *self.link_mut(slot) = BUSY;

        self.available = self
            .available
            .checked_sub(1)
            .expect("a non-exhausted free list has at least one available slot");

        Some(usize::from(slot))
    }

    /// Marks a busy slot as free again and appends it to the end of the chain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DoubleRelease`] if the slot is not busy. The list is left untouched.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is out of bounds. The owning pool validates addresses before mapping
    /// them to slots so this indicates a bug in the pool.
    pub(crate) fn put(&mut self, slot: usize) -> Result<()> {
        let slot = Self::to_slot(slot);

        if self.link(slot) != BUSY {
            return Err(Error::DoubleRelease {
                slot: usize::from(slot),
            });
        }

        if self.head == Self::END {
            // Nothing was free, the released slot starts a new chain.
            self.head = slot;
        } else {
            *self.link_mut(self.tail) = slot;
        }

        self.tail = slot;
        *self.link_mut(slot) = Self::END;

        self.available = self
            .available
            .checked_add(1)
            .expect("guarded by the slot having been busy");

        Ok(())
    }

    fn to_slot(slot: usize) -> u16 {
        assert!(
            slot < BLOCK_COUNT,
            "slot {slot} out of bounds in free list of {} blocks",
            BLOCK_COUNT
        );

        u16::try_from(slot).expect("guarded by BLOCK_COUNT <= MAX_BLOCK_COUNT")
    }

    fn link(&self, slot: u16) -> u16 {
        *self
            .links
            .get(usize::from(slot))
            .expect("cursors and links only ever refer to in-bounds slots")
    }

    fn link_mut(&mut self, slot: u16) -> &mut u16 {
        self.links
            .get_mut(usize::from(slot))
            .expect("cursors and links only ever refer to in-bounds slots")
    }

    /// Walks the whole table and verifies that the chain and the counters agree.
    #[cfg_attr(test, mutants::skip)] // This is essentially test logic, mutation is meaningless.
    #[cfg(test)]
    pub(crate) fn integrity_check(&self) {
        if !self.initialized {
            return;
        }

        let mut observed_free: usize = 0;

        for (index, &link) in self.links.iter().enumerate() {
            assert!(
                link == BUSY || link <= Self::END,
                "slot {index} has invalid link {link:#06x} in free list of {} blocks",
                BLOCK_COUNT
            );

            if link != BUSY {
                observed_free = observed_free
                    .checked_add(1)
                    .expect("guarded by BLOCK_COUNT <= MAX_BLOCK_COUNT");
            }
        }

        assert_eq!(
            observed_free,
            self.available(),
            "available count does not match the number of free slots"
        );

        if self.head == Self::END {
            assert_eq!(observed_free, 0, "head is END but free slots exist");
            assert_eq!(self.link(self.tail), BUSY, "head is END but tail is free");
            return;
        }

        // Follow the chain from head and expect to land on tail after exactly
        // `available` steps, visiting only free slots.
        let mut current = self.head;
        let mut visited: usize = 1;

        loop {
            let next = self.link(current);
            assert_ne!(next, BUSY, "slot {current} is in the chain but marked busy");

            if next == Self::END {
                assert_eq!(current, self.tail, "chain ends at {current}, not at tail");
                break;
            }

            current = next;
            visited = visited
                .checked_add(1)
                .expect("guarded by BLOCK_COUNT <= MAX_BLOCK_COUNT");

            assert!(
                visited <= observed_free,
                "chain is longer than the number of free slots (cycle?)"
            );
        }

        assert_eq!(
            visited, observed_free,
            "some free slots are not reachable from head"
        );
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn initialized<const N: usize>() -> FreeList<N> {
        let mut list = FreeList::<N>::new();
        list.initialize();
        list
    }

    #[test]
    fn smoke_test() {
        let mut list = initialized::<3>();

        assert_eq!(list.available(), 3);
        assert_eq!(list.take(), Some(0));
        assert_eq!(list.take(), Some(1));
        assert_eq!(list.take(), Some(2));
        assert_eq!(list.take(), None);
        assert!(list.is_exhausted());

        list.put(1).unwrap();
        assert_eq!(list.available(), 1);
        assert_eq!(list.take(), Some(1));

        list.integrity_check();
    }

    #[test]
    fn uninitialized_hands_out_nothing() {
        let mut list = FreeList::<4>::new();

        assert!(!list.is_initialized());
        assert!(list.is_exhausted());
        assert_eq!(list.available(), 0);
        assert_eq!(list.take(), None);
    }

    #[test]
    fn uninitialized_rejects_put() {
        let mut list = FreeList::<4>::new();

        assert!(matches!(list.put(2), Err(Error::DoubleRelease { slot: 2 })));
    }

    #[test]
    fn initialize_is_idempotent() {
        let mut list = initialized::<4>();

        assert_eq!(list.take(), Some(0));

        // A second initialize must not give back the slot we are holding.
        list.initialize();

        assert_eq!(list.available(), 3);
        assert_eq!(list.take(), Some(1));
    }

    #[test]
    fn reset_frees_everything() {
        let mut list = initialized::<4>();

        while list.take().is_some() {}
        assert_eq!(list.available(), 0);

        list.reset();

        assert_eq!(list.available(), 4);
        assert_eq!(list.take(), Some(0));
        assert_eq!(list.take(), Some(1));
        list.integrity_check();
    }

    #[test]
    fn double_put_is_rejected() {
        let mut list = initialized::<4>();

        let slot = list.take().unwrap();
        list.put(slot).unwrap();

        assert!(matches!(
            list.put(slot),
            Err(Error::DoubleRelease { slot: 0 })
        ));

        // The slot is still free exactly once.
        assert_eq!(list.available(), 4);
        list.integrity_check();
    }

    #[test]
    fn put_of_never_taken_slot_is_rejected() {
        let mut list = initialized::<4>();

        assert!(list.put(3).is_err());
        assert_eq!(list.available(), 4);
    }

    #[test]
    fn released_slots_are_reused_in_fifo_order() {
        let mut list = initialized::<4>();

        for _ in 0..4 {
            _ = list.take().unwrap();
        }

        list.put(2).unwrap();
        list.put(0).unwrap();
        list.put(3).unwrap();

        assert_eq!(list.take(), Some(2));
        assert_eq!(list.take(), Some(0));
        assert_eq!(list.take(), Some(3));
        assert_eq!(list.take(), None);
    }

    #[test]
    fn release_appends_behind_untouched_slots() {
        let mut list = initialized::<4>();

        let first = list.take().unwrap();
        list.put(first).unwrap();

        // Slot 0 went to the back of the chain.
        assert_eq!(list.take(), Some(1));
        assert_eq!(list.take(), Some(2));
        assert_eq!(list.take(), Some(3));
        assert_eq!(list.take(), Some(0));
        assert_eq!(list.take(), None);
    }

    #[test]
    fn single_block() {
        let mut list = initialized::<1>();

        assert_eq!(list.take(), Some(0));
        assert_eq!(list.take(), None);

        list.put(0).unwrap();
        list.integrity_check();

        assert_eq!(list.take(), Some(0));
        assert_eq!(list.take(), None);
        assert!(list.put(0).is_ok());
        assert!(list.put(0).is_err());
    }

    #[test]
    fn drain_to_last_then_refill() {
        let mut list = initialized::<3>();

        // Leave exactly one free slot, which is both head and tail.
        _ = list.take().unwrap();
        _ = list.take().unwrap();
        assert_eq!(list.available(), 1);

        assert_eq!(list.take(), Some(2));
        assert!(list.is_exhausted());

        list.put(0).unwrap();
        list.put(2).unwrap();
        list.integrity_check();

        assert_eq!(list.take(), Some(0));
        assert_eq!(list.take(), Some(2));
        assert_eq!(list.take(), None);
    }

    #[test]
    #[should_panic]
    fn put_out_of_bounds_panics() {
        let mut list = initialized::<4>();

        _ = list.put(4);
    }

    #[test]
    fn max_block_count_is_supported() {
        let mut list = initialized::<MAX_BLOCK_COUNT>();

        assert_eq!(FreeList::<MAX_BLOCK_COUNT>::END, 0xFFFE);
        assert_eq!(list.available(), MAX_BLOCK_COUNT);

        for expected in 0..MAX_BLOCK_COUNT {
            assert_eq!(list.take(), Some(expected));
        }

        assert_eq!(list.take(), None);

        list.put(MAX_BLOCK_COUNT - 1).unwrap();
        assert_eq!(list.take(), Some(MAX_BLOCK_COUNT - 1));
    }

    #[test]
    fn random_churn_keeps_integrity() {
        const COUNT: usize = 16;

        let mut list = initialized::<COUNT>();
        let mut taken = Vec::new();
        let mut rng = SmallRng::seed_from_u64(42);

        for _ in 0..10_000 {
            let release = !taken.is_empty() && (taken.len() == COUNT || rng.random_bool(0.5));

            if release {
                let position = rng.random_range(0..taken.len());
                let slot = taken.swap_remove(position);
                list.put(slot).unwrap();
            } else {
                let slot = list.take().unwrap();
                assert!(!taken.contains(&slot));
                taken.push(slot);
            }

            assert_eq!(list.available(), COUNT - taken.len());
            list.integrity_check();
        }
    }
}
