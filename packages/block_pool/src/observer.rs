/// Receives notifications about what a [`BlockPool`][crate::BlockPool] is doing.
///
/// The pool calls these methods synchronously from inside its critical section, right after
/// the corresponding state change (or failure) has happened. All methods default to doing
/// nothing, so an implementation only needs to override the events it cares about.
///
/// Calling back into the same pool from an observer method is not supported. Depending on the
/// critical section in use, it either deadlocks or observes the pool mid-operation.
///
/// See [`Diagnostics`][crate::Diagnostics] for a ready-made observer that counts events.
pub trait PoolObserver {
    /// The free list was (re)built and all `block_count` blocks are free.
    fn initialized(&self, block_count: usize) {
        _ = block_count;
    }

    /// The block in `slot` was handed out.
    fn acquired(&self, slot: usize) {
        _ = slot;
    }

    /// The block in `slot` was returned to the pool.
    fn released(&self, slot: usize) {
        _ = slot;
    }

    /// An acquisition failed because no block was free.
    fn exhausted(&self) {}

    /// A release failed because the block in `slot` was not handed out.
    fn double_release(&self, slot: usize) {
        _ = slot;
    }

    /// A release failed because `address` is not the start of a block of this pool.
    fn invalid_address(&self, address: usize) {
        _ = address;
    }
}

/// An observer that ignores all events. Pools built with it carry no diagnostics overhead.
#[derive(Clone, Copy, Debug, Default)]
#[expect(clippy::exhaustive_structs, reason = "intentionally an empty struct")]
pub struct NoopObserver;

impl PoolObserver for NoopObserver {}

impl<O: PoolObserver + ?Sized> PoolObserver for &O {
    fn initialized(&self, block_count: usize) {
        (**self).initialized(block_count);
    }

    fn acquired(&self, slot: usize) {
        (**self).acquired(slot);
    }

    fn released(&self, slot: usize) {
        (**self).released(slot);
    }

    fn exhausted(&self) {
        (**self).exhausted();
    }

    fn double_release(&self, slot: usize) {
        (**self).double_release(slot);
    }

    fn invalid_address(&self, address: usize) {
        (**self).invalid_address(address);
    }
}
