use thiserror::Error;

/// Errors that can occur when acquiring or releasing blocks.
///
/// None of these leave the pool in an inconsistent state. An exhausted pool simply has no
/// block to give right now, while the two release errors indicate a bug in the caller.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// Every block of the pool is currently handed out, or the pool has not been initialized
    /// and is not configured to initialize itself on first use.
    #[error("block pool is exhausted, no free block is available")]
    PoolExhausted,

    /// The released block is not currently handed out. Either it was already released or it
    /// was never acquired since the last reset.
    #[error("block in slot {slot} is not allocated, it was already released or never acquired")]
    DoubleRelease {
        /// Index of the slot the released address maps to.
        slot: usize,
    },

    /// The released address is not the start of any block owned by the pool.
    #[error("address {address:#x} does not point to the start of a block owned by this pool")]
    InvalidAddress {
        /// The address that was passed in.
        address: usize,
    },
}

/// A specialized `Result` type for block pool operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;
