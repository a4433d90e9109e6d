//! Basic usage of the `block_pool` crate:
//!
//! * Placing a pool in a `static`.
//! * Acquiring blocks and writing to them.
//! * Releasing blocks, including detection of misuse.
//! * Inspecting diagnostics.

use block_pool::{BlockPool, Diagnostics, ErrorHooks, MutexCriticalSection};

fn out_of_blocks() {
    println!("(hook) the pool ran out of blocks");
}

static POOL: BlockPool<4, 32, MutexCriticalSection, Diagnostics> = BlockPool::with_parts(
    true,
    MutexCriticalSection::new(),
    Diagnostics::with_hooks(ErrorHooks::new().on_exhausted(out_of_blocks)),
);

fn main() {
    // The pool initializes itself on the first acquisition because we asked it to above.
    let greeting = POOL.acquire().expect("a fresh pool has free blocks");
    let message = b"hello from a pooled block";

    // SAFETY: The block is 32 bytes, the message fits and the block is exclusively ours.
    let stored = unsafe {
        greeting
            .as_ptr()
            .copy_from_nonoverlapping(message.as_ptr(), message.len());

        std::slice::from_raw_parts(greeting.as_ptr(), message.len())
    };

    println!("Stored: {}", String::from_utf8_lossy(stored));

    // Drain the rest of the pool to see exhaustion in action.
    let mut others = Vec::new();

    while let Ok(block) = POOL.acquire() {
        others.push(block);
    }

    println!(
        "Holding {} blocks, {} available",
        others.len() + 1,
        POOL.available()
    );

    POOL.release(greeting.as_ptr()).expect("block came from this pool");

    // Releasing twice is caught rather than corrupting the pool.
    if let Err(e) = POOL.release(greeting.as_ptr()) {
        println!("Second release rejected: {e}");
    }

    for block in others {
        POOL.release(block.as_ptr()).expect("block came from this pool");
    }

    println!("Diagnostics: {:?}", POOL.diagnostics());
}
