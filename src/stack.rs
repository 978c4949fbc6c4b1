//! Stack growth for the recursive parser and evaluator.
//!
//! Both walk the program by native recursion. Before each level we make sure
//! some stack remains and grow onto the heap otherwise, so that the
//! evaluator's own depth limit (see [`crate::interp::Interpreter`]) is what
//! stops runaway recursion rather than a native overflow.

/// Grow when less than this much stack remains.
const RED_ZONE: usize = 128 * 1024;

/// Size of each new stack segment.
const SEGMENT_SIZE: usize = 2 * 1024 * 1024;

/// Run `f`, first growing the stack if it is nearly exhausted.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, SEGMENT_SIZE, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
