//! Stack growth for the recursive passes over source and syntax trees.

/// Remaining stack below which a new segment is allocated.
const RED_ZONE: usize = 64 * 1024;
const SEGMENT_SIZE: usize = 1024 * 1024;

/// Run `f`, moving to a fresh heap-allocated stack segment first when
/// the current one is nearly used up.
pub(crate) fn ensure_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, SEGMENT_SIZE, f)
}
