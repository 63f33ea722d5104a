//! # Task System Core Trait
//!
//! A `Task` is a self-contained unit of work moved to a worker thread. It owns
//! everything it needs, runs to completion there, and its `Output` travels back
//! to the main thread through the worker's result channel.
//!
//! ## Thread Safety
//! - `Task` must be `Send` to be transferred to a worker
//! - `Output` must be `Send` to be transferred back
//! - Shared read-only state travels as `Arc`

/// A unit of work that runs on a worker thread.
///
/// # Implementation Guidelines
/// - Should be relatively coarse-grained to amortize scheduling overhead
/// - Should report failures inside `Output` rather than panicking, so the
///   worker stays alive for the next task
pub trait Task: Send + 'static {
    /// Value handed back to the main thread.
    type Output: Send + 'static;

    /// Performs the work. Called exactly once, on a worker thread.
    fn process(self) -> Self::Output;
}
