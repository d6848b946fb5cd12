//! # tapguard-store: Counter store implementations.
//!
//! [`MemoryCounterStore`] implements [`tapguard_core::CounterStore`] inside
//! the process. It backs single-instance deployments, offline replay, and
//! every test in the workspace. A networked store (Redis or similar) plugs
//! into the same trait.

pub mod memory;

pub use memory::MemoryCounterStore;
