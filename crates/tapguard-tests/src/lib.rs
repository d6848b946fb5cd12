//! End-to-end test suite for TapGuard.
//!
//! Drives the full validation pipeline over the in-memory store with a
//! manual clock, including concurrent same-player races and failing stores.

pub mod helpers;
