//! # tapguard-core
//! Foundation types, traits, and configuration for the TapGuard anti-cheat engine.

pub mod clock;
pub mod codec;
pub mod config;
pub mod constants;
pub mod error;
pub mod keys;
pub mod traits;
pub mod types;

pub use clock::{ManualClock, SystemClock};
pub use crate::config::{EngineConfig, FailurePolicy};
pub use error::{ConfigError, StoreError, TapGuardError};
pub use traits::{Clock, CounterStore};
pub use types::{
    ActiveSanctions, PlayerId, RejectReason, SanctionKind, SanctionOutcome, SanctionRecord,
    SanctionTier, TapEvent, TapRequest, TapVerdict, TimingState,
};
