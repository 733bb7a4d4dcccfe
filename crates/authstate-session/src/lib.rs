//! Time-boxed authentication state with two independent expiration clocks:
//! an absolute lifetime fixed at session start and a sliding inactivity
//! window extended by recorded activity.
//!
//! Expiry is enforced lazily on every read and eagerly by cancelable timers
//! driven through a [`Scheduler`]; both paths run the same deadline check.

pub mod config;
pub mod listener;
pub mod manager;
pub mod scheduler;

pub use config::SessionConfig;
pub use listener::{ExpirationListener, ListenerId};
pub use manager::{SessionManager, SESSION_KEY};
pub use scheduler::{ManualScheduler, Scheduler, TimerHandle, TimerTask, TokioScheduler};
