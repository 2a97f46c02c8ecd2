//! Token renewal coordination and session termination
//!
//! When many requests hit a 401 at once, exactly one renewal exchange runs.
//! The `RefreshCoordinator` is an actor: a single task owns the
//! Idle/Refreshing state and receives acquire requests over a channel, so the
//! single-flight guarantee holds on any runtime flavour, multi-threaded
//! included.
//!
//! Renewal lifecycle:
//! 1. First 401 → `acquire_fresh_token()` → state `Refreshing`, renewal task spawned
//! 2. Further 401s while `Refreshing` → queued as waiters, no new exchange
//! 3. Renewal succeeds → pair persisted, every waiter resolved in arrival order
//! 4. Renewal fails (or no refresh token) → `SessionTerminator` runs once,
//!    every waiter rejected with the same error
//! 5. State returns to `Idle`

pub mod coordinator;
pub mod error;
pub mod state;
pub mod terminator;

pub use coordinator::{RefreshContext, RefreshCoordinator};
pub use error::{RefreshError, Result};
pub use state::{CoordinatorAction, CoordinatorEvent, CoordinatorState, handle_event};
pub use terminator::{Navigator, SessionStatus, SessionTerminator};
