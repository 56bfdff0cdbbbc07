//! Layer lock coordinator.
//!
//! One [`LockCoordinator`] runs per user per open document. It owns the
//! local lock table and decides, without any central arbiter, who may edit
//! which node:
//!
//! - `acquire`/`release` update the local table and broadcast the change.
//! - Peers mirror each other's broadcasts; a remote `lock_acquired` always
//!   wins over the local view.
//! - Locks expire after a TTL, so a crashed peer's locks clear themselves.
//! - A joining coordinator asks everyone for their held locks
//!   (`request_locks` / `locks_response`) before the user starts editing.
//!
//! # Known limitation
//!
//! Acquisition is optimistic. Two coordinators can both see a node as free
//! and both lock it before either broadcast arrives. Each side then applies
//! the other's `lock_acquired` (remote wins), drops its own entry, and is
//! told through [`LockEvent::Overridden`]. Both users may edit only in the
//! window before the broadcasts cross.
//!
//! After they cross, each peer mirrors the *other* user as owner, and
//! neither holds a timer for it. The node is then locked for everyone,
//! including both racers, until the mirrored entries expire one TTL later
//! (30 seconds by default). Editors should expect a node to stay
//! unusable for that long after a simultaneous acquire, and may surface the
//! `Overridden` event so the user knows why. Stronger guarantees would need
//! a single sequencer.
//!
//! Two coordinators sharing one user id cannot see each other's locks,
//! because self-originated messages are filtered by user id.

mod commands;
pub mod config;
pub mod error;
pub mod events;
mod handle;
mod service;

pub use config::CoordinatorConfig;
pub use error::CoordinatorError;
pub use events::LockEvent;
pub use handle::CoordinatorHandle;
pub use service::LockCoordinator;
