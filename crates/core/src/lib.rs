//! Domain types for the layer lock coordination protocol.
//!
//! Everything here is plain bookkeeping with no spawned tasks:
//!
//! - [`lock_table`]: per-session node → lock map with lazy expiry.
//! - [`presence`]: throttled activity and selection tracking.
//! - [`protocol`]: TTL constants, topic naming, and the [`LockMessage`] wire enum.
//! - [`session`]: the editor-facing seams ([`EditorSession`], [`EditGate`]).

pub mod error;
pub mod lock_table;
pub mod presence;
pub mod protocol;
pub mod session;
pub mod types;

pub use error::CoreError;
pub use lock_table::{Lock, LockTable};
pub use presence::{PresenceRecord, PresenceTracker};
pub use protocol::{LockEntry, LockMessage, Topic};
pub use session::{EditGate, EditorSession, SessionInfo};
pub use types::{DocumentId, NodeId, Timestamp, UserId};
