//! Audit trail of sync attempts
//!
//! Every push, pull and conflict resolution ends as an [`AuditMessage`].
//! Conflicts are tracked through `merge_conflict_uuid` and resolution
//! attempts are chained with `next_audit`.

mod store;
mod types;

pub use store::{AuditRepository, AuditStore};
pub use types::{AuditMessage, ConflictState, PushOutcome};
