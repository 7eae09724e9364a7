// ABOUTME: Pending-change query engine
// Paged, lazily merged results across workspaces, owners and paths

mod engine;
mod merge;
pub mod request;
pub mod stream;

pub use engine::query_pending_changes;
pub use request::{PendingChangeQuery, QueryPath};
pub use stream::PendingChangeStream;

use crate::models::{ChangeSummary, PendingChange};

/// Per-type counts of a collected result set.
pub fn summarize(changes: &[PendingChange]) -> ChangeSummary {
    ChangeSummary::from_changes(changes)
}
