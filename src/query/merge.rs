// ABOUTME: Lazy k-way merge of per-path pending-change pages into one ordered, deduplicated sequence
// Each queried path gets a cursor that fetches its next server page only when its buffer runs dry

use crate::models::{ChangeType, PendingChange, PendingSet, ServerPath, WorkspaceDefinition};
use crate::session::{ServerSession, SessionError};
use crate::transport::{ItemSpec, PendingSetQuery, TransportError};
use async_stream::try_stream;
use futures_util::Stream;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

type SortKey = (ServerPath, ChangeType);

fn owned_key(change: &PendingChange) -> SortKey {
    (change.server_item.clone(), change.change_type)
}

/// Validated inputs of one query.
#[derive(Debug)]
pub(crate) struct QueryPlan {
    pub workspaces: Vec<Arc<WorkspaceDefinition>>,
    pub specs: Vec<ItemSpec>,
    pub include_deleted: bool,
    pub page_size: u32,
}

impl QueryPlan {
    fn server_query(&self, spec: &ItemSpec) -> PendingSetQuery {
        PendingSetQuery {
            workspace_names: self.workspaces.iter().map(|w| w.name.clone()).collect(),
            owners: self.workspaces.iter().map(|w| w.owner.clone()).collect(),
            item_specs: vec![spec.clone()],
            include_deleted: self.include_deleted,
            page_size: self.page_size,
        }
    }

    /// Keep only changes inside the item spec's scope and the owning workspace's mappings.
    fn accept_page(&self, spec: &ItemSpec, pending_sets: Vec<PendingSet>) -> Vec<PendingChange> {
        let mut accepted = Vec::new();

        for set in pending_sets {
            let Some(workspace) = self
                .workspaces
                .iter()
                .find(|w| w.is_named(&set.name, &set.owner))
            else {
                warn!(
                    "Ignoring pending set of unrequested workspace {};{}",
                    set.name, set.owner
                );
                continue;
            };

            for mut change in set.pending_changes {
                if !spec.recursion.includes(&spec.item, &change.server_item) {
                    debug!(
                        "Dropping {} outside {} ({:?})",
                        change.server_item, spec.item, spec.recursion
                    );
                    continue;
                }
                if change.is_deleted_item() && !self.include_deleted {
                    continue;
                }
                if !workspace.maps_local_path(&change.local_item) {
                    warn!(
                        "Dropping {} for {}: local item {} is outside the workspace mappings",
                        change.change_type,
                        change.server_item,
                        change.local_item.display()
                    );
                    continue;
                }

                change.workspace = set.name.clone();
                change.owner = set.owner.clone();
                if change.computer.is_none() {
                    change.computer = set.computer.clone();
                }
                accepted.push(change);
            }
        }

        accepted
    }
}

struct PathCursor {
    spec: ItemSpec,
    query: PendingSetQuery,
    buffer: VecDeque<PendingChange>,
    continuation: Option<String>,
    last_key: Option<SortKey>,
    exhausted: bool,
}

impl PathCursor {
    fn new(spec: ItemSpec, plan: &QueryPlan) -> Self {
        Self {
            query: plan.server_query(&spec),
            spec,
            buffer: VecDeque::new(),
            continuation: None,
            last_key: None,
            exhausted: false,
        }
    }

    fn head(&self) -> Option<&PendingChange> {
        self.buffer.front()
    }

    /// Fetch pages until something is buffered or the server has no more.
    async fn fill(&mut self, session: &ServerSession, plan: &QueryPlan) -> Result<(), SessionError> {
        while self.buffer.is_empty() && !self.exhausted {
            let input = self.spec.item.to_string();
            let page = session
                .fetch_page(&self.query, self.continuation.take(), &input)
                .await?;

            self.continuation = page.continuation_token;
            self.exhausted = self.continuation.is_none();

            let mut changes = plan.accept_page(&self.spec, page.pending_sets);
            changes.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

            if let (Some(last), Some(first)) = (&self.last_key, changes.first()) {
                if (&first.server_item, first.change_type) < (&last.0, last.1) {
                    return Err(SessionError::Transport {
                        operation: "query_pending_sets",
                        input,
                        source: TransportError::Protocol(format!(
                            "page starting at {} goes back before {}",
                            first.server_item, last.0
                        )),
                    });
                }
            }
            if let Some(last) = changes.last() {
                self.last_key = Some(owned_key(last));
            }

            self.buffer.extend(changes);
        }
        Ok(())
    }
}

/// Stream the merged results of every cursor in `(server item, change type)` order.
pub(crate) fn merge_pending_changes(
    session: Arc<ServerSession>,
    plan: QueryPlan,
) -> impl Stream<Item = Result<PendingChange, SessionError>> + Send {
    try_stream! {
        let mut cursors: Vec<PathCursor> = plan
            .specs
            .iter()
            .map(|spec| PathCursor::new(spec.clone(), &plan))
            .collect();
        // Case variants of one item sort next to each other, so the change
        // types already emitted for the current item are enough to dedup
        let mut current_item: Option<ServerPath> = None;
        let mut emitted_types: Vec<ChangeType> = Vec::new();
        let mut emitted = 0usize;

        loop {
            for cursor in &mut cursors {
                cursor.fill(&session, &plan).await?;
            }

            let next = cursors
                .iter()
                .enumerate()
                .filter_map(|(index, cursor)| cursor.head().map(|head| (index, head)))
                .min_by(|(_, a), (_, b)| a.sort_key().cmp(&b.sort_key()))
                .map(|(index, _)| index);

            let Some(index) = next else {
                break;
            };
            let Some(change) = cursors[index].buffer.pop_front() else {
                break;
            };

            let repeated_item = current_item
                .as_ref()
                .is_some_and(|item| item.same_item(&change.server_item));
            if repeated_item {
                if emitted_types.contains(&change.change_type) {
                    continue;
                }
            } else {
                current_item = Some(change.server_item.clone());
                emitted_types.clear();
            }
            emitted_types.push(change.change_type);
            emitted += 1;
            yield change;
        }

        debug!("Pending change query finished with {} results", emitted);
    }
}
