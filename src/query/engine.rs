// ABOUTME: Entry point of pending-change queries
// Validates the request, resolves workspaces and paths up front, then hands a plan to the merge stream

use super::merge::{merge_pending_changes, QueryPlan};
use super::request::{PendingChangeQuery, QueryPath};
use super::stream::PendingChangeStream;
use crate::models::{RecursionType, ServerPath, WorkspaceDefinition};
use crate::registry::RegistryError;
use crate::session::{ServerSession, SessionError};
use crate::transport::ItemSpec;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Query the pending changes of the requested workspaces under the requested paths.
///
/// Everything that can be checked before talking to the pending-set endpoint is
/// checked here, so a stream is only returned for a query that can run. Server
/// pages are fetched lazily as the stream is consumed; a failure after that
/// point is the stream's last item.
pub async fn query_pending_changes(
    session: &Arc<ServerSession>,
    query: PendingChangeQuery,
) -> Result<PendingChangeStream, SessionError> {
    session.ensure_open()?;

    if query.workspace_names.is_empty() {
        return Err(SessionError::InvalidQuery(
            "at least one workspace name is required".to_string(),
        ));
    }
    if query.owners.is_empty() {
        return Err(SessionError::InvalidQuery(
            "at least one owner is required".to_string(),
        ));
    }
    if let Some(blank) = query
        .workspace_names
        .iter()
        .chain(query.owners.iter())
        .find(|value| value.trim().is_empty())
    {
        return Err(SessionError::InvalidQuery(format!(
            "blank workspace name or owner: {blank:?}"
        )));
    }

    let workspaces = resolve_workspaces(session, &query).await?;

    if query.paths.is_empty() {
        debug!("Pending change query without paths returns nothing");
        return Ok(PendingChangeStream::empty());
    }

    let mut specs: Vec<ItemSpec> = Vec::with_capacity(query.paths.len());
    for path in &query.paths {
        let item = match path {
            QueryPath::Server(item) => item.clone(),
            QueryPath::Local(local) => server_item_for_local(&workspaces, local)?,
        };
        let spec = ItemSpec {
            item,
            recursion: query.recursion,
        };
        if !specs.iter().any(|known| covers(known, &spec)) {
            specs.push(spec);
        }
    }

    info!(
        "Querying pending changes of {} workspace(s) under {} path(s) ({:?})",
        workspaces.len(),
        specs.len(),
        query.recursion
    );

    let plan = QueryPlan {
        workspaces,
        specs,
        include_deleted: query.include_deleted,
        page_size: session.settings().page_size,
    };
    Ok(PendingChangeStream::new(merge_pending_changes(
        session.clone(),
        plan,
    )))
}

/// Every requested name must exist for at least one requested owner.
async fn resolve_workspaces(
    session: &ServerSession,
    query: &PendingChangeQuery,
) -> Result<Vec<Arc<WorkspaceDefinition>>, SessionError> {
    let mut workspaces: Vec<Arc<WorkspaceDefinition>> = Vec::new();

    for name in &query.workspace_names {
        let mut found = false;
        for owner in &query.owners {
            if let Some(definition) = session.definition(name, owner).await? {
                found = true;
                if !workspaces.iter().any(|w| w.key() == definition.key()) {
                    workspaces.push(definition);
                }
            }
        }
        if !found {
            return Err(SessionError::WorkspaceMismatch {
                workspace: name.clone(),
                owners: query.owners.iter().cloned().collect(),
            });
        }
    }

    Ok(workspaces)
}

fn server_item_for_local(
    workspaces: &[Arc<WorkspaceDefinition>],
    local: &Path,
) -> Result<ServerPath, SessionError> {
    if !local.is_absolute() {
        return Err(RegistryError::RelativePath {
            path: local.to_path_buf(),
        }
        .into());
    }

    workspaces
        .iter()
        .filter_map(|w| w.mapping_depth(local).map(|depth| (depth, w)))
        .max_by_key(|(depth, _)| *depth)
        .and_then(|(_, w)| w.server_path_for_local(local))
        .ok_or_else(|| {
            RegistryError::NotMapped {
                path: local.to_path_buf(),
            }
            .into()
        })
}

/// True when `known` already returns everything `spec` would.
fn covers(known: &ItemSpec, spec: &ItemSpec) -> bool {
    if known.item.same_item(&spec.item) {
        return true;
    }
    known.recursion == RecursionType::Full && spec.item.is_descendant_of(&known.item)
}
