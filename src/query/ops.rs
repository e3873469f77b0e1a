//! Shared read/write primitives over the versioned graph.
//!
//! The write helpers implement the append-only patterns every migration is
//! composed from: append a record, mirror it as deleted, end it on the
//! acting branch. Nothing here ever rewrites a record in place.

use std::collections::BTreeMap;

use crate::model::labels;
use crate::model::{
    Branch, Direction, EdgeKind, EdgeRecord, Node, NodeId, PropertyMap, Timestamp, Value,
};
use crate::query::{resolve_active, BranchFilter, QueryStats};
use crate::schema::{AttributeSchema, BranchSupport};
use crate::storage::{EdgeSpec, GraphStore};
use crate::{Error, Result};

// ============================================================================
// Root anchor
// ============================================================================

/// The singleton Root node, if the graph has one.
pub async fn root_node<S: GraphStore>(store: &S, tx: &S::Tx) -> Result<Option<Node>> {
    let mut roots = store.nodes_by_label(tx, labels::ROOT).await?;
    Ok(if roots.is_empty() { None } else { Some(roots.swap_remove(0)) })
}

/// Get or create the Root anchor. A fresh root starts at graph version 1.
pub async fn ensure_root<S: GraphStore>(store: &S, tx: &mut S::Tx) -> Result<Node> {
    if let Some(root) = root_node(store, tx).await? {
        return Ok(root);
    }
    let mut props = PropertyMap::new();
    props.insert("graph_version".into(), Value::Int(1));
    let id = store
        .create_node(tx, store.generate_uuid(), &[labels::ROOT], props)
        .await?;
    store
        .get_node(tx, id)
        .await?
        .ok_or_else(|| Error::Storage("root vanished after creation".into()))
}

/// The physical format version recorded on the root.
pub fn graph_version(root: &Node) -> i64 {
    root.get("graph_version").and_then(Value::as_int).unwrap_or(0)
}

/// Record a new physical format version. Caller policy decides when —
/// migrations never bump the version themselves.
pub async fn set_graph_version<S: GraphStore>(
    store: &S,
    tx: &mut S::Tx,
    root: NodeId,
    version: i64,
) -> Result<()> {
    store
        .set_node_property(tx, root, "graph_version", Value::Int(version))
        .await
}

// ============================================================================
// Reads
// ============================================================================

/// Resolve each logical edge among `records` to its current record, keeping
/// only active winners. Records are grouped per (source, kind, target);
/// the tie-break within a group is the standard one.
///
/// This is the sweep form, for enumerating distinct edges to act on. For a
/// single-valued kind (`HAS_VALUE`, the flags) the target IS the value, so
/// "the current value" resolves across ALL records of (source, kind) with
/// [`resolve_active`] instead — a deeper branch's record shadows the
/// parent's even though the two point at different targets.
pub fn resolve_per_logical_edge<'a>(
    records: &'a [EdgeRecord],
    filter: &BranchFilter,
) -> Vec<&'a EdgeRecord> {
    let mut groups: BTreeMap<(NodeId, EdgeKind, NodeId), Vec<&EdgeRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry((record.source, record.kind, record.target))
            .or_default()
            .push(record);
    }
    groups
        .into_values()
        .filter_map(|group| resolve_active(group, filter))
        .collect()
}

/// Nodes of `kind` alive on the filtered branch/time — liveness is the
/// active `IS_PART_OF` anchor to Root.
pub async fn active_nodes_of_kind<S: GraphStore>(
    store: &S,
    tx: &S::Tx,
    filter: &BranchFilter,
    kind: &str,
) -> Result<Vec<Node>> {
    let candidates = store
        .nodes_by_property(tx, labels::NODE, "kind", &Value::from(kind))
        .await?;
    let mut alive = Vec::new();
    for node in candidates {
        let anchors = store
            .edges_of(tx, node.id, Direction::Outgoing, &[EdgeKind::IsPartOf])
            .await?;
        if !resolve_per_logical_edge(&anchors, filter).is_empty() {
            alive.push(node);
        }
    }
    alive.sort_by_key(|n| n.id);
    Ok(alive)
}

/// The node's active attribute named `name`, with the winning
/// `HAS_ATTRIBUTE` record, if any.
pub async fn active_attribute<S: GraphStore>(
    store: &S,
    tx: &S::Tx,
    filter: &BranchFilter,
    node: NodeId,
    name: &str,
) -> Result<Option<(EdgeRecord, Node)>> {
    let records = store
        .edges_of(tx, node, Direction::Outgoing, &[EdgeKind::HasAttribute])
        .await?;
    for winner in resolve_per_logical_edge(&records, filter) {
        let Some(attribute) = store.get_node(tx, winner.target).await? else {
            continue;
        };
        if attribute.name() == Some(name) {
            return Ok(Some((winner.clone(), attribute)));
        }
    }
    Ok(None)
}

/// Every currently-active edge incident to `node`, over the given
/// (kind, direction) set, deduplicated by record id.
pub async fn active_incident_edges<S: GraphStore>(
    store: &S,
    tx: &S::Tx,
    filter: &BranchFilter,
    node: NodeId,
    kinds: &[(EdgeKind, Direction)],
) -> Result<Vec<EdgeRecord>> {
    let mut collected = Vec::new();
    for (kind, direction) in kinds {
        let records = store.edges_of(tx, node, *direction, &[*kind]).await?;
        collected.extend(records);
    }
    collected.sort_by_key(|r| r.id);
    collected.dedup_by_key(|r| r.id);

    let winners: Vec<EdgeRecord> = resolve_per_logical_edge(&collected, filter)
        .into_iter()
        .cloned()
        .collect();
    Ok(winners)
}

// ============================================================================
// Writes
// ============================================================================

/// Get or create the shared Boolean flag node for `value`.
pub async fn ensure_boolean_node<S: GraphStore>(
    store: &S,
    tx: &mut S::Tx,
    value: bool,
) -> Result<NodeId> {
    let existing = store
        .nodes_by_property(tx, labels::BOOLEAN, "value", &Value::Bool(value))
        .await?;
    if let Some(node) = existing.first() {
        return Ok(node.id);
    }
    let mut props = PropertyMap::new();
    props.insert("value".into(), Value::Bool(value));
    store
        .create_node(tx, store.generate_uuid(), &[labels::BOOLEAN], props)
        .await
}

/// Create a node of `kind` anchored to Root via an active `IS_PART_OF`
/// record on the acting branch.
pub async fn create_anchored_node<S: GraphStore>(
    store: &S,
    tx: &mut S::Tx,
    branch: &Branch,
    at: Timestamp,
    node_labels: &[&str],
    mut props: PropertyMap,
    kind: &str,
    namespace: &str,
    stats: &mut QueryStats,
) -> Result<NodeId> {
    let root = ensure_root(store, tx).await?;
    props.insert("kind".into(), Value::from(kind));
    props.insert("namespace".into(), Value::from(namespace));
    let id = store
        .create_node(tx, store.generate_uuid(), node_labels, props)
        .await?;
    store
        .add_edge(tx, EdgeSpec::active(id, root.id, EdgeKind::IsPartOf, branch, at))
        .await?;
    stats.nodes_created += 1;
    stats.edges_created += 1;
    Ok(id)
}

/// Create the full attribute subtree for `owner`: the Attribute element,
/// its value, its protected/visible flags, and the four wiring edges —
/// all active from `at` on the acting branch.
pub async fn create_attribute_subtree<S: GraphStore>(
    store: &S,
    tx: &mut S::Tx,
    branch: &Branch,
    at: Timestamp,
    owner: NodeId,
    attribute: &AttributeSchema,
    branch_support: BranchSupport,
    stats: &mut QueryStats,
) -> Result<NodeId> {
    let mut attr_props = PropertyMap::new();
    attr_props.insert("name".into(), Value::from(attribute.name.as_str()));
    attr_props.insert("branch_support".into(), Value::from(branch_support.as_str()));
    let attr_id = store
        .create_node(tx, store.generate_uuid(), &[labels::ATTRIBUTE], attr_props)
        .await?;

    let mut value_props = PropertyMap::new();
    value_props.insert("value".into(), attribute.default_as_value());
    let value_id = store
        .create_node(tx, store.generate_uuid(), &[labels::ATTRIBUTE_VALUE], value_props)
        .await?;

    let protected = ensure_boolean_node(store, tx, false).await?;
    let visible = ensure_boolean_node(store, tx, true).await?;

    for (source, target, kind) in [
        (owner, attr_id, EdgeKind::HasAttribute),
        (attr_id, value_id, EdgeKind::HasValue),
        (attr_id, protected, EdgeKind::IsProtected),
        (attr_id, visible, EdgeKind::IsVisible),
    ] {
        store
            .add_edge(tx, EdgeSpec::active(source, target, kind, branch, at))
            .await?;
        stats.edges_created += 1;
    }
    stats.nodes_created += 2;
    Ok(attr_id)
}

/// Append a deleted-status tombstone with the same endpoints and kind as
/// `record`, on the acting branch.
pub async fn mirror_deleted<S: GraphStore>(
    store: &S,
    tx: &mut S::Tx,
    branch: &Branch,
    at: Timestamp,
    record: &EdgeRecord,
    stats: &mut QueryStats,
) -> Result<()> {
    store
        .add_edge(
            tx,
            EdgeSpec::deleted(record.source, record.target, record.kind, branch, at),
        )
        .await?;
    stats.edges_created += 1;
    Ok(())
}

/// End `record` iff it belongs to the acting branch. Records belonging to
/// other branches are left untouched — only the acting branch's view is
/// ended.
pub async fn end_if_acting_branch<S: GraphStore>(
    store: &S,
    tx: &mut S::Tx,
    branch: &Branch,
    at: Timestamp,
    record: &EdgeRecord,
    stats: &mut QueryStats,
) -> Result<()> {
    if record.branch == branch.name && record.is_open() {
        store.end_edge(tx, record.id, at).await?;
        stats.edges_ended += 1;
    }
    Ok(())
}

/// Append an active record of the same kind as `record` with new
/// endpoints — the re-pointing half of rename/re-label migrations.
pub async fn repoint<S: GraphStore>(
    store: &S,
    tx: &mut S::Tx,
    branch: &Branch,
    at: Timestamp,
    record: &EdgeRecord,
    source: NodeId,
    target: NodeId,
    stats: &mut QueryStats,
) -> Result<()> {
    store
        .add_edge(tx, EdgeSpec::active(source, target, record.kind, branch, at))
        .await?;
    stats.edges_created += 1;
    Ok(())
}
