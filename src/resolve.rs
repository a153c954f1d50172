//! Bridge between a live `GraphStore` and its persisted shape.
//!
//! Persisted edges carry only `(node id, port flags)` for each end. Loading
//! rebuilds the nodes first and then resolves every edge against them by
//! identity; whatever cannot be resolved is dropped and reported.

use tracing::{debug, warn};

use crate::error::Error;
use crate::model::{Line, Node, NodeId, Point, PortRef, PortRole};
use crate::store::GraphStore;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SavedNode {
    pub position: Point,
    pub image: Vec<u8>,
    pub text: String,
    /// Running id counter at the time of saving.
    pub counter: u32,
    pub id: NodeId,
    pub start_connected: bool,
    pub end_connected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SavedEndpoint {
    pub node: NodeId,
    pub on_start: bool,
    pub on_end: bool,
}

impl SavedEndpoint {
    pub fn new(port: PortRef) -> Self {
        Self {
            node: port.node,
            on_start: port.role == PortRole::Start,
            on_end: port.role == PortRole::End,
        }
    }

    /// End wins when both flags are set; neither flag means the end is unresolvable.
    pub fn role(&self) -> Option<PortRole> {
        if self.on_end {
            Some(PortRole::End)
        } else if self.on_start {
            Some(PortRole::Start)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SavedEdge {
    /// Geometry at save time; ignored on load in favour of live anchors.
    pub line: Line,
    pub start: SavedEndpoint,
    pub end: SavedEndpoint,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SavedDocument {
    pub nodes: Vec<SavedNode>,
    pub edges: Vec<SavedEdge>,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub nodes: usize,
    pub edges: usize,
    /// Nodes with a repeated id and edges that could not be resolved, one error each.
    pub dropped: Vec<Error>,
}

/// Captures the store in document order: nodes bottom to top, then edges.
pub fn capture(store: &GraphStore) -> SavedDocument {
    let counter = store.ids().current();
    let nodes = store
        .nodes()
        .map(|n| SavedNode {
            position: n.position(),
            image: n.image().to_vec(),
            text: n.text().to_string(),
            counter,
            id: n.id(),
            start_connected: n.port(PortRole::Start).connected,
            end_connected: n.port(PortRole::End).connected,
        })
        .collect();
    let edges = store
        .edges()
        .map(|e| SavedEdge {
            line: e.line,
            start: SavedEndpoint::new(e.start),
            end: SavedEndpoint::new(e.end),
        })
        .collect();
    SavedDocument { nodes, edges }
}

/// Replaces the contents of `store` with `doc`.
///
/// The first node with a given id wins; later ones are reported as dropped.
/// The id counter is raised to cover every counter value and identity in the
/// document; it is never lowered.
pub fn reconnect(doc: SavedDocument, store: &mut GraphStore) -> LoadReport {
    store.clear();
    let mut report = LoadReport::default();

    for saved in doc.nodes {
        store.ids_mut().bump_floor(saved.counter.max(saved.id.0));
        let mut node = Node::new(saved.id, saved.position, saved.image);
        node.text = saved.text;
        node.start.connected = saved.start_connected;
        node.end.connected = saved.end_connected;
        if let Err(err) = store.add_node(node) {
            warn!(error = %err, "dropping node");
            report.dropped.push(err);
        }
    }

    for (index, saved) in doc.edges.into_iter().enumerate() {
        let start = resolve_end(store, index, saved.start);
        let end = resolve_end(store, index, saved.end);
        let (start, end) = match (start, end) {
            (Ok(start), Ok(end)) => (start, end),
            (Err(err), _) | (_, Err(err)) => {
                warn!(edge = index, error = %err, "dropping edge");
                report.dropped.push(err);
                continue;
            }
        };
        if let Err(err) = store.add_edge(start, end) {
            warn!(edge = index, error = %err, "dropping edge");
            report.dropped.push(err);
        }
    }

    // Flags follow the resolved edges, not what the file claimed.
    store.refresh_all_ports();
    let ids: Vec<NodeId> = store.nodes().map(Node::id).collect();
    for id in ids {
        // Every edge in the store has live endpoints, so rerouting cannot fail.
        let _ = store.on_node_moved(id);
    }

    report.nodes = store.node_count();
    report.edges = store.edge_count();
    debug!(nodes = report.nodes, edges = report.edges, dropped = report.dropped.len(), "reconnected");
    report
}

fn resolve_end(store: &GraphStore, edge: usize, saved: SavedEndpoint) -> Result<PortRef, Error> {
    match (store.node(saved.node), saved.role()) {
        (Some(_), Some(role)) => Ok(PortRef::new(saved.node, role)),
        _ => Err(Error::DanglingReference {
            edge,
            node: saved.node,
        }),
    }
}
