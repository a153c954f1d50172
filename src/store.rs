use indexmap::IndexMap;

use crate::config::Geometry;
use crate::error::{Error, Result};
use crate::model::{Edge, EdgeId, Line, Node, NodeId, Point, PortRef, PortRole};

/// Process-wide running counter for node identities.
///
/// Identities are never handed out twice: deleting a node does not give its
/// id back, and loading a document raises the counter past every id it saw.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdAllocator {
    current: u32,
}

impl IdAllocator {
    pub fn next_id(&mut self) -> Result<NodeId> {
        self.current = self.current.checked_add(1).ok_or(Error::IdsExhausted)?;
        Ok(NodeId(self.current))
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn bump_floor(&mut self, floor: u32) {
        self.current = self.current.max(floor);
    }

    pub fn reset(&mut self) {
        self.current = 0;
    }
}

/// What `GraphStore::remove_node` took out, with enough positional data to put it back.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedNode {
    pub node: Node,
    pub index: usize,
    /// Cascaded edges in removal order, each with its index at the moment it was removed.
    pub edges: Vec<(usize, Edge)>,
}

/// Live nodes and edges of one document.
///
/// `edges` doubles as the port adjacency: every entry is resolved, and its
/// insertion order is the order evaluation walks.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphStore {
    geometry: Geometry,
    nodes: IndexMap<NodeId, Node>,
    edges: IndexMap<EdgeId, Edge>,
    ids: IdAllocator,
    next_edge: u32,
}

impl GraphStore {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            nodes: IndexMap::new(),
            edges: IndexMap::new(),
            ids: IdAllocator::default(),
            next_edge: 0,
        }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    pub fn ids_mut(&mut self) -> &mut IdAllocator {
        &mut self.ids
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(&id).ok_or(Error::UnknownNode(id))
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    /// Nodes bottom to top.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn add_node(&mut self, node: Node) -> Result<()> {
        self.insert_node(node, None)
    }

    /// Inserts at `index` in z-order, or on top when `None`. An id already in
    /// the document is refused rather than overwritten.
    pub(crate) fn insert_node(&mut self, node: Node, index: Option<usize>) -> Result<()> {
        let id = node.id();
        if self.nodes.contains_key(&id) {
            return Err(Error::DuplicateNode(id));
        }
        match index {
            Some(index) if index <= self.nodes.len() => {
                self.nodes.shift_insert(index, id, node);
            }
            _ => {
                self.nodes.insert(id, node);
            }
        }
        Ok(())
    }

    /// Removes the node together with every edge that touches either of its ports.
    pub fn remove_node(&mut self, id: NodeId) -> Result<RemovedNode> {
        let touching: Vec<EdgeId> = self
            .edges
            .values()
            .filter(|e| e.touches(id))
            .map(|e| e.id)
            .collect();
        let mut edges = Vec::with_capacity(touching.len());
        for edge_id in touching {
            edges.push(self.remove_edge(edge_id)?);
        }
        let (index, _, node) = self
            .nodes
            .shift_remove_full(&id)
            .ok_or(Error::UnknownNode(id))?;
        Ok(RemovedNode { node, index, edges })
    }

    /// Reverses `remove_node`, restoring z-order and edge order exactly.
    pub(crate) fn restore_node(&mut self, removed: RemovedNode) -> Result<()> {
        self.insert_node(removed.node, Some(removed.index))?;
        for (index, edge) in removed.edges.into_iter().rev() {
            self.insert_edge(edge, Some(index))?;
        }
        Ok(())
    }

    fn line_between(&self, start: PortRef, end: PortRef) -> Result<Line> {
        let from = self.node(start.node).ok_or(Error::UnknownNode(start.node))?;
        let to = self.node(end.node).ok_or(Error::UnknownNode(end.node))?;
        Ok(Line::new(
            from.anchor(start.role, &self.geometry),
            to.anchor(end.role, &self.geometry),
        ))
    }

    fn check_connection(&self, start: PortRef, end: PortRef) -> Result<Line> {
        if start.node == end.node {
            return Err(Error::InvalidConnection {
                reason: format!("{start} and {end} belong to the same node"),
            });
        }
        let line = self.line_between(start, end)?;
        if self.edges.values().any(|e| e.start == start && e.end == end) {
            return Err(Error::InvalidConnection {
                reason: format!("{start} is already connected to {end}"),
            });
        }
        Ok(line)
    }

    pub fn add_edge(&mut self, start: PortRef, end: PortRef) -> Result<EdgeId> {
        let line = self.check_connection(start, end)?;
        let id = EdgeId(self.next_edge);
        self.next_edge += 1;
        self.edges.insert(id, Edge { id, start, end, line });
        self.mark_connected(start);
        self.mark_connected(end);
        Ok(id)
    }

    /// Re-establishes a known edge under the id it had before.
    pub(crate) fn insert_edge(&mut self, mut edge: Edge, index: Option<usize>) -> Result<()> {
        edge.line = self.check_connection(edge.start, edge.end)?;
        self.next_edge = self.next_edge.max(edge.id.0 + 1);
        let (start, end) = (edge.start, edge.end);
        match index {
            Some(index) if index <= self.edges.len() => {
                self.edges.shift_insert(index, edge.id, edge);
            }
            _ => {
                self.edges.insert(edge.id, edge);
            }
        }
        self.mark_connected(start);
        self.mark_connected(end);
        Ok(())
    }

    /// Drops the adjacency entry; the nodes on either side stay.
    pub fn remove_edge(&mut self, id: EdgeId) -> Result<(usize, Edge)> {
        let (index, _, edge) = self
            .edges
            .shift_remove_full(&id)
            .ok_or(Error::UnknownEdge(id))?;
        self.refresh_port(edge.start);
        self.refresh_port(edge.end);
        Ok((index, edge))
    }

    fn mark_connected(&mut self, port: PortRef) {
        if let Some(node) = self.nodes.get_mut(&port.node) {
            node.port_mut(port.role).connected = true;
        }
    }

    fn refresh_port(&mut self, port: PortRef) {
        let connected = self
            .edges
            .values()
            .any(|e| e.start == port || e.end == port);
        if let Some(node) = self.nodes.get_mut(&port.node) {
            node.port_mut(port.role).connected = connected;
        }
    }

    pub(crate) fn refresh_all_ports(&mut self) {
        let ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        for id in ids {
            self.refresh_port(PortRef::new(id, PortRole::Start));
            self.refresh_port(PortRef::new(id, PortRole::End));
        }
    }

    /// Places the node and reports the edges that now need rerouting.
    ///
    /// Geometry is not updated here; pass the result to `reroute`, or call
    /// `on_node_moved`.
    pub fn move_node(&mut self, id: NodeId, position: Point) -> Result<Vec<EdgeId>> {
        let node = self.node_mut(id)?;
        if node.locked {
            return Err(Error::NodeLocked(id));
        }
        node.position = position;
        Ok(self.edges_of(id))
    }

    pub fn edges_of(&self, id: NodeId) -> Vec<EdgeId> {
        self.edges
            .values()
            .filter(|e| e.touches(id))
            .map(|e| e.id)
            .collect()
    }

    pub fn reroute(&mut self, edges: &[EdgeId]) -> Result<()> {
        for &id in edges {
            let edge = self.edges.get(&id).ok_or(Error::UnknownEdge(id))?;
            let line = self.line_between(edge.start, edge.end)?;
            if let Some(edge) = self.edges.get_mut(&id) {
                edge.line = line;
            }
        }
        Ok(())
    }

    pub fn on_node_moved(&mut self, id: NodeId) -> Result<Vec<EdgeId>> {
        let edges = self.edges_of(id);
        self.reroute(&edges)?;
        Ok(edges)
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) -> Result<()> {
        self.node_mut(id)?.text = text.into();
        Ok(())
    }

    pub(crate) fn set_locked(&mut self, id: NodeId, locked: bool) -> Result<()> {
        self.node_mut(id)?.locked = locked;
        Ok(())
    }

    /// Ports under `point`, topmost node first.
    pub fn ports_at(&self, point: Point) -> Vec<PortRef> {
        self.nodes
            .values()
            .rev()
            .filter_map(|n| n.port_at(point, &self.geometry).map(|role| PortRef::new(n.id(), role)))
            .collect()
    }

    pub fn node_at(&self, point: Point) -> Option<NodeId> {
        self.nodes
            .values()
            .rev()
            .find(|n| n.contains(point, &self.geometry))
            .map(Node::id)
    }

    /// Most recently added edge passing within `tolerance` of `point`.
    pub fn edge_at(&self, point: Point, tolerance: f64) -> Option<EdgeId> {
        self.edges
            .values()
            .rev()
            .find(|e| e.line.distance_to(point) <= tolerance)
            .map(|e| e.id)
    }

    /// Empties the document. The id counter is kept; see `IdAllocator::reset`.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
    }
}
