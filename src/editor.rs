use std::path::Path;

use tracing::{debug, info};

use crate::Format;
use crate::binary;
use crate::config::EditorConfig;
use crate::connect::{Connection, Finish};
use crate::error::{Error, Result};
use crate::eval;
use crate::history::{Command, CommandStack, Removal, Step};
use crate::model::{EdgeId, Item, Line, Node, NodeId, Point};
use crate::resolve::{self, LoadReport};
use crate::store::GraphStore;
use crate::xml;

/// Notifications for whoever presents the document.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    NodeMoved { id: NodeId, position: Point },
    ResultChanged(f64),
    HistoryChanged { can_undo: bool, can_redo: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Node(NodeId),
    Edge(EdgeId),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Drag {
    node: NodeId,
    before: Point,
    /// Pointer offset from the node's origin at press time.
    grab: Point,
}

/// The editing session: one document, its history and the gesture in progress.
///
/// Every mutation that can be undone goes through here so the store and the
/// command stack never disagree.
#[derive(Debug)]
pub struct Editor {
    config: EditorConfig,
    store: GraphStore,
    history: CommandStack,
    connection: Connection,
    drag: Option<Drag>,
    selection: Option<Selection>,
    events: Vec<Event>,
    availability: (bool, bool),
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl Editor {
    pub fn new(config: EditorConfig) -> Self {
        Self {
            store: GraphStore::new(config.geometry),
            history: CommandStack::new(config.history_limit),
            config,
            connection: Connection::default(),
            drag: None,
            selection: None,
            events: Vec::new(),
            availability: (false, false),
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn history(&self) -> &CommandStack {
        &self.history
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    fn gesture_active(&self) -> bool {
        self.connection.is_drawing() || self.drag.is_some()
    }

    fn record(&mut self, command: Command) {
        self.history.push(command);
        self.notify_history();
    }

    fn notify_history(&mut self) {
        let now = (self.history.can_undo(), self.history.can_redo());
        if now != self.availability {
            self.availability = now;
            self.events.push(Event::HistoryChanged {
                can_undo: now.0,
                can_redo: now.1,
            });
        }
    }

    fn notify_moved(&mut self, id: NodeId) {
        if let Some(node) = self.store.node(id) {
            self.events.push(Event::NodeMoved {
                id,
                position: node.position(),
            });
        }
    }

    /// Places a new node with a fresh identity and records it in the history.
    pub fn create_node(&mut self, image: Vec<u8>, position: Point) -> Result<NodeId> {
        let id = self.store.ids_mut().next_id()?;
        let node = Node::new(id, position, image);
        self.store.add_node(node.clone())?;
        debug!(%id, %position, "node created");
        self.record(Command::add(Item::Node(node)));
        Ok(id)
    }

    /// Press: starts drawing when `point` is over a port.
    pub fn begin_connection(&mut self, point: Point) -> bool {
        if self.drag.is_some() {
            return false;
        }
        self.connection.begin(&mut self.store, point)
    }

    pub fn update_connection(&mut self, point: Point) -> bool {
        self.connection.update(point)
    }

    /// Release: returns the new edge, or `None` when the gesture was rejected.
    pub fn end_connection(&mut self, point: Point) -> Option<EdgeId> {
        let Finish::Committed(id) = self.connection.finish(&mut self.store, point) else {
            return None;
        };
        let edge = self.store.edge(id)?.clone();
        self.record(Command::add(Item::Edge(edge)));
        Some(id)
    }

    pub fn cancel_connection(&mut self) {
        self.connection.cancel(&mut self.store);
    }

    pub fn connection_preview(&self) -> Option<Line> {
        self.connection.preview()
    }

    /// Press on a node body. Locked nodes cannot be picked up.
    pub fn begin_drag(&mut self, point: Point) -> Option<NodeId> {
        if self.gesture_active() {
            return None;
        }
        let node = self.store.node(self.store.node_at(point)?)?;
        if node.is_locked() {
            return None;
        }
        let position = node.position();
        let drag = Drag {
            node: node.id(),
            before: position,
            grab: Point::new(point.x - position.x, point.y - position.y),
        };
        self.drag = Some(drag);
        Some(drag.node)
    }

    /// Moves the dragged node so it stays under the pointer. Attached edges
    /// follow on every step.
    pub fn drag_to(&mut self, point: Point) -> Result<bool> {
        let Some(drag) = self.drag else {
            return Ok(false);
        };
        let position = Point::new(point.x - drag.grab.x, point.y - drag.grab.y);
        let edges = self.store.move_node(drag.node, position)?;
        self.store.reroute(&edges)?;
        self.notify_moved(drag.node);
        Ok(true)
    }

    /// Release: records a single move from the press position to the current one.
    pub fn end_drag(&mut self) -> Option<NodeId> {
        let drag = self.drag.take()?;
        let after = self.store.node(drag.node)?.position();
        if after == drag.before {
            return None;
        }
        self.record(Command::Move {
            node: drag.node,
            before: drag.before,
            after,
        });
        Some(drag.node)
    }

    /// Programmatic move, recorded as one history step. A drag in progress is
    /// committed first so its step stays separate.
    pub fn move_node(&mut self, id: NodeId, position: Point) -> Result<()> {
        self.end_drag();
        let before = self
            .store
            .node(id)
            .ok_or(Error::UnknownNode(id))?
            .position();
        let edges = self.store.move_node(id, position)?;
        self.store.reroute(&edges)?;
        self.notify_moved(id);
        if before != position {
            self.record(Command::Move {
                node: id,
                before,
                after: position,
            });
        }
        Ok(())
    }

    /// Value edits are not part of the history.
    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) -> Result<()> {
        self.store.set_text(id, text)
    }

    pub fn set_value(&mut self, id: NodeId, value: f64) -> Result<()> {
        self.set_text(id, value.to_string())
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn select(&mut self, selection: Selection) -> Result<()> {
        match selection {
            Selection::Node(id) if self.store.node(id).is_none() => return Err(Error::UnknownNode(id)),
            Selection::Edge(id) if self.store.edge(id).is_none() => return Err(Error::UnknownEdge(id)),
            _ => {}
        }
        self.selection = Some(selection);
        Ok(())
    }

    /// Selects whatever is under `point`. Edges are drawn above nodes and win.
    pub fn select_at(&mut self, point: Point) -> Option<Selection> {
        let tolerance = self.config.geometry.port_size / 2.0;
        self.selection = self
            .store
            .edge_at(point, tolerance)
            .map(Selection::Edge)
            .or_else(|| self.store.node_at(point).map(Selection::Node));
        self.selection
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Deletes the selected item, cascading to attached edges for a node.
    /// Returns false when nothing was selected or a gesture is in progress.
    pub fn delete_selected(&mut self) -> Result<bool> {
        if self.gesture_active() {
            return Ok(false);
        }
        let Some(selection) = self.selection.take() else {
            return Ok(false);
        };
        let removal = match selection {
            Selection::Node(id) => Removal::Node(self.store.remove_node(id)?),
            Selection::Edge(id) => {
                let (index, edge) = self.store.remove_edge(id)?;
                Removal::Edge { index, edge }
            }
        };
        self.record(Command::Remove(removal));
        Ok(true)
    }

    /// Ignored while a connection or drag is in progress.
    pub fn undo(&mut self) -> Result<Option<Step>> {
        if self.gesture_active() {
            return Ok(None);
        }
        let step = self.history.undo(&mut self.store)?;
        self.after_step(step.as_ref());
        Ok(step)
    }

    /// Ignored while a connection or drag is in progress.
    pub fn redo(&mut self) -> Result<Option<Step>> {
        if self.gesture_active() {
            return Ok(None);
        }
        let step = self.history.redo(&mut self.store)?;
        self.after_step(step.as_ref());
        Ok(step)
    }

    fn after_step(&mut self, step: Option<&Step>) {
        if let Some(id) = step.and_then(|s| s.moved) {
            self.notify_moved(id);
        }
        let stale = match self.selection {
            Some(Selection::Node(id)) => self.store.node(id).is_none(),
            Some(Selection::Edge(id)) => self.store.edge(id).is_none(),
            None => false,
        };
        if stale {
            self.selection = None;
        }
        self.notify_history();
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_text(&self) -> Option<String> {
        self.history.undo_text()
    }

    pub fn redo_text(&self) -> Option<String> {
        self.history.redo_text()
    }

    pub fn to_bytes(&self, format: Format) -> Result<Vec<u8>> {
        let doc = resolve::capture(&self.store);
        match format {
            Format::Binary => binary::encode(&doc),
            Format::Xml => Ok(xml::encode(&doc)?.into_bytes()),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>, format: Format) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes(format)?;
        std::fs::write(path, &bytes)?;
        info!(
            path = %path.display(),
            ?format,
            nodes = self.store.node_count(),
            edges = self.store.edge_count(),
            "saved"
        );
        Ok(())
    }

    /// Replaces the document with the decoded `bytes`.
    ///
    /// Nothing changes unless decoding succeeds. Repeated node ids and edges
    /// that cannot be resolved are dropped and listed in the report.
    pub fn from_bytes(&mut self, bytes: &[u8], format: Format) -> Result<LoadReport> {
        let doc = match format {
            Format::Binary => binary::decode(bytes)?,
            Format::Xml => {
                let text = std::str::from_utf8(bytes)
                    .map_err(|e| Error::corrupt("xml", "document", e.to_string()))?;
                xml::decode(text)?
            }
        };
        self.reset_session();
        let report = resolve::reconnect(doc, &mut self.store);
        Ok(report)
    }

    pub fn load(&mut self, path: impl AsRef<Path>, format: Format) -> Result<LoadReport> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        self.load_bytes_from(path, &bytes, format)
    }

    /// Like `load`, with the format picked from the file contents.
    pub fn load_auto(&mut self, path: impl AsRef<Path>) -> Result<LoadReport> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let format = Format::detect(&bytes);
        debug!(path = %path.display(), ?format, "detected format");
        self.load_bytes_from(path, &bytes, format)
    }

    fn load_bytes_from(&mut self, path: &Path, bytes: &[u8], format: Format) -> Result<LoadReport> {
        let report = self.from_bytes(bytes, format)?;
        info!(
            path = %path.display(),
            ?format,
            nodes = report.nodes,
            edges = report.edges,
            dropped = report.dropped.len(),
            "loaded"
        );
        Ok(report)
    }

    pub fn evaluate(&mut self) -> Result<f64> {
        let result = eval::evaluate(&self.store)?;
        self.events.push(Event::ResultChanged(result));
        Ok(result)
    }

    fn reset_session(&mut self) {
        self.connection.cancel(&mut self.store);
        self.drag = None;
        self.selection = None;
        self.history.clear();
        self.store.clear();
        self.notify_history();
    }

    /// Empties the document and its history. Identities keep counting up.
    pub fn clear(&mut self) {
        self.reset_session();
        debug!("document cleared");
    }

    /// Like `clear`, but identities start again from 1.
    pub fn new_document(&mut self) {
        self.reset_session();
        self.store.ids_mut().reset();
        debug!("new document");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PortRef, PortRole};
    use pretty_assertions::assert_eq;

    /// Two nodes 300 apart, connected End -> Start.
    fn connected() -> (Editor, NodeId, NodeId, EdgeId) {
        let mut editor = Editor::default();
        let a = editor.create_node(Vec::new(), Point::new(0.0, 0.0)).unwrap();
        let b = editor.create_node(Vec::new(), Point::new(300.0, 0.0)).unwrap();
        assert!(editor.begin_connection(Point::new(100.0, 50.0)));
        let edge = editor.end_connection(Point::new(290.0, 50.0)).unwrap();
        (editor, a, b, edge)
    }

    #[test]
    fn committed_connection_is_undoable() {
        let (mut editor, a, b, edge) = connected();
        assert_eq!(editor.undo_text().as_deref(), Some("connect 1:end -> 2:start"));
        let stored = editor.store().edge(edge).unwrap();
        assert_eq!(stored.start, PortRef::new(a, PortRole::End));
        assert_eq!(stored.end, PortRef::new(b, PortRole::Start));

        editor.undo().unwrap();
        assert_eq!(editor.store().edge_count(), 0);
        editor.redo().unwrap();
        assert_eq!(editor.store().edge(edge).map(|e| e.end), Some(PortRef::new(b, PortRole::Start)));
    }

    #[test]
    fn rejected_connection_leaves_no_history() {
        let mut editor = Editor::default();
        editor.create_node(Vec::new(), Point::new(0.0, 0.0)).unwrap();
        let len = editor.history().len();
        assert!(editor.begin_connection(Point::new(100.0, 50.0)));
        assert_eq!(editor.end_connection(Point::new(-10.0, 50.0)), None);
        assert_eq!(editor.history().len(), len);
        assert_eq!(editor.store().edge_count(), 0);
    }

    #[test]
    fn drag_pushes_one_move_and_keeps_edges_attached() {
        let (mut editor, a, _, edge) = connected();
        editor.drain_events();

        assert_eq!(editor.begin_drag(Point::new(50.0, 50.0)), Some(a));
        editor.drag_to(Point::new(60.0, 80.0)).unwrap();
        editor.drag_to(Point::new(70.0, 150.0)).unwrap();
        assert_eq!(editor.end_drag(), Some(a));

        assert_eq!(editor.store().node(a).unwrap().position(), Point::new(20.0, 100.0));
        assert_eq!(editor.store().edge(edge).unwrap().line.p1, Point::new(120.0, 150.0));
        assert_eq!(editor.undo_text().as_deref(), Some("move node 1"));
        let moves = editor
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, Event::NodeMoved { .. }))
            .count();
        assert_eq!(moves, 2);

        editor.undo().unwrap();
        assert_eq!(editor.store().node(a).unwrap().position(), Point::new(0.0, 0.0));
        assert_eq!(editor.store().edge(edge).unwrap().line.p1, Point::new(100.0, 50.0));
    }

    #[test]
    fn programmatic_move_commits_the_drag_in_progress() {
        let (mut editor, a, _, _) = connected();
        let len = editor.history().len();

        editor.begin_drag(Point::new(50.0, 50.0)).unwrap();
        editor.drag_to(Point::new(60.0, 80.0)).unwrap();
        editor.move_node(a, Point::new(400.0, 400.0)).unwrap();
        assert_eq!(editor.history().len(), len + 2);
        assert!(!editor.drag_to(Point::new(0.0, 0.0)).unwrap(), "drag is over");
        assert_eq!(editor.end_drag(), None);

        editor.undo().unwrap();
        assert_eq!(editor.store().node(a).unwrap().position(), Point::new(10.0, 30.0));
        editor.undo().unwrap();
        assert_eq!(editor.store().node(a).unwrap().position(), Point::new(0.0, 0.0));
    }

    #[test]
    fn zero_distance_drag_records_nothing() {
        let mut editor = Editor::default();
        editor.create_node(Vec::new(), Point::new(0.0, 0.0)).unwrap();
        let len = editor.history().len();
        editor.begin_drag(Point::new(10.0, 10.0)).unwrap();
        assert_eq!(editor.end_drag(), None);
        assert_eq!(editor.history().len(), len);
    }

    #[test]
    fn source_node_cannot_be_dragged_while_drawing() {
        let mut editor = Editor::default();
        editor.create_node(Vec::new(), Point::new(0.0, 0.0)).unwrap();
        editor.begin_connection(Point::new(100.0, 50.0));
        assert_eq!(editor.begin_drag(Point::new(50.0, 50.0)), None);
        assert_eq!(editor.undo().unwrap(), None, "undo is ignored mid-gesture");
        editor.cancel_connection();
        assert!(editor.begin_drag(Point::new(50.0, 50.0)).is_some());
    }

    #[test]
    fn delete_selected_edge_and_undo() {
        let (mut editor, _, _, edge) = connected();
        assert_eq!(editor.select_at(Point::new(200.0, 52.0)), Some(Selection::Edge(edge)));
        assert!(editor.delete_selected().unwrap());
        assert_eq!(editor.store().edge_count(), 0);
        assert_eq!(editor.selection(), None);
        assert!(!editor.delete_selected().unwrap());

        editor.undo().unwrap();
        assert!(editor.store().edge(edge).is_some());
    }

    #[test]
    fn select_rejects_unknown_items() {
        let mut editor = Editor::default();
        assert!(matches!(editor.select(Selection::Node(NodeId(4))), Err(Error::UnknownNode(_))));
        assert!(matches!(editor.select(Selection::Edge(EdgeId(0))), Err(Error::UnknownEdge(_))));
    }

    #[test]
    fn history_availability_is_reported_on_change() {
        let mut editor = Editor::default();
        editor.create_node(Vec::new(), Point::default()).unwrap();
        editor.create_node(Vec::new(), Point::new(200.0, 0.0)).unwrap();
        editor.undo().unwrap();
        editor.undo().unwrap();
        let history: Vec<Event> = editor
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, Event::HistoryChanged { .. }))
            .collect();
        assert_eq!(
            history,
            vec![
                Event::HistoryChanged { can_undo: true, can_redo: false },
                Event::HistoryChanged { can_undo: true, can_redo: true },
                Event::HistoryChanged { can_undo: false, can_redo: true },
            ]
        );
    }

    #[test]
    fn set_value_and_evaluate() {
        let (mut editor, a, b, _) = connected();
        editor.set_value(a, 3.0).unwrap();
        editor.set_text(b, "7").unwrap();
        assert_eq!(editor.evaluate().unwrap(), 21.0);
        assert_eq!(editor.drain_events().last(), Some(&Event::ResultChanged(21.0)));
    }

    #[test]
    fn corrupt_input_leaves_document_untouched() {
        let (mut editor, _, _, _) = connected();
        let before = editor.store().clone();
        assert!(editor.from_bytes(b"\0\0\0\x04no", Format::Binary).is_err());
        assert!(editor.from_bytes(b"<Diagram><Node>", Format::Xml).is_err());
        assert_eq!(editor.store(), &before);
        assert!(editor.can_undo());
    }

    #[test]
    fn clear_keeps_counting_but_new_document_restarts() {
        let mut editor = Editor::default();
        editor.create_node(Vec::new(), Point::default()).unwrap();
        editor.clear();
        assert!(editor.store().is_empty());
        assert!(!editor.can_undo());
        assert_eq!(editor.create_node(Vec::new(), Point::default()).unwrap(), NodeId(2));

        editor.new_document();
        assert_eq!(editor.create_node(Vec::new(), Point::default()).unwrap(), NodeId(1));
    }
}
