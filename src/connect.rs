use tracing::debug;

use crate::model::{EdgeId, Line, Point, PortRef};
use crate::store::GraphStore;

/// A rubber-band edge that has a source port but no destination yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Pending {
    pub source: PortRef,
    pub origin: Point,
    pub cursor: Point,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Finish {
    Committed(EdgeId),
    /// Released over empty space, over the source node, or onto an existing connection.
    Rejected,
    /// Release without a preceding press on a port.
    NotDrawing,
}

/// Pointer-driven connection drawing: `Idle` until a press lands on a port.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Connection {
    #[default]
    Idle,
    Drawing(Pending),
}

impl Connection {
    pub fn is_drawing(&self) -> bool {
        matches!(self, Connection::Drawing(_))
    }

    pub fn pending(&self) -> Option<&Pending> {
        match self {
            Connection::Drawing(pending) => Some(pending),
            Connection::Idle => None,
        }
    }

    pub fn preview(&self) -> Option<Line> {
        self.pending().map(|p| Line::new(p.origin, p.cursor))
    }

    /// Starts drawing when `point` is over a port. The owning node is locked
    /// in place until the gesture ends.
    pub fn begin(&mut self, store: &mut GraphStore, point: Point) -> bool {
        if self.is_drawing() {
            return false;
        }
        let Some(source) = store.ports_at(point).into_iter().next() else {
            return false;
        };
        let Some(origin) = store
            .node(source.node)
            .map(|n| n.anchor(source.role, store.geometry()))
        else {
            return false;
        };
        if store.set_locked(source.node, true).is_err() {
            return false;
        }
        debug!(%source, "begin connection");
        *self = Connection::Drawing(Pending {
            source,
            origin,
            cursor: point,
        });
        true
    }

    pub fn update(&mut self, point: Point) -> bool {
        match self {
            Connection::Drawing(pending) => {
                pending.cursor = point;
                true
            }
            Connection::Idle => false,
        }
    }

    /// Ends the gesture, attaching to the topmost port under `point` that
    /// belongs to another node.
    pub fn finish(&mut self, store: &mut GraphStore, point: Point) -> Finish {
        let Connection::Drawing(pending) = std::mem::take(self) else {
            return Finish::NotDrawing;
        };
        let source = pending.source;
        // The source node exists: it was locked when drawing began.
        let _ = store.set_locked(source.node, false);

        let Some(target) = store
            .ports_at(point)
            .into_iter()
            .find(|port| port.node != source.node)
        else {
            debug!(%source, %point, "connection dropped: no target port");
            return Finish::Rejected;
        };
        match store.add_edge(source, target) {
            Ok(id) => {
                debug!(%source, %target, "connection committed");
                Finish::Committed(id)
            }
            Err(err) => {
                debug!(%source, %target, error = %err, "connection rejected");
                Finish::Rejected
            }
        }
    }

    /// Abandons the gesture, leaving the store as it was before `begin`.
    pub fn cancel(&mut self, store: &mut GraphStore) {
        if let Connection::Drawing(pending) = std::mem::take(self) {
            let _ = store.set_locked(pending.source.node, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Geometry;
    use crate::model::{Node, NodeId, PortRole};

    fn two_nodes() -> (GraphStore, NodeId, NodeId) {
        let mut store = GraphStore::new(Geometry::default());
        let a = store.ids_mut().next_id().unwrap();
        store.add_node(Node::new(a, Point::new(0.0, 0.0), Vec::new())).unwrap();
        let b = store.ids_mut().next_id().unwrap();
        store.add_node(Node::new(b, Point::new(300.0, 0.0), Vec::new())).unwrap();
        (store, a, b)
    }

    #[test]
    fn press_outside_ports_stays_idle() {
        let (mut store, _, _) = two_nodes();
        let mut conn = Connection::default();
        assert!(!conn.begin(&mut store, Point::new(50.0, 50.0)));
        assert!(!conn.is_drawing());
        assert!(!conn.update(Point::new(60.0, 60.0)));
    }

    #[test]
    fn drawing_locks_source_and_tracks_pointer() {
        let (mut store, a, _) = two_nodes();
        let mut conn = Connection::default();
        assert!(conn.begin(&mut store, Point::new(101.0, 50.0)));
        assert!(store.node(a).unwrap().is_locked());

        conn.update(Point::new(200.0, 80.0));
        assert_eq!(
            conn.preview(),
            Some(Line::new(Point::new(100.0, 50.0), Point::new(200.0, 80.0)))
        );
    }

    #[test]
    fn release_on_other_port_commits() {
        let (mut store, a, b) = two_nodes();
        let mut conn = Connection::default();
        conn.begin(&mut store, Point::new(100.0, 50.0));
        let Finish::Committed(id) = conn.finish(&mut store, Point::new(291.0, 50.0)) else {
            panic!("expected a committed edge");
        };
        let edge = store.edge(id).unwrap();
        assert_eq!(edge.start, PortRef::new(a, PortRole::End));
        assert_eq!(edge.end, PortRef::new(b, PortRole::Start));
        assert!(!store.node(a).unwrap().is_locked());
        assert!(!conn.is_drawing());
    }

    #[test]
    fn release_over_empty_space_or_source_is_rejected() {
        let (mut store, a, _) = two_nodes();
        let before = store.clone();
        let mut conn = Connection::default();

        conn.begin(&mut store, Point::new(100.0, 50.0));
        assert_eq!(conn.finish(&mut store, Point::new(200.0, 200.0)), Finish::Rejected);
        assert_eq!(store, before);

        conn.begin(&mut store, Point::new(100.0, 50.0));
        assert_eq!(conn.finish(&mut store, Point::new(-10.0, 50.0)), Finish::Rejected);
        assert_eq!(store, before);
        assert!(!store.node(a).unwrap().is_locked());
    }

    #[test]
    fn release_without_press_is_not_drawing() {
        let (mut store, _, _) = two_nodes();
        let mut conn = Connection::default();
        assert_eq!(conn.finish(&mut store, Point::new(0.0, 0.0)), Finish::NotDrawing);
    }

    #[test]
    fn cancel_unlocks_source() {
        let (mut store, a, _) = two_nodes();
        let mut conn = Connection::default();
        conn.begin(&mut store, Point::new(-10.0, 50.0));
        conn.cancel(&mut store);
        assert!(!store.node(a).unwrap().is_locked());
        assert_eq!(conn, Connection::Idle);
    }
}
