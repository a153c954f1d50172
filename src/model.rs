use std::fmt;

use crate::config::Geometry;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn offset(self, dx: f64, dy: f64) -> Point {
        Point::new(self.x + dx, self.y + dy)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A straight segment; edges are always drawn from `p1` to `p2` with the arrowhead at `p2`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Line {
    pub p1: Point,
    pub p2: Point,
}

impl Line {
    pub const fn new(p1: Point, p2: Point) -> Self {
        Self { p1, p2 }
    }

    /// Tip followed by the two barbs.
    pub fn arrow_head(&self, geometry: &Geometry) -> [Point; 3] {
        let angle = (-(self.p2.y - self.p1.y)).atan2(self.p2.x - self.p1.x);
        let len = geometry.arrow_length;
        let span = geometry.arrow_span;
        let barb = |theta: f64| {
            Point::new(
                self.p2.x - theta.sin() * len,
                self.p2.y - theta.cos() * len,
            )
        };
        [
            self.p2,
            barb(angle + span),
            barb(angle + std::f64::consts::PI - span),
        ]
    }

    pub fn distance_to(&self, point: Point) -> f64 {
        let dx = self.p2.x - self.p1.x;
        let dy = self.p2.y - self.p1.y;
        let len_sq = dx * dx + dy * dy;
        if len_sq == 0.0 {
            return self.p1.distance(point);
        }
        let t = (((point.x - self.p1.x) * dx + (point.y - self.p1.y) * dy) / len_sq).clamp(0.0, 1.0);
        Point::new(self.p1.x + t * dx, self.p1.y + t * dy).distance(point)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub u32);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortRole {
    Start,
    End,
}

impl fmt::Display for PortRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortRole::Start => f.write_str("start"),
            PortRole::End => f.write_str("end"),
        }
    }
}

/// One side of an edge, by identity rather than by reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortRef {
    pub node: NodeId,
    pub role: PortRole,
}

impl PortRef {
    pub const fn new(node: NodeId, role: PortRole) -> Self {
        Self { node, role }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.role)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Port {
    pub owner: NodeId,
    pub role: PortRole,
    /// Set while at least one edge terminates here.
    pub connected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: NodeId,
    pub(crate) position: Point,
    pub(crate) text: String,
    pub(crate) image: Vec<u8>,
    pub(crate) start: Port,
    pub(crate) end: Port,
    pub(crate) locked: bool,
}

impl Node {
    pub fn new(id: NodeId, position: Point, image: Vec<u8>) -> Self {
        Self {
            id,
            position,
            text: String::new(),
            image,
            start: Port {
                owner: id,
                role: PortRole::Start,
                connected: false,
            },
            end: Port {
                owner: id,
                role: PortRole::End,
                connected: false,
            },
            locked: false,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The label stays hidden until a value has been assigned.
    pub fn is_text_visible(&self) -> bool {
        !self.text.is_empty()
    }

    /// Numeric reading of the label; anything unparseable counts as zero.
    pub fn value(&self) -> f64 {
        self.text.trim().parse().unwrap_or(0.0)
    }

    pub fn image(&self) -> &[u8] {
        &self.image
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn port(&self, role: PortRole) -> &Port {
        match role {
            PortRole::Start => &self.start,
            PortRole::End => &self.end,
        }
    }

    pub(crate) fn port_mut(&mut self, role: PortRole) -> &mut Port {
        match role {
            PortRole::Start => &mut self.start,
            PortRole::End => &mut self.end,
        }
    }

    /// Start sits just left of the box, End on its right edge, both at mid height.
    pub fn anchor(&self, role: PortRole, geometry: &Geometry) -> Point {
        let mid = self.position.y + geometry.node_height / 2.0;
        match role {
            PortRole::Start => Point::new(self.position.x - geometry.port_size, mid),
            PortRole::End => Point::new(self.position.x + geometry.node_width, mid),
        }
    }

    pub fn port_at(&self, point: Point, geometry: &Geometry) -> Option<PortRole> {
        [PortRole::End, PortRole::Start]
            .into_iter()
            .find(|&role| self.anchor(role, geometry).distance(point) < geometry.port_size)
    }

    pub fn contains(&self, point: Point, geometry: &Geometry) -> bool {
        let p = self.position;
        point.x >= p.x
            && point.x < p.x + geometry.node_width
            && point.y >= p.y
            && point.y < p.y + geometry.node_height
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    pub start: PortRef,
    pub end: PortRef,
    pub line: Line,
}

impl Edge {
    pub fn touches(&self, node: NodeId) -> bool {
        self.start.node == node || self.end.node == node
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Node(Node),
    Edge(Edge),
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Item::Node(node) => write!(f, "node {}", node.id()),
            Item::Edge(edge) => write!(f, "edge {} -> {}", edge.start, edge.end),
        }
    }
}
