use std::f64::consts::PI;

/// Layout constants shared by anchors, hit testing and arrowheads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub node_width: f64,
    pub node_height: f64,
    /// Diameter of a port circle; also the pointer tolerance when hit testing ports.
    pub port_size: f64,
    pub arrow_length: f64,
    /// Angle between the shaft and each barb of the arrowhead.
    pub arrow_span: f64,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            node_width: 100.0,
            node_height: 100.0,
            port_size: 10.0,
            arrow_length: 10.0,
            arrow_span: PI / 3.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditorConfig {
    pub geometry: Geometry,
    /// Oldest commands are dropped once the history grows past this many entries.
    pub history_limit: Option<usize>,
}

impl EditorConfig {
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }
}
