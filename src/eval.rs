use std::fmt;

use tracing::debug;

use crate::error::{Error, Result};
use crate::model::NodeId;
use crate::store::GraphStore;

/// Operation an edge contributes, chosen by the identity of the node it points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Multiply,
    Divide,
    Subtract,
}

impl Operator {
    /// Ids up to 4 are used as-is, larger ids wrap modulo 4. Whatever is not
    /// 1, 2 or 3 afterwards (4, multiples of 4, and 0) subtracts.
    pub fn for_target(id: NodeId) -> Self {
        let n = if id.0 > 4 { id.0 % 4 } else { id.0 };
        match n {
            1 => Operator::Add,
            2 => Operator::Multiply,
            3 => Operator::Divide,
            _ => Operator::Subtract,
        }
    }

    pub fn apply(self, lhs: f64, rhs: f64) -> Option<f64> {
        match self {
            Operator::Add => Some(lhs + rhs),
            Operator::Multiply => Some(lhs * rhs),
            Operator::Divide if rhs == 0.0 => None,
            Operator::Divide => Some(lhs / rhs),
            Operator::Subtract => Some(lhs - rhs),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Operator::Add => "+",
            Operator::Multiply => "*",
            Operator::Divide => "/",
            Operator::Subtract => "-",
        };
        f.write_str(symbol)
    }
}

/// Sums one contribution per edge, in adjacency order.
///
/// Each edge combines its source and destination node values with the
/// destination's operator. There is no ordering or cycle handling: a node
/// touched by several edges takes part once per edge.
pub fn evaluate(store: &GraphStore) -> Result<f64> {
    let mut result = 0.0;
    for edge in store.edges() {
        let from = store
            .node(edge.start.node)
            .ok_or(Error::UnknownNode(edge.start.node))?;
        let to = store
            .node(edge.end.node)
            .ok_or(Error::UnknownNode(edge.end.node))?;
        let op = Operator::for_target(to.id());
        let term = op.apply(from.value(), to.value()).ok_or(Error::DivideByZero {
            from: from.id(),
            to: to.id(),
        })?;
        debug!(edge = %edge.id, lhs = from.value(), %op, rhs = to.value(), term, "evaluate");
        result += term;
    }
    Ok(result)
}
