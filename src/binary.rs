//! Compact binary form: a flat run of tagged records, big-endian, no framing.
//!
//! ```text
//! record := tag:bytes (node | edge)
//! node   := x:f64 y:f64 image:bytes text:bytes counter:u32 id:u32 start:u8 end:u8
//! edge   := x1:f64 y1:f64 x2:f64 y2:f64 endpoint endpoint
//! endpoint := node:u32 on_start:u8 on_end:u8
//! bytes  := len:u32 data[len]
//! ```
//!
//! End of input is the only terminator.

use winnow::binary::{be_f64, be_u32, length_take, u8};
use winnow::prelude::*;

use crate::error::{Error, Result};
use crate::model::{Line, NodeId, Point};
use crate::resolve::{SavedDocument, SavedEdge, SavedEndpoint, SavedNode};

const NODE_TAG: &[u8] = b"node";
const EDGE_TAG: &[u8] = b"edge";

pub fn encode(doc: &SavedDocument) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for node in &doc.nodes {
        put_bytes(&mut out, NODE_TAG, "record tag")?;
        put_point(&mut out, node.position);
        put_bytes(&mut out, &node.image, "node image")?;
        put_bytes(&mut out, node.text.as_bytes(), "node text")?;
        out.extend_from_slice(&node.counter.to_be_bytes());
        out.extend_from_slice(&node.id.0.to_be_bytes());
        out.push(u8::from(node.start_connected));
        out.push(u8::from(node.end_connected));
    }
    for edge in &doc.edges {
        put_bytes(&mut out, EDGE_TAG, "record tag")?;
        put_point(&mut out, edge.line.p1);
        put_point(&mut out, edge.line.p2);
        put_endpoint(&mut out, edge.start);
        put_endpoint(&mut out, edge.end);
    }
    Ok(out)
}

fn put_point(out: &mut Vec<u8>, point: Point) {
    out.extend_from_slice(&point.x.to_be_bytes());
    out.extend_from_slice(&point.y.to_be_bytes());
}

fn put_bytes(out: &mut Vec<u8>, bytes: &[u8], what: &'static str) -> Result<()> {
    let len = u32::try_from(bytes.len()).map_err(|_| Error::Encode {
        what,
        message: format!("{} bytes exceed the 4 GiB field limit", bytes.len()),
    })?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

fn put_endpoint(out: &mut Vec<u8>, endpoint: SavedEndpoint) {
    out.extend_from_slice(&endpoint.node.0.to_be_bytes());
    out.push(u8::from(endpoint.on_start));
    out.push(u8::from(endpoint.on_end));
}

pub fn decode(bytes: &[u8]) -> Result<SavedDocument> {
    let mut input = bytes;
    let mut doc = SavedDocument::default();
    while !input.is_empty() {
        let at = bytes.len() - input.len();
        let tag = record_tag(&mut input).map_err(|_| truncated(at, "record tag"))?;
        match tag {
            NODE_TAG => {
                let node = node_record(&mut input).map_err(|_| truncated(at, "node record"))?;
                doc.nodes.push(node);
            }
            EDGE_TAG => {
                let edge = edge_record(&mut input).map_err(|_| truncated(at, "edge record"))?;
                doc.edges.push(edge);
            }
            other => {
                let shown: String = String::from_utf8_lossy(other).chars().take(32).collect();
                return Err(Error::corrupt(
                    "binary",
                    format!("byte {at}"),
                    format!("unknown record tag `{shown}`"),
                ));
            }
        }
    }
    Ok(doc)
}

fn truncated(at: usize, what: &str) -> Error {
    Error::corrupt("binary", format!("byte {at}"), format!("truncated or malformed {what}"))
}

fn record_tag<'i>(input: &mut &'i [u8]) -> winnow::Result<&'i [u8]> {
    length_take(be_u32).parse_next(input)
}

fn point(input: &mut &[u8]) -> winnow::Result<Point> {
    let x = be_f64.parse_next(input)?;
    let y = be_f64.parse_next(input)?;
    Ok(Point::new(x, y))
}

fn flag(input: &mut &[u8]) -> winnow::Result<bool> {
    u8.map(|b| b != 0).parse_next(input)
}

fn text(input: &mut &[u8]) -> winnow::Result<String> {
    length_take(be_u32)
        .try_map(std::str::from_utf8)
        .map(str::to_owned)
        .parse_next(input)
}

fn node_record(input: &mut &[u8]) -> winnow::Result<SavedNode> {
    let position = point.parse_next(input)?;
    let image = length_take(be_u32).parse_next(input)?.to_vec();
    let text = text.parse_next(input)?;
    let counter = be_u32.parse_next(input)?;
    let id = NodeId(be_u32.parse_next(input)?);
    let start_connected = flag.parse_next(input)?;
    let end_connected = flag.parse_next(input)?;
    Ok(SavedNode {
        position,
        image,
        text,
        counter,
        id,
        start_connected,
        end_connected,
    })
}

fn endpoint(input: &mut &[u8]) -> winnow::Result<SavedEndpoint> {
    let node = NodeId(be_u32.parse_next(input)?);
    let on_start = flag.parse_next(input)?;
    let on_end = flag.parse_next(input)?;
    Ok(SavedEndpoint {
        node,
        on_start,
        on_end,
    })
}

fn edge_record(input: &mut &[u8]) -> winnow::Result<SavedEdge> {
    let p1 = point.parse_next(input)?;
    let p2 = point.parse_next(input)?;
    let start = endpoint.parse_next(input)?;
    let end = endpoint.parse_next(input)?;
    Ok(SavedEdge {
        line: Line::new(p1, p2),
        start,
        end,
    })
}
