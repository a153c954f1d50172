//! Tagged-text form: one `<Node>` element per node, then one `<Edge>` per
//! edge, under a single `<Diagram>` root. Unknown elements and attributes
//! are skipped so newer files still load.

use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::error::{Error, Result};
use crate::model::{Line, NodeId, Point};
use crate::resolve::{SavedDocument, SavedEdge, SavedEndpoint, SavedNode};

const ROOT: &str = "Diagram";

/// Fails when a node's text holds a character XML 1.0 cannot carry.
pub fn encode(doc: &SavedDocument) -> Result<String> {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(&format!("<{ROOT}>\n"));
    for node in &doc.nodes {
        out.push_str("  <Node>\n");
        let p = node.position;
        out.push_str(&format!("    <Position>{},{}</Position>\n", p.x, p.y));
        out.push_str(&format!("    <Image>{}</Image>\n", STANDARD.encode(&node.image)));
        out.push_str(&format!("    <Text>{}</Text>\n", escape_xml(&node.text)?));
        out.push_str(&format!("    <Counter>{}</Counter>\n", node.counter));
        out.push_str(&format!("    <Id>{}</Id>\n", node.id));
        out.push_str(&format!("    <StartConnected>{}</StartConnected>\n", u8::from(node.start_connected)));
        out.push_str(&format!("    <EndConnected>{}</EndConnected>\n", u8::from(node.end_connected)));
        out.push_str("  </Node>\n");
    }
    for edge in &doc.edges {
        out.push_str("  <Edge>\n");
        let Line { p1, p2 } = edge.line;
        out.push_str(&format!("    <Line>{},{},{},{}</Line>\n", p1.x, p1.y, p2.x, p2.y));
        write_endpoint(&mut out, "From", edge.start);
        write_endpoint(&mut out, "To", edge.end);
        out.push_str("  </Edge>\n");
    }
    out.push_str(&format!("</{ROOT}>\n"));
    Ok(out)
}

fn write_endpoint(out: &mut String, tag: &str, endpoint: SavedEndpoint) {
    out.push_str(&format!(
        "    <{tag} node=\"{}\" start=\"{}\" end=\"{}\"/>\n",
        endpoint.node,
        u8::from(endpoint.on_start),
        u8::from(endpoint.on_end)
    ));
}

/// The `Char` production of XML 1.0.
fn is_xml_char(ch: char) -> bool {
    matches!(ch, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

fn escape_xml(text: &str) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '\r' => out.push_str("&#13;"),
            _ if !is_xml_char(ch) => {
                return Err(Error::Encode {
                    what: "node text",
                    message: format!("U+{:04X} is not allowed in XML", u32::from(ch)),
                });
            }
            _ => out.push(ch),
        }
    }
    Ok(out)
}

pub fn decode(text: &str) -> Result<SavedDocument> {
    let xml = roxmltree::Document::parse(text)
        .map_err(|e| Error::corrupt("xml", "document", e.to_string()))?;
    let root = xml.root_element();
    if root.tag_name().name() != ROOT {
        return Err(Error::corrupt(
            "xml",
            "document",
            format!("expected a <{ROOT}> root, found <{}>", root.tag_name().name()),
        ));
    }

    let mut doc = SavedDocument::default();
    for element in root.children().filter(|n| n.is_element()) {
        match element.tag_name().name() {
            "Node" => {
                let at = format!("node #{}", doc.nodes.len() + 1);
                doc.nodes.push(read_node(element, &at)?);
            }
            "Edge" => {
                let at = format!("edge #{}", doc.edges.len() + 1);
                doc.edges.push(read_edge(element, &at)?);
            }
            _ => {}
        }
    }
    Ok(doc)
}

fn read_node(element: roxmltree::Node<'_, '_>, at: &str) -> Result<SavedNode> {
    let mut node = SavedNode::default();
    let mut id = None;
    for field in element.children().filter(|n| n.is_element()) {
        let value = field.text().unwrap_or("");
        match field.tag_name().name() {
            "Position" => {
                let [x, y] = numbers::<2>(value, at, "Position")?;
                node.position = Point::new(x, y);
            }
            "Image" => {
                node.image = STANDARD
                    .decode(value.trim())
                    .map_err(|e| Error::corrupt("xml", at, format!("Image: {e}")))?;
            }
            "Text" => node.text = value.to_string(),
            "Counter" => node.counter = number(value, at, "Counter")?,
            "Id" => id = Some(NodeId(number(value, at, "Id")?)),
            "StartConnected" => node.start_connected = flag(value, at, "StartConnected")?,
            "EndConnected" => node.end_connected = flag(value, at, "EndConnected")?,
            _ => {}
        }
    }
    node.id = id.ok_or_else(|| Error::corrupt("xml", at, "missing <Id>"))?;
    Ok(node)
}

fn read_edge(element: roxmltree::Node<'_, '_>, at: &str) -> Result<SavedEdge> {
    let mut edge = SavedEdge::default();
    let (mut start, mut end) = (None, None);
    for field in element.children().filter(|n| n.is_element()) {
        match field.tag_name().name() {
            "Line" => {
                let [x1, y1, x2, y2] = numbers::<4>(field.text().unwrap_or(""), at, "Line")?;
                edge.line = Line::new(Point::new(x1, y1), Point::new(x2, y2));
            }
            "From" => start = Some(read_endpoint(field, at, "From")?),
            "To" => end = Some(read_endpoint(field, at, "To")?),
            _ => {}
        }
    }
    edge.start = start.ok_or_else(|| Error::corrupt("xml", at, "missing <From>"))?;
    edge.end = end.ok_or_else(|| Error::corrupt("xml", at, "missing <To>"))?;
    Ok(edge)
}

fn read_endpoint(element: roxmltree::Node<'_, '_>, at: &str, tag: &str) -> Result<SavedEndpoint> {
    let node = element
        .attribute("node")
        .ok_or_else(|| Error::corrupt("xml", at, format!("<{tag}> has no node attribute")))?;
    let on = |name: &str| -> Result<bool> {
        element
            .attribute(name)
            .map_or(Ok(false), |v| flag(v, at, &format!("{tag}@{name}")))
    };
    Ok(SavedEndpoint {
        node: NodeId(number(node, at, &format!("{tag}@node"))?),
        on_start: on("start")?,
        on_end: on("end")?,
    })
}

fn number<T: FromStr>(value: &str, at: &str, field: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::corrupt("xml", at, format!("{field}: `{value}` is not a number")))
}

fn numbers<const N: usize>(value: &str, at: &str, field: &str) -> Result<[f64; N]> {
    let parts: Vec<&str> = value.split(',').collect();
    if parts.len() != N {
        return Err(Error::corrupt(
            "xml",
            at,
            format!("{field}: expected {N} comma-separated numbers, found `{value}`"),
        ));
    }
    let mut out = [0.0; N];
    for (slot, part) in out.iter_mut().zip(parts) {
        *slot = number(part, at, field)?;
    }
    Ok(out)
}

fn flag(value: &str, at: &str, field: &str) -> Result<bool> {
    match value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => number::<i64>(other, at, field).map(|n| n != 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> SavedDocument {
        SavedDocument {
            nodes: vec![
                SavedNode {
                    position: Point::new(0.1, -40.0),
                    image: vec![0x89, b'P', b'N', b'G', 0, 255],
                    text: "a < b & \"c\"".into(),
                    counter: 2,
                    id: NodeId(1),
                    start_connected: false,
                    end_connected: true,
                },
                SavedNode {
                    position: Point::new(100.0, 0.0),
                    image: Vec::new(),
                    text: String::new(),
                    counter: 2,
                    id: NodeId(2),
                    start_connected: true,
                    end_connected: false,
                },
            ],
            edges: vec![SavedEdge {
                line: Line::new(Point::new(100.0, 50.0), Point::new(90.0, 50.0)),
                start: SavedEndpoint {
                    node: NodeId(1),
                    on_start: false,
                    on_end: true,
                },
                end: SavedEndpoint {
                    node: NodeId(2),
                    on_start: true,
                    on_end: false,
                },
            }],
        }
    }

    #[test]
    fn decode_reads_back_encoded_document() {
        let doc = sample();
        assert_eq!(decode(&encode(&doc).unwrap()).unwrap(), doc);
    }

    #[test]
    fn encoded_layout() {
        let doc = SavedDocument {
            nodes: vec![SavedNode {
                position: Point::new(1.5, 2.0),
                image: b"png".to_vec(),
                text: "7".into(),
                counter: 1,
                id: NodeId(1),
                start_connected: false,
                end_connected: false,
            }],
            edges: vec![],
        };
        let expected = "\
<?xml version=\"1.0\" encoding=\"UTF-8\"?>
<Diagram>
  <Node>
    <Position>1.5,2</Position>
    <Image>cG5n</Image>
    <Text>7</Text>
    <Counter>1</Counter>
    <Id>1</Id>
    <StartConnected>0</StartConnected>
    <EndConnected>0</EndConnected>
  </Node>
</Diagram>
";
        assert_eq!(encode(&doc).unwrap(), expected);
    }

    #[test]
    fn text_outside_the_xml_charset_is_refused() {
        for text in ["a\u{1}b", "\u{0}", "tail\u{FFFF}", "\u{1B}[0m"] {
            let mut doc = sample();
            doc.nodes[1].text = text.to_string();
            let err = encode(&doc).unwrap_err();
            assert!(matches!(err, Error::Encode { what: "node text", .. }), "{text:?}: {err}");
        }

        let mut doc = sample();
        doc.nodes[1].text = "tab\there\r\nline 🌊 \u{E000}".to_string();
        assert_eq!(decode(&encode(&doc).unwrap()).unwrap(), doc);
    }

    #[test]
    fn unknown_elements_and_attributes_are_ignored() {
        let input = r#"<Diagram version="2">
            <Legend>ignored</Legend>
            <Node colour="red"><Id>4</Id><Shape>round</Shape><Text>5</Text></Node>
            <Edge><Weight>3</Weight><From node="4" end="1" extra="x"/><To node="9" start="1"/></Edge>
        </Diagram>"#;
        let doc = decode(input).unwrap();
        assert_eq!(doc.nodes.len(), 1);
        assert_eq!(doc.nodes[0].id, NodeId(4));
        assert_eq!(doc.nodes[0].text, "5");
        assert_eq!(doc.nodes[0].position, Point::default());
        assert_eq!(doc.edges[0].start, SavedEndpoint { node: NodeId(4), on_start: false, on_end: true });
        assert_eq!(doc.edges[0].end.node, NodeId(9));
    }

    #[test]
    fn malformed_input_is_corrupt() {
        let cases = [
            "<Diagram><Node>",
            "<Scene/>",
            "<Diagram><Node><Text>x</Text></Node></Diagram>",
            "<Diagram><Node><Id>one</Id></Node></Diagram>",
            "<Diagram><Node><Id>1</Id><Position>1</Position></Node></Diagram>",
            "<Diagram><Node><Id>1</Id><Image>!!</Image></Node></Diagram>",
            "<Diagram><Edge><From node=\"1\"/></Edge></Diagram>",
        ];
        for input in cases {
            let err = decode(input).unwrap_err();
            assert!(matches!(err, Error::CorruptFile { format: "xml", .. }), "{input}: {err}");
        }
    }

    #[test]
    fn error_names_the_offending_element() {
        let input = "<Diagram><Node><Id>1</Id></Node><Node><Id>2</Id><Counter>-3</Counter></Node></Diagram>";
        let err = decode(input).unwrap_err().to_string();
        assert!(err.contains("node #2"), "{err}");
        assert!(err.contains("Counter"), "{err}");
    }
}
