use unicode_width::UnicodeWidthStr;

use crate::eval::Operator;
use crate::store::GraphStore;

pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

fn pad(s: &str, width: usize) -> String {
    let fill = width.saturating_sub(display_width(s));
    format!("{s}{}", " ".repeat(fill))
}

/// Lays rows out as left-aligned columns separated by two spaces.
/// Trailing whitespace is trimmed from every line.
fn table(rows: &[Vec<String>]) -> String {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = (0..columns)
        .map(|c| {
            rows.iter()
                .filter_map(|r| r.get(c))
                .map(|cell| display_width(cell))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    for row in rows {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| pad(cell, w))
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    }
    out
}

/// Plain-text listing of a document: one row per node, one per edge.
pub fn render(store: &GraphStore) -> String {
    let mut out = String::new();
    out.push_str(&format!("{} nodes, {} edges\n", store.node_count(), store.edge_count()));

    if store.node_count() > 0 {
        let mut rows = vec![vec![
            "id".to_string(),
            "position".to_string(),
            "value".to_string(),
            "image".to_string(),
        ]];
        for node in store.nodes() {
            let value = if node.is_text_visible() {
                node.text().replace(['\n', '\r'], " ")
            } else {
                "-".to_string()
            };
            rows.push(vec![
                node.id().to_string(),
                node.position().to_string(),
                value,
                format!("{} B", node.image().len()),
            ]);
        }
        out.push('\n');
        out.push_str(&table(&rows));
    }

    if store.edge_count() > 0 {
        let mut rows = vec![vec!["edge".to_string(), "from".to_string(), "to".to_string(), "op".to_string()]];
        for edge in store.edges() {
            rows.push(vec![
                edge.id.to_string(),
                edge.start.to_string(),
                edge.end.to_string(),
                Operator::for_target(edge.end.node).to_string(),
            ]);
        }
        out.push('\n');
        out.push_str(&table(&rows));
    }
    out
}
