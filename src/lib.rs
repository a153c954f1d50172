pub mod binary;
pub mod config;
pub mod connect;
pub mod editor;
pub mod error;
pub mod eval;
pub mod history;
pub mod model;
pub mod resolve;
pub mod store;
pub mod summary;
pub mod xml;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub use config::{EditorConfig, Geometry};
pub use editor::{Editor, Event, Selection};
pub use error::{Error, Result};
pub use model::{EdgeId, Line, NodeId, Point, PortRef, PortRole};
pub use resolve::LoadReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Binary,
    Xml,
}

impl Format {
    /// Tagged text starts with `<` once leading whitespace is skipped; a
    /// binary document starts with a length prefix and never does.
    pub fn detect(bytes: &[u8]) -> Self {
        match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'<') => Format::Xml,
            _ => Format::Binary,
        }
    }

    /// `.xml` means tagged text; anything else is binary.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("xml") => Format::Xml,
            _ => Format::Binary,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Binary => f.write_str("binary"),
            Format::Xml => f.write_str("xml"),
        }
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binary" | "bin" => Ok(Format::Binary),
            "xml" => Ok(Format::Xml),
            other => Err(format!("unknown format: {other} (expected binary or xml)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_looks_past_leading_whitespace() {
        assert_eq!(Format::detect(b"  \n<?xml version=\"1.0\"?>"), Format::Xml);
        assert_eq!(Format::detect(b"<Diagram/>"), Format::Xml);
        assert_eq!(Format::detect(b"\0\0\0\x04node"), Format::Binary);
        assert_eq!(Format::detect(b""), Format::Binary);
    }

    #[test]
    fn format_from_path_extension() {
        assert_eq!(Format::from_path(Path::new("plant.XML")), Format::Xml);
        assert_eq!(Format::from_path(Path::new("plant.fcd")), Format::Binary);
        assert_eq!(Format::from_path(Path::new("plant")), Format::Binary);
    }

    #[test]
    fn format_parses_from_flag_value() {
        assert_eq!("XML".parse::<Format>(), Ok(Format::Xml));
        assert_eq!("bin".parse::<Format>(), Ok(Format::Binary));
        let err = "svg".parse::<Format>().unwrap_err();
        assert!(err.contains("unknown format: svg"), "got: {err}");
    }
}
