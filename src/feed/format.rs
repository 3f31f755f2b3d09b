use std::fmt;

use super::xml::Element;

/// The syndication format of a parsed document, decided by its root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedFormat {
    /// `<rss>` root: RSS 0.9x / 2.0
    Rss,
    /// `<feed>` root: Atom (RFC 4287)
    Atom,
    /// Anything else; carries the root element's local name for logging
    Unknown(String),
}

impl FeedFormat {
    /// Classify a document by its root element's local name.
    pub fn detect(root: &Element) -> Self {
        match root.name.as_str() {
            "rss" => FeedFormat::Rss,
            "feed" => FeedFormat::Atom,
            other => FeedFormat::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for FeedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedFormat::Rss => f.write_str("RSS"),
            FeedFormat::Atom => f.write_str("Atom"),
            FeedFormat::Unknown(root) => write!(f, "unknown (<{root}>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::xml::parse_document;

    fn detect(doc: &str) -> FeedFormat {
        FeedFormat::detect(&parse_document(doc.as_bytes()).unwrap())
    }

    #[test]
    fn test_detect_rss() {
        assert_eq!(detect(r#"<?xml version="1.0"?><rss version="2.0"><channel/></rss>"#), FeedFormat::Rss);
    }

    #[test]
    fn test_detect_atom_with_namespace() {
        assert_eq!(
            detect(r#"<feed xmlns="http://www.w3.org/2005/Atom"><id>x</id></feed>"#),
            FeedFormat::Atom
        );
    }

    #[test]
    fn test_detect_unknown_root() {
        let format = detect(r#"<opml version="2.0"><body/></opml>"#);
        assert_eq!(format, FeedFormat::Unknown("opml".into()));
        assert_eq!(format.to_string(), "unknown (<opml>)");
    }

    #[test]
    fn test_detect_skips_prolog_and_comments() {
        let doc = "<?xml version=\"1.0\"?>\n<!-- generated -->\n<?xml-stylesheet href=\"s.xsl\"?>\n<rss/>";
        assert_eq!(detect(doc), FeedFormat::Rss);
    }
}
