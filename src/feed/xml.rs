use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// Maximum element nesting depth accepted from a feed document.
/// Real feeds are a handful of levels deep; this bounds memory and recursion.
const MAX_DEPTH: usize = 256;

/// Errors that can occur while reading a feed document into an element tree.
#[derive(Debug, Error)]
pub enum XmlError {
    /// The underlying XML reader rejected the document.
    #[error("XML syntax error at byte {position}: {message}")]
    Syntax { position: u64, message: String },

    /// The document contained no element at all.
    #[error("Document has no root element")]
    NoRoot,

    /// The document ended before the root element was closed.
    #[error("Unexpected end of document inside <{0}>")]
    Unclosed(String),

    /// Element nesting exceeded [`MAX_DEPTH`].
    #[error("XML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),
}

/// An owned XML element: the parsed form every normalizer reads from.
///
/// Names are local names with any namespace prefix split off into
/// `prefix`. Text and CDATA directly inside the element are concatenated
/// into `text`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub prefix: Option<String>,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    /// Value of the attribute with the given local name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First child in this element's namespace with the given local name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children
            .iter()
            .find(|c| c.prefix == self.prefix && c.name == name)
    }

    /// All children sharing this element's namespace prefix with the given
    /// local name, in document order.
    ///
    /// Extension elements (`<atom:link>` or `<dc:date>` inside an RSS
    /// channel) never stand in for the host format's own elements, while a
    /// fully prefixed `<atom:feed>` still finds its `<atom:entry>` children.
    pub fn children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children
            .iter()
            .filter(move |c| c.prefix == self.prefix && c.name == name)
    }

    /// Trimmed text of the first `name` child, `None` when missing or blank.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(Element::trimmed_text)
    }

    /// Trimmed text of this element, `None` when blank.
    pub fn trimmed_text(&self) -> Option<&str> {
        let text = self.text.trim();
        (!text.is_empty()).then_some(text)
    }

    /// Text of this element followed by the text of all descendants.
    ///
    /// Used for Atom `type="xhtml"` constructs, whose content is markup
    /// rather than a text node.
    pub fn deep_text(&self) -> String {
        let mut out = self.text.clone();
        for child in &self.children {
            let inner = child.deep_text();
            if !inner.is_empty() {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(&inner);
            }
        }
        out
    }
}

/// Parse a raw document into its root [`Element`].
///
/// Processing instructions, comments and the doctype are skipped. Anything
/// after the root element closes is ignored.
pub fn parse_document(bytes: &[u8]) -> Result<Element, XmlError> {
    // quick-xml (0.37) does not expand <!ENTITY> declarations: only the five
    // XML builtins and numeric references are resolved during unescape.
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Element> = Vec::new();
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| XmlError::Syntax {
            position: reader.error_position() as u64,
            message: e.to_string(),
        })?;

        match event {
            Event::Start(e) => {
                if stack.len() >= MAX_DEPTH {
                    return Err(XmlError::MaxDepthExceeded(MAX_DEPTH));
                }
                stack.push(open_element(&e, &reader));
            }
            Event::Empty(e) => {
                let element = open_element(&e, &reader);
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => return Ok(element),
                }
            }
            Event::End(_) => {
                // quick-xml verifies that end names match their start tags
                let Some(element) = stack.pop() else {
                    continue;
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => return Ok(element),
                }
            }
            Event::Text(e) => {
                if let Some(current) = stack.last_mut() {
                    // HTML entities such as &nbsp; are not XML builtins; keep them raw
                    match e.unescape() {
                        Ok(text) => current.text.push_str(&text),
                        Err(_) => current.text.push_str(&decode_lossy(&reader, &e)),
                    }
                }
            }
            Event::CData(e) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&decode_lossy(&reader, &e));
                }
            }
            Event::Eof => {
                return Err(match stack.pop() {
                    Some(open) => XmlError::Unclosed(open.name),
                    None => XmlError::NoRoot,
                });
            }
            _ => {}
        }
        buf.clear();
    }
}

/// Decode raw content in the document's declared encoding, replacing what cannot be decoded.
fn decode_lossy(reader: &Reader<&[u8]>, raw: &[u8]) -> String {
    match reader.decoder().decode(raw) {
        Ok(text) => text.into_owned(),
        Err(_) => String::from_utf8_lossy(raw).into_owned(),
    }
}

fn open_element(start: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Element {
    let name = start.name();
    let local = String::from_utf8_lossy(name.local_name().as_ref()).into_owned();
    let prefix = name
        .prefix()
        .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned());

    let mut attributes = Vec::new();
    for attr_result in start.attributes() {
        let attr = match attr_result {
            Ok(attr) => attr,
            Err(e) => {
                tracing::debug!(element = %local, error = %e, "Skipping malformed attribute");
                continue;
            }
        };
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = match attr.decode_and_unescape_value(reader.decoder()) {
            Ok(v) => v.into_owned(),
            Err(_) => decode_lossy(reader, &attr.value),
        };
        attributes.push((key, value));
    }

    Element {
        name: local,
        prefix,
        attributes,
        text: String::new(),
        children: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_nested_elements() {
        let doc = br#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Hello</title><item><guid>1</guid></item></channel></rss>"#;
        let root = parse_document(doc).unwrap();

        assert_eq!(root.name, "rss");
        assert_eq!(root.attr("version"), Some("2.0"));
        let channel = root.child("channel").unwrap();
        assert_eq!(channel.child_text("title"), Some("Hello"));
        assert_eq!(channel.children("item").count(), 1);
    }

    #[test]
    fn test_namespace_prefix_is_split_off() {
        let doc = br#"<rss xmlns:atom="http://www.w3.org/2005/Atom"><channel>
<atom:link href="https://example.com/feed" rel="self"/>
<link>https://example.com/</link>
</channel></rss>"#;
        let root = parse_document(doc).unwrap();
        let channel = root.child("channel").unwrap();

        // Only the channel's own <link> is visible through child lookup
        let links: Vec<_> = channel.children("link").collect();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].trimmed_text(), Some("https://example.com/"));

        let atom = channel.children.iter().find(|c| c.prefix.is_some()).unwrap();
        assert_eq!(atom.prefix.as_deref(), Some("atom"));
        assert_eq!(atom.attr("rel"), Some("self"));
    }

    #[test]
    fn test_prefixed_root_finds_prefixed_children() {
        let doc = br#"<a:feed xmlns:a="http://www.w3.org/2005/Atom"><a:id>urn:x</a:id></a:feed>"#;
        let root = parse_document(doc).unwrap();
        assert_eq!(root.name, "feed");
        assert_eq!(root.child_text("id"), Some("urn:x"));
    }

    #[test]
    fn test_cdata_and_entities() {
        let doc = br#"<feed><title><![CDATA[Tom & Jerry]]></title><subtitle>a &amp; b</subtitle></feed>"#;
        let root = parse_document(doc).unwrap();
        assert_eq!(root.child_text("title"), Some("Tom & Jerry"));
        assert_eq!(root.child_text("subtitle"), Some("a & b"));
    }

    #[test]
    fn test_unknown_entity_kept_raw() {
        let doc = b"<rss><channel><title>a&nbsp;b</title></channel></rss>";
        let root = parse_document(doc).unwrap();
        let title = root.child("channel").unwrap().child_text("title").unwrap();
        assert!(title.contains("nbsp"));
    }

    /// Lookup results borrow from the tree only, never from the name.
    fn lookup<'e>(root: &'e Element, name: &str) -> Option<&'e str> {
        root.child_text(name)
    }

    #[test]
    fn test_child_lookup_outlives_name() {
        let root = parse_document(b"<feed><id>urn:y</id></feed>").unwrap();
        let found = {
            let name = String::from("id");
            lookup(&root, &name)
        };
        assert_eq!(found, Some("urn:y"));
        assert_eq!(root.child(&String::from("id")).map(|c| c.name.as_str()), Some("id"));
    }

    #[test]
    fn test_declared_single_byte_encoding_is_decoded() {
        // "Café" and "naïve" in windows-1252: é = 0xE9, ï = 0xEF
        let doc = b"<?xml version=\"1.0\" encoding=\"windows-1252\"?>\
<rss><channel><title>Caf\xe9</title><description><![CDATA[na\xefve]]></description></channel></rss>";
        let root = parse_document(doc).unwrap();
        let channel = root.child("channel").unwrap();
        assert_eq!(channel.child_text("title"), Some("Caf\u{e9}"));
        assert_eq!(channel.child_text("description"), Some("na\u{ef}ve"));
    }

    #[test]
    fn test_undeclared_encoding_defaults_to_utf8() {
        let root = parse_document("<feed><title>Caf\u{e9}</title></feed>".as_bytes()).unwrap();
        assert_eq!(root.child_text("title"), Some("Caf\u{e9}"));
    }

    #[test]
    fn test_blank_child_text_is_none() {
        let root = parse_document(b"<feed><id>   </id></feed>").unwrap();
        assert_eq!(root.child_text("id"), None);
        assert_eq!(root.child_text("missing"), None);
    }

    #[test]
    fn test_deep_text_flattens_markup() {
        let doc = br#"<title type="xhtml"><div>Bold <b>move</b></div></title>"#;
        let root = parse_document(doc).unwrap();
        assert_eq!(root.deep_text().split_whitespace().collect::<Vec<_>>(), ["Bold", "move"]);
    }

    #[test]
    fn test_self_closing_root() {
        let root = parse_document(b"<feed/>").unwrap();
        assert_eq!(root.name, "feed");
        assert!(root.children.is_empty());
    }

    #[test]
    fn test_empty_document_has_no_root() {
        assert!(matches!(parse_document(b"  \n"), Err(XmlError::NoRoot)));
    }

    #[test]
    fn test_truncated_document_is_error() {
        let result = parse_document(b"<rss><channel><title>x</title>");
        assert!(result.is_err());
    }

    #[test]
    fn test_mismatched_end_tag_is_error() {
        let result = parse_document(b"<rss><channel></item></rss>");
        assert!(matches!(result, Err(XmlError::Syntax { .. })));
    }

    #[test]
    fn test_depth_limit() {
        let mut doc = String::new();
        for _ in 0..(MAX_DEPTH + 1) {
            doc.push_str("<a>");
        }
        let result = parse_document(doc.as_bytes());
        assert!(matches!(result, Err(XmlError::MaxDepthExceeded(_))));
    }
}
