//! Atom normalizer: `feed > entry` (RFC 4287) into the canonical model.

use chrono::Utc;
use std::collections::BTreeMap;
use url::Url;

use super::date::resolve_atom_date;
use super::xml::Element;
use super::insert_article;
use crate::storage::{Article, Feed};
use crate::util::sanitize_opt;

/// Picks one `<link>` out of an entry.
type LinkRule = for<'a> fn(&'a Element) -> Option<&'a Element>;

/// Entry link: `rel="alternate"` first, else the only link there is.
const ENTRY_LINK_RULES: [LinkRule; 2] = [alternate_link, sole_link];

fn alternate_link(entry: &Element) -> Option<&Element> {
    entry.children("link").find(|l| is_rel(l, "alternate"))
}

fn sole_link(entry: &Element) -> Option<&Element> {
    let mut links = entry.children("link");
    match (links.next(), links.next()) {
        (Some(only), None) => Some(only),
        _ => None,
    }
}

/// A missing `rel` attribute means `alternate` (RFC 4287 §4.2.7.2).
fn is_rel(link: &Element, rel: &str) -> bool {
    link.attr("rel").map(str::trim).unwrap_or("alternate") == rel
}

/// Resolve a link's `href`, relative references against `base`.
fn resolve_href(link: &Element, base: Option<&Url>) -> Option<String> {
    let href = link.attr("href")?.trim();
    if href.is_empty() {
        return None;
    }
    match Url::parse(href) {
        Ok(url) => Some(url.to_string()),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            base.and_then(|b| b.join(href).ok()).map(|u| u.to_string())
        }
        Err(_) => None,
    }
}

/// Text of an Atom text construct; `type="xhtml"` content is markup.
fn text_construct(parent: &Element, name: &str) -> Option<String> {
    let element = parent.child(name)?;
    if element.attr("type") == Some("xhtml") {
        sanitize_opt(Some(&element.deep_text()))
    } else {
        sanitize_opt(element.trimmed_text())
    }
}

/// Normalize a parsed Atom document fetched from `source_url`.
///
/// The feed link is the `rel="self"` link when present, else the source
/// URL. A missing `<id>` yields an empty feed id rather than an error.
pub fn normalize_atom(root: &Element, source_url: &str) -> Feed {
    let base = Url::parse(source_url).ok();

    let link = root
        .children("link")
        .find(|l| is_rel(l, "self"))
        .and_then(|l| resolve_href(l, base.as_ref()))
        .unwrap_or_else(|| source_url.to_string());

    let id = root.child_text("id").unwrap_or_default().to_string();
    if id.is_empty() {
        tracing::warn!(
            feed = %source_url,
            "Atom feed has no <id>; it will be stored under an empty id"
        );
    }

    let updated = root
        .child_text("updated")
        .map(resolve_atom_date)
        .unwrap_or_else(Utc::now);

    let mut articles = BTreeMap::new();
    let mut dropped = 0usize;
    for entry in root.children("entry") {
        match normalize_entry(entry, base.as_ref()) {
            Some(article) => insert_article(&mut articles, article),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        tracing::warn!(
            feed = %source_url,
            dropped = dropped,
            "Atom entries without id or link skipped"
        );
    }

    Feed {
        id,
        title: text_construct(root, "title"),
        description: text_construct(root, "subtitle"),
        link,
        updated,
        articles,
    }
}

fn normalize_entry(entry: &Element, base: Option<&Url>) -> Option<Article> {
    let link = ENTRY_LINK_RULES
        .iter()
        .find_map(|rule| rule(entry))
        .and_then(|l| resolve_href(l, base));
    let id = entry
        .child_text("id")
        .map(str::to_string)
        .or_else(|| link.clone())?;

    let published_raw = entry.child_text("published");
    let updated_raw = entry.child_text("updated");

    let published = published_raw
        .or(updated_raw)
        .map(resolve_atom_date)
        .unwrap_or_else(Utc::now);
    let updated = match (published_raw, updated_raw) {
        (Some(_), Some(raw)) => resolve_atom_date(raw),
        _ => published,
    };

    Some(Article {
        id,
        title: text_construct(entry, "title"),
        link,
        published,
        updated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::xml::parse_document;
    use chrono::{DateTime, TimeZone};
    use pretty_assertions::assert_eq;

    const SOURCE: &str = "https://example.org/atom.xml";

    fn normalize(doc: &str) -> Feed {
        normalize_atom(&parse_document(doc.as_bytes()).unwrap(), SOURCE)
    }

    fn entry_feed(entry_body: &str) -> Feed {
        normalize(&format!(
            r#"<feed xmlns="http://www.w3.org/2005/Atom"><id>urn:feed</id><entry>{entry_body}</entry></feed>"#
        ))
    }

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2003, 12, day, 18, 30, 2).unwrap()
    }

    #[test]
    fn test_full_feed() {
        let feed = normalize(
            r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="html">Example &lt;i&gt;Feed&lt;/i&gt;</title>
  <subtitle>A subtitle.</subtitle>
  <link href="https://example.org/" rel="alternate"/>
  <link href="https://example.org/feed.atom" rel="self"/>
  <id>urn:uuid:60a76c80-d399-11d9-b91C-0003939e0af6</id>
  <updated>2003-12-13T18:30:02Z</updated>
  <entry>
    <title>Atom-Powered Robots Run Amok</title>
    <link href="https://example.org/2003/12/13/atom03"/>
    <id>urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6a</id>
    <published>2003-12-10T18:30:02Z</published>
    <updated>2003-12-13T18:30:02Z</updated>
  </entry>
</feed>"#,
        );

        assert_eq!(feed.id, "urn:uuid:60a76c80-d399-11d9-b91C-0003939e0af6");
        assert_eq!(feed.link, "https://example.org/feed.atom");
        assert_eq!(feed.title.as_deref(), Some("Example Feed"));
        assert_eq!(feed.description.as_deref(), Some("A subtitle."));
        assert_eq!(feed.updated, ts(13));

        let article = &feed.articles["urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6a"];
        assert_eq!(article.title.as_deref(), Some("Atom-Powered Robots Run Amok"));
        assert_eq!(article.link.as_deref(), Some("https://example.org/2003/12/13/atom03"));
        assert_eq!(article.published, ts(10));
        assert_eq!(article.updated, ts(13));
    }

    #[test]
    fn test_feed_link_without_self_falls_back_to_source() {
        let feed = normalize(
            r#"<feed><id>x</id><link rel="alternate" href="https://example.org/"/></feed>"#,
        );
        assert_eq!(feed.link, SOURCE);

        let feed = normalize(r#"<feed><id>x</id></feed>"#);
        assert_eq!(feed.link, SOURCE);
    }

    #[test]
    fn test_missing_feed_id_is_empty() {
        let feed = normalize(r#"<feed><title>No id</title></feed>"#);
        assert_eq!(feed.id, "");
    }

    #[test]
    fn test_entry_prefers_alternate_link() {
        let feed = entry_feed(
            r#"<id>e1</id>
<link rel="self" href="https://example.org/A"/>
<link rel="alternate" href="https://example.org/B"/>"#,
        );
        assert_eq!(feed.articles["e1"].link.as_deref(), Some("https://example.org/B"));
    }

    #[test]
    fn test_entry_single_link_used_regardless_of_rel() {
        let feed = entry_feed(r#"<id>e1</id><link rel="enclosure" href="https://example.org/a.mp3"/>"#);
        assert_eq!(feed.articles["e1"].link.as_deref(), Some("https://example.org/a.mp3"));
    }

    #[test]
    fn test_entry_several_links_none_alternate_is_unset() {
        let feed = entry_feed(
            r#"<id>e1</id>
<link rel="self" href="https://example.org/A"/>
<link rel="edit" href="https://example.org/B"/>"#,
        );
        assert_eq!(feed.articles["e1"].link, None);
    }

    #[test]
    fn test_entry_relative_href_resolved_against_source() {
        let feed = entry_feed(r#"<id>e1</id><link href="/posts/1"/>"#);
        assert_eq!(feed.articles["e1"].link.as_deref(), Some("https://example.org/posts/1"));
    }

    #[test]
    fn test_entry_without_id_uses_link() {
        let feed = entry_feed(r#"<link href="https://example.org/p"/><title>x</title>"#);
        assert!(feed.articles.contains_key("https://example.org/p"));
    }

    #[test]
    fn test_entry_without_id_or_link_is_dropped() {
        let feed = entry_feed(r#"<title>Nothing to key on</title>"#);
        assert!(feed.articles.is_empty());
    }

    #[test]
    fn test_entry_published_falls_back_to_updated() {
        let feed = entry_feed(r#"<id>e1</id><updated>2003-12-13T18:30:02Z</updated>"#);
        let article = &feed.articles["e1"];
        assert_eq!(article.published, ts(13));
        assert_eq!(article.updated, ts(13));
    }

    #[test]
    fn test_entry_updated_mirrors_published() {
        let feed = entry_feed(r#"<id>e1</id><published>2003-12-10T18:30:02Z</published>"#);
        let article = &feed.articles["e1"];
        assert_eq!(article.published, ts(10));
        assert_eq!(article.updated, ts(10));
    }

    #[test]
    fn test_entry_without_dates_is_now() {
        let before = Utc::now();
        let feed = entry_feed(r#"<id>e1</id>"#);
        let article = &feed.articles["e1"];
        assert!(article.published >= before && article.published <= Utc::now());
        assert_eq!(article.updated, article.published);
    }

    #[test]
    fn test_xhtml_title() {
        let feed = entry_feed(
            r#"<id>e1</id><title type="xhtml"><div xmlns="http://www.w3.org/1999/xhtml">Less: <em>&lt;</em></div></title>"#,
        );
        assert!(feed.articles["e1"].title.as_deref().unwrap().starts_with("Less:"));
    }
}
