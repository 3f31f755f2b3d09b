//! RSS normalizer: `rss > channel > item` into the canonical model.

use chrono::Utc;
use std::collections::BTreeMap;

use super::date::resolve_rss_date;
use super::xml::Element;
use super::{absolute_url, first_match, insert_article, Rule};
use crate::storage::{Article, Feed};
use crate::util::sanitize_opt;

/// Article link: the item's `<link>`, else a `<guid>` that is itself a URL.
const ARTICLE_LINK_RULES: [Rule<String>; 2] = [link_from_link, link_from_guid];

/// Article id: `<guid>`, else the raw `<link>` text.
const ARTICLE_ID_RULES: [Rule<String>; 2] = [id_from_guid, id_from_link_text];

fn link_from_link(item: &Element) -> Option<String> {
    item.child_text("link").and_then(absolute_url)
}

fn link_from_guid(item: &Element) -> Option<String> {
    item.child_text("guid").and_then(absolute_url)
}

fn id_from_guid(item: &Element) -> Option<String> {
    item.child_text("guid").map(str::to_string)
}

fn id_from_link_text(item: &Element) -> Option<String> {
    item.child_text("link").map(str::to_string)
}

/// Normalize a parsed RSS document fetched from `source_url`.
///
/// A channel `<link>` that parses as a URL becomes both the feed's link and
/// its id; otherwise the source URL is used for both. Items are never
/// dropped for a bad date or URL, only when neither an id nor a link can
/// be resolved.
pub fn normalize_rss(root: &Element, source_url: &str) -> Feed {
    let empty = Element::default();
    let channel = root.child("channel").unwrap_or(&empty);

    let link = channel
        .child_text("link")
        .and_then(absolute_url)
        .unwrap_or_else(|| source_url.to_string());

    let updated = channel
        .child_text("lastBuildDate")
        .or_else(|| channel.child_text("pubDate"))
        .map(resolve_rss_date)
        .unwrap_or_else(Utc::now);

    let mut articles = BTreeMap::new();
    let mut dropped = 0usize;
    for item in channel.children("item") {
        match normalize_item(item) {
            Some(article) => insert_article(&mut articles, article),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        tracing::warn!(
            feed = %source_url,
            dropped = dropped,
            "RSS items without guid or link skipped"
        );
    }

    Feed {
        id: link.clone(),
        title: sanitize_opt(channel.child_text("title")),
        description: sanitize_opt(channel.child_text("description")),
        link,
        updated,
        articles,
    }
}

fn normalize_item(item: &Element) -> Option<Article> {
    let link = first_match(&ARTICLE_LINK_RULES, item);
    let id = first_match(&ARTICLE_ID_RULES, item).or_else(|| link.clone())?;

    // RSS has no separate modification date
    let published = item
        .child_text("pubDate")
        .map(resolve_rss_date)
        .unwrap_or_else(Utc::now);

    Some(Article {
        id,
        title: sanitize_opt(item.child_text("title")),
        link,
        published,
        updated: published,
    })
}
