//! Date resolution for the two feed formats.
//!
//! RSS dates are nominally RFC 822 but feeds deviate freely, so they are
//! tried against an ordered list of layouts. Atom dates are RFC 3339.
//! Both profiles fall back to the current time rather than failing: one
//! bad timestamp never costs the rest of the feed.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};

/// How the trailing zone field of an RSS date is written.
#[derive(Debug, Clone, Copy)]
enum ZoneStyle {
    /// Alphabetic zone name: `GMT`, `EST`, `Z`
    Name,
    /// Numeric offset: `+0000`, `-0500`
    Offset,
}

/// One accepted RSS date layout (after the weekday prefix is stripped).
#[derive(Debug, Clone, Copy)]
struct RssLayout {
    /// chrono format for the `day month year time` part
    format: &'static str,
    /// Exact width of the year field; chrono's `%Y` would also accept `06`
    year_digits: usize,
    zone: ZoneStyle,
}

/// Tried in order; the first layout that parses wins.
const RSS_LAYOUTS: [RssLayout; 4] = [
    RssLayout {
        format: "%d %b %Y %H:%M:%S",
        year_digits: 4,
        zone: ZoneStyle::Name,
    },
    RssLayout {
        format: "%d %b %Y %H:%M:%S",
        year_digits: 4,
        zone: ZoneStyle::Offset,
    },
    RssLayout {
        format: "%d %b %y %H:%M:%S",
        year_digits: 2,
        zone: ZoneStyle::Name,
    },
    RssLayout {
        format: "%d %b %y %H:%M:%S",
        year_digits: 2,
        zone: ZoneStyle::Offset,
    },
];

impl RssLayout {
    fn parse(&self, raw: &str) -> Option<DateTime<Utc>> {
        let fields: Vec<&str> = raw.split_whitespace().collect();
        let [day, month, year, time, zone] = fields.as_slice() else {
            return None;
        };
        if year.len() != self.year_digits || !year.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let stamp = format!("{day} {month} {year} {time}");
        let naive = NaiveDateTime::parse_from_str(&stamp, self.format).ok()?;
        let offset = match self.zone {
            ZoneStyle::Name => zone_name_offset(zone)?,
            ZoneStyle::Offset => zone_numeric_offset(zone)?,
        };

        offset
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Offset for an alphabetic zone name.
///
/// The RFC 822 names map to their offsets; any other alphabetic name is
/// taken as UTC. Returns `None` when the field is not a name at all.
fn zone_name_offset(zone: &str) -> Option<FixedOffset> {
    if zone.is_empty() || !zone.bytes().all(|b| b.is_ascii_alphabetic()) {
        return None;
    }
    let hours = match zone.to_ascii_uppercase().as_str() {
        "EDT" => -4,
        "EST" | "CDT" => -5,
        "CST" | "MDT" => -6,
        "MST" | "PDT" => -7,
        "PST" => -8,
        _ => 0,
    };
    FixedOffset::east_opt(hours * 3600)
}

/// Offset for a `+hhmm` / `-hhmm` field.
fn zone_numeric_offset(zone: &str) -> Option<FixedOffset> {
    let (sign, digits) = match zone.as_bytes().first()? {
        b'+' => (1, &zone[1..]),
        b'-' => (-1, &zone[1..]),
        _ => return None,
    };
    let digits = digits.replace(':', "");
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Drop everything up to and including the first comma (`Mon, `).
fn strip_weekday(raw: &str) -> &str {
    match raw.find(',') {
        Some(comma) => raw[comma + 1..].trim(),
        None => raw.trim(),
    }
}

/// Parse an RSS date, `None` when no accepted layout matches.
pub fn parse_rss_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = strip_weekday(raw);
    RSS_LAYOUTS.iter().find_map(|layout| layout.parse(raw))
}

/// Parse an Atom (RFC 3339) date, `None` when malformed.
pub fn parse_atom_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Resolve an RSS date string, falling back to now.
///
/// An empty string is "no date" and returns now without a warning; an
/// unparseable one is logged.
pub fn resolve_rss_date(raw: &str) -> DateTime<Utc> {
    resolve_or_now(raw, parse_rss_date)
}

/// Resolve an Atom date string, falling back to now.
pub fn resolve_atom_date(raw: &str) -> DateTime<Utc> {
    resolve_or_now(raw, parse_atom_date)
}

fn resolve_or_now(raw: &str, parse: fn(&str) -> Option<DateTime<Utc>>) -> DateTime<Utc> {
    if raw.trim().is_empty() {
        return Utc::now();
    }
    parse(raw).unwrap_or_else(|| {
        tracing::warn!(date = %raw, "Failed to parse date, using current time");
        Utc::now()
    })
}
