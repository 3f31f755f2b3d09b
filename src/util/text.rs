use std::borrow::Cow;

/// Reduce feed-supplied text to safe plain text for title/description fields.
///
/// - Markup tags (`<b>`, `<script>…`) are removed; the contents of
///   `<script>` and `<style>` are dropped entirely
/// - Common HTML entities left behind by double-escaping feeds are decoded
/// - Control characters and terminal escape sequences are stripped
/// - Runs of whitespace collapse to a single space, ends are trimmed
///
/// Total and side-effect free: any input yields some (possibly empty) string.
pub fn sanitize(raw: &str) -> String {
    let without_tags = strip_tags(raw);
    let decoded = decode_entities(&without_tags);
    let clean = strip_control_chars(&decoded);
    clean.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Sanitize optional text, mapping a blank result to `None`.
pub fn sanitize_opt(raw: Option<&str>) -> Option<String> {
    raw.map(sanitize).filter(|s| !s.is_empty())
}

/// Remove `<...>` tags. Text inside `<script>` and `<style>` is removed too.
fn strip_tags(s: &str) -> Cow<'_, str> {
    if !s.contains('<') {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        let after = &rest[open..];
        let Some(close) = after.find('>') else {
            // Unterminated '<' is literal text, not a tag
            out.push_str(after);
            return Cow::Owned(out);
        };
        let tag = &after[1..close];
        rest = &after[close + 1..];

        let tag_name: String = tag
            .trim_start_matches('/')
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        if !tag.starts_with('/') && (tag_name == "script" || tag_name == "style") {
            let closing = format!("</{tag_name}");
            match find_ascii_case_insensitive(rest, &closing) {
                Some(end) => {
                    rest = &rest[end..];
                    rest = match rest.find('>') {
                        Some(gt) => &rest[gt + 1..],
                        None => "",
                    };
                }
                None => rest = "",
            }
        }
        // Tags separate words: "<p>a</p><p>b</p>" must not become "ab"
        out.push(' ');
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .to_ascii_lowercase()
        .find(&needle.to_ascii_lowercase())
}

/// Decode the handful of HTML entities that survive XML unescaping.
fn decode_entities(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp..];
        let entity_end = after.find(';').filter(|&end| end <= 10);
        let decoded = entity_end.and_then(|end| decode_entity(&after[1..end]));
        match (decoded, entity_end) {
            (Some(c), Some(end)) => {
                out.push(c);
                rest = &after[end + 1..];
            }
            _ => {
                out.push('&');
                rest = &after[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code);
    }
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "hellip" => '\u{2026}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201C}',
        "rdquo" => '\u{201D}',
        _ => return None,
    })
}

/// Strip terminal control characters and ANSI escape sequences from text.
///
/// Strips:
/// - ASCII control chars: 0x00-0x08, 0x0B-0x0C, 0x0E-0x1F, 0x7F
/// - ANSI CSI sequences: `\x1b[` ... (terminal byte 0x40-0x7E)
/// - ANSI OSC sequences: `\x1b]` ... (until BEL 0x07 or ST `\x1b\\`)
/// - Bare ESC (0x1b) not followed by `[` or `]`
///
/// Preserves: tab (0x09), newline (0x0A), carriage return (0x0D).
///
/// Returns `Cow::Borrowed` when the input contains no control characters (common case).
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let bytes = s.as_bytes();
    let len = bytes.len();

    let is_control = |b: u8| b == 0x1b || b == 0x7f || (b < 0x20 && b != 0x09 && b != 0x0a && b != 0x0d);

    if !bytes.iter().any(|&b| is_control(b)) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(len);
    let mut i = 0;

    while i < len {
        let b = bytes[i];

        if b == 0x1b && i + 1 < len && bytes[i + 1] == b'[' {
            // CSI: parameter/intermediate bytes until a final byte
            i += 2;
            while i < len {
                let c = bytes[i];
                i += 1;
                if (0x40..=0x7e).contains(&c) {
                    break;
                }
            }
        } else if b == 0x1b && i + 1 < len && bytes[i + 1] == b']' {
            // OSC: everything until BEL or ST
            i += 2;
            while i < len {
                if bytes[i] == 0x07 {
                    i += 1;
                    break;
                }
                if bytes[i] == 0x1b && i + 1 < len && bytes[i + 1] == b'\\' {
                    i += 2;
                    break;
                }
                i += 1;
            }
        } else if is_control(b) {
            i += 1;
        } else {
            let start = i;
            i += 1;
            while i < len && !is_control(bytes[i]) {
                i += 1;
            }
            // SAFETY: we only break on ASCII control bytes, which cannot appear
            // mid-codepoint in valid UTF-8, so s[start..i] is valid UTF-8.
            out.push_str(&s[start..i]);
        }
    }

    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_plain_text_unchanged() {
        assert_eq!(sanitize("Hello, world"), "Hello, world");
    }

    #[test]
    fn test_sanitize_strips_tags() {
        assert_eq!(sanitize("<p>Hello <b>bold</b> world</p>"), "Hello bold world");
        assert_eq!(sanitize("<p>one</p><p>two</p>"), "one two");
    }

    #[test]
    fn test_sanitize_drops_script_and_style_bodies() {
        let input = "Safe<script type=\"text/javascript\">alert('x')</script> text<STYLE>p{}</STYLE>!";
        assert_eq!(sanitize(input), "Safe text !");
    }

    #[test]
    fn test_sanitize_decodes_entities() {
        assert_eq!(sanitize("Tom &amp; Jerry&nbsp;&#8212; &#x41;"), "Tom & Jerry \u{2014} A");
        assert_eq!(sanitize("a &bogus; b"), "a &bogus; b");
        assert_eq!(sanitize("AT&T"), "AT&T");
    }

    #[test]
    fn test_sanitize_unterminated_tag_is_text() {
        assert_eq!(sanitize("1 < 2"), "1 < 2");
    }

    #[test]
    fn test_sanitize_collapses_whitespace() {
        assert_eq!(sanitize("  spread\n\tout   text "), "spread out text");
    }

    #[test]
    fn test_sanitize_opt_blank_is_none() {
        assert_eq!(sanitize_opt(Some("<br/>")), None);
        assert_eq!(sanitize_opt(None), None);
        assert_eq!(sanitize_opt(Some(" x ")), Some("x".to_string()));
    }

    #[test]
    fn test_strip_clean_text_returns_borrowed() {
        let input = "Hello, world! This is clean text.";
        let result = strip_control_chars(input);
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result, input);
    }

    #[test]
    fn test_strip_control_chars_removes_controls() {
        let input = "he\x00ll\x07o\x08 w\x0bor\x0cld\x01!";
        assert_eq!(strip_control_chars(input), "hello world!");
    }

    #[test]
    fn test_strip_ansi_and_osc() {
        assert_eq!(strip_control_chars("\x1b[31mRed\x1b[0m"), "Red");
        assert_eq!(strip_control_chars("\x1b]0;title\x07safe"), "safe");
        assert_eq!(strip_control_chars("\x1b]0;title\x1b\\safe"), "safe");
        assert_eq!(strip_control_chars("before\x1bafter"), "beforeafter");
    }

    #[test]
    fn test_strip_unicode_preserved() {
        assert_eq!(strip_control_chars("日本語 \x1b[31m赤い\x1b[0m"), "日本語 赤い");
    }
}
