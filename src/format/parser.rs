//! TXT and M3U dialect parsing (spec §4.E).
//!
//! Grounded on `backend/utils/parser.py::Parser.get_channel_data` (TXT
//! category-stack handling, category-clean regex) and the teacher's
//! `ingestor/m3u_parser.rs` (`parse_extinf_line`/`parse_attributes`) for the
//! hand-rolled quote-aware EXTINF attribute tokenizer.

use std::sync::LazyLock;

use regex::Regex;

use super::ChannelEvent;
use crate::errors::ParseError;

/// Mirrors the Python original's character class literally: it is not a
/// literal-string match on `"#genre#"`, but a class over the individual
/// characters `, # g e n r` plus whitespace and several emoji/CJK-symbol
/// Unicode ranges. A run of any of these collapses to a single space.
static CATEGORY_CLEAN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"[,#genr\s\u{1F000}-\u{1FFFF}\u{2500}-\u{2BEF}\u{2E00}-\u{2E7F}\u{3000}-\u{3300}]+",
    )
    .unwrap()
});

fn clean_category(line: &str) -> String {
    CATEGORY_CLEAN_PATTERN
        .replace_all(line, " ")
        .trim()
        .to_string()
}

/// Parses the TXT live-source dialect: blank lines and `#`-comments are
/// skipped; a line ending in `#genre#` opens a new category; subsequent
/// `name,url` lines belong to it until the next category header.
pub fn parse_txt(text: &str) -> Result<Vec<ChannelEvent>, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::EmptyPayload);
    }

    let mut events = Vec::new();
    let mut category: Option<String> = None;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || (line.starts_with('#') && !line.ends_with("#genre#")) {
            continue;
        }

        if line.ends_with("#genre#") {
            let cleaned = clean_category(line);
            category = if cleaned.is_empty() { None } else { Some(cleaned) };
            continue;
        }

        let Some(cat) = &category else { continue };
        let Some((name, url)) = line.split_once(',') else {
            continue;
        };
        let (name, url) = (name.trim(), url.trim());
        if url.is_empty() {
            continue;
        }
        events.push(ChannelEvent::new(cat.clone(), name, url));
    }

    Ok(events)
}

/// Parses the M3U dialect. `#EXTM3U`'s own attributes are ignored;
/// `#EXTINF` attributes are captured via a quote-aware tokenizer (ported
/// from the teacher's `parse_attributes`); the next non-tag `http(s)` line
/// is the URL — and if several URL lines follow one `#EXTINF` tag, each
/// produces its own event against the same attributes.
pub fn parse_m3u(text: &str) -> Result<Vec<ChannelEvent>, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::EmptyPayload);
    }

    let mut events = Vec::new();
    let mut current: Option<(String, Option<String>, Option<String>, Option<String>)> = None;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with("#EXTM3U") {
            continue;
        }

        if let Some(rest) = line.strip_prefix("#EXTINF:") {
            let Some(comma_pos) = rest.rfind(',') else {
                current = None;
                continue;
            };
            let attrs_part = &rest[..comma_pos];
            let display_name = rest[comma_pos + 1..].trim().replace("频道", "");

            let mut tvg_id = None;
            let mut tvg_logo = None;
            let mut group_title = None;
            for (key, value) in parse_extinf_attributes(attrs_part) {
                match key.as_str() {
                    "tvg-id" => tvg_id = Some(value),
                    "tvg-logo" => tvg_logo = Some(value),
                    "group-title" => group_title = Some(value),
                    _ => {}
                }
            }
            current = Some((display_name, tvg_id, tvg_logo, group_title));
            continue;
        }

        if line.starts_with('#') {
            continue;
        }

        if line.starts_with("http:") || line.starts_with("https:") {
            if let Some((name, id, logo, group)) = &current {
                let mut event = ChannelEvent::new(
                    group.clone().unwrap_or_default(),
                    name.clone(),
                    line.to_string(),
                );
                event.id = id.clone();
                event.logo = logo.clone();
                events.push(event);
            }
        }
    }

    Ok(events)
}

/// Quote-aware `key="value"` tokenizer, ported from the teacher's
/// hand-rolled `parse_attributes` state machine.
fn parse_extinf_attributes(attrs: &str) -> Vec<(String, String)> {
    let mut result = Vec::new();
    let mut key = String::new();
    let mut value = String::new();
    let mut in_quotes = false;
    let mut in_value = false;
    let mut escape_next = false;

    for ch in attrs.chars() {
        if escape_next {
            if in_value {
                value.push(ch);
            } else {
                key.push(ch);
            }
            escape_next = false;
            continue;
        }

        match ch {
            '\\' => escape_next = true,
            '"' => {
                if in_value {
                    in_quotes = !in_quotes;
                }
            }
            '=' if !in_quotes && !in_value => in_value = true,
            ' ' | '\t' if !in_quotes => {
                if in_value && !value.is_empty() {
                    result.push((key.trim().to_string(), value.trim_matches('"').to_string()));
                    key.clear();
                    value.clear();
                    in_value = false;
                }
            }
            _ => {
                if in_value {
                    value.push(ch);
                } else {
                    key.push(ch);
                }
            }
        }
    }

    if in_value && !value.is_empty() {
        result.push((key.trim().to_string(), value.trim_matches('"').to_string()));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn txt_parses_genre_sections() {
        let text = "体育频道,#genre#\nESPN,http://h/espn.m3u8\nCNN,http://h/cnn.m3u8\n";
        let events = parse_txt(text).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].category_hint, "体育频道");
        assert_eq!(events[0].channel_name, "ESPN");
        assert_eq!(events[0].url, "http://h/espn.m3u8");
    }

    #[test]
    fn txt_skips_lines_before_any_category() {
        let text = "orphan,http://h/a.m3u8\n体育频道,#genre#\nESPN,http://h/espn.m3u8\n";
        let events = parse_txt(text).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].channel_name, "ESPN");
    }

    #[test]
    fn txt_empty_payload_is_error() {
        assert!(matches!(parse_txt("   \n"), Err(ParseError::EmptyPayload)));
    }

    #[test]
    fn txt_skips_lines_with_empty_url() {
        let text = "体育频道,#genre#\nESPN,\n";
        let events = parse_txt(text).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn m3u_parses_extinf_and_attributes() {
        let text = concat!(
            "#EXTM3U\n",
            "#EXTINF:-1 tvg-id=\"1\" tvg-logo=\"http://l\" group-title=\"Sports\",ESPN频道\n",
            "http://h/espn.m3u8\n"
        );
        let events = parse_m3u(text).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].channel_name, "ESPN");
        assert_eq!(events[0].id.as_deref(), Some("1"));
        assert_eq!(events[0].logo.as_deref(), Some("http://l"));
        assert_eq!(events[0].category_hint, "Sports");
    }

    #[test]
    fn m3u_multiple_urls_under_one_extinf_each_produce_an_event() {
        let text = concat!(
            "#EXTINF:-1 group-title=\"Sports\",ESPN\n",
            "http://h/a.m3u8\n",
            "http://h/b.m3u8\n"
        );
        let events = parse_m3u(text).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].url, "http://h/a.m3u8");
        assert_eq!(events[1].url, "http://h/b.m3u8");
    }
}
