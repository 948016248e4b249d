//! Sitemap dialect: an XML document of `<loc>` entries, each pointing at a
//! remote TXT live-source to fetch and re-parse (spec §4.E).
//!
//! Grounded on `backend/utils/parser.py::Parser.load_sitemap_data` /
//! `_get_remote_url_data` (fetch each `<loc>` ending in `iptv4.txt`,
//! ingest with the ignore-filter set, then fetch one fixed self-hosted URL
//! without it) and the teacher's `quick_xml::Reader` streaming idiom
//! (`utils/xmltv_parser.rs`).

use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;

use super::parser::parse_txt;
use super::ChannelEvent;
use crate::category::CategoryManager;
use crate::errors::ParseError;

/// Self-hosted live-source fetched unconditionally after the sitemap's own
/// entries, with the ignore-filter off.
const SELF_HOSTED_LIVE_URL: &str = "http://107.174.95.154/tvbox/json/live.txt";

/// Extracts the text of every `<loc>` element in a sitemap XML document.
pub fn extract_locs(xml: &str) -> Result<Vec<String>, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut locs = Vec::new();
    let mut in_loc = false;

    loop {
        match reader.read_event().map_err(ParseError::Xml)? {
            Event::Start(e) if e.name().as_ref() == b"loc" => in_loc = true,
            Event::End(e) if e.name().as_ref() == b"loc" => in_loc = false,
            Event::Text(text) if in_loc => {
                locs.push(text.unescape().map_err(ParseError::Xml)?.into_owned());
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(locs)
}

/// Filters a sitemap's `<loc>` entries down to those ending in the TXT
/// live-source naming convention.
pub fn live_source_locs(xml: &str) -> Result<Vec<String>, ParseError> {
    Ok(extract_locs(xml)?
        .into_iter()
        .filter(|loc| loc.ends_with("iptv4.txt"))
        .collect())
}

/// Filters a TXT payload's parsed events, dropping ignored categories —
/// used for sitemap-sourced fetches (`use_ignore = true` in the original).
pub fn parse_txt_ignoring(text: &str, categories: &CategoryManager) -> Result<Vec<ChannelEvent>, ParseError> {
    Ok(parse_txt(text)?
        .into_iter()
        .filter(|event| !categories.is_ignored(&event.category_hint))
        .collect())
}

/// Fetches a sitemap, follows every `iptv4.txt` `<loc>` plus the fixed
/// self-hosted URL, and returns the combined, ignore-filtered event
/// stream. Network errors abort the whole fetch; a malformed individual
/// line is simply skipped (spec §4.E: "parse errors on individual lines
/// are swallowed").
pub async fn fetch_sitemap_events(
    client: &Client,
    sitemap_url: &str,
    categories: &CategoryManager,
) -> Result<Vec<ChannelEvent>, ParseError> {
    let sitemap_xml = client
        .get(sitemap_url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|source| ParseError::Network {
            url: sitemap_url.to_string(),
            source,
        })?
        .text()
        .await
        .map_err(|source| ParseError::Network {
            url: sitemap_url.to_string(),
            source,
        })?;

    let mut events = Vec::new();
    for loc in live_source_locs(&sitemap_xml)? {
        if let Ok(text) = fetch_text(client, &loc).await {
            if let Ok(parsed) = parse_txt_ignoring(&text, categories) {
                events.extend(parsed);
            }
        }
    }

    if let Ok(text) = fetch_text(client, SELF_HOSTED_LIVE_URL).await {
        if let Ok(parsed) = parse_txt(&text) {
            events.extend(parsed);
        }
    }

    Ok(events)
}

async fn fetch_text(client: &Client, url: &str) -> Result<String, ParseError> {
    client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|source| ParseError::Network {
            url: url.to_string(),
            source,
        })?
        .text()
        .await
        .map_err(|source| ParseError::Network {
            url: url.to_string(),
            source,
        })
}
