//! TXT <-> M3U round-trip conversion (spec §4.I).
//!
//! Grounded on `backend/api/tv/converter.py::LiveConverter`: both
//! directions funnel through a transient `ChannelRegistry` populated from
//! the source text, then serialized in the target dialect. Unlike
//! `format::parser`'s hand-rolled EXTINF tokenizer, this module parses
//! `#EXTINF` attributes with the regex the original's converter itself
//! used (`(\w+)="((?:[^"\\]|\\.)*)"`) — the two dialect readers in this
//! crate deliberately differ the same way their sources did.

use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::category::CategoryManager;
use crate::registry::ChannelRegistry;

static EXTINF_PARAM_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(\w+)="((?:[^"\\]|\\.)*)""#).unwrap());

/// Splits an `#EXTINF:` tag body (everything after the leading `#EXTINF:`)
/// into its `key="value"` attributes and trailing display name.
fn parse_extinf_params(content: &str) -> (Vec<(String, String)>, String) {
    let (param_str, name) = match content.rsplit_once(',') {
        Some((params, name)) => (params, name.trim().replace("频道", "")),
        None => (content, String::new()),
    };

    let params = EXTINF_PARAM_PATTERN
        .captures_iter(param_str)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect();

    (params, name)
}

fn param(params: &[(String, String)], key: &str) -> Option<String> {
    params.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
}

fn new_registry() -> ChannelRegistry {
    ChannelRegistry::new(Arc::new(CategoryManager::with_defaults()))
}

/// Converts M3U source text into TXT-dialect output.
pub fn m3u_to_txt(m3u_data: &str) -> String {
    let registry = new_registry();
    let mut group_title = String::new();
    let mut channel_name = String::new();
    let mut channel_id: Option<String> = None;

    for raw_line in m3u_data.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with("#EXTM3U") {
            continue;
        }

        if let Some(tag_content) = line.strip_prefix("#EXTINF:") {
            let (params, name) = parse_extinf_params(tag_content);
            channel_name = name;
            channel_id = param(&params, "id");
            group_title = param(&params, "title").unwrap_or_default();
            continue;
        }

        if line.starts_with("http:") || line.starts_with("https:") {
            registry.add(
                &group_title,
                &channel_name,
                line,
                channel_id.as_deref(),
                None,
            );
        }
    }

    registry.sort();
    registry.serialize_txt()
}

/// Converts TXT source text into M3U-dialect output.
pub fn txt_to_m3u(txt_data: &str) -> String {
    let registry = new_registry();
    let mut group_title = String::new();

    for raw_line in txt_data.trim().lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(stripped) = line.strip_suffix(",#genre#") {
            group_title = stripped.trim().to_string();
            continue;
        }
        let Some((name, url)) = line.split_once(',') else {
            continue;
        };
        registry.add(&group_title, name.trim(), url.trim(), None, None);
    }

    registry.sort();
    registry.serialize_m3u()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn txt_to_m3u_round_trip_preserves_channel_and_url() {
        let txt = "Sports,#genre#\nESPN,http://h/espn.m3u8\n";
        let m3u = txt_to_m3u(txt);
        assert!(m3u.starts_with("#EXTM3U"));
        assert!(m3u.contains("ESPN"));
        assert!(m3u.contains("http://h/espn.m3u8"));
    }

    #[test]
    fn m3u_to_txt_extracts_name_and_url() {
        let m3u = "#EXTM3U\n#EXTINF:-1 tvg-id=\"1\" group-title=\"Sports\",ESPN频道\nhttp://h/espn.m3u8\n";
        let txt = m3u_to_txt(m3u);
        assert!(txt.contains("ESPN,http://h/espn.m3u8"));
    }
}
