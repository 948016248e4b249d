//! Host-based merging: keep only channels served by the busiest hosts
//! (spec §4.H).
//!
//! Grounded on `backend/api/tv/merger.py::LiveMerger`: extract each URL's
//! host, count channels per host, keep the top `n` hosts (`heapq.nlargest`
//! in the original; here a sort + truncate, equally O(n log n) and
//! idiomatic for a one-shot batch operation), and bypass the filter
//! entirely for ignored categories. `format_output` ports
//! `LiveMerger.format_output` verbatim: it groups by the raw
//! `category_hint` string, not a resolved `CategoryDescriptor`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::category::CategoryManager;
use super::ChannelEvent;

fn extract_host(url: &str) -> Option<&str> {
    let after_scheme = url.split_once("//")?.1;
    Some(after_scheme.split('/').next().unwrap_or(after_scheme))
}

/// One host's contribution to the merged output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostStat {
    pub host: String,
    pub count: usize,
}

/// Result of merging: the selected top hosts plus the events admitted
/// (either hosted by one of them, or belonging to an ignored category).
pub struct MergeResult {
    pub top_hosts: Vec<HostStat>,
    pub events: Vec<ChannelEvent>,
}

/// Keeps only channels hosted on the `n` busiest hosts (by channel count),
/// always admitting ignored-category channels regardless of host.
pub fn merge_top_hosts(events: &[ChannelEvent], categories: &Arc<CategoryManager>, n: usize) -> MergeResult {
    let mut host_counts: HashMap<&str, usize> = HashMap::new();
    for event in events {
        if let Some(host) = extract_host(&event.url) {
            *host_counts.entry(host).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(&str, usize)> = host_counts.into_iter().collect();
    ranked.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.truncate(n);

    let top_hosts: Vec<HostStat> = ranked
        .iter()
        .map(|(host, count)| HostStat {
            host: host.to_string(),
            count: *count,
        })
        .collect();
    let top_host_set: std::collections::HashSet<&str> = ranked.iter().map(|(h, _)| *h).collect();

    let filtered = events
        .iter()
        .filter(|event| {
            let hosted_by_top = extract_host(&event.url)
                .map(|h| top_host_set.contains(h))
                .unwrap_or(false);
            hosted_by_top || categories.is_ignored(&event.category_hint)
        })
        .cloned()
        .collect();

    MergeResult {
        top_hosts,
        events: filtered,
    }
}

/// Renders a `MergeResult` into the host-stats + category-grouped TXT
/// dialect used by the merge report: a `#===` delimited host-count block
/// followed by `<icon><category>,#genre#` sections, one per raw
/// `category_hint` (first-seen order, not resolved via `CategoryManager`),
/// with a blank line after each section's channels.
pub fn format_output(result: &MergeResult, categories: &Arc<CategoryManager>) -> String {
    let mut order: Vec<&str> = Vec::new();
    let mut grouped: HashMap<&str, Vec<&ChannelEvent>> = HashMap::new();
    for event in &result.events {
        let key = event.category_hint.as_str();
        grouped
            .entry(key)
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(event);
    }

    let mut lines = vec!["#========================".to_string()];
    for host in &result.top_hosts {
        lines.push(format!("#{}: {}", host.host, host.count));
    }
    lines.push("#========================".to_string());

    for category in order {
        let icon = categories
            .descriptor(category)
            .map(|d| d.icon)
            .unwrap_or_default();
        lines.push(format!("{icon}{category},#genre#"));
        for event in &grouped[category] {
            lines.push(format!("{},{}", event.channel_name, event.url));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}
