//! Channel Registry: thread-safe grouped channel container (spec §4.C).
//!
//! Grounded on `backend/services/channel.py::ChannelBaseModel` (group-keyed
//! channel map, `sort`/`total_count`/`add_channel`/`to_txt_string`/
//! `to_m3u_string`) and `backend/models/channel_info.py::ChannelList`
//! (per-group channel sorting via `mixed_sort_key`). The teacher's
//! `Arc<RwLock<_>>` idiom (`ingestor/state_manager.rs`) replaces Python's
//! `threading.RLock`; the URL-endpoint interning table the Data Model
//! requires (spec §3) lives here as the registry is the only collaborator
//! that outlives individual probes.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::category::CategoryManager;
use crate::models::{Channel, UrlEndpoint};
use crate::normalize::canonical_channel_name;
use crate::sort_key::mixed_sort_key;

struct Group {
    channels: HashMap<String, Arc<Channel>>,
}

impl Group {
    fn new() -> Self {
        Self {
            channels: HashMap::new(),
        }
    }

    fn endpoint_count(&self) -> usize {
        self.channels.values().map(|c| c.endpoint_count()).sum()
    }

    fn sorted_channels(&self) -> Vec<Arc<Channel>> {
        let mut channels: Vec<Arc<Channel>> = self.channels.values().cloned().collect();
        channels.sort_by_key(|c| mixed_sort_key(&c.name()));
        channels
    }
}

/// Grouped channel store. Owns every `Channel` it holds; `UrlEndpoint`
/// instances are interned by URL process-wide (never evicted — see spec §9).
pub struct ChannelRegistry {
    categories: Arc<CategoryManager>,
    groups: RwLock<(Vec<String>, HashMap<String, Group>)>,
    endpoint_table: RwLock<HashMap<String, Arc<UrlEndpoint>>>,
    /// Playback/catchup template appended to the M3U header, if configured.
    playback_template: RwLock<Option<String>>,
}

impl ChannelRegistry {
    pub fn new(categories: Arc<CategoryManager>) -> Self {
        Self {
            categories,
            groups: RwLock::new((Vec::new(), HashMap::new())),
            endpoint_table: RwLock::new(HashMap::new()),
            playback_template: RwLock::new(None),
        }
    }

    pub fn set_playback_template(&self, template: Option<String>) {
        *self.playback_template.write().unwrap() = template;
    }

    /// Interns a URL-endpoint by URL identity: the first caller to observe
    /// a URL creates it; later callers get the same shared instance.
    pub fn intern_endpoint(&self, url: &str) -> Arc<UrlEndpoint> {
        if let Some(existing) = self.endpoint_table.read().unwrap().get(url) {
            return existing.clone();
        }
        let mut table = self.endpoint_table.write().unwrap();
        table
            .entry(url.to_string())
            .or_insert_with(|| Arc::new(UrlEndpoint::new(url)))
            .clone()
    }

    /// Resolves the channel's category, drops it if excluded, otherwise
    /// places it into the resolved group (creating the group and/or
    /// channel lazily) and interns its URL-endpoint.
    pub fn add(
        &self,
        group_hint: &str,
        channel_name: &str,
        url: &str,
        id: Option<&str>,
        logo: Option<&str>,
    ) {
        let channel_name = canonical_channel_name(channel_name);

        let desc = self.categories.resolve(channel_name, group_hint);
        if self.categories.is_excluded(&desc, channel_name) {
            return;
        }

        let endpoint = self.intern_endpoint(url);
        let mut groups = self.groups.write().unwrap();
        let (order, map) = &mut *groups;
        if !map.contains_key(&desc.name) {
            order.push(desc.name.clone());
            map.insert(desc.name.clone(), Group::new());
        }
        let group = map.get_mut(&desc.name).unwrap();
        let channel = group
            .channels
            .entry(channel_name.to_string())
            .or_insert_with(|| Arc::new(Channel::new(id.unwrap_or(channel_name), channel_name)));
        channel.set_logo(logo.map(String::from));
        channel.add_endpoint(endpoint);
    }

    /// Reorders groups to match `CategoryManager::groups()`; unknown
    /// groups are appended afterward in their existing relative order.
    pub fn sort(&self) {
        let canonical = self.categories.groups();
        let index_of: HashMap<&str, usize> = canonical
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();

        let mut groups = self.groups.write().unwrap();
        let (order, _) = &mut *groups;
        let default_index = canonical.len();
        order.sort_by_key(|name| {
            index_of
                .get(name.as_str())
                .copied()
                .unwrap_or(default_index)
        });
    }

    /// Sum of endpoint counts across non-ignored groups.
    pub fn total_count(&self) -> usize {
        let groups = self.groups.read().unwrap();
        let (order, map) = &*groups;
        order
            .iter()
            .filter(|name| !self.categories.is_ignored(name))
            .filter_map(|name| map.get(name.as_str()))
            .map(|g| g.endpoint_count())
            .sum()
    }

    fn extm3u_header(&self) -> String {
        match self.playback_template.read().unwrap().as_deref() {
            None => "#EXTM3U".to_string(),
            Some(playback) => {
                let escaped = playback.replace('"', "\\\"");
                format!(
                    "#EXTM3U x-tvg-url=\"{escaped}\" catchup=\"append\" catchup-source=\"?playseek=${{(b)yyyyMMddHHmmss}}-${{(e)yyyyMMddHHmmss}}\""
                )
            }
        }
    }

    pub fn serialize_txt(&self) -> String {
        let groups = self.groups.read().unwrap();
        let (order, map) = &*groups;
        let mut out = Vec::new();
        for name in order {
            let Some(group) = map.get(name) else { continue };
            out.push(format!("{name},#genre#"));
            for channel in group.sorted_channels() {
                out.extend(channel.to_txt_lines());
            }
            out.push(String::new());
        }
        out.join("\n").trim().to_string()
    }

    pub fn serialize_m3u(&self) -> String {
        let groups = self.groups.read().unwrap();
        let (order, map) = &*groups;
        let mut out = vec![self.extm3u_header()];
        for name in order {
            let Some(group) = map.get(name) else { continue };
            for channel in group.sorted_channels() {
                out.extend(channel.to_m3u_records(name));
            }
        }
        out.join("\n").trim().to_string()
    }

    pub fn clear(&self) {
        let mut groups = self.groups.write().unwrap();
        groups.0.clear();
        groups.1.clear();
        self.endpoint_table.write().unwrap().clear();
    }

    pub fn group_names(&self) -> Vec<String> {
        self.groups.read().unwrap().0.clone()
    }

    pub fn categories(&self) -> &Arc<CategoryManager> {
        &self.categories
    }

    /// All channels in a group, for callers that need to walk every
    /// endpoint (e.g. the batch orchestrator's re-validation pass).
    pub fn channels_in_group(&self, name: &str) -> Vec<Arc<Channel>> {
        self.groups
            .read()
            .unwrap()
            .1
            .get(name)
            .map(|g| g.channels.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> ChannelRegistry {
        ChannelRegistry::new(Arc::new(CategoryManager::with_defaults()))
    }

    #[test]
    fn add_creates_group_and_channel() {
        let reg = fresh();
        reg.add("体育频道", "ESPN", "http://h/espn.m3u8", None, None);
        assert_eq!(reg.total_count(), 1);
    }

    #[test]
    fn excluded_channel_is_dropped() {
        let reg = ChannelRegistry::new(Arc::new(CategoryManager::new()));
        reg.categories.update(
            crate::category::CategoryDescriptor::new("kids", "👶").with_excludes(["Banned"]),
        );
        reg.add("kids", "Banned", "http://h/a.m3u8", None, None);
        assert_eq!(reg.total_count(), 0);
    }

    #[test]
    fn ignored_groups_excluded_from_total() {
        let reg = fresh();
        reg.add("央视频道", "CCTV-News", "http://h/a.m3u8", None, None);
        assert_eq!(reg.total_count(), 0);
    }

    #[test]
    fn duplicate_url_same_channel_dedups() {
        let reg = fresh();
        reg.add("体育频道", "ESPN", "http://h/a.m3u8", None, None);
        reg.add("体育频道", "ESPN", "http://h/a.m3u8", None, None);
        assert_eq!(reg.total_count(), 1);
    }

    #[test]
    fn sort_orders_groups_by_category_canonical_order() {
        let reg = fresh();
        reg.add("体育频道", "ESPN", "http://h/a.m3u8", None, None);
        reg.add("央视精品", "CCTV兵器科技", "http://h/b.m3u8", None, None);
        reg.sort();
        let names = reg.group_names();
        let sports_idx = names.iter().position(|n| n == "体育频道").unwrap();
        let premium_idx = names.iter().position(|n| n == "央视精品").unwrap();
        assert!(premium_idx < sports_idx);
    }

    #[test]
    fn clear_removes_all_state() {
        let reg = fresh();
        reg.add("体育频道", "ESPN", "http://h/a.m3u8", None, None);
        reg.clear();
        assert_eq!(reg.total_count(), 0);
        assert!(reg.group_names().is_empty());
    }

    #[test]
    fn serialize_txt_groups_channels_with_genre_header() {
        let reg = fresh();
        reg.add("体育频道", "ESPN", "http://h/a.m3u8", None, None);
        let txt = reg.serialize_txt();
        assert!(txt.contains("体育频道,#genre#"));
        assert!(txt.contains("ESPN,http://h/a.m3u8"));
    }
}
