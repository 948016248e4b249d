//! Channel: a named logical station with a deduplicated set of URL endpoints.
//!
//! Grounded on `backend/models/channel_info.py::ChannelInfo` (serialization
//! contracts, name synthesis, lock discipline) and the teacher's
//! `Arc<RwLock<_>>` idiom for shared mutable state
//! (`ingestor/state_manager.rs`).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::url_endpoint::UrlEndpoint;

/// A logical channel: a display name with one or more redundant stream URLs.
#[derive(Debug)]
pub struct Channel {
    /// Empty when equal to `name` (spec invariant: identifier != name when both set).
    id: RwLock<String>,
    name: RwLock<String>,
    logo: RwLock<Option<String>>,
    group_title: RwLock<String>,
    /// Keyed by `UrlEndpoint::original_url` for O(1) add/remove-by-identity.
    endpoints: RwLock<HashMap<String, Arc<UrlEndpoint>>>,
}

impl Channel {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let id = id.into();
        let name = name.into();
        let id = if id == name { String::new() } else { id };
        Self {
            id: RwLock::new(id),
            name: RwLock::new(name),
            logo: RwLock::new(None),
            group_title: RwLock::new(String::new()),
            endpoints: RwLock::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> String {
        self.id.read().unwrap().clone()
    }

    pub fn name(&self) -> String {
        self.name.read().unwrap().clone()
    }

    pub fn set_name(&self, name: Option<String>) {
        let id = self.id();
        let resolved = match name {
            Some(n) if !n.is_empty() => n,
            _ => format!("channel-{id}"),
        };
        *self.name.write().unwrap() = resolved;
    }

    /// Only assigns a name if the channel doesn't already have one — used
    /// by Stage 5 (spec §4.F), which is skipped for already-named channels.
    pub fn has_name(&self) -> bool {
        !self.name.read().unwrap().is_empty()
    }

    pub fn logo(&self) -> Option<String> {
        self.logo.read().unwrap().clone()
    }

    pub fn set_logo(&self, logo: Option<String>) {
        if let Some(logo) = logo {
            *self.logo.write().unwrap() = Some(logo);
        }
    }

    pub fn group_title(&self) -> String {
        self.group_title.read().unwrap().clone()
    }

    pub fn set_group_title(&self, title: impl Into<String>) {
        *self.group_title.write().unwrap() = title.into();
    }

    /// Insert a URL-endpoint (set semantics — a second insert of the same
    /// `original_url` is a no-op since the caller is expected to hand us
    /// an already-interned `Arc<UrlEndpoint>`).
    pub fn add_endpoint(&self, endpoint: Arc<UrlEndpoint>) {
        self.endpoints
            .write()
            .unwrap()
            .entry(endpoint.original_url().to_string())
            .or_insert(endpoint);
    }

    /// Prune an endpoint from this channel's set (spec: "pruned from a
    /// channel's set when validation finally fails").
    pub fn remove_endpoint(&self, original_url: &str) {
        self.endpoints.write().unwrap().remove(original_url);
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.read().unwrap().len()
    }

    /// Endpoints ordered by ascending speed, per the serialization contract.
    pub fn endpoints_by_speed(&self) -> Vec<Arc<UrlEndpoint>> {
        let mut endpoints: Vec<Arc<UrlEndpoint>> =
            self.endpoints.read().unwrap().values().cloned().collect();
        endpoints.sort_by(|a, b| {
            a.speed_kbps()
                .partial_cmp(&b.speed_kbps())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        endpoints
    }

    /// TXT lines for this channel: `<name>,<url>` per endpoint, speed ascending.
    pub fn to_txt_lines(&self) -> Vec<String> {
        let name = self.name();
        self.endpoints_by_speed()
            .iter()
            .map(|ep| format!("{},{}", name, ep.current_url()))
            .collect()
    }

    /// M3U records for this channel, one `#EXTINF` + URL pair per endpoint.
    pub fn to_m3u_records(&self, default_group: &str) -> Vec<String> {
        let name = self.name();
        let id = self.id();
        let logo = self.logo();
        let group = if self.group_title().is_empty() {
            default_group.to_string()
        } else {
            self.group_title()
        };

        let mut attrs = String::new();
        if !id.is_empty() {
            attrs.push_str(&format!("tvg-id=\"{id}\" "));
        }
        if !name.is_empty() {
            attrs.push_str(&format!("tvg-name=\"{name}\" "));
        }
        if let Some(logo) = logo {
            attrs.push_str(&format!("tvg-logo=\"{logo}\" "));
        }
        attrs.push_str(&format!("group-title=\"{group}\""));

        self.endpoints_by_speed()
            .iter()
            .map(|ep| format!("#EXTINF:-1 {attrs},{name}\n{}", ep.current_url()))
            .collect()
    }

    /// Combined TXT+M3U rendering of a single channel (supplemented from
    /// `backend/models/channel_info.py::ChannelInfo.get_all`), used by the
    /// CLI's `check-single` subcommand.
    pub fn render_combined(&self, default_group: &str) -> String {
        let txt = self.to_txt_lines().join("\n");
        let m3u = self.to_m3u_records(default_group).join("\n");
        format!(
            "{txt}\n\n===============================================================\n\n{m3u}"
        )
    }
}
