//! TXT/M3U/sitemap dialect parsing, TXT<->M3U conversion, and host-based
//! merging (spec §4.E, §4.H, §4.I).

pub mod converter;
pub mod merger;
pub mod parser;
pub mod sitemap;

/// One parsed `(category_hint, channel_name, url)` triple. `id`/`logo` are
/// carried when the source dialect provides them (M3U's `tvg-id`/`tvg-logo`);
/// `category_hint` is the raw group hint handed to
/// `ChannelRegistry::add` — resolution against the category table happens
/// there, not during parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEvent {
    pub category_hint: String,
    pub channel_name: String,
    pub url: String,
    pub id: Option<String>,
    pub logo: Option<String>,
}

impl ChannelEvent {
    pub fn new(category_hint: impl Into<String>, channel_name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            category_hint: category_hint.into(),
            channel_name: channel_name.into(),
            url: url.into(),
            id: None,
            logo: None,
        }
    }
}
