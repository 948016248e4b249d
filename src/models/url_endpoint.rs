//! URL-endpoint: one stream URL serving a channel, with measured throughput.
//!
//! Grounded on `backend/models/channel_info.py::ChannelUrl`, which abuses a
//! constructor-replacing `__new__` to intern instances by URL (see spec §9 —
//! that idiom does not survive translation). Here interning is an explicit
//! `intern(url) -> Arc<UrlEndpoint>` map guarded by a lock, owned by the
//! `ChannelRegistry`.

use std::sync::RwLock;

/// A single stream URL and its measured characteristics.
///
/// Identity, equality, and hashing are all by `original_url` — the URL the
/// endpoint was first observed under. `current_url` may be rewritten in
/// place by the validator's variant-follow step (spec §4.F Stage 1) without
/// changing the endpoint's identity in any `HashMap`/`HashSet` it is stored
/// in under `original_url`.
#[derive(Debug)]
pub struct UrlEndpoint {
    original_url: String,
    current_url: RwLock<String>,
    speed_kbps: RwLock<f64>,
    resolution: RwLock<Option<String>>,
}

impl UrlEndpoint {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            current_url: RwLock::new(url.clone()),
            original_url: url,
            speed_kbps: RwLock::new(0.0),
            resolution: RwLock::new(None),
        }
    }

    /// The URL this endpoint was interned under — its permanent identity.
    pub fn original_url(&self) -> &str {
        &self.original_url
    }

    /// The URL currently in effect for probing (may differ from
    /// `original_url` after a Stage 1 variant-follow rewrite).
    pub fn current_url(&self) -> String {
        self.current_url.read().unwrap().clone()
    }

    pub fn set_current_url(&self, url: impl Into<String>) {
        *self.current_url.write().unwrap() = url.into();
    }

    pub fn speed_kbps(&self) -> f64 {
        *self.speed_kbps.read().unwrap()
    }

    /// Last-writer-wins speed update, rounded to one decimal place.
    pub fn set_speed_kbps(&self, speed: f64) {
        *self.speed_kbps.write().unwrap() = (speed * 10.0).round() / 10.0;
    }

    pub fn resolution(&self) -> Option<String> {
        self.resolution.read().unwrap().clone()
    }

    /// First non-null resolution wins; later writes are ignored once set.
    pub fn set_resolution_if_absent(&self, resolution: impl Into<String>) {
        let mut guard = self.resolution.write().unwrap();
        if guard.is_none() {
            *guard = Some(resolution.into());
        }
    }
}

impl PartialEq for UrlEndpoint {
    fn eq(&self, other: &Self) -> bool {
        self.original_url == other.original_url
    }
}

impl Eq for UrlEndpoint {}

impl std::hash::Hash for UrlEndpoint {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.original_url.hash(state);
    }
}
