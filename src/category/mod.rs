//! Category Manager: channel → category group, exclusion rules, ignore list.
//!
//! Grounded on `backend/services/category.py::CategoryManager` (the
//! `_channel_relations` index built once from each descriptor's explicit
//! `channels` list, `is_ignore`/`get_groups`/`get_category_name`). The
//! Python original reaches for a `@singleton` decorator; this crate
//! threads an explicit `Arc<CategoryManager>` through collaborators
//! instead, matching how the teacher threads `Config`/`Database` rather
//! than reaching for a process global.

use std::collections::HashMap;
use std::sync::RwLock;

pub const UNCATEGORIZED: &str = "uncategorized";

/// Static configuration for one category: display name, icon, an explicit
/// channel-name binding list, and an exclusion list (`"*"` excludes
/// everything except `channels`).
#[derive(Debug, Clone)]
pub struct CategoryDescriptor {
    pub name: String,
    pub icon: String,
    pub channels: Vec<String>,
    pub excludes: Vec<String>,
}

impl CategoryDescriptor {
    pub fn new(name: impl Into<String>, icon: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            icon: icon.into(),
            channels: Vec::new(),
            excludes: Vec::new(),
        }
    }

    pub fn with_channels(mut self, channels: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.channels = channels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_excludes(mut self, excludes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.excludes = excludes.into_iter().map(Into::into).collect();
        self
    }
}

struct Inner {
    /// Insertion order is the canonical `groups()` order.
    order: Vec<String>,
    descriptors: HashMap<String, CategoryDescriptor>,
    /// channel_name -> category name, rebuilt whenever descriptors change.
    channel_index: HashMap<String, String>,
    ignore_categories: Vec<String>,
}

impl Inner {
    fn rebuild_index(&mut self) {
        self.channel_index.clear();
        for name in &self.order {
            let Some(desc) = self.descriptors.get(name) else {
                continue;
            };
            for channel in &desc.channels {
                self.channel_index
                    .insert(channel.clone(), desc.name.clone());
            }
        }
    }
}

/// Maps channel names onto category descriptors and enforces exclusion /
/// ignore rules. Descriptors are static once loaded; mutation operations
/// (`update`/`remove`/`clear`) are fully serialized behind a single lock.
pub struct CategoryManager {
    inner: RwLock<Inner>,
}

impl CategoryManager {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                order: Vec::new(),
                descriptors: HashMap::new(),
                channel_index: HashMap::new(),
                ignore_categories: Vec::new(),
            }),
        }
    }

    /// Seeded with the default category table (supplemented from
    /// `backend/services/category.py`'s `_categories` map and
    /// `_ignore_categories`).
    pub fn with_defaults() -> Self {
        let mgr = Self::new();
        for desc in default_descriptors() {
            mgr.update(desc);
        }
        mgr.set_ignore_categories(default_ignore_categories());
        mgr
    }

    pub fn update(&self, descriptor: CategoryDescriptor) {
        let mut inner = self.inner.write().unwrap();
        if !inner.descriptors.contains_key(&descriptor.name) {
            inner.order.push(descriptor.name.clone());
        }
        inner.descriptors.insert(descriptor.name.clone(), descriptor);
        inner.rebuild_index();
    }

    pub fn remove(&self, name: &str) {
        let mut inner = self.inner.write().unwrap();
        inner.descriptors.remove(name);
        inner.order.retain(|n| n != name);
        inner.rebuild_index();
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.order.clear();
        inner.descriptors.clear();
        inner.channel_index.clear();
    }

    pub fn set_ignore_categories(&self, names: Vec<String>) {
        self.inner.write().unwrap().ignore_categories = names;
    }

    /// Explicit channel-bindings dominate; falls back to `fallback_category`,
    /// then to the uncategorized descriptor.
    pub fn resolve(&self, channel_name: &str, fallback_category: &str) -> CategoryDescriptor {
        let inner = self.inner.read().unwrap();
        if let Some(bound) = inner.channel_index.get(channel_name) {
            if let Some(desc) = inner.descriptors.get(bound) {
                return desc.clone();
            }
        }
        if let Some(desc) = inner.descriptors.get(fallback_category) {
            return desc.clone();
        }
        inner
            .descriptors
            .get(UNCATEGORIZED)
            .cloned()
            .unwrap_or_else(|| CategoryDescriptor::new(UNCATEGORIZED, "📂"))
    }

    pub fn is_excluded(&self, descriptor: &CategoryDescriptor, channel_name: &str) -> bool {
        let excludes_all = descriptor.excludes.iter().any(|e| e == "*")
            && !descriptor.channels.iter().any(|c| c == channel_name);
        excludes_all
            || descriptor
                .excludes
                .iter()
                .any(|e| e == channel_name)
    }

    pub fn is_ignored(&self, category_name: &str) -> bool {
        self.inner
            .read()
            .unwrap()
            .ignore_categories
            .iter()
            .any(|c| c == category_name)
    }

    /// Canonical sort order for Registry output.
    pub fn groups(&self) -> Vec<String> {
        self.inner.read().unwrap().order.clone()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.inner.read().unwrap().descriptors.contains_key(name)
    }

    /// Looks up a descriptor by its exact name, with no fallback to
    /// `UNCATEGORIZED` — `None` if no such category is registered.
    pub fn descriptor(&self, name: &str) -> Option<CategoryDescriptor> {
        self.inner.read().unwrap().descriptors.get(name).cloned()
    }
}

impl Default for CategoryManager {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn default_descriptors() -> Vec<CategoryDescriptor> {
    vec![
        CategoryDescriptor::new("超慢跑", "🏃"),
        CategoryDescriptor::new("央视频道", "📺"),
        CategoryDescriptor::new("央视精品", "✨").with_channels([
            "CCTV兵器科技",
            "CCTV风云剧场",
            "CCTV风云音乐",
            "CCTV风云足球",
            "CCTV高尔夫网球",
            "CCTV怀旧剧场",
            "CCTV世界地理",
            "CCTV文化精品",
            "CCTV央视台球",
            "CCTV第一剧场",
        ]),
        CategoryDescriptor::new("卫视频道", "📡"),
        CategoryDescriptor::new("体育频道", "⚽"),
        CategoryDescriptor::new("纪录频道", "📜"),
        CategoryDescriptor::new("综艺频道", "🎤"),
        CategoryDescriptor::new("戏曲频道", "🎭"),
        CategoryDescriptor::new("电视剧场", "📽️"),
        CategoryDescriptor::new("电影频道", "🎬"),
        CategoryDescriptor::new("儿童频道", "👶"),
        CategoryDescriptor::new("轮播电影", "🔁"),
        CategoryDescriptor::new("直播中国", "📹"),
        CategoryDescriptor::new("春晚频道", "🏮"),
        CategoryDescriptor::new("港台频道", "🌉"),
        CategoryDescriptor::new("海外频道", "🌐"),
        CategoryDescriptor::new("全球实况", "🌏"),
        CategoryDescriptor::new(UNCATEGORIZED, "📂"),
    ]
}

fn default_ignore_categories() -> Vec<String> {
    ["春晚频道", "直播中国", "港台频道", "海外频道", "全球实况", "央视频道", "卫视频道"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_binding_overrides_fallback() {
        let mgr = CategoryManager::with_defaults();
        let desc = mgr.resolve("CCTV兵器科技", "体育频道");
        assert_eq!(desc.name, "央视精品");
    }

    #[test]
    fn fallback_used_when_unbound() {
        let mgr = CategoryManager::with_defaults();
        let desc = mgr.resolve("ESPN", "体育频道");
        assert_eq!(desc.name, "体育频道");
    }

    #[test]
    fn unknown_fallback_resolves_to_uncategorized() {
        let mgr = CategoryManager::with_defaults();
        let desc = mgr.resolve("Some Channel", "nonexistent");
        assert_eq!(desc.name, UNCATEGORIZED);
    }

    #[test]
    fn star_exclude_allows_only_explicit_channels() {
        let mgr = CategoryManager::new();
        mgr.update(
            CategoryDescriptor::new("kids", "👶")
                .with_channels(["Cartoon1"])
                .with_excludes(["*"]),
        );
        let desc = mgr.resolve("Cartoon1", "kids");
        assert!(!mgr.is_excluded(&desc, "Cartoon1"));
        let other_desc = CategoryDescriptor::new("kids", "👶")
            .with_channels(["Cartoon1"])
            .with_excludes(["*"]);
        assert!(mgr.is_excluded(&other_desc, "RandomOther"));
    }

    #[test]
    fn named_exclude_blocks_single_channel() {
        let mgr = CategoryManager::new();
        let desc = CategoryDescriptor::new("news", "📰").with_excludes(["Banned"]);
        assert!(mgr.is_excluded(&desc, "Banned"));
        assert!(!mgr.is_excluded(&desc, "Allowed"));
    }

    #[test]
    fn ignore_categories_lookup() {
        let mgr = CategoryManager::with_defaults();
        assert!(mgr.is_ignored("央视频道"));
        assert!(!mgr.is_ignored("体育频道"));
    }

    #[test]
    fn groups_preserve_insertion_order() {
        let mgr = CategoryManager::new();
        mgr.update(CategoryDescriptor::new("b", ""));
        mgr.update(CategoryDescriptor::new("a", ""));
        assert_eq!(mgr.groups(), vec!["b".to_string(), "a".to_string()]);
    }
}
