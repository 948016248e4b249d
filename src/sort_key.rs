//! Mixed natural/pinyin sort key for channel display ordering (spec §4.B).
//!
//! Grounded on `backend/utils/sort_util.py::mixed_sort_key`: a channel name
//! is split into alternating runs of ASCII letters/symbols, digit runs, and
//! CJK runs, each tagged by kind so the final tuple comparison never
//! crosses kinds. CJK runs are romanized to pinyin and compared as text.

use pinyin::ToPinyin;
use regex::Regex;
use std::sync::LazyLock;

static SEGMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([a-zA-Z]+|[^\w\s]+)|(\d+)|([一-龥]+)").unwrap()
});

/// One tagged segment of a sort key. Ordered `Alpha < Cjk < Number` to
/// match the tag-character ordering ('a' < 'c' < 'n') the original
/// produced implicitly by tagging tuples with those letters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Segment {
    Alpha(String),
    Cjk(String),
    Number(u64),
}

/// A comparable, totally-ordered sort key for a channel display name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MixedSortKey(Vec<Segment>);

pub fn mixed_sort_key(s: &str) -> MixedSortKey {
    let mut segments = Vec::new();
    for caps in SEGMENT_PATTERN.captures_iter(s) {
        if let Some(m) = caps.get(1) {
            segments.push(Segment::Alpha(m.as_str().to_lowercase()));
        } else if let Some(m) = caps.get(2) {
            let n: u64 = m.as_str().parse().unwrap_or(0);
            segments.push(Segment::Number(n));
        } else if let Some(m) = caps.get(3) {
            segments.push(Segment::Cjk(cjk_to_pinyin(m.as_str())));
        }
    }
    MixedSortKey(segments)
}

fn cjk_to_pinyin(s: &str) -> String {
    s.chars()
        .filter_map(|c| c.to_pinyin())
        .map(|p| p.plain().to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_sort_naturally_not_lexically() {
        let mut names = vec!["CCTV10", "CCTV2", "CCTV1"];
        names.sort_by_key(|n| mixed_sort_key(n));
        assert_eq!(names, vec!["CCTV1", "CCTV2", "CCTV10"]);
    }

    #[test]
    fn alpha_segments_are_case_insensitive() {
        assert_eq!(mixed_sort_key("ABC"), mixed_sort_key("abc"));
    }

    #[test]
    fn cjk_segments_compare_by_pinyin() {
        // 北京 (Beijing) should sort before 上海 (Shanghai) under pinyin ordering.
        let mut names = vec!["上海卫视", "北京卫视"];
        names.sort_by_key(|n| mixed_sort_key(n));
        assert_eq!(names, vec!["北京卫视", "上海卫视"]);
    }

    #[test]
    fn mixed_alpha_number_cjk_segments_are_tagged_independently() {
        let key = mixed_sort_key("CCTV5频道");
        assert_eq!(key.0.len(), 3);
        assert!(matches!(key.0[0], Segment::Alpha(_)));
        assert!(matches!(key.0[1], Segment::Number(5)));
        assert!(matches!(key.0[2], Segment::Cjk(_)));
    }
}
