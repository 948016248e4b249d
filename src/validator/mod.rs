//! Stream Validator: the five-stage per-URL probe (spec §4.F).
//!
//! Grounded on `backend/services/checker.py::ChannelChecker`
//! (`_check_single`, `_check_mp4_validity`, `_check_m3u8_url`,
//! `_check_m3u8_validity`, `_check_ts_availability`, `_benchmark_speed`,
//! `_extract_channel_name`) for stage order, byte/threshold/timeout
//! values, and on the teacher's `reqwest::Client::builder()` idiom
//! (`sources/m3u.rs`, `ingestor/m3u_parser.rs`) for client construction.
//! The original's `ThreadPoolExecutor(max_workers=1)` + `future.result(timeout=...)`
//! hard-timeout pattern is replaced by `tokio::time::timeout` wrapping the
//! whole probe — a first-class cancellable context instead of a nested
//! thread pool.

use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use regex::Regex;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};
use url::Url;

use crate::config::ValidatorConfig;
use crate::models::{Channel, UrlEndpoint};

static TVG_NAME_DOUBLE_QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"tvg-name="([^"]*)""#).unwrap());
static TVG_NAME_SINGLE_QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"tvg-name='([^']*)'").unwrap());
static STREAM_INF_VARIANT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#EXT-X-STREAM-INF:.*\n(\S+)").unwrap());

const MP4_FTYP_18: [u8; 8] = [0x00, 0x00, 0x00, 0x18, b'f', b't', b'y', b'p'];
const MP4_FTYP_20: [u8; 8] = [0x00, 0x00, 0x00, 0x20, b'f', b't', b'y', b'p'];

/// Runs the five-stage probe against a single URL-endpoint. Holds two
/// clients with different connect-timeout budgets: `primary` (2s connect,
/// matching the original's default `(2, timeout-2)` tuple for manifest and
/// MP4 calls) and `segment` (1s connect, matching `(1, timeout-1)` for
/// per-segment `HEAD`s).
pub struct StreamValidator {
    primary: Client,
    segment: Client,
    config: ValidatorConfig,
}

impl StreamValidator {
    pub fn new(config: ValidatorConfig) -> reqwest::Result<Self> {
        let primary = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent("iptv-channel-validator/0.1")
            .build()?;
        let segment = Client::builder()
            .connect_timeout(Duration::from_secs(1))
            .user_agent("iptv-channel-validator/0.1")
            .build()?;
        Ok(Self {
            primary,
            segment,
            config,
        })
    }

    /// Probes one URL-endpoint. Bounded by `probe_hard_timeout_secs`
    /// wall-clock; a timeout counts as a failed probe, never propagates.
    pub async fn validate(&self, channel: &Channel, endpoint: &Arc<UrlEndpoint>, deep: bool) -> bool {
        let hard_timeout = Duration::from_secs(self.config.probe_hard_timeout_secs);
        match tokio::time::timeout(hard_timeout, self.validate_inner(channel, endpoint, deep)).await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    url = %endpoint.current_url(),
                    timeout_secs = self.config.probe_hard_timeout_secs,
                    "probe timed out"
                );
                false
            }
        }
    }

    async fn validate_inner(&self, channel: &Channel, endpoint: &Arc<UrlEndpoint>, deep: bool) -> bool {
        let url = endpoint.current_url();

        if url.ends_with(".mp4") {
            return self.check_mp4(&url).await;
        }

        if !url.contains(".m3u8") {
            return false;
        }

        if !deep {
            return self.fetch_manifest(endpoint).await.is_some();
        }

        let Some(manifest) = self.fetch_manifest(endpoint).await else {
            return false;
        };

        if !check_structural(&manifest) {
            debug!(url = %endpoint.current_url(), "manifest failed structural check");
            return false;
        }

        let manifest_url = endpoint.current_url();
        let segment_uris = extract_segment_uris(&manifest);
        let Some(valid_segments) = self.check_segments(&manifest_url, &segment_uris).await else {
            debug!(url = %manifest_url, "no reachable segments");
            return false;
        };

        let speed = self.benchmark_speed(&valid_segments).await;
        endpoint.set_speed_kbps(speed);

        if !channel.has_name() {
            let extraction = tokio::time::timeout(
                Duration::from_secs(self.config.name_extraction_timeout_secs),
                self.extract_channel_name(&manifest, &manifest_url),
            )
            .await;
            if let Ok(Some(name)) = extraction {
                channel.set_name(Some(name));
            }
        }

        true
    }

    /// Stage MP4: `HEAD` content-type/length sanity check, then a
    /// streaming `GET` sniffing the first 8 bytes for an `ftyp` box header.
    async fn check_mp4(&self, url: &str) -> bool {
        let Ok(head) = self.primary.head(url).send().await else {
            return false;
        };
        if !head.status().is_success() {
            return false;
        }
        if let Some(ct) = head.headers().get(reqwest::header::CONTENT_TYPE) {
            if let Ok(ct) = ct.to_str() {
                if !ct.to_lowercase().contains("video/mp4") {
                    return false;
                }
            }
        }
        if let Some(cl) = head.headers().get(reqwest::header::CONTENT_LENGTH) {
            if let Ok(n) = cl.to_str().unwrap_or("").parse::<u64>() {
                if n < 1024 {
                    return false;
                }
            }
        }

        let Ok(resp) = self.primary.get(url).send().await else {
            return false;
        };
        if !resp.status().is_success() {
            return false;
        }
        let mut stream = resp.bytes_stream();
        let mut buf = Vec::with_capacity(8);
        while buf.len() < 8 {
            match stream.next().await {
                Some(Ok(chunk)) => buf.extend_from_slice(&chunk),
                _ => break,
            }
        }
        buf.len() >= 8 && (buf[..8] == MP4_FTYP_18 || buf[..8] == MP4_FTYP_20)
    }

    /// Stage 1: `GET`s the manifest, following a single `#EXT-X-STREAM-INF`
    /// variant level by rewriting the endpoint's current URL in place.
    async fn fetch_manifest(&self, endpoint: &Arc<UrlEndpoint>) -> Option<String> {
        let url = endpoint.current_url();
        let content = self.get_text(&url).await?;

        if let Some(caps) = STREAM_INF_VARIANT.captures(&content) {
            let variant_ref = caps[1].trim();
            if let Some(variant_url) = resolve_relative(&url, variant_ref) {
                if let Some(variant_content) = self.get_text(&variant_url).await {
                    endpoint.set_current_url(variant_url);
                    return Some(variant_content);
                }
            }
        }

        Some(content)
    }

    async fn get_text(&self, url: &str) -> Option<String> {
        let resp = self
            .primary
            .get(url)
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        resp.text().await.ok()
    }

    /// Stage 3: `HEAD`s up to `ts_segment_test_count` segments in
    /// parallel; passes iff at least one responds 200.
    async fn check_segments(&self, manifest_url: &str, uris: &[String]) -> Option<Vec<String>> {
        let take_n = self.config.ts_segment_test_count.min(uris.len());
        let targets: Vec<String> = uris[..take_n]
            .iter()
            .filter_map(|uri| resolve_relative(manifest_url, uri))
            .collect();

        let checks = targets.iter().map(|url| self.check_segment_head(url));
        let results = futures::future::join_all(checks).await;

        let valid: Vec<String> = targets
            .into_iter()
            .zip(results)
            .filter_map(|(url, ok)| ok.then_some(url))
            .collect();

        if valid.is_empty() {
            None
        } else {
            Some(valid)
        }
    }

    async fn check_segment_head(&self, url: &str) -> bool {
        self.segment
            .head(url)
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .send()
            .await
            .map(|r| r.status() == StatusCode::OK)
            .unwrap_or(false)
    }

    /// Stage 4: reads up to `benchmark_chunk_count * benchmark_chunk_size`
    /// bytes across the validated segments and reports aggregate KB/s.
    async fn benchmark_speed(&self, urls: &[String]) -> f64 {
        let budget = (self.config.benchmark_chunk_size * self.config.benchmark_chunk_count) as u64;
        let mut total_bytes: u64 = 0;
        let mut total_time = Duration::ZERO;

        for url in urls {
            let Ok(resp) = self
                .primary
                .get(url)
                .timeout(Duration::from_secs(self.config.request_timeout_secs))
                .send()
                .await
            else {
                continue;
            };
            if !resp.status().is_success() {
                continue;
            }

            let start = Instant::now();
            let mut stream = resp.bytes_stream();
            let mut read: u64 = 0;
            while read < budget {
                match stream.next().await {
                    Some(Ok(chunk)) => read += chunk.len() as u64,
                    _ => break,
                }
            }
            total_time += start.elapsed();
            total_bytes += read;
        }

        if total_time.is_zero() {
            0.0
        } else {
            (total_bytes as f64 / total_time.as_secs_f64()) / 1024.0
        }
    }

    /// Stage 5: `tvg-name` (first non-empty, across all `#EXTINF` lines)
    /// beats the longest display-name candidate, which beats a
    /// `Content-Disposition` filename.
    async fn extract_channel_name(&self, manifest: &str, manifest_url: &str) -> Option<String> {
        if let Some(name) = extract_from_extinf(manifest) {
            return Some(name);
        }
        self.extract_from_content_disposition(manifest_url).await
    }

    async fn extract_from_content_disposition(&self, url: &str) -> Option<String> {
        let resp = self
            .segment
            .head(url)
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .ok()?;
        let cd = resp.headers().get(reqwest::header::CONTENT_DISPOSITION)?;
        let cd_str = cd.to_str().ok()?;
        let filename = cd_str
            .split("filename=")
            .nth(1)?
            .trim_matches(|c| c == '"' || c == ';' || c == ' ')
            .to_string();
        Some(match filename.rfind('.') {
            Some(idx) => filename[..idx].to_string(),
            None => filename,
        })
    }
}

fn check_structural(content: &str) -> bool {
    content.trim_start().starts_with("#EXTM3U")
        && content.contains("#EXT-X-VERSION")
        && content.contains("#EXT-X-MEDIA-SEQUENCE")
}

fn extract_segment_uris(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(String::from)
        .collect()
}

fn resolve_relative(base: &str, reference: &str) -> Option<String> {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return Some(reference.to_string());
    }
    Url::parse(base).ok()?.join(reference).ok().map(|u| u.to_string())
}

fn extract_from_extinf(manifest: &str) -> Option<String> {
    let mut candidates: Vec<String> = Vec::new();
    for line in manifest.lines() {
        let line = line.trim();
        if !line.starts_with("#EXTINF") {
            continue;
        }

        if let Some(caps) = TVG_NAME_DOUBLE_QUOTED
            .captures(line)
            .or_else(|| TVG_NAME_SINGLE_QUOTED.captures(line))
        {
            let name = caps[1].trim();
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }

        if let Some(idx) = line.rfind(',') {
            let display = line[idx + 1..].trim();
            let cleaned: String = display
                .chars()
                .filter(|c| !matches!(c, ',' | '.' | '，' | '。'))
                .collect();
            if !cleaned.trim().is_empty() {
                candidates.push(display.to_string());
            }
        }
    }
    candidates.into_iter().max_by_key(|s| s.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn validator() -> StreamValidator {
        StreamValidator::new(Config::default().validator).unwrap()
    }

    #[test]
    fn structural_check_requires_all_three_tags() {
        assert!(check_structural("#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-MEDIA-SEQUENCE:0\n"));
        assert!(!check_structural("#EXT-X-VERSION:3\n#EXT-X-MEDIA-SEQUENCE:0\n"));
        assert!(!check_structural("#EXTM3U\n#EXT-X-VERSION:3\n"));
    }

    #[test]
    fn segment_uris_skip_tags_and_blanks() {
        let manifest = "#EXTM3U\n#EXTINF:10,\nseg1.ts\n\n#EXTINF:10,\nseg2.ts\n";
        assert_eq!(extract_segment_uris(manifest), vec!["seg1.ts", "seg2.ts"]);
    }

    #[test]
    fn tvg_name_short_circuits_over_display_name() {
        let manifest = "#EXTINF:-1 tvg-name=\"Real Name\",Fallback Display\n";
        assert_eq!(extract_from_extinf(manifest), Some("Real Name".to_string()));
    }

    #[test]
    fn longest_display_name_wins_without_tvg_name() {
        let manifest = "#EXTINF:-1,Ch\n#EXTINF:-1,Channel One\n";
        assert_eq!(extract_from_extinf(manifest), Some("Channel One".to_string()));
    }

    #[test]
    fn relative_segment_resolves_against_manifest_directory() {
        let resolved = resolve_relative("http://host/live/index.m3u8", "seg1.ts").unwrap();
        assert_eq!(resolved, "http://host/live/seg1.ts");
    }

    #[tokio::test]
    async fn mp4_stage_accepts_valid_ftyp_header() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/video.mp4"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "video/mp4")
                    .insert_header("content-length", "2048"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/video.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![
                0x00, 0x00, 0x00, 0x18, b'f', b't', b'y', b'p', b'i', b's', b'o', b'm',
            ]))
            .mount(&server)
            .await;

        let validator = validator();
        let ok = validator.check_mp4(&format!("{}/video.mp4", server.uri())).await;
        assert!(ok);
    }

    #[tokio::test]
    async fn mp4_stage_rejects_wrong_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/video.mp4"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-type", "text/html"))
            .mount(&server)
            .await;

        let validator = validator();
        let ok = validator.check_mp4(&format!("{}/video.mp4", server.uri())).await;
        assert!(!ok);
    }

    #[tokio::test]
    async fn deep_validate_follows_variant_and_passes_structural_check() {
        let server = MockServer::start().await;
        let master = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1000\nvariant.m3u8\n";
        let variant = "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-MEDIA-SEQUENCE:0\nseg1.ts\n";

        Mock::given(method("GET"))
            .and(path("/master.m3u8"))
            .respond_with(ResponseTemplate::new(200).set_body_string(master))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/variant.m3u8"))
            .respond_with(ResponseTemplate::new(200).set_body_string(variant))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/seg1.ts"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/seg1.ts"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 2048]))
            .mount(&server)
            .await;

        let validator = validator();
        let channel = Channel::new("1", "Test");
        let endpoint = Arc::new(UrlEndpoint::new(format!("{}/master.m3u8", server.uri())));
        let ok = validator.validate(&channel, &endpoint, true).await;
        assert!(ok);
        assert!(endpoint.current_url().ends_with("/variant.m3u8"));
        assert!(endpoint.speed_kbps() >= 0.0);
    }
}
