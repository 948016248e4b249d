//! End-to-end coverage across the dialect parsers, category classifier,
//! stream validator, and batch orchestrator working together.

use std::sync::Arc;

use iptv_channel_validator::category::CategoryManager;
use iptv_channel_validator::config::{OrchestratorConfig, ValidatorConfig};
use iptv_channel_validator::format::{converter, merger, parser};
use iptv_channel_validator::orchestrator::BatchOrchestrator;
use iptv_channel_validator::registry::ChannelRegistry;
use iptv_channel_validator::task::{CreateTaskParams, TaskRegistry, TaskStatus};
use iptv_channel_validator::validator::StreamValidator;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn validator_config() -> ValidatorConfig {
    ValidatorConfig {
        request_timeout_secs: 5,
        probe_hard_timeout_secs: 5,
        connect_timeout_secs: 2,
        ts_segment_test_count: 3,
        name_extraction_timeout_secs: 2,
        benchmark_chunk_size: 256,
        benchmark_chunk_count: 2,
    }
}

#[test]
fn txt_source_parses_classifies_and_serializes() {
    let text = "体育频道,#genre#\nESPN,http://h/espn.m3u8\nCNN,http://h/cnn.m3u8\n央视频道,#genre#\nCCTV-1,http://h/cctv1.m3u8\n";
    let events = parser::parse_txt(text).unwrap();
    assert_eq!(events.len(), 3);

    let registry = ChannelRegistry::new(Arc::new(CategoryManager::with_defaults()));
    for event in &events {
        registry.add(&event.category_hint, &event.channel_name, &event.url, None, None);
    }
    registry.sort();

    // 央视频道 is an ignored category, so it contributes to the serialized
    // output but not to total_count.
    assert_eq!(registry.total_count(), 2);
    let txt = registry.serialize_txt();
    assert!(txt.contains("ESPN,http://h/espn.m3u8"));
}

#[test]
fn convert_round_trips_txt_through_m3u_and_back() {
    let txt = "体育频道,#genre#\nESPN,http://h/espn.m3u8\n";
    let m3u = converter::txt_to_m3u(txt);
    assert!(m3u.starts_with("#EXTM3U"));
    assert!(m3u.contains("ESPN"));

    let back_to_txt = converter::m3u_to_txt(&m3u);
    assert!(back_to_txt.contains("ESPN,http://h/espn.m3u8"));
}

#[test]
fn merge_keeps_only_the_busiest_host() {
    let text = concat!(
        "体育频道,#genre#\n",
        "A,http://busy.example/a.m3u8\n",
        "B,http://busy.example/b.m3u8\n",
        "C,http://quiet.example/c.m3u8\n",
    );
    let events = parser::parse_txt(text).unwrap();
    let categories = Arc::new(CategoryManager::with_defaults());
    let result = merger::merge_top_hosts(&events, &categories, 1);

    assert_eq!(result.top_hosts.len(), 1);
    assert_eq!(result.top_hosts[0].host, "busy.example");
    assert_eq!(result.events.len(), 2);
}

#[tokio::test]
async fn mp4_endpoint_passes_shallow_and_deep_checks() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "video/mp4")
                .insert_header("content-length", "4096"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![
            0x00, 0x00, 0x00, 0x18, b'f', b't', b'y', b'p',
        ]))
        .mount(&server)
        .await;

    let validator = StreamValidator::new(validator_config()).unwrap();
    let registry = Arc::new(ChannelRegistry::new(Arc::new(CategoryManager::with_defaults())));
    let tasks = Arc::new(TaskRegistry::new());
    let orchestrator = BatchOrchestrator::new(
        tasks.clone(),
        Arc::new(validator),
        registry.clone(),
        OrchestratorConfig { io_intensity_factor: 4 },
    );

    let url_template = format!("{}/{{i}}.mp4", server.uri());
    let task_id = tasks
        .create(CreateTaskParams {
            task_type: "check_batch".to_string(),
            description: "mp4 batch".to_string(),
            url: url_template.clone(),
            total: 3,
        })
        .await;

    let success = orchestrator.check_batch(&task_id, &url_template, 0, 3, false, 8).await.unwrap();
    assert_eq!(success, 3);

    let task = tasks.get(&task_id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.processed, 3);
    assert_eq!(task.progress, 100.0);
    assert_eq!(registry.total_count(), 3);
}

#[tokio::test]
async fn unreachable_mp4_endpoints_fail_the_whole_batch() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let validator = StreamValidator::new(validator_config()).unwrap();
    let registry = Arc::new(ChannelRegistry::new(Arc::new(CategoryManager::with_defaults())));
    let tasks = Arc::new(TaskRegistry::new());
    let orchestrator = BatchOrchestrator::new(
        tasks.clone(),
        Arc::new(validator),
        registry.clone(),
        OrchestratorConfig { io_intensity_factor: 4 },
    );

    let url_template = format!("{}/{{i}}.mp4", server.uri());
    let task_id = tasks
        .create(CreateTaskParams {
            task_type: "check_batch".to_string(),
            description: "mp4 batch".to_string(),
            url: url_template.clone(),
            total: 2,
        })
        .await;

    let success = orchestrator.check_batch(&task_id, &url_template, 0, 2, false, 8).await.unwrap();
    assert_eq!(success, 0);
    assert_eq!(registry.total_count(), 0);

    let task = tasks.get(&task_id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.success, 0);
}
