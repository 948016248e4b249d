//! Batch orchestrator: runs the Stream Validator across many URL-endpoints
//! concurrently, reporting progress onto a task record (spec §4.G).
//!
//! Grounded on `backend/services/checker.py::ChannelChecker.check_batch` /
//! `update_batch_live` (generator + bounded thread pool, shared counters
//! under a lock, count-reconciliation, output persistence) with Python's
//! `ThreadPoolExecutor` replaced by `futures::stream::buffer_unordered`
//! over a `tokio` runtime, matching the teacher's async-worker-pool idiom.

use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{error, warn};

use crate::config::OrchestratorConfig;
use crate::errors::{AppError, OrchestratorError};
use crate::models::{Channel, UrlEndpoint};
use crate::registry::ChannelRegistry;
use crate::task::{TaskPatch, TaskRegistry, TaskStatus};
use crate::validator::StreamValidator;

/// Coordinates a pool of probes against the Stream Validator, patching a
/// task record's progress as results arrive.
pub struct BatchOrchestrator {
    tasks: Arc<TaskRegistry>,
    validator: Arc<StreamValidator>,
    registry: Arc<ChannelRegistry>,
    config: OrchestratorConfig,
}

impl BatchOrchestrator {
    pub fn new(
        tasks: Arc<TaskRegistry>,
        validator: Arc<StreamValidator>,
        registry: Arc<ChannelRegistry>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            tasks,
            validator,
            registry,
            config,
        }
    }

    /// `min(requested, cpus * io_intensity_factor + 1)`.
    fn worker_count(&self, requested: usize) -> usize {
        let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        requested.min(cpus * self.config.io_intensity_factor + 1)
    }

    /// Probes a single ad-hoc URL, independent of the registry. Used by the
    /// CLI's `check-single` subcommand.
    pub async fn check_single(&self, url: &str, deep: bool) -> (bool, Arc<Channel>) {
        let channel = Arc::new(Channel::new(url, ""));
        let endpoint = Arc::new(UrlEndpoint::new(url));
        channel.add_endpoint(endpoint.clone());
        let ok = self.validator.validate(&channel, &endpoint, deep).await;
        if ok && !channel.has_name() {
            channel.set_name(None);
        }
        (ok, channel)
    }

    /// Probes `size` URLs generated by substituting `{i}` in `url_template`
    /// with each index in `start..start+size`, recording every passing
    /// channel into the registry. Returns the number that passed.
    pub async fn check_batch(
        &self,
        task_id: &str,
        url_template: &str,
        start: i64,
        size: i64,
        deep: bool,
        requested_workers: usize,
    ) -> Result<i64, AppError> {
        if size <= 0 {
            return Err(OrchestratorError::EmptyBatch { size }.into());
        }
        if !url_template.contains("{i}") {
            return Err(OrchestratorError::MissingPlaceholder {
                template: url_template.to_string(),
            }
            .into());
        }

        self.tasks
            .update(task_id, TaskPatch { status: Some(TaskStatus::Running), ..Default::default() })
            .await?;

        let workers = self.worker_count(requested_workers);
        let processed = Arc::new(AtomicI64::new(0));
        let success = Arc::new(AtomicI64::new(0));

        stream::iter(start..start + size)
            .for_each_concurrent(workers, |index| {
                let validator = self.validator.clone();
                let registry = self.registry.clone();
                let tasks = self.tasks.clone();
                let task_id = task_id.to_string();
                let processed = processed.clone();
                let success = success.clone();
                let url = url_template.replace("{i}", &index.to_string());

                async move {
                    let channel = Arc::new(Channel::new(index.to_string(), ""));
                    let endpoint = Arc::new(UrlEndpoint::new(url.clone()));
                    channel.add_endpoint(endpoint.clone());

                    let ok = validator.validate(&channel, &endpoint, deep).await;
                    if ok {
                        if !channel.has_name() {
                            channel.set_name(None);
                        }
                        registry.add("", &channel.name(), &url, Some(&index.to_string()), None);
                        success.fetch_add(1, Ordering::SeqCst);
                    }

                    let processed_now = processed.fetch_add(1, Ordering::SeqCst) + 1;
                    let _ = tasks
                        .update(
                            &task_id,
                            TaskPatch {
                                processed: Some(processed_now),
                                success: Some(success.load(Ordering::SeqCst)),
                                ..Default::default()
                            },
                        )
                        .await;
                }
            })
            .await;

        self.registry.sort();
        let final_success = success.load(Ordering::SeqCst);
        self.tasks
            .update(task_id, TaskPatch { status: Some(TaskStatus::Completed), ..Default::default() })
            .await?;
        Ok(final_success)
    }

    /// Re-validates every endpoint already held by the registry, pruning
    /// endpoints that now fail, and optionally persists the result to
    /// `output_path` (TXT) and its `.m3u` sibling. A persistence failure is
    /// logged, not propagated — the task still reports completed.
    pub async fn update_batch_live(
        &self,
        task_id: &str,
        deep: bool,
        output_path: Option<&Path>,
        requested_workers: usize,
    ) -> Result<i64, AppError> {
        self.tasks
            .update(task_id, TaskPatch { status: Some(TaskStatus::Running), ..Default::default() })
            .await?;

        let categories = self.registry.categories().clone();
        let mut jobs: Vec<(Arc<Channel>, Arc<UrlEndpoint>)> = Vec::new();
        for group in self.registry.group_names() {
            if categories.is_ignored(&group) {
                continue;
            }
            for channel in self.registry.channels_in_group(&group) {
                for endpoint in channel.endpoints_by_speed() {
                    jobs.push((channel.clone(), endpoint));
                }
            }
        }

        let actual_total = jobs.len() as i64;
        let expected_total = self.tasks.get(task_id).await.map(|t| t.total).unwrap_or(actual_total);
        if actual_total != expected_total {
            warn!(actual_total, expected_total, "actual task count differs from expected total");
            self.tasks
                .update(task_id, TaskPatch { total: Some(actual_total), ..Default::default() })
                .await?;
        }

        let workers = self.worker_count(requested_workers);
        let processed = Arc::new(AtomicI64::new(0));
        let success = Arc::new(AtomicI64::new(0));

        stream::iter(jobs)
            .for_each_concurrent(workers, |(channel, endpoint)| {
                let validator = self.validator.clone();
                let tasks = self.tasks.clone();
                let task_id = task_id.to_string();
                let processed = processed.clone();
                let success = success.clone();

                async move {
                    let ok = validator.validate(&channel, &endpoint, deep).await;
                    if ok {
                        success.fetch_add(1, Ordering::SeqCst);
                    } else {
                        channel.remove_endpoint(endpoint.original_url());
                    }

                    let processed_now = processed.fetch_add(1, Ordering::SeqCst) + 1;
                    let _ = tasks
                        .update(
                            &task_id,
                            TaskPatch {
                                processed: Some(processed_now),
                                success: Some(success.load(Ordering::SeqCst)),
                                ..Default::default()
                            },
                        )
                        .await;
                }
            })
            .await;

        let final_success = success.load(Ordering::SeqCst);

        if let Some(path) = output_path {
            self.write_outputs(path);
        }

        self.tasks
            .update(task_id, TaskPatch { status: Some(TaskStatus::Completed), ..Default::default() })
            .await?;
        Ok(final_success)
    }

    fn write_outputs(&self, path: &Path) {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();

        if let Err(e) = self.write_file(path, &timestamp, self.registry.serialize_txt()) {
            error!(path = %path.display(), error = %e, "failed to save channel data to txt file");
        }

        let m3u_path = path.with_extension("m3u");
        if let Err(e) = self.write_file(&m3u_path, &timestamp, self.registry.serialize_m3u()) {
            error!(path = %m3u_path.display(), error = %e, "failed to save channel data to m3u file");
        }
    }

    fn write_file(&self, path: &Path, timestamp: &str, body: String) -> Result<(), AppError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| AppError::persistence(path.display().to_string(), e))?;
            }
        }
        let contents = format!("# 频道数据导出时间: {timestamp}\n{body}\n");
        std::fs::write(path, contents).map_err(|e| AppError::persistence(path.display().to_string(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::CategoryManager;
    use crate::config::ValidatorConfig;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn validator_config() -> ValidatorConfig {
        ValidatorConfig {
            request_timeout_secs: 5,
            probe_hard_timeout_secs: 5,
            connect_timeout_secs: 2,
            ts_segment_test_count: 3,
            name_extraction_timeout_secs: 2,
            benchmark_chunk_size: 1024,
            benchmark_chunk_count: 4,
        }
    }

    fn orchestrator(registry: Arc<ChannelRegistry>) -> (Arc<TaskRegistry>, BatchOrchestrator) {
        let tasks = Arc::new(TaskRegistry::new());
        let validator = Arc::new(StreamValidator::new(validator_config()).unwrap());
        let orch = BatchOrchestrator::new(
            tasks.clone(),
            validator,
            registry,
            OrchestratorConfig { io_intensity_factor: 4 },
        );
        (tasks, orch)
    }

    #[tokio::test]
    async fn check_batch_rejects_zero_size() {
        let registry = Arc::new(ChannelRegistry::new(Arc::new(CategoryManager::with_defaults())));
        let (tasks, orch) = orchestrator(registry);
        let id = tasks
            .create(crate::task::CreateTaskParams {
                task_type: "check_batch".to_string(),
                description: "d".to_string(),
                url: "http://h/{i}.mp4".to_string(),
                total: 0,
            })
            .await;
        let result = orch.check_batch(&id, "http://h/{i}.mp4", 0, 0, false, 4).await;
        assert!(matches!(result, Err(AppError::Orchestrator(OrchestratorError::EmptyBatch { .. }))));
    }

    #[tokio::test]
    async fn check_batch_rejects_missing_placeholder() {
        let registry = Arc::new(ChannelRegistry::new(Arc::new(CategoryManager::with_defaults())));
        let (tasks, orch) = orchestrator(registry);
        let id = tasks
            .create(crate::task::CreateTaskParams {
                task_type: "check_batch".to_string(),
                description: "d".to_string(),
                url: "http://h/fixed.mp4".to_string(),
                total: 1,
            })
            .await;
        let result = orch.check_batch(&id, "http://h/fixed.mp4", 0, 1, false, 4).await;
        assert!(matches!(
            result,
            Err(AppError::Orchestrator(OrchestratorError::MissingPlaceholder { .. }))
        ));
    }

    #[tokio::test]
    async fn check_batch_records_passing_mp4_urls_and_updates_task() {
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

        let registry = Arc::new(ChannelRegistry::new(Arc::new(CategoryManager::with_defaults())));
        let (tasks, orch) = orchestrator(registry.clone());
        let template = format!("{}/{{i}}.mp4", server.uri());
        let id = tasks
            .create(crate::task::CreateTaskParams {
                task_type: "check_batch".to_string(),
                description: "d".to_string(),
                url: template.clone(),
                total: 2,
            })
            .await;

        let success = orch.check_batch(&id, &template, 0, 2, false, 4).await.unwrap();
        assert_eq!(success, 2);
        assert_eq!(registry.total_count(), 2);

        let task = tasks.get(&id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.success, 2);
        assert_eq!(task.processed, 2);
    }
}
