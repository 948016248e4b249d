use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use iptv_channel_validator::{
    category::{CategoryManager, UNCATEGORIZED},
    config::Config,
    format::{converter, merger, parser, sitemap},
    orchestrator::BatchOrchestrator,
    registry::ChannelRegistry,
    task::{CreateTaskParams, TaskRegistry},
    validator::StreamValidator,
};

#[derive(Parser)]
#[command(name = "iptv-channel-validator")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Validates, classifies, and normalizes IPTV live-stream channel data")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Probe one URL and print its TXT/M3U rendering.
    CheckSingle {
        url: String,
        /// Run the full manifest/segment/benchmark pipeline instead of a
        /// bare reachability check.
        #[arg(long)]
        deep: bool,
    },
    /// Probe a numbered family of URLs (`{i}` substituted over a range).
    CheckBatch {
        /// URL template containing a literal `{i}` placeholder.
        url_template: String,
        #[arg(long, default_value_t = 0)]
        start: i64,
        #[arg(long)]
        size: i64,
        #[arg(long)]
        deep: bool,
        #[arg(long, default_value_t = 16)]
        workers: usize,
    },
    /// Re-validate every channel in an existing TXT source, pruning dead
    /// endpoints and optionally writing the result back out.
    UpdateLive {
        /// Existing TXT-dialect source to load before re-validating.
        input: PathBuf,
        #[arg(long)]
        deep: bool,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long, default_value_t = 16)]
        workers: usize,
    },
    /// Convert between the TXT and M3U dialects.
    Convert {
        input: PathBuf,
        /// Target dialect: `txt` or `m3u`.
        #[arg(long = "to")]
        to: String,
    },
    /// Keep only channels served by the busiest hosts.
    Merge {
        input: PathBuf,
        #[arg(long, default_value_t = 10)]
        top_n: usize,
    },
    /// Fetch a sitemap's linked TXT live-sources and print the merged TXT.
    FetchSitemap { sitemap_url: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("iptv_channel_validator={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("iptv-channel-validator v{}", env!("CARGO_PKG_VERSION"));

    std::env::set_var("CONFIG_FILE", &cli.config);
    let config = Config::load()?;

    match cli.command {
        Command::CheckSingle { url, deep } => {
            let validator = StreamValidator::new(config.validator)?;
            let registry = Arc::new(ChannelRegistry::new(Arc::new(CategoryManager::with_defaults())));
            let tasks = Arc::new(TaskRegistry::new());
            let orchestrator =
                BatchOrchestrator::new(tasks, Arc::new(validator), registry, config.orchestrator);

            let (ok, channel) = orchestrator.check_single(&url, deep).await;
            if ok {
                println!("{}", channel.render_combined(UNCATEGORIZED));
            } else {
                eprintln!("probe failed for {url}");
                std::process::exit(1);
            }
        }

        Command::CheckBatch { url_template, start, size, deep, workers } => {
            let validator = Arc::new(StreamValidator::new(config.validator)?);
            let registry = Arc::new(ChannelRegistry::new(Arc::new(CategoryManager::with_defaults())));
            let tasks = Arc::new(TaskRegistry::new());
            let orchestrator = BatchOrchestrator::new(
                tasks.clone(),
                validator,
                registry.clone(),
                config.orchestrator,
            );

            let task_id = tasks
                .create(CreateTaskParams {
                    task_type: "check_batch".to_string(),
                    description: format!("checking {size} urls from {start}"),
                    url: url_template.clone(),
                    total: size,
                })
                .await;

            let success = orchestrator
                .check_batch(&task_id, &url_template, start, size, deep, workers)
                .await?;

            info!(success, size, "batch check complete");
            println!("{}", registry.serialize_txt());
        }

        Command::UpdateLive { input, deep, output, workers } => {
            let text = std::fs::read_to_string(&input)?;
            let registry = Arc::new(ChannelRegistry::new(Arc::new(CategoryManager::with_defaults())));
            for event in parser::parse_txt(&text)? {
                registry.add(&event.category_hint, &event.channel_name, &event.url, event.id.as_deref(), event.logo.as_deref());
            }
            registry.sort();
            let total = registry.total_count() as i64;

            let validator = Arc::new(StreamValidator::new(config.validator)?);
            let tasks = Arc::new(TaskRegistry::new());
            let orchestrator = BatchOrchestrator::new(
                tasks.clone(),
                validator,
                registry.clone(),
                config.orchestrator,
            );

            let task_id = tasks
                .create(CreateTaskParams {
                    task_type: "update_batch_live".to_string(),
                    description: format!("re-validating {}", input.display()),
                    url: input.display().to_string(),
                    total,
                })
                .await;

            let success = orchestrator
                .update_batch_live(&task_id, deep, output.as_deref(), workers)
                .await?;

            info!(success, total, "live update complete");
            if output.is_none() {
                println!("{}", registry.serialize_txt());
            }
        }

        Command::Convert { input, to } => {
            let text = std::fs::read_to_string(&input)?;
            let converted = match to.as_str() {
                "txt" => converter::m3u_to_txt(&text),
                "m3u" => converter::txt_to_m3u(&text),
                other => anyhow::bail!("unknown target dialect: {other} (expected txt or m3u)"),
            };
            println!("{converted}");
        }

        Command::Merge { input, top_n } => {
            let text = std::fs::read_to_string(&input)?;
            let events = parser::parse_txt(&text)?;
            let categories = Arc::new(CategoryManager::with_defaults());
            let result = merger::merge_top_hosts(&events, &categories, top_n);
            println!("{}", merger::format_output(&result, &categories));
        }

        Command::FetchSitemap { sitemap_url } => {
            let client = reqwest::Client::new();
            let categories = Arc::new(CategoryManager::with_defaults());
            let events = sitemap::fetch_sitemap_events(&client, &sitemap_url, &categories).await?;

            let registry = ChannelRegistry::new(categories);
            for event in events {
                registry.add(&event.category_hint, &event.channel_name, &event.url, event.id.as_deref(), event.logo.as_deref());
            }
            registry.sort();
            println!("{}", registry.serialize_txt());
        }
    }

    Ok(())
}
