mod cli;
mod interrupt;
mod report;
mod scan;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer};

use cli::{Cli, Command, RunArgs};
use interrupt::ConsoleReporter;
use report::RunReport;
use orderdesk::db::Database;
use orderdesk::{
    load_config, AiClient, BatchOptions, BatchOrchestrator, CompanyDetector, CompanyDirectory,
    Config, GeminiClient, SingleFileProcessor, SourceFile, SqliteStore, Store, MAX_BATCH_FILES,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs)?;

    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load config: {}", cli.config.display()))?;

    match cli.command {
        Command::Run(args) => run_batch(config, args).await,
        Command::Detect { file } => detect(config, &file).await,
    }
}

fn init_logging(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .compact()
            .with_writer(std::io::stderr)
            .boxed()
    };
    let subscriber = tracing_subscriber::registry().with(fmt_layer.with_filter(filter));

    // The library logs through the `log` facade.
    tracing_log::LogTracer::init().context("Failed to install log bridge")?;
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;
    Ok(())
}

struct Services {
    store: Arc<dyn Store>,
    ai: Arc<dyn AiClient>,
    detector: Arc<CompanyDetector>,
}

async fn build_services(config: &Config) -> Result<Services> {
    let db_path = config
        .database_path()
        .context("Could not determine a database location; set database_path")?;
    let sqlite = SqliteStore::new(Database::open(&db_path)?);
    let seeded = sqlite.seed_rules(config.rules.clone()).await?;
    if seeded > 0 {
        info!("Seeded {} detection rules from config", seeded);
    }
    let store: Arc<dyn Store> = Arc::new(sqlite);

    let ai: Arc<dyn AiClient> = Arc::new(GeminiClient::from_config(&config.ai)?);
    let directory = CompanyDirectory::new(config.companies.clone());
    let detector = CompanyDetector::load(
        Arc::clone(&ai),
        Arc::clone(&store),
        directory,
        config.detection.clone(),
    )
    .await;

    Ok(Services {
        store,
        ai,
        detector: Arc::new(detector),
    })
}

async fn run_batch(config: Config, args: RunArgs) -> Result<()> {
    args.validate()?;

    let documents = scan::collect_documents(&args.inputs)?;
    if documents.is_empty() {
        anyhow::bail!("No supported documents found in the given inputs");
    }
    let chunk_size = config.batch.max_files.clamp(1, MAX_BATCH_FILES);
    info!(
        "Found {} documents, running in batches of up to {}",
        documents.len(),
        chunk_size
    );

    let services = build_services(&config).await?;
    let processor = SingleFileProcessor::new(
        services.detector,
        services.ai,
        Arc::clone(&services.store),
    );
    let orchestrator = BatchOrchestrator::new(
        Arc::new(processor),
        services.store,
        config.batch.clone(),
        config.tracker.clone(),
    )
    .with_reporter(Arc::new(ConsoleReporter));

    let handle = orchestrator.handle();
    let stop = interrupt::install(handle.clone())?;

    let options = BatchOptions {
        concurrency_limit: args.concurrency,
        auto_detect_enabled: !args.no_auto_detect,
        retry_failed_files: args.retry_failed,
        pause_on_error: args.pause_on_error,
        company_id: args.company,
    };

    let mut report = RunReport::new(documents.len());
    let chunks: Vec<_> = documents.chunks(chunk_size).collect();
    for (i, chunk) in chunks.iter().enumerate() {
        if stop.load(Ordering::SeqCst) {
            break;
        }

        let mut files = Vec::with_capacity(chunk.len());
        for doc in chunk.iter() {
            let mut file = SourceFile::from_path(&doc.path)
                .await
                .with_context(|| format!("Failed to read {}", doc.path.display()))?;
            file.file_name = doc.name.clone();
            files.push(file);
        }

        info!("Starting batch {} of {}", i + 1, chunks.len());
        let summary = orchestrator.start_batch(files, options.clone()).await?;
        let paused = summary.paused_on_error;
        report.add(summary);
        if report.was_cancelled() {
            break;
        }

        // An error pause from the last file holds the remaining batches too.
        if paused && i + 1 < chunks.len() {
            while handle.is_paused() && !stop.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    if report.error > 0 {
        std::process::exit(2);
    }
    Ok(())
}

async fn detect(config: Config, path: &std::path::Path) -> Result<()> {
    let file = SourceFile::from_path(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let services = build_services(&config).await?;

    let result = services
        .detector
        .detect_document(Some(&file.file_name), &file.bytes, &file.mime_type)
        .await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
