use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use daybook::clock::SystemClock;
use daybook::config;
use daybook::crypto::Codec;
use daybook::db;
use daybook::producer;
use daybook::queue::TaskQueue;
use daybook::store::{KvStore, RedisStore};
use daybook::summarizer::HttpSummarizer;
use daybook::worker::{Worker, WorkerSettings};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the summary worker until interrupted
    Run,
    /// Execute one summary production pass over the week that just ended
    Produce,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    let codec = Arc::new(Codec::from_base64(&cfg.encryption_key())?);
    let store: Arc<dyn KvStore> = Arc::new(RedisStore::connect(&cfg.redis.url).await?);
    let queue = TaskQueue::new(store.clone());

    match args.command {
        Command::Produce => {
            let report =
                producer::run_once(&pool, &codec, &queue, store.as_ref(), &SystemClock).await?;
            info!(
                entries = report.entries_seen,
                tasks = report.tasks_queued,
                "producer run finished"
            );
        }
        Command::Run => {
            let summarizer = Arc::new(HttpSummarizer::new(
                &cfg.summarizer.endpoint,
                cfg.summarizer.api_key.clone(),
                cfg.dispatch_timeout(),
            )?);
            let worker = Worker::new(
                pool.clone(),
                codec,
                queue,
                summarizer,
                Arc::new(SystemClock),
                WorkerSettings::from_config(&cfg.app),
            );

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let handle = tokio::spawn(async move { worker.run(shutdown_rx).await });

            tokio::signal::ctrl_c().await?;
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
            handle.await?;
        }
    }

    Ok(())
}
