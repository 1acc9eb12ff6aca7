use std::sync::Arc;

use anyhow::Context;
use citywatch::{
    actors::EvaluatorHandle,
    api::{ApiState, spawn_api_server},
    channels::Transports,
    config::{Config, read_config_file},
    dispatcher::Dispatcher,
    monitors::{BreachEvaluator, HttpSampler},
    storage::{AlertStore, Channel, sqlite::SqliteStore},
};
use clap::Parser;
use tracing::{info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file; defaults apply when omitted
    #[arg(short)]
    file: Option<String>,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("citywatch", LevelFilter::DEBUG),
        ("citywatch_hub", LevelFilter::TRACE),
        ("tower_http", LevelFilter::DEBUG),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let mut config = match &args.file {
        Some(path) => read_config_file(path)?,
        None => Config::default(),
    };
    config.apply_env_overrides();

    let store: Arc<dyn AlertStore> = Arc::new(
        SqliteStore::new(&config.storage.path)
            .await
            .context("failed to open alert store")?,
    );

    for operator in &config.operators {
        store.upsert_operator(operator).await?;
    }
    info!("loaded {} operator contacts", config.operators.len());

    let transports = Transports::from_config(&config.channels)?;
    for channel in Channel::ALL {
        if !transports.is_configured(channel) {
            warn!("{channel} channel is not configured; dispatches to it will be refused");
        }
    }

    let dispatcher = Dispatcher::new(
        store.clone(),
        transports,
        config.channels.send_timeout(),
    );

    let evaluator = start_evaluator(&config, store.clone(), dispatcher.clone())?;

    let state = ApiState::new(store.clone(), dispatcher, Some(evaluator.clone()));
    let addr = spawn_api_server(config.api.clone(), state).await?;
    info!("citywatch hub ready on http://{addr}/api/v1");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("shutting down");

    if let Err(e) = evaluator.shutdown().await {
        warn!("evaluator did not shut down cleanly: {e:#}");
    }
    store.close().await?;

    Ok(())
}

fn start_evaluator(
    config: &Config,
    store: Arc<dyn AlertStore>,
    dispatcher: Dispatcher,
) -> anyhow::Result<EvaluatorHandle> {
    let sampler = Arc::new(HttpSampler::new(&config.telemetry)?);

    let mut evaluator = BreachEvaluator::new(store, sampler, config.evaluator.dedup_window());
    if config.evaluator.notify_on_breach {
        evaluator = evaluator.notify_with(dispatcher);
    }

    info!(
        "evaluating {} every {}s",
        config.telemetry.url, config.evaluator.interval_secs
    );

    Ok(EvaluatorHandle::spawn(evaluator, config.evaluator.interval()))
}
