use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use kubepulse::config::{self, Config, CONFIG_FILE_PATH};
use kubepulse::feeds::{source_from_config, ClusterSource, DemoSource, MetricKind, MetricsFeed};
use kubepulse::logger::{self, LogTag};
use kubepulse::stream::Topic;

#[derive(Parser)]
#[command(name = "kubepulse")]
#[command(about = "Kubernetes cluster metrics producer and stream watcher", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = CONFIG_FILE_PATH)]
    config: String,

    #[command(flatten)]
    logging: LoggingArgs,

    #[command(subcommand)]
    command: Command,
}

/// Read by the logger straight from the process arguments; declared so clap accepts them
#[derive(Args)]
#[allow(dead_code)]
struct LoggingArgs {
    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[arg(long, global = true)]
    debug_stream: bool,

    #[arg(long, global = true)]
    debug_producer: bool,

    #[arg(long, global = true)]
    debug_feeds: bool,

    #[arg(long, global = true)]
    debug_api: bool,

    #[arg(long, global = true)]
    debug_config: bool,

    #[arg(long, global = true)]
    debug_system: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run the metrics producer (HTTP snapshots + WebSocket stream)
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,

        /// Serve randomised readings instead of probing kubectl
        #[arg(long)]
        demo: bool,
    },

    /// Connect to a producer and print what arrives
    Watch {
        #[arg(long)]
        api_url: Option<String>,

        /// Topic to print (repeatable); all known topics by default
        #[arg(long = "topic")]
        topics: Vec<String>,

        /// Use fixture data instead of a live producer
        #[arg(long)]
        demo: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    #[cfg(feature = "logging")]
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    logger::init();
    kubepulse::arguments::print_debug_info();

    config::load_config_from_path(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config))?;
    let config = config::get_config_clone();

    logger::info(
        LogTag::System,
        &format!("kubepulse {} starting", env!("CARGO_PKG_VERSION")),
    );

    match cli.command {
        Command::Serve { host, port, demo } => serve(config, host, port, demo).await,
        Command::Watch {
            api_url,
            topics,
            demo,
        } => watch_stream(config, api_url, topics, demo).await,
    }
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        logger::error(LogTag::System, &format!("Failed to listen for Ctrl+C: {}", e));
    }
}

#[cfg(feature = "web")]
async fn serve(mut config: Config, host: Option<String>, port: Option<u16>, demo: bool) -> Result<()> {
    use kubepulse::producer::{probe_for, ProducerServer};

    if let Some(host) = host {
        config.producer.host = host;
    }
    if let Some(port) = port {
        config.producer.port = port;
    }

    let probe = probe_for(&config.producer, demo || config.feeds.demo_mode);
    let server = ProducerServer::start(config.producer.clone(), probe)
        .await
        .context("starting producer")?;

    wait_for_ctrl_c().await;
    logger::info(LogTag::System, "Shutdown requested");
    server.stop().await.context("stopping producer")?;
    Ok(())
}

#[cfg(not(feature = "web"))]
async fn serve(_config: Config, _host: Option<String>, _port: Option<u16>, _demo: bool) -> Result<()> {
    anyhow::bail!("kubepulse was built without the `web` feature; `serve` is unavailable")
}

fn print_frame(topic: &str, payload: &serde_json::Value) {
    let time = chrono::Local::now().format("%H:%M:%S");
    println!("{} {} {}", time.to_string().dimmed(), topic.cyan().bold(), payload);
}

fn print_summary(feed: &MetricsFeed) {
    println!("\n{}", "Latest readings".bold());
    for kind in MetricKind::ALL {
        match feed.latest(kind) {
            Some(sample) => println!(
                "  {:<8} {:>8.1}  ({}, {} samples)",
                kind.key(),
                sample.value,
                feed.trend(kind),
                feed.samples(kind).len()
            ),
            None => println!("  {:<8} {:>8}", kind.key(), "-"),
        }
    }
    println!(
        "  {} event(s), {} alert(s)",
        feed.events().len(),
        feed.alerts().len()
    );
}

async fn watch_stream(mut config: Config, api_url: Option<String>, topics: Vec<String>, demo: bool) -> Result<()> {
    if let Some(url) = api_url {
        config.stream.api_url = url;
    }
    if demo {
        config.feeds.demo_mode = true;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut demo_task = None;
    let source: Arc<dyn ClusterSource> = if config.feeds.demo_mode {
        let fixtures = Arc::new(DemoSource::new());
        demo_task = Some(tokio::spawn(fixtures.clone().run(
            Duration::from_secs(config.producer.metrics_interval_secs.max(1)),
            shutdown_rx,
        )));
        fixtures
    } else {
        source_from_config(&config).context("connecting to metrics stream")?
    };

    let topics: Vec<String> = if topics.is_empty() {
        Topic::ALL.iter().map(|t| t.code().to_string()).collect()
    } else {
        topics
    };

    let _subscriptions: Vec<_> = topics
        .iter()
        .map(|topic| {
            let name = topic.clone();
            source.subscribe(
                topic,
                Arc::new(move |payload: &serde_json::Value| print_frame(&name, payload)),
            )
        })
        .collect();

    let feed = MetricsFeed::new(source.clone(), config.feeds.sample_window);
    if let Err(e) = feed.bootstrap().await {
        logger::warning(
            LogTag::System,
            &format!("Initial snapshot unavailable, waiting for the stream: {}", e),
        );
    }

    logger::info(
        LogTag::System,
        &format!(
            "Watching {} topic(s) from {} source (Ctrl+C to stop)",
            topics.len(),
            source.name()
        ),
    );

    wait_for_ctrl_c().await;
    shutdown_tx.send_replace(true);
    if let Some(task) = demo_task {
        let _ = task.await;
    }

    print_summary(&feed);
    Ok(())
}
