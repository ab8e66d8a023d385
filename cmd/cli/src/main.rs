use anyhow::anyhow;
use aws_config::BehaviorVersion;
use aws_sdk_sqs::Client;
use clap::{Parser, ValueEnum};
use sqs_worker::{Registry, Server, SqsQueue};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

mod exec;

use exec::ExecHandler;

/// Pulls messages from SQS and executes the specified command
#[derive(Debug, Parser)]
struct Cli {
    /// SQS Endpoint URL
    #[arg(short('E'), long, env = "AWS_ENDPOINT_URL")]
    endpoint_url: Option<String>,

    /// SQS Queue URL
    #[arg(short('Q'), long, env = "QUEUE_URL")]
    queue_url: Option<String>,

    /// Seconds to long-poll for each receive
    #[arg(
        short('W'),
        long,
        env = "SQS_WAIT_TIME_SECONDS",
        default_value_t = 0,
        value_parser = clap::value_parser!(i32).range(0..=20)
    )]
    wait_time_seconds: i32,

    /// exec arguments. Use {}.body to get the message
    #[arg(short, long, allow_hyphen_values = true)]
    exec: Vec<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|err| anyhow!(err))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Failed to listen for the shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal, finishing the current message");
}

fn registry(exec: &[String]) -> Registry {
    match ExecHandler::from_args(exec) {
        Some(handler) => Registry::new().register(handler),
        None => {
            warn!("No --exec command given, received messages will be left on the queue");
            Registry::new()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    debug!(?args, "Parsed arguments");

    let mut loader = aws_config::defaults(BehaviorVersion::v2023_11_09());
    if let Some(endpoint_url) = &args.endpoint_url {
        loader = loader.endpoint_url(endpoint_url)
    }
    let config = loader.load().await;
    let client = Client::new(&config);

    let wait_time_seconds = args.wait_time_seconds;
    let connect =
        move |queue_url: &str| SqsQueue::new(client, queue_url).wait_time_seconds(wait_time_seconds);

    Server::new(args.queue_url, connect, registry(&args.exec))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    Ok(())
}
