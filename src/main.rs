use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use attach2s::build_pipeline;
use attach2s::config::Attach2sConfig;
use attach2s::metrics::{gather_metrics, setup_metrics_provider};
use attach2s::pipeline::models::FetchRequest;
use clap::{command, Parser, ValueEnum};
use dotenvy::dotenv;
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer, Registry};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Attach2sArgs {
    #[arg(long)]
    config_file: PathBuf,
    /// Fetch request JSON; read from stdin when omitted.
    #[arg(long)]
    request_file: Option<PathBuf>,
    #[arg(long, default_value = "INFO")]
    log_level: String,
    // Stdout carries the batch result, so console logs go to stderr.
    #[arg(long, value_enum, default_value_t = LoggingType::Pretty)]
    stderr_log_kind: LoggingType,
    #[arg(long, value_enum, default_value_t = LoggingType::JSON)]
    file_log_kind: LoggingType,
    #[arg(long, default_value = "logs")]
    file_log_dir: String,
    #[arg(long)]
    print_metrics: bool,
}

#[derive(ValueEnum, Clone, Debug)]
pub enum LoggingType {
    None,
    Pretty,
    JSON,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    dotenv().ok();
    let args = Attach2sArgs::parse();

    let _observability_guard = setup_logging(
        &args.log_level,
        &args.stderr_log_kind,
        &args.file_log_kind,
        &args.file_log_dir,
    );
    setup_metrics_provider()?;

    let config = Attach2sConfig::from_file(&args.config_file)?;
    info!(
        request_timeout_secs = config.request_timeout_secs,
        "Parsed config contents"
    );

    let request = read_request(args.request_file.as_deref())?;
    info!(items = request.items.len(), "Parsed fetch request");

    let pipeline = build_pipeline(&config).await?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling remaining attachments");
            on_signal.cancel();
        }
    });

    let batch = pipeline.run(&request, &cancel).await;
    println!("{}", serde_json::to_string_pretty(&batch)?);

    if args.print_metrics {
        eprintln!("{}", gather_metrics()?);
    }

    // Returning, not exiting, lets the log guard flush the file writer.
    if batch.error_flag {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn read_request(path: Option<&std::path::Path>) -> Result<FetchRequest, Box<dyn std::error::Error>> {
    let raw = match path {
        Some(path) => {
            info!("About to read fetch request from {}", path.display());
            std::fs::read_to_string(path)?
        }
        None => {
            let mut raw = String::new();
            std::io::stdin().read_to_string(&mut raw)?;
            raw
        }
    };
    Ok(serde_json::from_str(&raw)?)
}

pub fn setup_logging(
    log_level: &str,
    stderr_log_kind: &LoggingType,
    file_log_kind: &LoggingType,
    file_log_dir: &str,
) -> WorkerGuard {
    let (non_blocking_writer, _guard) = tracing_appender::non_blocking(
        tracing_appender::rolling::daily(file_log_dir, "attach2s.log"),
    );

    let stderr_layer = match stderr_log_kind {
        LoggingType::Pretty => Some(fmt::layer().with_writer(std::io::stderr).pretty().boxed()),
        LoggingType::JSON => Some(fmt::layer().with_writer(std::io::stderr).json().boxed()),
        LoggingType::None => None,
    };

    let file_layer = match file_log_kind {
        LoggingType::Pretty => Some(
            fmt::layer()
                .with_writer(non_blocking_writer)
                .pretty()
                .boxed(),
        ),
        LoggingType::JSON => Some(fmt::layer().with_writer(non_blocking_writer).json().boxed()),
        LoggingType::None => None,
    };

    Registry::default()
        .with(LevelFilter::from_str(log_level).unwrap_or(LevelFilter::INFO))
        .with(stderr_layer)
        .with(file_layer)
        .init();
    _guard
}
