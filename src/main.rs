mod bitable;
mod cli;
mod config;
mod error;
mod poller;
mod proxy;
mod ranking;
mod status;
mod ui;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use simplelog::{ColorChoice, Config as LogConfig, LevelFilter, TermLogger, TerminalMode};
use tokio_util::sync::CancellationToken;

use cli::{Cli, Command};
use config::AppConfig;
use poller::{HttpStatusSource, PollOutcome, PollSettings};
use ranking::SortMode;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Command::Serve { bind } => serve(config, bind, cli.verbose).await,
        Command::Watch {
            job_id,
            proxy,
            interval_ms,
            max_errors,
            sort,
        } => watch(config, job_id, proxy, interval_ms, max_errors, sort).await,
    }
}

async fn serve(mut config: AppConfig, bind: Option<String>, verbose: bool) -> Result<()> {
    init_logging(verbose)?;
    if let Some(bind) = bind {
        config.bind = bind;
    }
    let state = proxy::ProxyState::new(Arc::new(config));
    proxy::serve(state).await
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    TermLogger::init(
        level,
        LogConfig::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )?;
    Ok(())
}

async fn watch(
    config: AppConfig,
    job_id: String,
    proxy: String,
    interval_ms: Option<u64>,
    max_errors: Option<u32>,
    sort: SortMode,
) -> Result<()> {
    let settings = PollSettings {
        interval_ms: interval_ms.unwrap_or(config.poll_interval_ms),
        max_errors: max_errors.unwrap_or(config.max_errors),
    };
    let source = HttpStatusSource::new(proxy);
    let progress = ui::WatchProgress::start(&job_id);

    // Ctrl-c cancels the run instead of waiting out the current sleep.
    let cancel = CancellationToken::new();
    let ctrlc = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrlc.cancel();
        }
    });

    match poller::poll_job(&source, &job_id, settings, &progress, cancel).await {
        PollOutcome::Finished(results) => {
            progress.finish_success(results.len());
            let ordered = ranking::rank(&results, sort);
            ui::print_results(&ordered);
            Ok(())
        }
        PollOutcome::Failed(message) => {
            progress.finish_error(&message);
            anyhow::bail!("polling failed: {message}")
        }
        PollOutcome::Cancelled => {
            progress.finish_cancelled();
            Ok(())
        }
    }
}
