use anyhow::Context;
use clap::Parser;
use ffmpeg_transcode::{Ffmpeg, Transcoder};
use tokio_util::sync::CancellationToken;

mod cli;
mod config;

use cli::Cli;

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .filter_module("ffmpeg_transcode", level)
        .filter_module("lite_transcode", level)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    ffmpeg_transcode::init().map_err(|e| anyhow::anyhow!("ffmpeg_transcode init: {}", e))?;
    let config = config::load(cli.config.as_deref())?.merge(&cli);
    log::debug!("config: {:?}", config);

    let cancel = CancellationToken::new();
    let transcoder = Transcoder::new(Ffmpeg)
        .with_config(config)
        .with_cancel(cancel.clone());
    let (input, output) = (cli.input, cli.output);
    let mut task = tokio::task::spawn_blocking(move || transcoder.run(&input, &output));

    let result = loop {
        tokio::select! {
            result = &mut task => break result.context("transcode task")?,
            _ = tokio::signal::ctrl_c() => {
                log::warn!("interrupted, cancelling");
                cancel.cancel();
            },
        }
    };

    match result {
        Ok(summary) => {
            for stats in &summary.streams {
                log::info!(
                    "stream #{}: {} read, {} decoded, {} filtered, {} written",
                    stats.index,
                    stats.packets_read,
                    stats.frames_decoded,
                    stats.frames_filtered,
                    stats.packets_written
                );
            }
            Ok(())
        }
        Err(err) => anyhow::bail!("transcode failed (status {}): {}", err.status_code(), err),
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::ExitCode::FAILURE
        }
    }
}
