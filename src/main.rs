use std::io::Write;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;

use dnscacher::app::{logging, App};
use dnscacher::config::cli::Cli;
use dnscacher::config::{load_config_file, FileConfig, Settings};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // 日志初始化之前的错误只能直接写 stderr
    let settings = match settings(cli) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = logging::init(settings.loglevel, settings.quiet, settings.log.as_deref()) {
        eprintln!("error: {:#}", e);
        return ExitCode::FAILURE;
    }

    let quiet = settings.quiet;
    match run(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logging::report_fatal(&format!("{:#}", e), quiet, &mut std::io::stderr());
            ExitCode::FAILURE
        }
    }
}

fn settings(cli: Cli) -> Result<Settings> {
    let overrides = cli.into_overrides();
    let file = match overrides.config.as_deref() {
        Some(path) => load_config_file(path)?,
        None => FileConfig::default(),
    };
    Ok(Settings::resolve(overrides, file)?)
}

async fn run(settings: Settings) -> Result<()> {
    debug!(command = settings.command.as_str(), "dnscacher starting");
    let output = App::new(settings).run().await?;
    if !output.is_empty() {
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(output.as_bytes())
            .and_then(|_| stdout.flush())
            .context("failed to write output")?;
    }
    Ok(())
}
