// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `skyd`: the SkySync daemon binary.

use sky_daemon::{lifecycle, Config};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn usage() -> ! {
    eprintln!("usage: skyd [--config <path>]");
    std::process::exit(2);
}

fn parse_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    let mut config = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => match args.next() {
                Some(path) => config = Some(PathBuf::from(path)),
                None => usage(),
            },
            "--help" | "-h" => usage(),
            _ => usage(),
        }
    }
    config
}

fn load_config(path: Option<PathBuf>) -> Result<Config, sky_daemon::ConfigError> {
    match path {
        Some(path) => Config::load(&path),
        None => {
            let default = PathBuf::from("skysync.toml");
            if default.exists() {
                Config::load(&default)
            } else {
                let config = Config::default();
                config.validate()?;
                Ok(config)
            }
        }
    }
}

/// Install the log subscriber. The non-blocking file guard, when one
/// exists, must live until process exit.
fn init_tracing(config: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sky_engine=info,sky_storage=info"));
    match &config.app.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "skyd.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match load_config(parse_args()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("skyd: {e}");
            return ExitCode::from(2);
        }
    };
    let _log_guard = init_tracing(&config);

    let daemon = match lifecycle::startup(config).await {
        Ok(daemon) => daemon,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            return ExitCode::FAILURE;
        }
    };
    match daemon.run_until_signalled().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "daemon exited with error");
            ExitCode::FAILURE
        }
    }
}
