// chatwin — Conversation message window engine for chat clients
// Copyright (C) 2025  Simon Peter Rothgang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use chatwin::Cli;
use chatwin::error::EngineError;
use chatwin::replay;
use chatwin::window::load_config;
use anyhow::Context as _;
use clap::Parser;
use std::fs::OpenOptions;
use std::time::Instant;

#[allow(clippy::exit)]
fn main() {
    if let Err(err) = run() {
        if let Some(engine_error) = extract_engine_error(&err) {
            eprintln!("{}", engine_error.user_message());
            eprintln!("{err:#}");
            std::process::exit(engine_error.exit_code());
        }
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(page_size) = cli.page_size {
        config.page_size = page_size;
    }
    let scenario = replay::load_scenario(&cli.scenario)?;
    tracing::info!(
        conversation_id = %scenario.conversation_id,
        steps = scenario.steps.len(),
        "loaded scenario"
    );

    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    let local_set = tokio::task::LocalSet::new();

    let started = Instant::now();
    let report = rt.block_on(local_set.run_until(replay::run_scenario(scenario, config)))?;
    tracing::info!(
        "replay finished in {:?}: {} messages",
        started.elapsed(),
        report.snapshot.messages.len()
    );

    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{rendered}");
    Ok(())
}

fn extract_engine_error(err: &anyhow::Error) -> Option<EngineError> {
    err.chain().find_map(|cause| cause.downcast_ref::<EngineError>().cloned())
}

const DIAGNOSTICS_TARGET: &str = "chatwin::diagnostics";

/// Filter directives: `--log-filter`, then `RUST_LOG`, then `info`.
fn log_directives(cli: &Cli) -> String {
    cli.log_filter
        .clone()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "info".to_owned())
}

/// Tracing is file-only so the JSON report on stdout stays clean.
fn init_tracing(cli: &Cli) -> anyhow::Result<()> {
    let Some(path) = cli.log_file.as_ref() else {
        if std::env::var_os("RUST_LOG").is_some() {
            eprintln!("RUST_LOG is ignored without --log-file <PATH>; no diagnostics are written.");
        }
        return Ok(());
    };

    let directives = log_directives(cli);
    let filter = tracing_subscriber::EnvFilter::try_new(&directives)
        .with_context(|| format!("invalid log filter `{directives}`"))?;

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(cli.log_append)
        .truncate(!cli.log_append)
        .open(path)
        .with_context(|| format!("cannot open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(file)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("cannot install tracing subscriber: {e}"))?;

    tracing::info!(
        target: DIAGNOSTICS_TARGET,
        version = env!("CARGO_PKG_VERSION"),
        scenario = %cli.scenario.display(),
        log_filter = %directives,
        append = cli.log_append,
        "diagnostics enabled"
    );
    Ok(())
}
