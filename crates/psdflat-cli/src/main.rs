// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// psdflat: hide the text layers of every Photoshop document in a directory and
// export flattened PNGs.
//
// Entry point. Initialises logging, parses arguments, runs the batch, and maps
// the outcome to an exit code.

mod cli;

use std::process::ExitCode;

use clap::Parser;

use cli::CliArgs;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();
    match cli::run(&args) {
        Ok(code) => code,
        Err(err) if err.is_fatal() => {
            tracing::error!(error = %err, "batch aborted");
            eprintln!("Critical error: {err}");
            ExitCode::from(cli::exit_for_error(&err))
        }
        Err(err) => {
            tracing::error!(error = %err, "report could not be written");
            eprintln!("Error: {err}");
            ExitCode::from(cli::exit_for_error(&err))
        }
    }
}
