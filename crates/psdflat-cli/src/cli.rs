// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line surface: arguments, report printing, and the exit-code policy.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use psdflat_batch::BatchJob;
use psdflat_batch::report::{render_json, render_text};
use psdflat_core::config::JobSpec;
use psdflat_core::error::{PsdflatError, Result};
use psdflat_core::types::RunSummary;

/// Input root missing, not a directory, or unreadable.
pub const EXIT_FATAL: u8 = 1;

/// No image was produced: nothing found, or every file failed.
pub const EXIT_NOTHING_CONVERTED: u8 = 3;

/// The batch ran but its report could not be rendered.
pub const EXIT_REPORT_FAILED: u8 = 4;

/// Batch hide text layers in PSDs and export flattened PNGs.
#[derive(Parser, Debug)]
#[command(name = "psdflat", version, about)]
pub struct CliArgs {
    /// Input directory containing PSD files
    #[arg(short = 'd', long = "dir")]
    pub dir: PathBuf,

    /// Output directory (default: input directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Process subdirectories recursively, mirroring them under the output
    #[arg(short, long)]
    pub recursive: bool,

    /// Print the run summary as JSON instead of the text report
    #[arg(long)]
    pub json: bool,
}

/// The batch layer never sees clap types.
impl From<&CliArgs> for JobSpec {
    fn from(args: &CliArgs) -> Self {
        JobSpec::new(args.dir.clone(), args.output.clone(), args.recursive)
    }
}

/// Run the batch and print its report. `Err` means the run never started.
pub fn run(args: &CliArgs) -> Result<ExitCode> {
    let summary = BatchJob::new(JobSpec::from(args)).run()?;

    let report = if args.json {
        render_json(&summary)?
    } else {
        render_text(&summary)
    };
    println!("{}", report.trim_end());

    Ok(ExitCode::from(exit_status(&summary)))
}

/// Zero when at least one image was written, even if other files failed.
pub fn exit_status(summary: &RunSummary) -> u8 {
    if summary.converted_any() {
        0
    } else {
        EXIT_NOTHING_CONVERTED
    }
}

/// Exit code for an error that escaped `run`.
pub fn exit_for_error(err: &PsdflatError) -> u8 {
    if err.is_fatal() {
        EXIT_FATAL
    } else {
        EXIT_REPORT_FAILED
    }
}
