// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batch job: convert every discovered document in turn.
//
// Files are processed strictly one after another. Each goes
// Discovered → Loaded → TextHidden → Exported, or stops at the first failing
// transition; nothing is retried. Per-file errors (and decoder panics) are
// recorded in the summary and never abort the run. Only discovery failure does.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use chrono::Utc;
use psdflat_core::config::JobSpec;
use psdflat_core::error::Result;
use psdflat_core::types::{FileMapping, FileOutcome, FileReport, RunSummary, Stage};
use psdflat_document::DocumentProcessor;
use tracing::{debug, info, instrument, warn};

use crate::discovery::discover;
use crate::mapping::{find_collisions, map_output};

/// A configured batch run.
pub struct BatchJob {
    spec: JobSpec,
}

impl BatchJob {
    pub fn new(spec: JobSpec) -> Self {
        Self { spec }
    }

    /// Discover sources and compute their output paths without converting.
    pub fn plan(&self) -> Result<Vec<FileMapping>> {
        discover(&self.spec)?
            .iter()
            .map(|source| map_output(&self.spec, source))
            .collect()
    }

    /// Convert every discovered document.
    ///
    /// Returns `Err` only when the input root cannot be enumerated; every
    /// per-file problem is reported in the summary instead.
    #[instrument(skip(self), fields(input = %self.spec.input_dir().display(), output = %self.spec.output_dir().display(), recursive = self.spec.recursive()))]
    pub fn run(&self) -> Result<RunSummary> {
        let started_at = Utc::now();
        let plan = self.plan()?;
        let total = plan.len();

        if total == 0 {
            warn!("no PSD files found in {}", self.spec.input_dir().display());
        } else {
            info!(total, "found PSD file(s), starting");
        }

        let mut files = Vec::with_capacity(total);
        for (index, mapping) in plan.into_iter().enumerate() {
            let position = index + 1;
            let name = mapping
                .source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let outcome = process_file(&mapping);
            match &outcome {
                FileOutcome::Converted {
                    hidden_text_layers, ..
                } => info!(
                    "[{position}/{total}] {name}: hidden {hidden_text_layers} text layer(s)"
                ),
                FileOutcome::Failed { stage, reason } => {
                    warn!("[{position}/{total}] {name}: failed at {stage}: {reason}")
                }
            }
            files.push(FileReport { mapping, outcome });
        }

        let summary = RunSummary {
            spec: self.spec.clone(),
            started_at,
            finished_at: Utc::now(),
            collisions: find_collisions(&files),
            files,
        };
        info!(
            discovered = summary.discovered(),
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            "batch complete"
        );
        Ok(summary)
    }
}

/// Load, hide text, export: stopping at the first failure.
fn process_file(mapping: &FileMapping) -> FileOutcome {
    let mut processor = DocumentProcessor::new(&mapping.source);

    if let Err(failed) = guarded(Stage::Load, || processor.load()) {
        return failed;
    }
    debug!(source = %mapping.source.display(), "loaded");

    let hidden_text_layers = match guarded(Stage::HideText, || processor.hide_text_layers()) {
        Ok(hidden) => hidden,
        Err(failed) => return failed,
    };
    debug!(source = %mapping.source.display(), hidden_text_layers, "text hidden");

    match guarded(Stage::Export, || processor.export_as_image(&mapping.destination)) {
        Ok(receipt) => FileOutcome::Converted {
            hidden_text_layers,
            png_sha256: receipt.sha256,
        },
        Err(failed) => failed,
    }
}

/// Run one pipeline stage, turning both errors and panics into a failure
/// outcome for that stage.
fn guarded<T>(
    stage: Stage,
    op: impl FnOnce() -> Result<T>,
) -> std::result::Result<T, FileOutcome> {
    match panic::catch_unwind(AssertUnwindSafe(op)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(FileOutcome::Failed {
            stage,
            reason: err.to_string(),
        }),
        Err(payload) => Err(FileOutcome::Failed {
            stage,
            reason: format!("decoder panicked: {}", panic_message(&*payload)),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
