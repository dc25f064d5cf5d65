// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Run report rendering: the human summary printed at the end of a batch and
// its JSON form.

use std::fmt::Write as _;

use psdflat_core::error::Result;
use psdflat_core::types::RunSummary;

const RULE_WIDTH: usize = 40;

/// Plain-text summary: totals, then one line per failed file.
pub fn render_text(summary: &RunSummary) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = String::new();

    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Processing complete");
    let _ = writeln!(out, "Found:      {}", summary.discovered());
    let _ = writeln!(out, "Converted:  {}", summary.succeeded());
    let _ = writeln!(out, "Failed:     {}", summary.failed());
    let _ = writeln!(out, "{rule}");

    if summary.failed() > 0 {
        let _ = writeln!(out, "Failures:");
        for (source, stage, reason) in summary.failures() {
            let _ = writeln!(out, "  {} ({stage}): {reason}", source.display());
        }
    }

    if !summary.collisions.is_empty() {
        let _ = writeln!(out, "Overwritten:");
        for collision in &summary.collisions {
            let _ = writeln!(
                out,
                "  {}: output of {} replaced by {}",
                collision.destination.display(),
                collision.overwritten.display(),
                collision.winner.display()
            );
        }
    }
    out
}

/// Pretty-printed JSON of the whole summary.
pub fn render_json(summary: &RunSummary) -> Result<String> {
    Ok(serde_json::to_string_pretty(summary)?)
}
