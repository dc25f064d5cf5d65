// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Source discovery: enumerate Photoshop documents under the input root.

use std::fs;
use std::path::PathBuf;

use psdflat_core::config::JobSpec;
use psdflat_core::error::{PsdflatError, Result};
use psdflat_core::types::is_source_document;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// List every recognised document under the job's input root.
///
/// Only direct children are considered unless the job is recursive. When the
/// output root sits inside the input root, it is never descended into, so
/// converted images from earlier runs are not mistaken for sources. Results are
/// sorted by path.
///
/// A missing or unreadable input root is a `Discovery` error; unreadable
/// entries below it are logged and skipped.
pub fn discover(spec: &JobSpec) -> Result<Vec<PathBuf>> {
    let root = spec.input_dir();
    if !root.exists() {
        return Err(PsdflatError::Discovery(format!(
            "input directory not found: {}",
            root.display()
        )));
    }
    if !root.is_dir() {
        return Err(PsdflatError::Discovery(format!(
            "input path is not a directory: {}",
            root.display()
        )));
    }
    fs::read_dir(root).map_err(|err| {
        PsdflatError::Discovery(format!("cannot read {}: {}", root.display(), err))
    })?;

    let max_depth = if spec.recursive() { usize::MAX } else { 1 };
    let excluded = nested_output_root(spec);

    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            excluded.as_deref().is_none_or(|out| {
                !entry.file_type().is_dir()
                    || fs::canonicalize(entry.path()).ok().as_deref() != Some(out)
            })
        });

    let mut found = Vec::new();
    for entry in walker {
        match entry {
            Ok(entry) => {
                let path = entry.path();
                if is_source_document(path) && path.is_file() {
                    debug!(path = %path.display(), "discovered");
                    found.push(entry.into_path());
                }
            }
            Err(err) => warn!(error = %err, "skipping unreadable entry"),
        }
    }

    found.sort();
    Ok(found)
}

/// Canonical output root, when it is an existing directory distinct from the
/// input root. Paths are compared canonically so `in` and `./in/out` still
/// count as nested.
fn nested_output_root(spec: &JobSpec) -> Option<PathBuf> {
    if spec.writes_in_place() {
        return None;
    }
    let output = fs::canonicalize(spec.output_dir()).ok()?;
    let input = fs::canonicalize(spec.input_dir()).ok()?;
    (output != input && output.starts_with(&input)).then_some(output)
}
