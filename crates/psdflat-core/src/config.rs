// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batch job configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Immutable description of one batch run.
///
/// The output root is resolved once here: when no output directory is given
/// the converted images land next to their sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Directory searched for documents.
    input_dir: PathBuf,
    /// Root of the mirrored output tree.
    output_dir: PathBuf,
    /// Descend into subdirectories of `input_dir`.
    recursive: bool,
}

impl JobSpec {
    pub fn new(
        input_dir: impl Into<PathBuf>,
        output_dir: Option<PathBuf>,
        recursive: bool,
    ) -> Self {
        let input_dir = input_dir.into();
        let output_dir = output_dir.unwrap_or_else(|| input_dir.clone());
        Self {
            input_dir,
            output_dir,
            recursive,
        }
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn recursive(&self) -> bool {
        self.recursive
    }

    /// True when converted images are written beside their sources.
    pub fn writes_in_place(&self) -> bool {
        self.input_dir == self.output_dir
    }
}
