// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for psdflat.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::JobSpec;

/// File extension recognised as a Photoshop document (compared ASCII
/// case-insensitively).
pub const SOURCE_EXTENSION: &str = "psd";

/// Extension given to every exported image.
pub const OUTPUT_EXTENSION: &str = "png";

/// Whether `path` carries the Photoshop document extension.
pub fn is_source_document(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(SOURCE_EXTENSION))
}

/// What a layer contains, as far as the hide-text rule is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerKind {
    /// Editable type layer.
    Text,
    /// Vector shape or solid/gradient/pattern fill.
    Shape,
    /// Embedded or linked smart object.
    SmartObject,
    /// Adjustment layer (levels, curves, ...).
    Adjustment,
    /// Plain raster layer.
    Image,
    /// Layer group (folder).
    Group,
}

impl LayerKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Shape => "shape",
            Self::SmartObject => "smart object",
            Self::Adjustment => "adjustment",
            Self::Image => "image",
            Self::Group => "group",
        }
    }
}

/// Pairing of a discovered source document with its output image path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMapping {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// The step of the per-file pipeline that failed.
///
/// A file moves `Discovered → Loaded → TextHidden → Exported`; the stage names
/// the transition that was being attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    HideText,
    Export,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Load => "load",
            Self::HideText => "hide-text",
            Self::Export => "export",
        };
        f.write_str(name)
    }
}

/// Result of processing one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Converted {
        /// Text layers switched from visible to hidden.
        hidden_text_layers: usize,
        /// SHA-256 of the written PNG, lowercase hex.
        png_sha256: String,
    },
    Failed { stage: Stage, reason: String },
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Converted { .. })
    }
}

/// One line of the run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    #[serde(flatten)]
    pub mapping: FileMapping,
    pub outcome: FileOutcome,
}

/// Two converted sources that wrote the same image; only the later one's
/// pixels survive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collision {
    pub destination: PathBuf,
    pub overwritten: PathBuf,
    pub winner: PathBuf,
}

/// Aggregated result of a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub spec: JobSpec,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub files: Vec<FileReport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collisions: Vec<Collision>,
}

impl RunSummary {
    /// Number of recognised documents found under the input root.
    pub fn discovered(&self) -> usize {
        self.files.len()
    }

    pub fn succeeded(&self) -> usize {
        self.files.iter().filter(|f| f.outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.discovered() - self.succeeded()
    }

    /// Failed files with their stage and reason.
    pub fn failures(&self) -> impl Iterator<Item = (&Path, Stage, &str)> {
        self.files.iter().filter_map(|f| match &f.outcome {
            FileOutcome::Failed { stage, reason } => {
                Some((f.mapping.source.as_path(), *stage, reason.as_str()))
            }
            FileOutcome::Converted { .. } => None,
        })
    }

    /// At least one image was written.
    pub fn converted_any(&self) -> bool {
        self.succeeded() > 0
    }
}
