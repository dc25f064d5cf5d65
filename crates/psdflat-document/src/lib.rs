// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// psdflat-document: Photoshop document handling for psdflat.
//
// Loads a PSD, exposes its layers as a kind-tagged tree, hides text layers,
// and exports the flattened composite as PNG.

pub mod digest;
pub mod layer;
pub mod probe;
pub mod processor;

#[cfg(any(test, feature = "test-support"))]
pub mod fixture;

// Re-export the primary structs so callers can use `psdflat_document::DocumentProcessor` etc.
pub use layer::{Layer, LayerTree};
pub use processor::{Document, DocumentProcessor, ExportReceipt};
