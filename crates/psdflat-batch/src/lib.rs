// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// psdflat-batch: walk an input directory, map every Photoshop document to a
// mirrored PNG path, and convert them one at a time, isolating failures per
// file.

pub mod discovery;
pub mod job;
pub mod mapping;
pub mod report;

pub use job::BatchJob;
