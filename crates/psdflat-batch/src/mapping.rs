// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Output path mapping: mirror a source's position under the input root onto
// the output root.

use std::collections::HashMap;
use std::path::Path;

use psdflat_core::config::JobSpec;
use psdflat_core::error::{PsdflatError, Result};
use psdflat_core::types::{Collision, FileMapping, FileReport, OUTPUT_EXTENSION};
use tracing::warn;

/// Map `source` to `<output root>/<path relative to input root>.png`.
pub fn map_output(spec: &JobSpec, source: &Path) -> Result<FileMapping> {
    let relative = source.strip_prefix(spec.input_dir()).map_err(|_| {
        PsdflatError::Discovery(format!(
            "{} is not under {}",
            source.display(),
            spec.input_dir().display()
        ))
    })?;
    let destination = spec
        .output_dir()
        .join(relative)
        .with_extension(OUTPUT_EXTENSION);

    Ok(FileMapping {
        source: source.to_path_buf(),
        destination,
    })
}

/// Converted sources whose image was replaced by a later source with the same
/// destination (`a.psd` and `a.PSD`). Failed files never overwrite anything.
pub fn find_collisions(files: &[FileReport]) -> Vec<Collision> {
    let mut last_writer: HashMap<&Path, &Path> = HashMap::new();
    let mut collisions = Vec::new();
    for file in files.iter().filter(|f| f.outcome.is_success()) {
        let destination = file.mapping.destination.as_path();
        let source = file.mapping.source.as_path();
        if let Some(previous) = last_writer.insert(destination, source) {
            warn!(
                overwritten = %previous.display(),
                winner = %source.display(),
                destination = %destination.display(),
                "output image overwritten by another document"
            );
            collisions.push(Collision {
                destination: destination.to_path_buf(),
                overwritten: previous.to_path_buf(),
                winner: source.to_path_buf(),
            });
        }
    }
    collisions
}

#[cfg(test)]
mod tests {
    use super::*;
    use psdflat_core::types::{FileOutcome, Stage};
    use std::path::PathBuf;

    #[test]
    fn in_place_replaces_extension() {
        let spec = JobSpec::new("/in", None, false);
        let mapping = map_output(&spec, Path::new("/in/a.psd")).expect("map");
        assert_eq!(mapping.source, PathBuf::from("/in/a.psd"));
        assert_eq!(mapping.destination, PathBuf::from("/in/a.png"));
    }

    #[test]
    fn mirrors_subdirectories_under_output_root() {
        let spec = JobSpec::new("/in", Some(PathBuf::from("/out")), true);
        let mapping = map_output(&spec, Path::new("/in/sub/deep/b.PSD")).expect("map");
        assert_eq!(mapping.destination, PathBuf::from("/out/sub/deep/b.png"));
    }

    #[test]
    fn keeps_inner_dots_in_stem() {
        let spec = JobSpec::new("/in", Some(PathBuf::from("/out")), false);
        let mapping = map_output(&spec, Path::new("/in/cover.v2.psd")).expect("map");
        assert_eq!(mapping.destination, PathBuf::from("/out/cover.v2.png"));
    }

    #[test]
    fn source_outside_root_is_rejected() {
        let spec = JobSpec::new("/in", None, false);
        assert!(matches!(
            map_output(&spec, Path::new("/elsewhere/a.psd")),
            Err(PsdflatError::Discovery(_))
        ));
    }

    fn converted(spec: &JobSpec, source: &str) -> FileReport {
        FileReport {
            mapping: map_output(spec, Path::new(source)).expect("map"),
            outcome: FileOutcome::Converted {
                hidden_text_layers: 0,
                png_sha256: "00".into(),
            },
        }
    }

    #[test]
    fn case_variants_collide() {
        let spec = JobSpec::new("/in", None, false);
        let files = vec![
            converted(&spec, "/in/a.PSD"),
            converted(&spec, "/in/a.psd"),
            converted(&spec, "/in/b.psd"),
        ];
        assert_eq!(
            find_collisions(&files),
            vec![Collision {
                destination: PathBuf::from("/in/a.png"),
                overwritten: PathBuf::from("/in/a.PSD"),
                winner: PathBuf::from("/in/a.psd"),
            }]
        );
    }

    #[test]
    fn failed_file_overwrites_nothing() {
        let spec = JobSpec::new("/in", None, false);
        let mut late = converted(&spec, "/in/a.psd");
        late.outcome = FileOutcome::Failed {
            stage: Stage::Load,
            reason: "bad".into(),
        };
        let files = vec![converted(&spec, "/in/a.PSD"), late];
        assert!(find_collisions(&files).is_empty());
    }
}
