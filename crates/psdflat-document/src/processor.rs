// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document processor: load a Photoshop document, hide its text layers, and
// export the flattened result as PNG. Decoding and compositing are done by the
// `psd` crate, encoding by `image`.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, RgbaImage};
use psd::{Psd, PsdLayer};
use psdflat_core::error::{PsdflatError, Result};
use tracing::{debug, info, instrument};

use crate::digest::hash_bytes;
use crate::layer::LayerTree;
use crate::probe::{self, Header, LayerRecord, RecordRole};

/// Probe slot for the decoder's `index`-th layer. The decoder lists layers
/// top-down, the probe in file order (bottom-most first).
fn slot_for(decoder_index: usize, leaf_count: usize) -> usize {
    leaf_count.saturating_sub(decoder_index + 1)
}

/// A decoded document and its mutable layer tree.
pub struct Document {
    psd: Psd,
    header: Header,
    layers: LayerTree,
}

impl Document {
    /// Decode a document from raw PSD bytes.
    #[instrument(skip_all, fields(bytes_len = bytes.len()))]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (header, records) = probe::probe(bytes)?;
        let layers = LayerTree::from_records(&records)?;

        let psd = Psd::from_bytes(bytes)
            .map_err(|err| PsdflatError::Decode(format!("{err}")))?;

        let leaves: Vec<&LayerRecord> = records
            .iter()
            .filter(|r| matches!(r.role, RecordRole::Leaf(_)))
            .collect();
        check_slots(&leaves, psd.layers())?;

        debug!(
            width = header.width,
            height = header.height,
            channels = header.channels,
            bit_depth = header.depth,
            layers = layers.leaf_count(),
            "Document decoded"
        );
        layers.walk(|layer, depth| {
            debug!(
                name = %layer.name,
                kind = layer.kind.label(),
                visible = layer.visible,
                depth,
                "layer"
            );
        });

        Ok(Self {
            psd,
            header,
            layers,
        })
    }

    /// Canvas width in pixels.
    pub fn width(&self) -> u32 {
        self.header.width
    }

    /// Canvas height in pixels.
    pub fn height(&self) -> u32 {
        self.header.height
    }

    pub fn layers(&self) -> &LayerTree {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut LayerTree {
        &mut self.layers
    }

    /// Composite every effectively visible layer at canvas size.
    ///
    /// A document without layer records yields its stored merged image.
    pub fn flatten(&self) -> Result<RgbaImage> {
        let pixels = if self.layers.leaf_count() == 0 {
            self.psd.rgba()
        } else {
            let rendered = self.layers.rendered_slots();
            let leaf_count = rendered.len();
            let filter = |(index, _): (usize, &PsdLayer)| {
                rendered
                    .get(slot_for(index, leaf_count))
                    .copied()
                    .unwrap_or(false)
            };
            self.psd
                .flatten_layers_rgba(&filter)
                .map_err(|err| PsdflatError::Encode(format!("compositing failed: {err}")))?
        };

        RgbaImage::from_raw(self.width(), self.height(), pixels).ok_or_else(|| {
            PsdflatError::Encode(format!(
                "composite buffer does not match the {}x{} canvas",
                self.width(),
                self.height()
            ))
        })
    }

    /// Flatten and encode as PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        let flattened = DynamicImage::ImageRgba8(self.flatten()?);
        let mut buffer = Vec::new();
        flattened
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .map_err(|err| PsdflatError::Encode(err.to_string()))?;
        Ok(buffer)
    }
}

/// Confirm the decoder's layer list is the probe's leaves read top-down.
fn check_slots(leaves: &[&LayerRecord], decoded: &[PsdLayer]) -> Result<()> {
    if leaves.len() != decoded.len() {
        return Err(PsdflatError::Decode(format!(
            "layer table mismatch: {} records, decoder found {} layers",
            leaves.len(),
            decoded.len()
        )));
    }

    let leaf_count = leaves.len();
    for (index, layer) in decoded.iter().enumerate() {
        let record = leaves[slot_for(index, leaf_count)];
        if !record.answers_to(layer.name()) {
            return Err(PsdflatError::Decode(format!(
                "layer {index} is named {:?} by the decoder but {:?} in its record",
                layer.name(),
                record.name
            )));
        }
    }
    Ok(())
}

/// What `export_as_image` wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReceipt {
    pub path: PathBuf,
    pub bytes_written: usize,
    /// SHA-256 of the PNG, lowercase hex.
    pub sha256: String,
}

/// Processes a single source file: load, hide text layers, export.
///
/// One instance per file; the decoded document lives only as long as the
/// processor.
pub struct DocumentProcessor {
    path: PathBuf,
    document: Option<Document>,
}

impl DocumentProcessor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            document: None,
        }
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    /// Read and decode the source file.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn load(&mut self) -> Result<()> {
        let bytes = fs::read(&self.path)?;
        let document = Document::from_bytes(&bytes).map_err(|err| match err {
            PsdflatError::Decode(detail) => PsdflatError::Decode(format!(
                "{}: {}",
                self.path.display(),
                detail
            )),
            other => other,
        })?;
        info!(
            width = document.width(),
            height = document.height(),
            layers = document.layers().leaf_count(),
            "Document loaded"
        );
        self.document = Some(document);
        Ok(())
    }

    /// Hide every text layer. Returns the number of layers that changed.
    ///
    /// Fails with `State` before `load`.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn hide_text_layers(&mut self) -> Result<usize> {
        let document = self
            .document
            .as_mut()
            .ok_or_else(|| PsdflatError::State("hide_text_layers called before load".into()))?;
        let hidden = document.layers_mut().hide_text_layers();
        debug!(hidden, "Text layers hidden");
        Ok(hidden)
    }

    /// Flatten the visible layers and write a PNG to `destination`, creating
    /// parent directories as needed. The file only appears once fully written.
    ///
    /// Fails with `State` before `load`.
    #[instrument(skip(self, destination), fields(path = %self.path.display(), destination = %destination.as_ref().display()))]
    pub fn export_as_image(&self, destination: impl AsRef<Path>) -> Result<ExportReceipt> {
        let destination = destination.as_ref();
        let document = self
            .document
            .as_ref()
            .ok_or_else(|| PsdflatError::State("export_as_image called before load".into()))?;

        let png = document.to_png_bytes()?;
        write_atomically(destination, &png)?;

        info!(bytes = png.len(), "PNG written");
        Ok(ExportReceipt {
            path: destination.to_path_buf(),
            bytes_written: png.len(),
            sha256: hash_bytes(&png),
        })
    }
}

/// Write to a sibling staging file, then rename over `destination`.
fn write_atomically(destination: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut staging = destination.as_os_str().to_owned();
    staging.push(".partial");
    let staging = PathBuf::from(staging);

    if let Err(err) = fs::write(&staging, bytes).and_then(|()| fs::rename(&staging, destination)) {
        let _ = fs::remove_file(&staging);
        return Err(err.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{PsdBuilder, Rect};
    use psdflat_core::types::LayerKind;

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];
    const GREEN: [u8; 4] = [0, 255, 0, 255];

    fn titled_poster() -> PsdBuilder {
        PsdBuilder::new(4, 4)
            .image("Background", Rect::full(4, 4), RED)
            .text("Title", Rect::new(0, 0, 2, 2), BLUE)
    }

    fn processor_for(builder: &PsdBuilder, dir: &Path) -> DocumentProcessor {
        let path = dir.join("poster.psd");
        builder.write_to(&path).expect("write fixture");
        DocumentProcessor::new(path)
    }

    #[test]
    fn hide_before_load_is_a_state_error() {
        let mut processor = DocumentProcessor::new("never-loaded.psd");
        assert!(matches!(
            processor.hide_text_layers(),
            Err(PsdflatError::State(_))
        ));
    }

    #[test]
    fn export_before_load_is_a_state_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let processor = DocumentProcessor::new("never-loaded.psd");
        let dest = dir.path().join("out.png");
        assert!(matches!(
            processor.export_as_image(&dest),
            Err(PsdflatError::State(_))
        ));
        assert!(!dest.exists());
    }

    #[test]
    fn load_rejects_garbage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("corrupt.psd");
        fs::write(&path, b"definitely not a photoshop document").expect("write");

        let mut processor = DocumentProcessor::new(&path);
        let err = processor.load().unwrap_err();
        assert!(matches!(err, PsdflatError::Decode(_)), "got {err:?}");
        assert!(err.to_string().contains("corrupt.psd"));
        assert!(processor.document().is_none());
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let mut processor = DocumentProcessor::new("/definitely/not/here.psd");
        assert!(matches!(processor.load(), Err(PsdflatError::Io(_))));
    }

    #[test]
    fn load_builds_layer_tree() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut processor = processor_for(&titled_poster(), dir.path());
        processor.load().expect("load");

        let document = processor.document().expect("loaded");
        assert_eq!((document.width(), document.height()), (4, 4));
        assert_eq!(document.layers().leaf_count(), 2);
        assert_eq!(document.layers().visible_of_kind(LayerKind::Text), 1);
    }

    #[test]
    fn hide_text_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut processor = processor_for(&titled_poster(), dir.path());
        processor.load().expect("load");

        assert_eq!(processor.hide_text_layers().expect("first"), 1);
        let after_once = processor.document().expect("loaded").layers().rendered_slots();
        assert_eq!(processor.hide_text_layers().expect("second"), 0);
        let after_twice = processor.document().expect("loaded").layers().rendered_slots();
        assert_eq!(after_once, after_twice);
    }

    #[test]
    fn exported_png_excludes_text_pixels() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut processor = processor_for(&titled_poster(), dir.path());
        processor.load().expect("load");
        processor.hide_text_layers().expect("hide");

        let dest = dir.path().join("nested").join("deeper").join("poster.png");
        let receipt = processor.export_as_image(&dest).expect("export");
        assert_eq!(receipt.path, dest);
        assert_eq!(receipt.sha256.len(), 64);

        let png = image::open(&dest).expect("decode png").to_rgba8();
        assert_eq!(png.dimensions(), (4, 4));
        // Former text area now shows the background.
        assert_eq!(png.get_pixel(0, 0).0, RED);
        assert_eq!(png.get_pixel(3, 3).0, RED);
    }

    #[test]
    fn text_is_drawn_when_not_hidden() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut processor = processor_for(&titled_poster(), dir.path());
        processor.load().expect("load");

        let flattened = processor.document().expect("loaded").flatten().expect("flatten");
        let corner = flattened.get_pixel(0, 0).0;
        assert!(corner[2] > corner[0], "expected the blue title, got {corner:?}");
    }

    #[test]
    fn export_leaves_no_staging_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut processor = processor_for(&titled_poster(), dir.path());
        processor.load().expect("load");

        let dest = dir.path().join("poster.png");
        processor.export_as_image(&dest).expect("export");
        assert!(dest.exists());
        assert!(!dir.path().join("poster.png.partial").exists());
    }

    #[test]
    fn export_overwrites_existing_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut processor = processor_for(&titled_poster(), dir.path());
        processor.load().expect("load");

        let dest = dir.path().join("poster.png");
        fs::write(&dest, b"stale").expect("write stale");
        let receipt = processor.export_as_image(&dest).expect("export");
        assert_eq!(fs::metadata(&dest).expect("meta").len() as usize, receipt.bytes_written);
    }

    #[test]
    fn export_is_deterministic() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut processor = processor_for(&titled_poster(), dir.path());
        processor.load().expect("load");
        processor.hide_text_layers().expect("hide");

        let first = processor.export_as_image(dir.path().join("a.png")).expect("a");
        let second = processor.export_as_image(dir.path().join("b.png")).expect("b");
        assert_eq!(first.sha256, second.sha256);
    }

    #[test]
    fn export_into_a_directory_path_fails_with_io() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut processor = processor_for(&titled_poster(), dir.path());
        processor.load().expect("load");

        let occupied = dir.path().join("taken.png");
        fs::create_dir(&occupied).expect("mkdir");
        assert!(matches!(
            processor.export_as_image(&occupied),
            Err(PsdflatError::Io(_))
        ));
    }

    #[test]
    fn hidden_layers_stay_out_of_the_composite() {
        let dir = tempfile::tempdir().expect("tempdir");
        let builder = PsdBuilder::new(2, 2)
            .image("Base", Rect::full(2, 2), GREEN)
            .image("Overlay", Rect::full(2, 2), BLUE)
            .hidden();
        let mut processor = processor_for(&builder, dir.path());
        processor.load().expect("load");

        let flattened = processor.document().expect("loaded").flatten().expect("flatten");
        assert_eq!(flattened.get_pixel(1, 1).0, GREEN);
    }

    #[test]
    fn layerless_document_exports_merged_image() {
        let dir = tempfile::tempdir().expect("tempdir");
        let builder = PsdBuilder::new(3, 2).composite(GREEN);
        let mut processor = processor_for(&builder, dir.path());
        processor.load().expect("load");
        assert_eq!(processor.hide_text_layers().expect("hide"), 0);

        let flattened = processor.document().expect("loaded").flatten().expect("flatten");
        assert_eq!(flattened.dimensions(), (3, 2));
        assert_eq!(flattened.get_pixel(2, 1).0, GREEN);
    }

    #[test]
    fn decoder_index_maps_to_file_slot() {
        assert_eq!(slot_for(0, 3), 2);
        assert_eq!(slot_for(1, 3), 1);
        assert_eq!(slot_for(2, 3), 0);
    }

    #[test]
    fn same_named_text_and_artwork_hide_the_right_layer() {
        let dir = tempfile::tempdir().expect("tempdir");
        let builder = PsdBuilder::new(2, 2)
            .image("Title", Rect::full(2, 2), RED)
            .text("Title", Rect::full(2, 2), BLUE);
        let mut processor = processor_for(&builder, dir.path());
        processor.load().expect("load");
        assert_eq!(processor.hide_text_layers().expect("hide"), 1);

        let flattened = processor.document().expect("loaded").flatten().expect("flatten");
        assert_eq!(flattened.get_pixel(1, 1).0, RED);
    }

    #[test]
    fn nul_terminated_unicode_names_load() {
        let builder = PsdBuilder::new(2, 2)
            .image("Backdrop", Rect::full(2, 2), GREEN)
            .unicode_name("Backdrop\0")
            .text("Title", Rect::full(2, 2), BLUE)
            .unicode_name("Title\0");
        let mut document = Document::from_bytes(&builder.build()).expect("decode");
        assert_eq!(document.layers_mut().hide_text_layers(), 1);
        assert_eq!(document.flatten().expect("flatten").get_pixel(0, 0).0, GREEN);
    }

    #[test]
    fn palindromic_layer_names_hide_the_right_layer() {
        let dir = tempfile::tempdir().expect("tempdir");
        let builder = PsdBuilder::new(2, 2)
            .image("A", Rect::full(2, 2), GREEN)
            .image("B", Rect::new(0, 0, 1, 1), RED)
            .text("A", Rect::full(2, 2), BLUE);
        let mut processor = processor_for(&builder, dir.path());
        processor.load().expect("load");
        processor.hide_text_layers().expect("hide");

        let flattened = processor.document().expect("loaded").flatten().expect("flatten");
        assert_eq!(flattened.get_pixel(0, 0).0, RED);
        assert_eq!(flattened.get_pixel(1, 1).0, GREEN);
    }
}
