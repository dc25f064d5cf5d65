// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Synthetic PSD writer for tests and benches.
//
// Emits small uncompressed 8-bit RGB documents with solid-colour layers, type
// layers (tagged with an empty `TySh` block), and layer groups laid out the way
// Photoshop stores them. Only compiled for tests or with `test-support`.

use std::path::Path;

/// Layer bounds in canvas pixels, `bottom`/`right` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub top: i32,
    pub left: i32,
    pub bottom: i32,
    pub right: i32,
}

impl Rect {
    pub fn new(top: i32, left: i32, bottom: i32, right: i32) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
        }
    }

    /// Rect covering a whole `width` x `height` canvas.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, height as i32, width as i32)
    }

    fn width(&self) -> usize {
        (self.right - self.left).max(0) as usize
    }

    fn height(&self) -> usize {
        (self.bottom - self.top).max(0) as usize
    }

    fn area(&self) -> usize {
        self.width() * self.height()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Image,
    Text,
    GroupOpen,
    GroupBounds,
}

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    unicode_name: Option<String>,
    kind: EntryKind,
    visible: bool,
    rect: Rect,
    color: [u8; 4],
}

/// Builder for an in-memory PSD. Layers are added bottom-most first.
#[derive(Debug, Clone)]
pub struct PsdBuilder {
    width: u32,
    height: u32,
    entries: Vec<Entry>,
    composite: Option<[u8; 4]>,
}

impl PsdBuilder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            entries: Vec::new(),
            composite: None,
        }
    }

    /// Add an opaque raster layer filled with `color`.
    pub fn image(self, name: &str, rect: Rect, color: [u8; 4]) -> Self {
        self.push(name, EntryKind::Image, rect, color)
    }

    /// Add a type layer whose rasterised pixels are filled with `color`.
    pub fn text(self, name: &str, rect: Rect, color: [u8; 4]) -> Self {
        self.push(name, EntryKind::Text, rect, color)
    }

    /// Add a group whose children are built by `children`.
    pub fn group(mut self, name: &str, children: impl FnOnce(PsdBuilder) -> PsdBuilder) -> Self {
        let inner = children(PsdBuilder::new(self.width, self.height));
        self = self.push("</Layer group>", EntryKind::GroupBounds, Rect::new(0, 0, 0, 0), [0; 4]);
        self.entries.extend(inner.entries);
        self.push(name, EntryKind::GroupOpen, Rect::new(0, 0, 0, 0), [0; 4])
    }

    /// Mark the most recently added layer (or group) hidden.
    pub fn hidden(mut self) -> Self {
        if let Some(last) = self.entries.last_mut() {
            last.visible = false;
        }
        self
    }

    /// Give the most recently added layer a `luni` unicode name.
    pub fn unicode_name(mut self, name: &str) -> Self {
        if let Some(last) = self.entries.last_mut() {
            last.unicode_name = Some(name.to_owned());
        }
        self
    }

    /// Fill the merged image section with `color` instead of painting layers.
    pub fn composite(mut self, color: [u8; 4]) -> Self {
        self.composite = Some(color);
        self
    }

    fn push(mut self, name: &str, kind: EntryKind, rect: Rect, color: [u8; 4]) -> Self {
        self.entries.push(Entry {
            name: name.to_owned(),
            unicode_name: None,
            kind,
            visible: true,
            rect,
            color,
        });
        self
    }

    /// Serialise the document.
    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();

        // Header.
        out.extend_from_slice(b"8BPS");
        put_u16(&mut out, 1);
        out.extend_from_slice(&[0; 6]);
        put_u16(&mut out, 4); // RGBA
        put_u32(&mut out, self.height);
        put_u32(&mut out, self.width);
        put_u16(&mut out, 8);
        put_u16(&mut out, 3); // RGB colour mode

        put_u32(&mut out, 0); // colour mode data
        put_u32(&mut out, 0); // image resources

        let layer_info = self.layer_info();
        put_u32(&mut out, (4 + layer_info.len() + 4) as u32);
        put_u32(&mut out, layer_info.len() as u32);
        out.extend_from_slice(&layer_info);
        put_u32(&mut out, 0); // global layer mask info

        // Merged image, raw planar R, G, B, A.
        put_u16(&mut out, 0);
        let merged = self.merged_pixels();
        for channel in 0..4 {
            out.extend(merged.iter().map(|px| px[channel]));
        }

        out
    }

    /// Serialise and write to `path`.
    pub fn write_to(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        std::fs::write(path, self.build())
    }

    fn layer_info(&self) -> Vec<u8> {
        if self.entries.is_empty() {
            return Vec::new();
        }

        let mut info = Vec::new();
        put_u16(&mut info, self.entries.len() as u16);

        for entry in &self.entries {
            let rect = entry.rect;
            for edge in [rect.top, rect.left, rect.bottom, rect.right] {
                info.extend_from_slice(&edge.to_be_bytes());
            }
            put_u16(&mut info, 4);
            for id in [-1i16, 0, 1, 2] {
                info.extend_from_slice(&id.to_be_bytes());
                put_u32(&mut info, (2 + rect.area()) as u32);
            }
            info.extend_from_slice(b"8BIMnorm");
            info.push(255); // opacity
            info.push(0); // clipping
            info.push(if entry.visible { 0 } else { 0b10 });
            info.push(0); // filler

            let extra = extra_data(entry);
            put_u32(&mut info, extra.len() as u32);
            info.extend_from_slice(&extra);
        }

        for entry in &self.entries {
            let [r, g, b, a] = entry.color;
            for value in [a, r, g, b] {
                put_u16(&mut info, 0);
                info.extend(std::iter::repeat_n(value, entry.rect.area()));
            }
        }

        if info.len() % 2 == 1 {
            info.push(0);
        }
        info
    }

    fn merged_pixels(&self) -> Vec<[u8; 4]> {
        let (width, height) = (self.width as usize, self.height as usize);
        let mut pixels = vec![self.composite.unwrap_or([0; 4]); width * height];
        if self.composite.is_some() {
            return pixels;
        }
        for entry in self.entries.iter().filter(|e| e.visible) {
            if !matches!(entry.kind, EntryKind::Image | EntryKind::Text) {
                continue;
            }
            let rect = entry.rect;
            for y in rect.top.max(0)..rect.bottom.min(height as i32) {
                for x in rect.left.max(0)..rect.right.min(width as i32) {
                    pixels[y as usize * width + x as usize] = entry.color;
                }
            }
        }
        pixels
    }
}

fn extra_data(entry: &Entry) -> Vec<u8> {
    let mut extra = Vec::new();
    put_u32(&mut extra, 0); // layer mask
    put_u32(&mut extra, 0); // blending ranges

    let name = entry.name.as_bytes();
    let name = &name[..name.len().min(255)];
    extra.push(name.len() as u8);
    extra.extend_from_slice(name);
    while extra.len() % 4 != 0 {
        extra.push(0);
    }

    if let Some(unicode) = &entry.unicode_name {
        let units: Vec<u16> = unicode.encode_utf16().collect();
        let mut data = Vec::new();
        put_u32(&mut data, units.len() as u32);
        for unit in units {
            put_u16(&mut data, unit);
        }
        put_block(&mut extra, b"luni", &data);
    }

    match entry.kind {
        EntryKind::Text => put_block(&mut extra, b"TySh", &[0; 4]),
        EntryKind::GroupOpen => put_block(&mut extra, b"lsct", &1u32.to_be_bytes()),
        EntryKind::GroupBounds => put_block(&mut extra, b"lsct", &3u32.to_be_bytes()),
        EntryKind::Image => {}
    }

    extra
}

fn put_block(out: &mut Vec<u8>, key: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(b"8BIM");
    out.extend_from_slice(key);
    put_u32(out, data.len() as u32);
    out.extend_from_slice(data);
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}
