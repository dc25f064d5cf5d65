// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Layer record probe: a read-only walk over the layer-and-mask section of a
// PSD file that recovers what the pixel decoder does not expose: the kind of
// each layer (text, shape, group divider, ...) and its unicode name.
//
// Pixel data is never touched here; the `psd` crate owns decoding and
// compositing.

use psdflat_core::error::{PsdflatError, Result};
use psdflat_core::types::LayerKind;
use tracing::debug;

const SIGNATURE: &[u8; 4] = b"8BPS";
const HEADER_LEN: usize = 26;

/// How a layer record participates in the layer tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordRole {
    /// A real layer with pixels (or an adjustment/fill) of the given kind.
    Leaf(LayerKind),
    /// The record carrying a group's name and visibility. Stored above the
    /// group's children.
    GroupOpen,
    /// The hidden "</Layer group>" marker stored below a group's children.
    GroupBounds,
}

/// One layer record, as stored in the file (bottom-most first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerRecord {
    /// Display name: the `luni` unicode name when present, else `pascal_name`.
    pub name: String,
    /// Legacy Pascal-string name from the record itself.
    pub pascal_name: String,
    pub visible: bool,
    pub role: RecordRole,
}

impl LayerRecord {
    /// Whether `other` is one of the names this record is known by. Trailing
    /// NULs are ignored on both sides.
    pub fn answers_to(&self, other: &str) -> bool {
        let other = other.trim_end_matches('\0');
        self.name == other || self.pascal_name.trim_end_matches('\0') == other
    }
}

/// Canvas facts read from the file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub width: u32,
    pub height: u32,
    pub channels: u16,
    pub depth: u16,
}

/// Read the header and every layer record of a PSD byte stream.
pub fn probe(bytes: &[u8]) -> Result<(Header, Vec<LayerRecord>)> {
    let mut reader = ByteReader::new(bytes);
    let header = read_header(&mut reader)?;

    // Color mode data and image resources are skipped wholesale.
    let color_mode_len = reader.read_u32()? as usize;
    reader.skip(color_mode_len)?;
    let resources_len = reader.read_u32()? as usize;
    reader.skip(resources_len)?;

    let layer_and_mask_len = reader.read_u32()? as usize;
    if layer_and_mask_len == 0 {
        return Ok((header, Vec::new()));
    }
    let mut section = reader.sub_reader(layer_and_mask_len)?;

    let layer_info_len = section.read_u32()? as usize;
    if layer_info_len == 0 {
        return Ok((header, Vec::new()));
    }
    let mut info = section.sub_reader(layer_info_len)?;

    // A negative count only signals that the merged alpha is in channel 0.
    let count = info.read_i16()?.unsigned_abs() as usize;
    let mut records = Vec::with_capacity(count);
    for index in 0..count {
        let record = read_layer_record(&mut info).map_err(|err| match err {
            PsdflatError::Decode(detail) => {
                PsdflatError::Decode(format!("layer record {index}: {detail}"))
            }
            other => other,
        })?;
        debug!(
            index,
            name = %record.name,
            visible = record.visible,
            role = ?record.role,
            "layer record"
        );
        records.push(record);
    }

    Ok((header, records))
}

fn read_header(reader: &mut ByteReader<'_>) -> Result<Header> {
    if reader.remaining() < HEADER_LEN {
        return Err(PsdflatError::Decode(format!(
            "file is {} bytes, shorter than a PSD header",
            reader.remaining()
        )));
    }
    let signature = reader.read_bytes(4)?;
    if signature != SIGNATURE {
        return Err(PsdflatError::Decode("missing 8BPS signature".into()));
    }
    match reader.read_u16()? {
        1 => {}
        2 => {
            return Err(PsdflatError::Decode(
                "large document format (PSB) is not supported".into(),
            ));
        }
        other => {
            return Err(PsdflatError::Decode(format!("unknown PSD version {other}")));
        }
    }
    reader.skip(6)?;
    let channels = reader.read_u16()?;
    let height = reader.read_u32()?;
    let width = reader.read_u32()?;
    let depth = reader.read_u16()?;
    let _color_mode = reader.read_u16()?;

    if width == 0 || height == 0 {
        return Err(PsdflatError::Decode(format!(
            "empty canvas {width}x{height}"
        )));
    }

    Ok(Header {
        width,
        height,
        channels,
        depth,
    })
}

fn read_layer_record(reader: &mut ByteReader<'_>) -> Result<LayerRecord> {
    // Bounds: top, left, bottom, right.
    reader.skip(16)?;

    let channel_count = reader.read_u16()? as usize;
    // Channel id (i16) + data length (u32) per channel.
    reader.skip(channel_count * 6)?;

    let blend_signature = reader.read_bytes(4)?;
    if blend_signature != b"8BIM" {
        return Err(PsdflatError::Decode("bad blend mode signature".into()));
    }
    reader.skip(4)?; // blend mode key
    reader.skip(2)?; // opacity, clipping
    let flags = reader.read_u8()?;
    reader.skip(1)?; // filler

    let extra_len = reader.read_u32()? as usize;
    let mut extra = reader.sub_reader(extra_len)?;

    let mask_len = extra.read_u32()? as usize;
    extra.skip(mask_len)?;
    let blending_ranges_len = extra.read_u32()? as usize;
    extra.skip(blending_ranges_len)?;

    let pascal_name = read_pascal_name(&mut extra)?;
    let mut unicode_name = None;
    let mut role = RecordRole::Leaf(LayerKind::Image);

    // Additional layer information blocks fill the rest of the extra data.
    while extra.remaining() >= 12 {
        let signature = extra.read_bytes(4)?;
        if signature != b"8BIM" && signature != b"8B64" {
            break;
        }
        let key: [u8; 4] = extra
            .read_bytes(4)?
            .try_into()
            .map_err(|_| PsdflatError::Decode("short block key".into()))?;
        let len = extra.read_u32()? as usize;
        let mut block = extra.sub_reader(len)?;

        match &key {
            b"luni" => unicode_name = Some(read_unicode_string(&mut block)?),
            b"lsct" | b"lsdk" => {
                role = match block.read_u32()? {
                    1 | 2 => RecordRole::GroupOpen,
                    3 => RecordRole::GroupBounds,
                    _ => role,
                };
            }
            _ => {
                if let (RecordRole::Leaf(current), Some(kind)) = (role, kind_for_key(&key)) {
                    // Text wins over the vector masks a type layer may also carry.
                    if current != LayerKind::Text {
                        role = RecordRole::Leaf(kind);
                    }
                }
            }
        }
    }

    Ok(LayerRecord {
        name: unicode_name.unwrap_or_else(|| pascal_name.clone()),
        pascal_name,
        visible: flags & 0b10 == 0,
        role,
    })
}

/// Layer kind implied by an additional-layer-information key.
fn kind_for_key(key: &[u8; 4]) -> Option<LayerKind> {
    match key {
        b"TySh" | b"tySh" => Some(LayerKind::Text),
        b"SoLd" | b"PlLd" | b"SoLE" => Some(LayerKind::SmartObject),
        b"vmsk" | b"vsms" | b"vscg" | b"SoCo" | b"GdFl" | b"PtFl" => Some(LayerKind::Shape),
        b"levl" | b"curv" | b"brit" | b"hue2" | b"blnc" | b"selc" | b"mixr" | b"grdm"
        | b"phfl" | b"expA" | b"vibA" | b"thrs" | b"nvrt" | b"post" | b"clrL" | b"blwh" => {
            Some(LayerKind::Adjustment)
        }
        _ => None,
    }
}

/// Pascal string padded so that length byte + text is a multiple of 4.
fn read_pascal_name(reader: &mut ByteReader<'_>) -> Result<String> {
    let len = reader.read_u8()? as usize;
    let text = reader.read_bytes(len)?;
    let consumed = 1 + len;
    reader.skip((4 - consumed % 4) % 4)?;
    Ok(String::from_utf8_lossy(text).into_owned())
}

/// UTF-16BE string prefixed with its length in code units.
fn read_unicode_string(reader: &mut ByteReader<'_>) -> Result<String> {
    let units = reader.read_u32()? as usize;
    let raw = reader.read_bytes(units * 2)?;
    let code_units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    let text = String::from_utf16_lossy(&code_units);
    Ok(text.trim_end_matches('\0').to_owned())
}

/// Bounds-checked big-endian cursor.
struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(PsdflatError::Decode(format!(
                "truncated: wanted {len} bytes at offset {}, {} left",
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn skip(&mut self, len: usize) -> Result<()> {
        self.read_bytes(len).map(|_| ())
    }

    /// Split off the next `len` bytes as an independent reader.
    fn sub_reader(&mut self, len: usize) -> Result<ByteReader<'a>> {
        self.read_bytes(len).map(ByteReader::new)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_i16(&mut self) -> Result<i16> {
        let b = self.read_bytes(2)?;
        Ok(i16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}
