// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Layer tree: the nested, kind-tagged view of a document's layers that the
// hide-text rule walks.

use psdflat_core::error::{PsdflatError, Result};
use psdflat_core::types::LayerKind;

use crate::probe::{LayerRecord, RecordRole};

/// A node in the layer tree.
///
/// Every node carries the same `visible` flag regardless of kind; only groups
/// have children. Leaves remember their position among the document's pixel
/// layers so the compositor can be told which ones to draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    pub name: String,
    pub kind: LayerKind,
    pub visible: bool,
    /// Child layers, bottom-most first. Empty for non-groups.
    pub children: Vec<Layer>,
    /// Index of this leaf among the document's pixel layers, in file order.
    slot: Option<usize>,
}

impl Layer {
    pub fn is_group(&self) -> bool {
        self.kind == LayerKind::Group
    }

    /// Pixel-layer slot of a leaf; `None` for groups.
    pub fn slot(&self) -> Option<usize> {
        self.slot
    }

    fn hide_text(&mut self) -> usize {
        let mut hidden = 0;
        if self.kind == LayerKind::Text && self.visible {
            self.visible = false;
            hidden += 1;
        }
        for child in &mut self.children {
            hidden += child.hide_text();
        }
        hidden
    }

    fn mark_rendered(&self, parent_visible: bool, rendered: &mut [bool]) {
        let visible = parent_visible && self.visible;
        if let Some(slot) = self.slot {
            if let Some(flag) = rendered.get_mut(slot) {
                *flag = visible;
            }
        }
        for child in &self.children {
            child.mark_rendered(visible, rendered);
        }
    }

    fn walk<'a>(&'a self, depth: usize, visit: &mut impl FnMut(&'a Layer, usize)) {
        visit(self, depth);
        for child in &self.children {
            child.walk(depth + 1, visit);
        }
    }
}

/// All layers of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerTree {
    /// Top-level layers, bottom-most first.
    roots: Vec<Layer>,
    /// Number of leaf layers (pixel slots).
    leaf_count: usize,
}

impl LayerTree {
    /// Fold flat file-order records into a tree.
    ///
    /// Records are stored bottom to top: a group's bounds marker comes first,
    /// then its children, then the record carrying the group's name.
    pub fn from_records(records: &[LayerRecord]) -> Result<Self> {
        let mut stack: Vec<Vec<Layer>> = vec![Vec::new()];
        let mut leaf_count = 0;

        for record in records {
            match record.role {
                RecordRole::GroupBounds => stack.push(Vec::new()),
                RecordRole::GroupOpen => {
                    if stack.len() < 2 {
                        return Err(PsdflatError::Decode(format!(
                            "group '{}' closes without an opening marker",
                            record.name
                        )));
                    }
                    let children = stack.pop().unwrap_or_default();
                    push_layer(
                        &mut stack,
                        Layer {
                            name: record.name.clone(),
                            kind: LayerKind::Group,
                            visible: record.visible,
                            children,
                            slot: None,
                        },
                    );
                }
                RecordRole::Leaf(kind) => {
                    push_layer(
                        &mut stack,
                        Layer {
                            name: record.name.clone(),
                            kind,
                            visible: record.visible,
                            children: Vec::new(),
                            slot: Some(leaf_count),
                        },
                    );
                    leaf_count += 1;
                }
            }
        }

        if stack.len() != 1 {
            return Err(PsdflatError::Decode(format!(
                "{} layer group(s) never closed",
                stack.len() - 1
            )));
        }

        Ok(Self {
            roots: stack.pop().unwrap_or_default(),
            leaf_count,
        })
    }

    pub fn roots(&self) -> &[Layer] {
        &self.roots
    }

    /// Number of leaf (non-group) layers.
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Hide every visible text layer, nested groups included. Returns how many
    /// layers changed; a second call returns 0.
    pub fn hide_text_layers(&mut self) -> usize {
        self.roots.iter_mut().map(Layer::hide_text).sum()
    }

    /// Per-slot flag: whether the leaf and every enclosing group is visible.
    pub fn rendered_slots(&self) -> Vec<bool> {
        let mut rendered = vec![false; self.leaf_count];
        for root in &self.roots {
            root.mark_rendered(true, &mut rendered);
        }
        rendered
    }

    /// Depth-first, pre-order visit of every layer with its nesting depth.
    pub fn walk<'a>(&'a self, mut visit: impl FnMut(&'a Layer, usize)) {
        for root in &self.roots {
            root.walk(0, &mut visit);
        }
    }

    /// Count of layers of `kind` that are currently visible themselves.
    pub fn visible_of_kind(&self, kind: LayerKind) -> usize {
        let mut count = 0;
        self.walk(|layer, _| {
            if layer.kind == kind && layer.visible {
                count += 1;
            }
        });
        count
    }
}

fn push_layer(stack: &mut [Vec<Layer>], layer: Layer) {
    if let Some(level) = stack.last_mut() {
        level.push(layer);
    }
}
