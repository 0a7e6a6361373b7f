//! Radial ("polar") tree layout plus the transform that fits it into a viewport.
//!
//! The outer radius is budgeted from the leaf count so labels on the rim do not
//! collide, and floored by the viewport so sparse maps still fill the view. Each
//! node owns an angular span proportional to the leaves beneath it; children split
//! their parent's span in original order.

use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

use crate::model::{MapNode, NodeIx};
use crate::tree::TreeIndex;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Arc length reserved on the rim for every leaf.
    pub units_per_leaf: f64,
    /// Minimum outer radius is `min(width, height) / min_radius_divisor`.
    pub min_radius_divisor: f64,
    /// Margin kept around the node bounding box when fitting.
    pub padding: f64,
    /// Upper bound on the fit scale, so tiny maps are not blown up.
    pub max_fit_scale: f64,
    pub dark_mode: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            units_per_leaf: 35.0,
            min_radius_divisor: 2.5,
            padding: 100.0,
            max_fit_scale: 1.0,
            dark_mode: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_usable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    pub fn shorter_side(&self) -> f64 {
        self.width.min(self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutNode {
    pub index: NodeIx,
    pub depth: usize,
    /// Radians clockwise from twelve o'clock, in `[0, 2π)`.
    pub angle: f64,
    pub radius: f64,
    pub span_start: f64,
    pub span: f64,
    pub x: f64,
    pub y: f64,
    pub has_children: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub source: NodeIx,
    pub target: NodeIx,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    fn around<'n>(nodes: impl IntoIterator<Item = &'n LayoutNode>) -> Self {
        let mut b = Bounds {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        for n in nodes {
            b.min_x = b.min_x.min(n.x);
            b.min_y = b.min_y.min(n.y);
            b.max_x = b.max_x.max(n.x);
            b.max_y = b.max_y.max(n.y);
        }
        if !b.min_x.is_finite() {
            return Bounds {
                min_x: 0.0,
                min_y: 0.0,
                max_x: 0.0,
                max_y: 0.0,
            };
        }
        b
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) * 0.5,
            (self.min_y + self.max_y) * 0.5,
        )
    }
}

/// Uniform scale followed by a translation, in viewport units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitTransform {
    pub scale: f64,
    pub translate_x: f64,
    pub translate_y: f64,
}

impl FitTransform {
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            x * self.scale + self.translate_x,
            y * self.scale + self.translate_y,
        )
    }
}

/// Advisory colors for the render target, picked from `dark_mode`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    pub background: String,
    pub link: String,
    pub label: String,
    pub active: String,
}

impl Palette {
    pub fn for_mode(dark_mode: bool) -> Self {
        let (background, link, label, active) = if dark_mode {
            ("#0f172a", "#475569", "#e2e8f0", "#38bdf8")
        } else {
            ("#ffffff", "#cbd5e1", "#1e293b", "#0284c7")
        };
        Self {
            background: background.to_string(),
            link: link.to_string(),
            label: label.to_string(),
            active: active.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    /// One entry per node, indexed by pre-order position.
    pub nodes: Vec<LayoutNode>,
    pub links: Vec<Link>,
    pub leaf_count: usize,
    pub max_depth: usize,
    pub outer_radius: f64,
    pub bounds: Bounds,
    pub fit: FitTransform,
    pub palette: Palette,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayoutOutcome {
    Ready(Layout),
    /// The viewport has no area yet; retry on the next resize.
    NotReady,
}

impl LayoutOutcome {
    pub fn ready(self) -> Option<Layout> {
        match self {
            Self::Ready(layout) => Some(layout),
            Self::NotReady => None,
        }
    }
}

pub fn layout(tree: &MapNode, viewport: Viewport, cfg: &LayoutConfig) -> LayoutOutcome {
    if !viewport.is_usable() {
        tracing::debug!(
            width = viewport.width,
            height = viewport.height,
            "viewport has no area, layout deferred"
        );
        return LayoutOutcome::NotReady;
    }

    let index = TreeIndex::build(tree);
    let leaf_count = index.leaf_count();
    let max_depth = index.max_depth();
    let outer_radius = outer_radius(leaf_count, viewport, cfg);
    let spans = angular_spans(&index);

    let nodes: Vec<LayoutNode> = spans
        .iter()
        .enumerate()
        .map(|(ix, &(start, span))| {
            let depth = index.depth(ix);
            let angle = (start + span / 2.0).rem_euclid(TAU);
            let radius = if max_depth == 0 {
                0.0
            } else {
                outer_radius * depth as f64 / max_depth as f64
            };
            LayoutNode {
                index: ix,
                depth,
                angle,
                radius,
                span_start: start,
                span,
                x: radius * angle.sin(),
                y: -radius * angle.cos(),
                has_children: !index.is_leaf(ix),
            }
        })
        .collect();

    let links = index
        .edges()
        .map(|(source, target)| Link { source, target })
        .collect();
    let bounds = Bounds::around(&nodes);
    let fit = fit_transform(bounds, viewport, cfg);

    tracing::debug!(
        nodes = nodes.len(),
        leaf_count,
        max_depth,
        outer_radius,
        scale = fit.scale,
        "radial layout computed"
    );

    LayoutOutcome::Ready(Layout {
        nodes,
        links,
        leaf_count,
        max_depth,
        outer_radius,
        bounds,
        fit,
        palette: Palette::for_mode(cfg.dark_mode),
    })
}

/// Greater of the leaf-budgeted radius and the viewport floor.
pub fn outer_radius(leaf_count: usize, viewport: Viewport, cfg: &LayoutConfig) -> f64 {
    let required = leaf_count as f64 * cfg.units_per_leaf.max(0.0) / TAU;
    let divisor = if cfg.min_radius_divisor > 0.0 {
        cfg.min_radius_divisor
    } else {
        LayoutConfig::default().min_radius_divisor
    };
    let floor = viewport.shorter_side() / divisor;
    required.max(floor)
}

fn angular_spans(index: &TreeIndex<'_>) -> Vec<(f64, f64)> {
    let leaves = index.subtree_leaves();
    let mut spans = vec![(0.0, TAU); index.len()];

    // Pre-order: a parent's span is final before its children are visited.
    for ix in 0..index.len() {
        let kids = index.children(ix);
        if kids.is_empty() {
            continue;
        }
        let (start, span) = spans[ix];
        let total: usize = kids.iter().map(|&k| leaves[k]).sum();
        let mut cursor = start;
        for (i, &kid) in kids.iter().enumerate() {
            // Last child takes the remainder so the partition has no float gap.
            let share = if i + 1 == kids.len() {
                start + span - cursor
            } else {
                span * leaves[kid] as f64 / total as f64
            };
            spans[kid] = (cursor, share);
            cursor += share;
        }
    }
    spans
}

fn fit_transform(bounds: Bounds, viewport: Viewport, cfg: &LayoutConfig) -> FitTransform {
    let padding = cfg.padding.max(0.0);
    let sx = viewport.width / (bounds.width() + 2.0 * padding);
    let sy = viewport.height / (bounds.height() + 2.0 * padding);
    let mut scale = sx.min(sy);
    if cfg.max_fit_scale > 0.0 {
        scale = scale.min(cfg.max_fit_scale);
    }
    if !scale.is_finite() || scale <= 0.0 {
        scale = 1.0;
    }
    let (cx, cy) = bounds.center();
    FitTransform {
        scale,
        translate_x: viewport.width / 2.0 - scale * cx,
        translate_y: viewport.height / 2.0 - scale * cy,
    }
}
