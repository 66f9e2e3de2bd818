//! Mapping geometry coordinates onto the canvas.

use geo_types::Coord;
use serde::{Deserialize, Serialize};

use crate::config::GridConfig;
use crate::error::{PatternError, Result};
use crate::outline::{Outline, Ring};

/// Axis-aligned bounding box in geometry space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    /// `None` for an empty iterator.
    pub fn of_points<'a, I>(pts: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Coord<f64>>,
    {
        let mut it = pts.into_iter();
        let first = it.next()?;
        let mut b = Bounds {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        for p in it {
            b.min_x = b.min_x.min(p.x);
            b.min_y = b.min_y.min(p.y);
            b.max_x = b.max_x.max(p.x);
            b.max_y = b.max_y.max(p.y);
        }
        Some(b)
    }

    pub fn of_rings(rings: &[Ring]) -> Option<Self> {
        Self::of_points(rings.iter().flat_map(|r| r.0.iter()))
    }

    pub fn of_outline(outline: &Outline) -> Option<Self> {
        Self::of_rings(&outline.rings)
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Zero or non-finite extent on either axis.
    pub fn is_degenerate(&self) -> bool {
        let (w, h) = (self.width(), self.height());
        !(w > 0.0 && h > 0.0 && w.is_finite() && h.is_finite())
    }

    /// Top-left corner in geometry space (y grows upward here).
    pub fn top_left(&self) -> Coord<f64> {
        Coord {
            x: self.min_x,
            y: self.max_y,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Canvas {
    pub width: f64,
    pub height: f64,
}

/// Uniform scale plus translation. SVG is y-down, so y is mirrored.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleTransform {
    pub scale: f64,
    pub tx: f64,
    pub ty: f64,
}

impl ScaleTransform {
    pub fn apply(&self, p: Coord<f64>) -> (f64, f64) {
        (p.x * self.scale + self.tx, self.ty - p.y * self.scale)
    }

    pub fn apply_ring(&self, ring: &Ring) -> Vec<(f64, f64)> {
        ring.0.iter().map(|&c| self.apply(c)).collect()
    }
}

/// Fit `bounds` into the canvas minus `padding` on every side, centred,
/// with the same scale on both axes.
pub fn fit(bounds: &Bounds, canvas: Canvas, padding: f64) -> Result<ScaleTransform> {
    let avail_w = canvas.width - 2.0 * padding;
    let avail_h = canvas.height - 2.0 * padding;
    if !(avail_w > 0.0 && avail_h > 0.0) {
        return Err(PatternError::InvalidRequest(format!(
            "padding {padding} leaves no room on a {}x{} canvas",
            canvas.width, canvas.height
        )));
    }
    if bounds.is_degenerate() {
        return Err(PatternError::DegenerateGeometry(format!(
            "shape extent is {}x{}",
            bounds.width(),
            bounds.height()
        )));
    }
    let (w, h) = (bounds.width(), bounds.height());
    let scale = (avail_w / w).min(avail_h / h);
    let left = padding + (avail_w - w * scale) / 2.0;
    let top = padding + (avail_h - h * scale) / 2.0;
    Ok(ScaleTransform {
        scale,
        tx: left - bounds.min_x * scale,
        ty: top + bounds.max_y * scale,
    })
}

/// Catalogue layout: one transform per object plus the resulting canvas.
#[derive(Clone, Debug, PartialEq)]
pub struct GridLayout {
    pub canvas: Canvas,
    pub cells: Vec<ScaleTransform>,
}

/// Place object `i` in row `i / columns`, column `i % columns`, each scaled
/// on its own so its larger side fills the cell's inner box.
pub fn grid(bounds: &[Bounds], cfg: &GridConfig, padding: f64) -> Result<GridLayout> {
    if bounds.is_empty() {
        return Err(PatternError::InvalidRequest("grid has no objects".to_string()));
    }
    let inner = cfg.cell_size - 2.0 * cfg.cell_padding;
    if !(inner > 0.0) || cfg.columns == 0 {
        return Err(PatternError::InvalidRequest(format!(
            "grid cell {} with padding {} leaves no room",
            cfg.cell_size, cfg.cell_padding
        )));
    }
    let cols = cfg.columns.min(bounds.len());
    let rows = bounds.len().div_ceil(cfg.columns);
    let canvas = Canvas {
        width: cols as f64 * cfg.cell_size + 2.0 * padding,
        height: rows as f64 * cfg.cell_size + 2.0 * padding,
    };

    let mut cells = Vec::with_capacity(bounds.len());
    for (i, b) in bounds.iter().enumerate() {
        let (w, h) = (b.width(), b.height());
        let longest = w.max(h);
        if !(longest > 0.0 && longest.is_finite()) {
            return Err(PatternError::DegenerateGeometry(format!(
                "object {i} has no extent"
            )));
        }
        let scale = inner / longest;
        let x0 = padding + (i % cfg.columns) as f64 * cfg.cell_size;
        let y0 = padding + (i / cfg.columns) as f64 * cfg.cell_size;
        let left = x0 + (cfg.cell_size - w * scale) / 2.0;
        let top = y0 + (cfg.cell_size - h * scale) / 2.0;
        cells.push(ScaleTransform {
            scale,
            tx: left - b.min_x * scale,
            ty: top + b.max_y * scale,
        });
    }
    Ok(GridLayout { canvas, cells })
}
