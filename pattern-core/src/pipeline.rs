//! Request entry point: load, flatten, outline, offset, lay out, assemble.

use geo_types::{Coord, LineString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::config::{LayoutMode, PatternConfig};
use crate::error::{PatternError, Result};
use crate::flatten::{FlatObject, combined_cloud, flatten_all};
use crate::layout::{Bounds, Canvas, ScaleTransform, fit, grid};
use crate::mesh::{MeshSource, load_meshes};
use crate::offset::seam_allowance;
use crate::outline::{Outline, OutlineConfig, Ring, extract_outline};
use crate::svg::{CanvasPath, Label, PatternDocument, ScaleBox, Strap, fmt_num};

/// Distance between a label's baseline and the shape it names (canvas units).
const LABEL_RISE: f64 = 2.0;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternRequest {
    pub objects: Vec<String>,
    /// Draw the seam allowance (and strap, when configured).
    #[serde(default)]
    pub include_seam_allowance: bool,
    /// Older toggle: seam allowance plus strap in one switch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_straps: Option<bool>,
    /// Return the SVG inline (default) or persist it and return a token.
    #[serde(default)]
    pub inline: Option<bool>,
    #[serde(default)]
    pub config: PatternConfig,
}

impl PatternRequest {
    pub fn new<I, S>(objects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            objects: objects.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.objects.is_empty() {
            return Err(PatternError::InvalidRequest(
                "at least one object is required".to_string(),
            ));
        }
        self.config.validate()
    }

    pub fn wants_seam_allowance(&self) -> bool {
        self.include_seam_allowance || self.include_straps == Some(true)
    }

    /// The strap hangs off the seam line, so it needs the seam allowance.
    pub fn wants_strap(&self) -> bool {
        self.wants_seam_allowance()
            && (self.config.strap.enabled || self.include_straps == Some(true))
    }
}

/// One outline with its optional seam line, still in geometry space.
struct Piece {
    outline: Outline,
    seam: Option<Outline>,
}

impl Piece {
    fn build(points: &[Coord<f64>], request: &PatternRequest) -> Result<Self> {
        let cfg = &request.config;
        let outline = extract_outline(
            points,
            &OutlineConfig {
                mode: cfg.hull_mode,
                tightness: cfg.tightness,
                concavity: cfg.concavity,
            },
        )?;
        let seam = if request.wants_seam_allowance() {
            seam_allowance(&outline, cfg.margin)
        } else {
            None
        };
        Ok(Self { outline, seam })
    }

    fn bounds(&self) -> Result<Bounds> {
        let main = Bounds::of_outline(&self.outline).ok_or_else(|| {
            PatternError::HullComputationFailed("outline has no rings".to_string())
        })?;
        Ok(match self.seam.as_ref().and_then(Bounds::of_outline) {
            Some(seam) => main.union(&seam),
            None => main,
        })
    }
}

fn transform_rings(t: &ScaleTransform, rings: &[Ring]) -> Vec<CanvasPath> {
    rings.iter().map(|r| t.apply_ring(r)).collect()
}

fn label_at(t: &ScaleTransform, text: &str, anchor: Coord<f64>) -> Label {
    let (x, y) = t.apply(anchor);
    Label {
        text: text.to_string(),
        x,
        y: y - LABEL_RISE,
    }
}

/// Height of the strip kept free along the bottom edge for the scale box.
fn decoration_strip(cfg: &PatternConfig) -> f64 {
    if cfg.scale_box.enabled {
        2.0 * cfg.scale_box.size
    } else {
        0.0
    }
}

/// "1cm scale box:" for the default 10 mm box, otherwise size and unit as given.
fn scale_caption(size: f64, unit: &str) -> String {
    let whole_cm = (size / 10.0 - (size / 10.0).round()).abs() < 1e-9;
    if unit == "mm" && whole_cm {
        format!("{}cm scale box:", fmt_num(size / 10.0))
    } else {
        format!("{}{unit} scale box:", fmt_num(size))
    }
}

fn scale_box(cfg: &PatternConfig, canvas: Canvas) -> Option<ScaleBox> {
    if !cfg.scale_box.enabled {
        return None;
    }
    let size = cfg.scale_box.size;
    Some(ScaleBox {
        x: size * 10.0,
        y: canvas.height - 2.0 * size,
        size,
        caption: Label {
            text: scale_caption(size, &cfg.canvas.unit),
            x: size,
            y: canvas.height - size,
        },
    })
}

/// Strap rectangle to the right of `drawn`, top-aligned, in geometry space.
fn strap_ring(cfg: &PatternConfig, drawn: &Bounds) -> Ring {
    let s = &cfg.strap;
    let x0 = drawn.max_x + s.gap;
    let y1 = drawn.max_y;
    let y0 = y1 - s.length;
    LineString::from(vec![
        (x0, y0),
        (x0 + s.width, y0),
        (x0 + s.width, y1),
        (x0, y1),
        (x0, y0),
    ])
}

/// Run the whole pipeline for one request.
#[instrument(skip_all, fields(objects = request.objects.len()))]
pub fn generate_pattern(
    request: &PatternRequest,
    source: &dyn MeshSource,
) -> Result<PatternDocument> {
    request.validate()?;
    let loaded = load_meshes(source, &request.objects)?;
    let flat = flatten_all(&loaded, request.config.plane);
    info!(
        requested = request.objects.len(),
        loaded = flat.len(),
        layout = ?request.config.layout,
        "generating pattern"
    );
    match request.config.layout {
        LayoutMode::Combined => combined_document(request, &flat),
        LayoutMode::Grid => grid_document(request, &flat),
    }
}

fn combined_document(request: &PatternRequest, flat: &[FlatObject]) -> Result<PatternDocument> {
    let cfg = &request.config;
    let piece = Piece::build(&combined_cloud(flat), request)?;
    let mut drawn = piece.bounds()?;

    let strap = if request.wants_strap() {
        let ring = strap_ring(cfg, &drawn);
        if let Some(b) = Bounds::of_rings(std::slice::from_ref(&ring)) {
            drawn = drawn.union(&b);
        }
        Some(ring)
    } else {
        None
    };

    let canvas = Canvas {
        width: cfg.canvas.width,
        height: cfg.canvas.height,
    };
    // The pattern is fitted above the scale box strip.
    let drawable = Canvas {
        height: canvas.height - decoration_strip(cfg),
        ..canvas
    };
    let t = fit(&drawn, drawable, cfg.canvas.padding)?;
    debug!(scale = t.scale, tx = t.tx, ty = t.ty, "combined layout");

    let labels = flat
        .iter()
        .filter_map(|o| {
            Bounds::of_points(&o.points).map(|b| label_at(&t, &o.id, b.top_left()))
        })
        .collect();
    let strap = strap.map(|ring| {
        // Caption sits under the strap's lower-left corner.
        let (x, y) = t.apply(ring.0[0]);
        Strap {
            outline: t.apply_ring(&ring),
            caption: Label {
                text: "Strap".to_string(),
                x,
                y: y + 3.0 * LABEL_RISE,
            },
        }
    });

    Ok(PatternDocument {
        canvas,
        unit: cfg.canvas.unit.clone(),
        outline: transform_rings(&t, &piece.outline.rings),
        seam: piece
            .seam
            .as_ref()
            .map(|s| transform_rings(&t, &s.rings))
            .unwrap_or_default(),
        scale_box: scale_box(cfg, canvas),
        strap,
        labels,
    })
}

fn grid_document(request: &PatternRequest, flat: &[FlatObject]) -> Result<PatternDocument> {
    let cfg = &request.config;
    let pieces = flat
        .iter()
        .map(|o| Piece::build(&o.points, request))
        .collect::<Result<Vec<_>>>()?;
    let bounds = pieces
        .iter()
        .map(Piece::bounds)
        .collect::<Result<Vec<_>>>()?;
    let layout = grid(&bounds, &cfg.grid, cfg.canvas.padding)?;
    let canvas = Canvas {
        height: layout.canvas.height + decoration_strip(cfg),
        ..layout.canvas
    };

    let mut doc = PatternDocument {
        canvas,
        unit: cfg.canvas.unit.clone(),
        outline: Vec::new(),
        seam: Vec::new(),
        scale_box: scale_box(cfg, canvas),
        strap: None,
        labels: Vec::new(),
    };
    for (((piece, b), t), obj) in pieces.iter().zip(&bounds).zip(&layout.cells).zip(flat) {
        doc.outline.extend(transform_rings(t, &piece.outline.rings));
        if let Some(seam) = &piece.seam {
            doc.seam.extend(transform_rings(t, &seam.rings));
        }
        doc.labels.push(label_at(t, &obj.id, b.top_left()));
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HullMode;
    use crate::mesh::{MemoryMeshSource, Mesh};

    fn prism(x: f64, y: f64, side: f64) -> Mesh {
        let mut vertices = Vec::new();
        for z in [0.0, 5.0] {
            vertices.extend([
                [x, y, z],
                [x + side, y, z],
                [x + side, y + side, z],
                [x, y + side, z],
            ]);
        }
        Mesh::new(vertices, vec![[0, 1, 2], [0, 2, 3], [4, 5, 6], [4, 6, 7]]).unwrap()
    }

    fn source() -> MemoryMeshSource {
        let mut s = MemoryMeshSource::new();
        s.insert("left", prism(0.0, 0.0, 10.0))
            .insert("right", prism(50.0, 0.0, 10.0));
        s
    }

    fn outline_box(doc: &PatternDocument) -> (f64, f64, f64, f64) {
        doc.outline.iter().chain(&doc.seam).flatten().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(x0, y0, x1, y1), &(x, y)| (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        )
    }

    #[test]
    fn request_accepts_legacy_strap_flag() {
        let req: PatternRequest =
            serde_json::from_str(r#"{"objects":["a"],"include_straps":true}"#).unwrap();
        assert!(!req.include_seam_allowance);
        assert!(req.wants_seam_allowance());
        assert!(req.wants_strap());
        assert_eq!(req.inline, None);

        let req: PatternRequest =
            serde_json::from_str(r#"{"objects":["a"],"include_seam_allowance":true}"#).unwrap();
        assert!(req.wants_seam_allowance());
        assert!(!req.wants_strap());
    }

    #[test]
    fn legacy_strap_flag_draws_the_strap() {
        let req: PatternRequest =
            serde_json::from_str(r#"{"objects":["left"],"include_straps":true}"#).unwrap();
        let doc = generate_pattern(&req, &source()).unwrap();
        assert_eq!(doc.seam.len(), 1);
        assert_eq!(doc.strap.as_ref().unwrap().caption.text, "Strap");
    }

    #[test]
    fn scale_box_sits_below_the_pattern() {
        let mut s = MemoryMeshSource::new();
        s.insert("square", prism(0.0, 0.0, 100.0));
        let combined = PatternRequest::new(["square"]);
        let mut grid = PatternRequest::new(["square", "square"]);
        grid.config.layout = LayoutMode::Grid;
        for req in [combined, grid] {
            let doc = generate_pattern(&req, &s).unwrap();
            let b = doc.scale_box.as_ref().unwrap();
            let (_, _, _, max_y) = outline_box(&doc);
            assert!(max_y < b.y, "{:?}: outline reaches {max_y}, box at {}", req.config.layout, b.y);
            assert!(b.y + b.size <= doc.canvas.height);
            assert!(b.caption.y <= doc.canvas.height);
        }
    }

    #[test]
    fn scale_caption_follows_size_and_unit() {
        assert_eq!(scale_caption(10.0, "mm"), "1cm scale box:");
        assert_eq!(scale_caption(20.0, "mm"), "2cm scale box:");
        assert_eq!(scale_caption(15.0, "mm"), "15mm scale box:");
        assert_eq!(scale_caption(1.0, "in"), "1in scale box:");

        let mut req = PatternRequest::new(["left"]);
        req.config.scale_box.size = 20.0;
        let doc = generate_pattern(&req, &source()).unwrap();
        assert_eq!(doc.scale_box.unwrap().caption.text, "2cm scale box:");
    }

    #[test]
    fn empty_request_is_invalid() {
        let req = PatternRequest::new(Vec::<String>::new());
        assert!(matches!(
            generate_pattern(&req, &source()),
            Err(PatternError::InvalidRequest(_))
        ));
    }

    #[test]
    fn combined_layout_labels_every_object() {
        let req = PatternRequest::new(["left", "missing", "right"]);
        let doc = generate_pattern(&req, &source()).unwrap();
        assert_eq!(doc.outline.len(), 1);
        assert!(doc.seam.is_empty());
        let names: Vec<&str> = doc.labels.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(names, ["left", "right"]);
        assert!(doc.scale_box.is_some());
    }

    #[test]
    fn seam_and_strap_fit_the_canvas() {
        let mut req = PatternRequest::new(["left"]);
        req.include_seam_allowance = true;
        req.config.margin = 2.0;
        req.config.strap.enabled = true;
        let doc = generate_pattern(&req, &source()).unwrap();
        assert_eq!(doc.seam.len(), 1);
        let strap = doc.strap.as_ref().unwrap();
        let pad = req.config.canvas.padding;
        for (x, y) in doc.outline.iter().chain(&doc.seam).flatten().chain(&strap.outline) {
            assert!(*x >= pad - 1e-6 && *x <= doc.canvas.width - pad + 1e-6);
            assert!(*y >= pad - 1e-6 && *y <= doc.canvas.height - pad + 1e-6);
        }
    }

    #[test]
    fn grid_layout_draws_one_piece_per_object() {
        let mut req = PatternRequest::new(["left", "right"]);
        req.config.layout = LayoutMode::Grid;
        req.config.hull_mode = HullMode::Concave;
        req.config.tightness = 1.0;
        req.include_seam_allowance = true;
        let doc = generate_pattern(&req, &source()).unwrap();
        assert_eq!(doc.outline.len(), 2);
        assert_eq!(doc.seam.len(), 2);
        assert_eq!(doc.canvas.width, 2.0 * 100.0 + 2.0 * 10.0);
        assert!(doc.labels[0].x < doc.labels[1].x);
    }
}
