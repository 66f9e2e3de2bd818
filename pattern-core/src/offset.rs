//! Seam allowance: growing an outline outward by a fixed margin.

use geo::{Area, BooleanOps, Buffer, Validation};
use geo_types::{MultiPolygon, Polygon};
use tracing::{debug, warn};

use crate::error::{PatternError, Result};
use crate::outline::Outline;

fn failed(msg: impl Into<String>) -> PatternError {
    PatternError::OffsetComputationFailed(msg.into())
}

/// Offset every ring of `outline` outward by `margin` (round joins).
///
/// Rings are buffered one at a time and the results unioned, so rings that
/// grow into each other merge and the output is a flat list of rings again.
/// A zero margin returns the outline untouched.
pub fn offset_outline(outline: &Outline, margin: f64) -> Result<Outline> {
    if !margin.is_finite() || margin < 0.0 {
        return Err(failed(format!("margin must be finite and >= 0, got {margin}")));
    }
    if outline.is_empty() {
        return Err(failed("nothing to offset"));
    }
    if outline.coords().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(failed("outline has non-finite coordinates"));
    }
    if margin == 0.0 {
        return Ok(outline.clone());
    }

    let mut merged = MultiPolygon::<f64>::new(vec![]);
    for ring in &outline.rings {
        let grown = Polygon::new(ring.clone(), vec![]).buffer(margin);
        merged = if merged.0.is_empty() {
            grown
        } else {
            merged.union(&grown)
        };
    }
    if merged.0.is_empty() {
        return Err(failed("buffer produced no geometry"));
    }

    let result = Outline::from_polygons(merged);
    for ring in &result.rings {
        let poly = Polygon::new(ring.clone(), vec![]);
        if ring.0.len() < 4 || poly.unsigned_area() <= 0.0 {
            return Err(failed("buffer produced a ring without area"));
        }
        if !poly.is_valid() {
            return Err(failed("buffer produced a self-intersecting ring"));
        }
    }
    debug!(
        rings_in = outline.rings.len(),
        rings_out = result.rings.len(),
        margin,
        "offset outline"
    );
    Ok(result)
}

/// Optional seam line. A failed offset never blocks the main outline; it is
/// logged and the seam line is left out.
pub fn seam_allowance(outline: &Outline, margin: f64) -> Option<Outline> {
    match offset_outline(outline, margin) {
        Ok(o) => Some(o),
        Err(e) => {
            warn!(category = ?e.category(), "omitting seam line: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Bounds;
    use approx::assert_relative_eq;
    use geo_types::{Coord, LineString};

    fn square(cx: f64, cy: f64, side: f64) -> Outline {
        let h = side / 2.0;
        Outline {
            rings: vec![LineString::from(vec![
                (cx - h, cy - h),
                (cx + h, cy - h),
                (cx + h, cy + h),
                (cx - h, cy + h),
                (cx - h, cy - h),
            ])],
        }
    }

    #[test]
    fn square_grows_by_twice_the_margin() {
        let grown = offset_outline(&square(0.0, 0.0, 100.0), 10.0).unwrap();
        assert_eq!(grown.rings.len(), 1);
        let b = Bounds::of_outline(&grown).unwrap();
        assert_relative_eq!(b.width(), 120.0, epsilon = 1e-3);
        assert_relative_eq!(b.height(), 120.0, epsilon = 1e-3);
        assert_relative_eq!((b.min_x + b.max_x) / 2.0, 0.0, epsilon = 1e-3);
        assert_relative_eq!((b.min_y + b.max_y) / 2.0, 0.0, epsilon = 1e-3);
    }

    #[test]
    fn zero_margin_is_identity() {
        let outline = square(5.0, -3.0, 40.0);
        assert_eq!(offset_outline(&outline, 0.0).unwrap(), outline);
    }

    #[test]
    fn nearby_rings_merge() {
        let mut outline = square(0.0, 0.0, 10.0);
        outline.rings.extend(square(12.0, 0.0, 10.0).rings);
        let grown = offset_outline(&outline, 2.0).unwrap();
        assert_eq!(grown.rings.len(), 1);
    }

    #[test]
    fn distant_rings_stay_apart() {
        let mut outline = square(0.0, 0.0, 10.0);
        outline.rings.extend(square(100.0, 0.0, 10.0).rings);
        let grown = offset_outline(&outline, 2.0).unwrap();
        assert_eq!(grown.rings.len(), 2);
    }

    #[test]
    fn broken_outline_degrades_to_no_seam() {
        let mut outline = square(0.0, 0.0, 10.0);
        outline.rings[0].0[1] = Coord {
            x: f64::NAN,
            y: 0.0,
        };
        assert!(matches!(
            offset_outline(&outline, 5.0),
            Err(PatternError::OffsetComputationFailed(_))
        ));
        assert!(seam_allowance(&outline, 5.0).is_none());
        assert!(seam_allowance(&square(0.0, 0.0, 10.0), 5.0).is_some());
    }
}
