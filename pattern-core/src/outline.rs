//! Outline extraction: the boundary polygon(s) around a flattened point cloud.

use std::collections::HashMap;

use geo::{Area, ConcaveHull, ConvexHull, Validation};
use geo_types::{Coord, LineString, MultiPoint, MultiPolygon, Point, Polygon};
use tracing::debug;

use crate::config::HullMode;
use crate::error::{PatternError, Result};

/// Closed polygon boundary (first point repeated at the end).
pub type Ring = LineString<f64>;

/// Clusters this small cannot be hollowed out any further than their convex hull.
const SMALL_CLUSTER: usize = 4;

/// Drawable boundary of a pattern piece: one or more rings, never holes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Outline {
    pub rings: Vec<Ring>,
}

impl Outline {
    /// Keep the exterior of each polygon. Interiors are not drawn.
    pub fn from_polygons<I>(polys: I) -> Self
    where
        I: IntoIterator<Item = Polygon<f64>>,
    {
        let mut rings = Vec::new();
        for poly in polys {
            let (exterior, interiors) = poly.into_inner();
            if !interiors.is_empty() {
                debug!(holes = interiors.len(), "dropping interior rings");
            }
            rings.push(exterior);
        }
        Self { rings }
    }

    pub fn to_multi_polygon(&self) -> MultiPolygon<f64> {
        MultiPolygon::new(
            self.rings
                .iter()
                .map(|r| Polygon::new(r.clone(), vec![]))
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }

    pub fn coords(&self) -> impl Iterator<Item = &Coord<f64>> {
        self.rings.iter().flat_map(|r| r.0.iter())
    }

    pub fn area(&self) -> f64 {
        self.rings
            .iter()
            .map(|r| Polygon::new(r.clone(), vec![]).unsigned_area())
            .sum()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OutlineConfig {
    pub mode: HullMode,
    pub tightness: f64,
    pub concavity: f64,
}

fn distinct(points: &[Coord<f64>]) -> Vec<Coord<f64>> {
    let mut pts = points.to_vec();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup();
    pts
}

fn dist2(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let (dx, dy) = (a.x - b.x, a.y - b.y);
    dx * dx + dy * dy
}

/// All points on one line, within a tolerance relative to the spread.
fn is_collinear(pts: &[Coord<f64>]) -> bool {
    let Some(&p0) = pts.first() else {
        return true;
    };
    let Some(&p1) = pts
        .iter()
        .max_by(|a, b| dist2(p0, **a).total_cmp(&dist2(p0, **b)))
    else {
        return true;
    };
    let len = dist2(p0, p1).sqrt();
    if len == 0.0 {
        return true;
    }
    let tol = len * 1e-9;
    pts.iter().all(|p| {
        let cross = (p1.x - p0.x) * (p.y - p0.y) - (p1.y - p0.y) * (p.x - p0.x);
        (cross / len).abs() <= tol
    })
}

fn extent(pts: &[Coord<f64>]) -> f64 {
    let (mut minx, mut miny) = (f64::INFINITY, f64::INFINITY);
    let (mut maxx, mut maxy) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in pts {
        minx = minx.min(p.x);
        miny = miny.min(p.y);
        maxx = maxx.max(p.x);
        maxy = maxy.max(p.y);
    }
    ((maxx - minx).powi(2) + (maxy - miny).powi(2)).sqrt()
}

fn multipoint(pts: &[Coord<f64>]) -> MultiPoint<f64> {
    MultiPoint::new(pts.iter().map(|&c| Point::from(c)).collect())
}

fn has_area(poly: &Polygon<f64>, scale: f64) -> bool {
    poly.exterior().0.len() >= 4 && poly.unsigned_area() > scale * scale * 1e-12
}

/// Reject inputs no outline can be built from: under three distinct points or
/// every point on one line.
fn check_spread(points: &[Coord<f64>]) -> Result<Vec<Coord<f64>>> {
    let pts = distinct(points);
    if pts.len() < 3 {
        return Err(PatternError::DegenerateGeometry(format!(
            "{} distinct point(s) cannot enclose an area",
            pts.len()
        )));
    }
    if is_collinear(&pts) {
        return Err(PatternError::DegenerateGeometry(
            "all points are collinear".to_string(),
        ));
    }
    Ok(pts)
}

pub fn extract_outline(points: &[Coord<f64>], cfg: &OutlineConfig) -> Result<Outline> {
    match cfg.mode {
        HullMode::Convex => convex_outline(points),
        HullMode::Concave => concave_outline(points, cfg.tightness, cfg.concavity),
    }
}

/// Exact convex hull as a single counter-clockwise ring.
pub fn convex_outline(points: &[Coord<f64>]) -> Result<Outline> {
    let pts = check_spread(points)?;
    let hull = multipoint(&pts).convex_hull();
    if !has_area(&hull, extent(&pts)) {
        return Err(PatternError::DegenerateGeometry(
            "convex hull has zero area".to_string(),
        ));
    }
    Ok(Outline::from_polygons([hull]))
}

/// Concave outline. Points are first split into clusters of points linked by
/// steps shorter than `tightness` times the cloud's diagonal; every cluster
/// then gets its own hull, so distant pieces stay separate rings.
pub fn concave_outline(points: &[Coord<f64>], tightness: f64, concavity: f64) -> Result<Outline> {
    let pts = check_spread(points)?;
    let diag = extent(&pts);
    let link = tightness * diag;
    let groups = clusters(&pts, link);
    debug!(points = pts.len(), clusters = groups.len(), link, "concave outline");

    let total = groups.len();
    let mut polys = Vec::new();
    let mut dropped = 0usize;
    for group in groups {
        if group.len() < 3 || is_collinear(&group) {
            dropped += 1;
            continue;
        }
        let hull = cluster_hull(&group, concavity);
        if has_area(&hull, diag) {
            polys.push(hull);
        } else {
            dropped += 1;
        }
    }
    if dropped > 0 {
        debug!(dropped, clusters = total, "dropped clusters without area");
    }
    if polys.is_empty() {
        return Err(PatternError::HullComputationFailed(format!(
            "concave hull produced no region with area ({dropped} of {total} clusters too small)"
        )));
    }
    Ok(Outline::from_polygons(polys))
}

/// Hull of one cluster. A concave hull that crosses itself is replaced by the
/// cluster's convex hull so every ring stays simple.
fn cluster_hull(group: &[Coord<f64>], concavity: f64) -> Polygon<f64> {
    let mp = multipoint(group);
    if group.len() <= SMALL_CLUSTER {
        return mp.convex_hull();
    }
    let hull = mp.concave_hull(concavity);
    if hull.is_valid() {
        hull
    } else {
        debug!(size = group.len(), "concave hull self-intersects, using convex hull");
        mp.convex_hull()
    }
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

/// Connected components of the "closer than `link`" graph, in the order of
/// their first point. Points are bucketed into cells of side `link / √2` so
/// that a whole cell is connected; only neighbouring cells are compared.
fn clusters(pts: &[Coord<f64>], link: f64) -> Vec<Vec<Coord<f64>>> {
    let cell = link / std::f64::consts::SQRT_2;
    if !(cell.is_finite() && cell > 0.0) {
        return vec![pts.to_vec()];
    }
    let (minx, miny) = pts.iter().fold((f64::INFINITY, f64::INFINITY), |acc, p| {
        (acc.0.min(p.x), acc.1.min(p.y))
    });
    let key = |p: &Coord<f64>| {
        (
            ((p.x - minx) / cell).floor() as i64,
            ((p.y - miny) / cell).floor() as i64,
        )
    };

    let mut cells: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    for (i, p) in pts.iter().enumerate() {
        cells.entry(key(p)).or_default().push(i);
    }
    let keys: Vec<(i64, i64)> = cells.keys().copied().collect();
    let index: HashMap<(i64, i64), usize> =
        keys.iter().enumerate().map(|(i, k)| (*k, i)).collect();

    let link2 = link * link;
    let mut sets = DisjointSet::new(keys.len());
    for (ci, &(cx, cy)) in keys.iter().enumerate() {
        for dx in -2..=2 {
            for dy in -2..=2 {
                let nk = (cx + dx, cy + dy);
                let Some(&ni) = index.get(&nk) else {
                    continue;
                };
                if ni <= ci || sets.find(ci) == sets.find(ni) {
                    continue;
                }
                let touching = cells[&(cx, cy)]
                    .iter()
                    .any(|&a| cells[&nk].iter().any(|&b| dist2(pts[a], pts[b]) <= link2));
                if touching {
                    sets.union(ci, ni);
                }
            }
        }
    }

    let mut order: HashMap<usize, usize> = HashMap::new();
    let mut out: Vec<Vec<Coord<f64>>> = Vec::new();
    for p in pts {
        let root = sets.find(index[&key(p)]);
        let slot = *order.entry(root).or_insert_with(|| {
            out.push(Vec::new());
            out.len() - 1
        });
        out[slot].push(*p);
    }
    out
}
