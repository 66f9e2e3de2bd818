use std::fs;
use std::path::Path;

use approx::assert_relative_eq;
use geo::{Area, Intersects};
use geo_types::{Coord, LineString, Point, Polygon};
use pattern_core::config::HullMode;
use pattern_core::flatten::{combined_cloud, flatten, flatten_all};
use pattern_core::layout::{Bounds, Canvas, fit};
use pattern_core::mesh::load_meshes;
use pattern_core::offset::offset_outline;
use pattern_core::outline::{Outline, OutlineConfig, convex_outline, extract_outline};
use pattern_core::{
    DirectoryMeshSource, MemoryMeshSource, Mesh, PatternError, PatternRequest, PatternResponse,
    PatternStore, respond,
};

fn coord(x: f64, y: f64) -> Coord<f64> {
    Coord { x, y }
}

/// Unit-ish slab: a square of side `side` at (x, y), top and bottom faces.
fn slab(x: f64, y: f64, side: f64) -> Mesh {
    let mut vertices = Vec::new();
    for z in [0.0, 1.0] {
        vertices.extend([
            [x, y, z],
            [x + side, y, z],
            [x + side, y + side, z],
            [x, y + side, z],
        ]);
    }
    Mesh::new(vertices, vec![[0, 1, 2], [0, 2, 3], [4, 5, 6], [4, 6, 7]]).unwrap()
}

fn write_models(dir: &Path) {
    fs::write(
        dir.join("cup.obj"),
        "o cup\nv 0 0 0\nv 40 0 0\nv 40 30 0\nv 0 30 0\nf 1 2 3 4\n",
    )
    .unwrap();
    fs::write(
        dir.join("saucer.stl"),
        "solid saucer\n\
         facet normal 0 0 1\n outer loop\n  vertex 60 0 0\n  vertex 90 0 0\n  vertex 75 20 0\n endloop\nendfacet\n\
         endsolid saucer\n",
    )
    .unwrap();
    fs::write(
        dir.join("spoon.json"),
        r#"{"geometries":[
            {"vertices":[[0,40,0],[5,40,0],[5,60,0]],"faces":[[0,1,2]]},
            {"vertices":[[0,60,0],[5,60,0],[2,70,0]],"faces":[[0,1,2]]}
        ]}"#,
    )
    .unwrap();
    fs::write(dir.join("broken.obj"), "v 0 0 0\nf 1 2 3\n").unwrap();
}

#[test]
fn directory_models_of_every_format_load_in_request_order() {
    let dir = tempfile::tempdir().unwrap();
    write_models(dir.path());
    let source = DirectoryMeshSource::new(dir.path());
    let ids: Vec<String> = ["spoon", "broken", "ghost", "cup", "saucer"]
        .into_iter()
        .map(String::from)
        .collect();
    let loaded = load_meshes(&source, &ids).unwrap();
    let names: Vec<&str> = loaded.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(names, ["spoon", "cup", "saucer"]);
    // Scene sub-geometries are concatenated.
    assert_eq!(loaded[0].mesh.vertices.len(), 6);
    assert_eq!(loaded[0].mesh.faces, vec![[0, 1, 2], [3, 4, 5]]);
}

#[test]
fn some_valid_objects_give_a_document() {
    let dir = tempfile::tempdir().unwrap();
    write_models(dir.path());
    let source = DirectoryMeshSource::new(dir.path());
    let req = PatternRequest::new(["ghost", "cup", "broken", "saucer"]);
    let resp = respond(&req, &source, None);
    let PatternResponse::Inline { svg } = resp else {
        panic!("expected inline svg, got {resp:?}");
    };
    assert!(svg.contains("class=\"outline\""));
    assert!(svg.contains(">cup</text>"));
    assert!(svg.contains(">saucer</text>"));
    assert!(!svg.contains(">ghost</text>"));
}

#[test]
fn no_valid_objects_fails() {
    let dir = tempfile::tempdir().unwrap();
    write_models(dir.path());
    let source = DirectoryMeshSource::new(dir.path());
    let req = PatternRequest::new(["ghost", "broken", "../cup"]);
    let err = pattern_core::generate_pattern(&req, &source).unwrap_err();
    assert!(matches!(err, PatternError::NoValidObjects { requested: 3 }));
}

#[test]
fn convex_hull_contains_every_flattened_point() {
    let mesh = Mesh::new(
        vec![
            [0.0, 0.0, 3.0],
            [7.0, 1.0, -2.0],
            [3.0, 9.0, 0.5],
            [2.0, 2.0, 8.0],
            [5.0, 3.0, 1.0],
            [-1.0, 4.0, 0.0],
        ],
        vec![[0, 1, 2], [3, 4, 5]],
    )
    .unwrap();
    let points = flatten(&mesh, Default::default());
    let outline = convex_outline(&points).unwrap();
    let mp = outline.to_multi_polygon();
    for p in &points {
        assert!(mp.intersects(&Point::from(*p)), "{p:?} outside hull");
    }
}

#[test]
fn two_distant_squares_give_two_rings() {
    let mut source = MemoryMeshSource::new();
    source
        .insert("a", slab(0.0, 0.0, 1.0))
        .insert("b", slab(1000.0, 0.0, 1.0));
    let ids = vec!["a".to_string(), "b".to_string()];
    let flat = flatten_all(&load_meshes(&source, &ids).unwrap(), Default::default());
    let cfg = OutlineConfig {
        mode: HullMode::Concave,
        tightness: 0.01,
        concavity: 2.0,
    };
    let outline = extract_outline(&combined_cloud(&flat), &cfg).unwrap();
    assert_eq!(outline.rings.len(), 2);
    for ring in &outline.rings {
        assert_eq!(ring.0.first(), ring.0.last());
        let area = Polygon::new(ring.clone(), vec![]).unsigned_area();
        assert_relative_eq!(area, 1.0, epsilon = 1e-9);
    }
    let mut xs: Vec<f64> = outline
        .rings
        .iter()
        .map(|r| Bounds::of_rings(std::slice::from_ref(r)).unwrap().min_x)
        .collect();
    xs.sort_by(f64::total_cmp);
    assert_eq!(xs, [0.0, 1000.0]);
}

#[test]
fn triangle_hull_is_the_triangle() {
    let pts = [coord(0.0, 0.0), coord(10.0, 0.0), coord(5.0, 10.0)];
    let outline = convex_outline(&pts).unwrap();
    assert_eq!(outline.rings.len(), 1);
    let ring = &outline.rings[0];
    assert_eq!(ring.0.len(), 4);
    assert_eq!(ring.0.first(), ring.0.last());
    for p in &pts {
        assert!(ring.0.contains(p));
    }
}

#[test]
fn square_with_margin_ten_grows_to_120() {
    let ring = LineString::from(vec![
        (-50.0, -50.0),
        (50.0, -50.0),
        (50.0, 50.0),
        (-50.0, 50.0),
        (-50.0, -50.0),
    ]);
    let outline = Outline { rings: vec![ring] };
    let grown = offset_outline(&outline, 10.0).unwrap();
    assert_eq!(grown.rings.len(), 1);
    let b = Bounds::of_outline(&grown).unwrap();
    assert_relative_eq!(b.width(), 120.0, epsilon = 1e-3);
    assert_relative_eq!(b.height(), 120.0, epsilon = 1e-3);
    assert_relative_eq!((b.min_x + b.max_x) / 2.0, 0.0, epsilon = 1e-3);
    assert_relative_eq!((b.min_y + b.max_y) / 2.0, 0.0, epsilon = 1e-3);

    // Zero margin is the identity on the result as well.
    assert_eq!(offset_outline(&grown, 0.0).unwrap(), grown);
}

#[test]
fn identical_points_are_degenerate() {
    let mut source = MemoryMeshSource::new();
    source.insert(
        "dot",
        Mesh::new(vec![[3.0, 3.0, 0.0]; 3], vec![[0, 1, 2]]).unwrap(),
    );
    for mode in [HullMode::Convex, HullMode::Concave] {
        let mut req = PatternRequest::new(["dot"]);
        req.config.hull_mode = mode;
        let err = pattern_core::generate_pattern(&req, &source).unwrap_err();
        assert!(
            matches!(err, PatternError::DegenerateGeometry(_)),
            "{mode:?}: {err}"
        );
    }
}

#[test]
fn layout_never_distorts() {
    let canvas = Canvas {
        width: 300.0,
        height: 300.0,
    };
    let b = Bounds {
        min_x: 0.0,
        min_y: 0.0,
        max_x: 40.0,
        max_y: 10.0,
    };
    let t = fit(&b, canvas, 10.0).unwrap();
    let (x0, y0) = t.apply(coord(b.min_x, b.max_y));
    let (x1, y1) = t.apply(coord(b.max_x, b.min_y));
    assert_relative_eq!(x1 - x0, 280.0, epsilon = 1e-9);
    assert_relative_eq!((y1 - y0) / 10.0, (x1 - x0) / 40.0, epsilon = 1e-9);
    assert!(y0 >= 10.0 && y1 <= 290.0);
}

#[test]
fn stored_documents_are_fetched_by_token() {
    let models = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_models(models.path());
    let source = DirectoryMeshSource::new(models.path());
    let store = PatternStore::open(out.path()).unwrap();

    let mut req = PatternRequest::new(["cup"]);
    req.inline = Some(false);
    req.include_seam_allowance = true;
    let first = respond(&req, &source, Some(&store));
    let second = respond(&req, &source, Some(&store));
    let (PatternResponse::Stored { token: a }, PatternResponse::Stored { token: b }) =
        (&first, &second)
    else {
        panic!("expected stored responses, got {first:?} / {second:?}");
    };
    assert_ne!(a, b);
    let svg = store.fetch(&a.to_string()).unwrap();
    assert!(svg.contains("class=\"seam\""));
    assert_eq!(svg, store.fetch(&b.to_string()).unwrap());
}
