//! Projection of 3D vertices onto the working plane.

use geo_types::Coord;
use serde::{Deserialize, Serialize};

use crate::mesh::{LoadedObject, Mesh};

/// Working plane; the axis orthogonal to it is discarded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plane {
    /// Drop Z.
    #[default]
    Xy,
    /// Drop Y.
    Xz,
    /// Drop X.
    Yz,
}

impl Plane {
    pub fn project(&self, v: [f64; 3]) -> Coord<f64> {
        let [x, y, z] = v;
        match self {
            Plane::Xy => Coord { x, y },
            Plane::Xz => Coord { x, y: z },
            Plane::Yz => Coord { x: y, y: z },
        }
    }
}

/// Flattened point cloud of one object.
#[derive(Clone, Debug)]
pub struct FlatObject {
    pub id: String,
    pub points: Vec<Coord<f64>>,
}

/// One point per vertex. Duplicates and degenerate faces are kept as is.
pub fn flatten(mesh: &Mesh, plane: Plane) -> Vec<Coord<f64>> {
    mesh.vertices.iter().map(|&v| plane.project(v)).collect()
}

pub fn flatten_all(objects: &[LoadedObject], plane: Plane) -> Vec<FlatObject> {
    objects
        .iter()
        .map(|o| FlatObject {
            id: o.id.clone(),
            points: flatten(&o.mesh, plane),
        })
        .collect()
}

pub fn combined_cloud(objects: &[FlatObject]) -> Vec<Coord<f64>> {
    objects
        .iter()
        .flat_map(|o| o.points.iter().copied())
        .collect()
}
