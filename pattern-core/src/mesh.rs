//! Mesh loading.
//!
//! Objects are resolved by identifier through a [`MeshSource`]. The file
//! backed source understands Wavefront OBJ, STL (ASCII and binary) and a
//! small JSON format that may describe a whole scene of sub-geometries.
//! Scenes are always merged into a single mesh.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{PatternError, Result};

/// STL binary header size in bytes.
const STL_HEADER_SIZE: usize = 80;
/// Normal + 3 vertices + attribute count.
const STL_TRIANGLE_SIZE: usize = 50;

/// Triangle mesh: vertex positions plus index triples into them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<[f64; 3]>,
    pub faces: Vec<[u32; 3]>,
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ParseError(String);

impl ParseError {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

type ParseResult<T> = std::result::Result<T, ParseError>;

impl Mesh {
    /// Build a mesh, checking that every face index is in range.
    pub fn new(vertices: Vec<[f64; 3]>, faces: Vec<[u32; 3]>) -> ParseResult<Self> {
        let mesh = Self { vertices, faces };
        mesh.validate()?;
        Ok(mesh)
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn validate(&self) -> ParseResult<()> {
        if let Some(v) = self
            .vertices
            .iter()
            .find(|v| v.iter().any(|c| !c.is_finite()))
        {
            return Err(ParseError::new(format!("non-finite vertex {v:?}")));
        }
        let n = self.vertices.len();
        for (i, face) in self.faces.iter().enumerate() {
            if face.iter().any(|&idx| idx as usize >= n) {
                return Err(ParseError::new(format!(
                    "face {i} references {face:?} but only {n} vertices exist"
                )));
            }
        }
        Ok(())
    }

    /// Merge sub-geometries into one mesh; face indices are shifted into the
    /// merged vertex index space.
    pub fn concatenate<I>(parts: I) -> Self
    where
        I: IntoIterator<Item = Mesh>,
    {
        let mut out = Mesh::default();
        for part in parts {
            let base = out.vertices.len() as u32;
            out.vertices.extend(part.vertices);
            out.faces.extend(
                part.faces
                    .into_iter()
                    .map(|[a, b, c]| [a + base, b + base, c + base]),
            );
        }
        out
    }
}

/// File formats understood by [`DirectoryMeshSource`], in lookup order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeshFormat {
    Obj,
    Stl,
    Json,
}

impl MeshFormat {
    pub const ALL: [MeshFormat; 3] = [MeshFormat::Obj, MeshFormat::Stl, MeshFormat::Json];

    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "obj" => Some(Self::Obj),
            "stl" => Some(Self::Stl),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Obj => "obj",
            Self::Stl => "stl",
            Self::Json => "json",
        }
    }

    pub fn parse(&self, bytes: &[u8]) -> ParseResult<Mesh> {
        match self {
            Self::Obj => {
                let text = std::str::from_utf8(bytes)
                    .map_err(|e| ParseError::new(format!("OBJ is not UTF-8: {e}")))?;
                parse_obj(text)
            }
            Self::Stl => parse_stl(bytes),
            Self::Json => parse_json(bytes),
        }
    }
}

fn resolve_obj_index(token: &str, vertex_count: usize) -> ParseResult<u32> {
    let head = token.split('/').next().unwrap_or_default();
    let raw: i64 = head
        .parse()
        .map_err(|_| ParseError::new(format!("bad face index {token:?}")))?;
    let idx = match raw {
        0 => return Err(ParseError::new("OBJ indices are 1-based, found 0")),
        r if r > 0 => r - 1,
        r => vertex_count as i64 + r,
    };
    if idx < 0 || idx as usize >= vertex_count {
        return Err(ParseError::new(format!(
            "face index {raw} out of range for {vertex_count} vertices"
        )));
    }
    Ok(idx as u32)
}

/// Parse Wavefront OBJ text. Only positions and faces are read; polygons are
/// fan triangulated. OBJ indices are global across `o`/`g` groups, so the
/// groups of a scene already share one index space.
pub fn parse_obj(text: &str) -> ParseResult<Mesh> {
    let mut mesh = Mesh::default();
    let mut groups = 0usize;
    for (lineno, line) in text.lines().enumerate() {
        let mut parts = line.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };
        match tag {
            "v" => {
                let coords = parts
                    .take(3)
                    .map(|s| s.parse::<f64>())
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|e| ParseError::new(format!("line {}: {e}", lineno + 1)))?;
                if coords.len() != 3 {
                    return Err(ParseError::new(format!(
                        "line {}: vertex needs 3 coordinates",
                        lineno + 1
                    )));
                }
                mesh.vertices.push([coords[0], coords[1], coords[2]]);
            }
            "f" => {
                let idx = parts
                    .map(|t| resolve_obj_index(t, mesh.vertices.len()))
                    .collect::<ParseResult<Vec<_>>>()?;
                if idx.len() < 3 {
                    return Err(ParseError::new(format!(
                        "line {}: face needs at least 3 vertices",
                        lineno + 1
                    )));
                }
                for k in 1..idx.len() - 1 {
                    mesh.faces.push([idx[0], idx[k], idx[k + 1]]);
                }
            }
            "o" | "g" => groups += 1,
            _ => {}
        }
    }
    debug!(
        vertices = mesh.vertices.len(),
        faces = mesh.faces.len(),
        groups,
        "parsed OBJ"
    );
    mesh.validate()?;
    Ok(mesh)
}

fn is_binary_stl(bytes: &[u8]) -> bool {
    if bytes.len() < STL_HEADER_SIZE + 4 {
        return false;
    }
    let count = u32::from_le_bytes([
        bytes[STL_HEADER_SIZE],
        bytes[STL_HEADER_SIZE + 1],
        bytes[STL_HEADER_SIZE + 2],
        bytes[STL_HEADER_SIZE + 3],
    ]) as usize;
    // Some binary exporters write "solid" into the header too.
    bytes.len() == STL_HEADER_SIZE + 4 + count * STL_TRIANGLE_SIZE
        || bytes[..STL_HEADER_SIZE].contains(&0)
        || !String::from_utf8_lossy(&bytes[..STL_HEADER_SIZE])
            .trim_start()
            .starts_with("solid")
}

/// Parse STL bytes, detecting ASCII vs binary.
pub fn parse_stl(bytes: &[u8]) -> ParseResult<Mesh> {
    if bytes.len() < 6 {
        return Err(ParseError::new("file too small to be valid STL"));
    }
    if is_binary_stl(bytes) {
        parse_stl_binary(bytes)
    } else {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| ParseError::new(format!("ASCII STL is not UTF-8: {e}")))?;
        parse_stl_ascii(text)
    }
}

fn read_f32(buf: &[u8]) -> f64 {
    f64::from(f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]))
}

fn parse_stl_binary(bytes: &[u8]) -> ParseResult<Mesh> {
    if bytes.len() < STL_HEADER_SIZE + 4 {
        return Err(ParseError::new(format!(
            "invalid STL header: expected {} bytes, got {}",
            STL_HEADER_SIZE + 4,
            bytes.len()
        )));
    }
    let count = u32::from_le_bytes([
        bytes[STL_HEADER_SIZE],
        bytes[STL_HEADER_SIZE + 1],
        bytes[STL_HEADER_SIZE + 2],
        bytes[STL_HEADER_SIZE + 3],
    ]) as usize;
    let body = &bytes[STL_HEADER_SIZE + 4..];
    if body.len() < count * STL_TRIANGLE_SIZE {
        return Err(ParseError::new(format!(
            "STL declares {count} triangles but holds {}",
            body.len() / STL_TRIANGLE_SIZE
        )));
    }
    let mut mesh = Mesh {
        vertices: Vec::with_capacity(count * 3),
        faces: Vec::with_capacity(count),
    };
    for tri in body.chunks_exact(STL_TRIANGLE_SIZE).take(count) {
        let base = mesh.vertices.len() as u32;
        // Skip the 12-byte normal.
        for v in tri[12..48].chunks_exact(12) {
            mesh.vertices
                .push([read_f32(&v[0..4]), read_f32(&v[4..8]), read_f32(&v[8..12])]);
        }
        mesh.faces.push([base, base + 1, base + 2]);
    }
    mesh.validate()?;
    Ok(mesh)
}

fn parse_stl_ascii(text: &str) -> ParseResult<Mesh> {
    let mut mesh = Mesh::default();
    let mut in_loop = false;
    let mut facet: Vec<[f64; 3]> = Vec::with_capacity(3);
    for line in text.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(tag) = parts.first() else {
            continue;
        };
        match tag.to_lowercase().as_str() {
            "outer" => {
                in_loop = true;
                facet.clear();
            }
            "vertex" if in_loop => {
                if parts.len() < 4 {
                    return Err(ParseError::new("vertex needs 3 coordinates"));
                }
                let mut v = [0.0; 3];
                for (slot, s) in v.iter_mut().zip(&parts[1..4]) {
                    *slot = s
                        .parse()
                        .map_err(|e| ParseError::new(format!("bad coordinate {s:?}: {e}")))?;
                }
                facet.push(v);
            }
            "endloop" => {
                in_loop = false;
                if facet.len() == 3 {
                    let base = mesh.vertices.len() as u32;
                    mesh.vertices.append(&mut facet);
                    mesh.faces.push([base, base + 1, base + 2]);
                }
            }
            "endsolid" => break,
            _ => {}
        }
    }
    mesh.validate()?;
    Ok(mesh)
}

#[derive(Deserialize)]
struct JsonMesh {
    vertices: Vec<[f64; 3]>,
    #[serde(default)]
    faces: Vec<[u32; 3]>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonMeshFile {
    Scene { geometries: Vec<JsonMesh> },
    Single(JsonMesh),
}

/// Parse the JSON mesh format: either one `{vertices, faces}` object or a
/// scene `{geometries: [...]}` that is merged with [`Mesh::concatenate`].
pub fn parse_json(bytes: &[u8]) -> ParseResult<Mesh> {
    let file: JsonMeshFile =
        serde_json::from_slice(bytes).map_err(|e| ParseError::new(e.to_string()))?;
    let parts = match file {
        JsonMeshFile::Scene { geometries } => geometries,
        JsonMeshFile::Single(m) => vec![m],
    };
    let meshes = parts
        .into_iter()
        .map(|m| Mesh::new(m.vertices, m.faces))
        .collect::<ParseResult<Vec<_>>>()?;
    Ok(Mesh::concatenate(meshes))
}

/// Supplies raw geometry for an object identifier.
pub trait MeshSource: Send + Sync {
    /// Resolve `id`; fails with [`PatternError::NotFound`] when nothing backs it.
    fn load(&self, id: &str) -> Result<Mesh>;
}

/// Reads `<root>/<id>.<ext>` for each supported extension in turn.
#[derive(Clone, Debug)]
pub struct DirectoryMeshSource {
    root: PathBuf,
}

impl DirectoryMeshSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Identifiers are plain names; anything that could leave the model
/// directory is treated as unknown.
fn is_plain_name(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with('.')
        && !id.contains(['/', '\\', '\0'])
        && !id.contains("..")
}

impl MeshSource for DirectoryMeshSource {
    fn load(&self, id: &str) -> Result<Mesh> {
        if !is_plain_name(id) {
            return Err(PatternError::NotFound { id: id.to_string() });
        }
        for format in MeshFormat::ALL {
            let path = self.root.join(format!("{id}.{}", format.extension()));
            if !path.is_file() {
                continue;
            }
            debug!(path = %path.display(), "reading mesh");
            let bytes = std::fs::read(&path)?;
            return format
                .parse(&bytes)
                .map_err(|e| PatternError::invalid_mesh(id, e.to_string()));
        }
        Err(PatternError::NotFound { id: id.to_string() })
    }
}

/// In-memory meshes keyed by identifier.
#[derive(Clone, Debug, Default)]
pub struct MemoryMeshSource {
    meshes: HashMap<String, Mesh>,
}

impl MemoryMeshSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, mesh: Mesh) -> &mut Self {
        self.meshes.insert(id.into(), mesh);
        self
    }
}

impl MeshSource for MemoryMeshSource {
    fn load(&self, id: &str) -> Result<Mesh> {
        self.meshes
            .get(id)
            .cloned()
            .ok_or_else(|| PatternError::NotFound { id: id.to_string() })
    }
}

/// A successfully loaded object, kept in request order.
#[derive(Clone, Debug)]
pub struct LoadedObject {
    pub id: String,
    pub mesh: Mesh,
}

/// Load one object and reject the empty mesh.
pub fn load_mesh(source: &dyn MeshSource, id: &str) -> Result<Mesh> {
    let mesh = source.load(id)?;
    if mesh.is_empty() {
        return Err(PatternError::EmptyGeometry { id: id.to_string() });
    }
    Ok(mesh)
}

/// Load every requested object. Individual failures are logged and skipped;
/// only a request where nothing loads fails.
pub fn load_meshes(source: &dyn MeshSource, ids: &[String]) -> Result<Vec<LoadedObject>> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        match load_mesh(source, id) {
            Ok(mesh) => out.push(LoadedObject {
                id: id.clone(),
                mesh,
            }),
            Err(e) => warn!(object = %id, category = ?e.category(), "skipping object: {e}"),
        }
    }
    if out.is_empty() {
        return Err(PatternError::NoValidObjects {
            requested: ids.len(),
        });
    }
    Ok(out)
}
