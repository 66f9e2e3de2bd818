//! Flat sewing/papercraft patterns from 3D meshes.
//!
//! A request names objects; their meshes are projected onto a plane, merged,
//! outlined, optionally grown by a seam allowance, fitted to a canvas and
//! written out as SVG.

pub mod config;
pub mod error;
pub mod flatten;
pub mod layout;
pub mod mesh;
pub mod offset;
pub mod outline;
pub mod pipeline;
pub mod response;
pub mod store;
pub mod svg;

pub use config::{HullMode, LayoutMode, PatternConfig};
pub use error::{ErrorCategory, PatternError, Result};
pub use flatten::Plane;
pub use mesh::{DirectoryMeshSource, MemoryMeshSource, Mesh, MeshSource};
pub use pipeline::{PatternRequest, generate_pattern};
pub use response::{PatternResponse, respond};
pub use store::{PatternStore, PatternToken};
pub use svg::PatternDocument;
