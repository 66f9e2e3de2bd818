//! Pipeline configuration.
//!
//! Every knob that used to be a separate code path (canvas size, hull
//! algorithm, seam margin) is a field here. All fields have defaults so a
//! request may carry a partial `config` object.

use serde::{Deserialize, Serialize};

use crate::error::{PatternError, Result};
use crate::flatten::Plane;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HullMode {
    #[default]
    Convex,
    Concave,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutMode {
    /// One silhouette over the combined point cloud of every object.
    #[default]
    Combined,
    /// Catalogue layout: one cell per object.
    Grid,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: f64,
    pub height: f64,
    pub padding: f64,
    /// Physical unit appended to the SVG width/height attributes.
    pub unit: String,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 300.0,
            height: 300.0,
            padding: 10.0,
            unit: "mm".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub columns: usize,
    pub cell_size: f64,
    pub cell_padding: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            columns: 3,
            cell_size: 100.0,
            cell_padding: 8.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleBoxConfig {
    pub enabled: bool,
    /// Side of the reference square in canvas units.
    pub size: f64,
}

impl Default for ScaleBoxConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            size: 10.0,
        }
    }
}

/// Strap drawn next to the pattern when seam allowance is requested.
/// Dimensions are in geometry units so the strap scales with the piece.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrapConfig {
    pub enabled: bool,
    pub width: f64,
    pub length: f64,
    pub gap: f64,
}

impl Default for StrapConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            width: 20.0,
            length: 200.0,
            gap: 10.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    pub hull_mode: HullMode,
    /// Link distance for concave hulls, as a fraction of the point cloud's
    /// bounding-box diagonal.
    pub tightness: f64,
    /// Concavity passed to the concave hull; larger is closer to convex.
    pub concavity: f64,
    /// Seam allowance in geometry units.
    pub margin: f64,
    pub plane: Plane,
    pub canvas: CanvasConfig,
    pub layout: LayoutMode,
    pub grid: GridConfig,
    pub scale_box: ScaleBoxConfig,
    pub strap: StrapConfig,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            hull_mode: HullMode::Convex,
            tightness: 0.1,
            concavity: 2.0,
            margin: 10.0,
            plane: Plane::Xy,
            canvas: CanvasConfig::default(),
            layout: LayoutMode::Combined,
            grid: GridConfig::default(),
            scale_box: ScaleBoxConfig::default(),
            strap: StrapConfig::default(),
        }
    }
}

fn positive(name: &str, v: f64) -> Result<()> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(PatternError::InvalidRequest(format!(
            "{name} must be a positive number, got {v}"
        )))
    }
}

fn non_negative(name: &str, v: f64) -> Result<()> {
    if v.is_finite() && v >= 0.0 {
        Ok(())
    } else {
        Err(PatternError::InvalidRequest(format!(
            "{name} must be zero or positive, got {v}"
        )))
    }
}

impl PatternConfig {
    pub fn validate(&self) -> Result<()> {
        positive("tightness", self.tightness)?;
        positive("concavity", self.concavity)?;
        non_negative("margin", self.margin)?;
        positive("canvas.width", self.canvas.width)?;
        positive("canvas.height", self.canvas.height)?;
        non_negative("canvas.padding", self.canvas.padding)?;
        positive("grid.cell_size", self.grid.cell_size)?;
        non_negative("grid.cell_padding", self.grid.cell_padding)?;
        if self.grid.columns == 0 {
            return Err(PatternError::InvalidRequest(
                "grid.columns must be at least 1".to_string(),
            ));
        }
        if self.scale_box.enabled {
            positive("scale_box.size", self.scale_box.size)?;
        }
        if self.strap.enabled {
            positive("strap.width", self.strap.width)?;
            positive("strap.length", self.strap.length)?;
            non_negative("strap.gap", self.strap.gap)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: PatternConfig =
            serde_json::from_str(r#"{"hull_mode":"concave","canvas":{"width":500}}"#).unwrap();
        assert_eq!(cfg.hull_mode, HullMode::Concave);
        assert_eq!(cfg.canvas.width, 500.0);
        assert_eq!(cfg.canvas.height, 300.0);
        assert_eq!(cfg.canvas.unit, "mm");
        assert_eq!(cfg.layout, LayoutMode::Combined);
        cfg.validate().unwrap();
    }

    #[test]
    fn rejects_negative_margin_and_zero_columns() {
        let mut cfg = PatternConfig {
            margin: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(PatternError::InvalidRequest(_))
        ));
        cfg.margin = 0.0;
        cfg.grid.columns = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_nan_tightness() {
        let cfg = PatternConfig {
            tightness: f64::NAN,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
