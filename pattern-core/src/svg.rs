//! Pattern document and its SVG serialization.

use std::io::Write;

use crate::error::Result;
use crate::layout::Canvas;

/// Closed polygon already in canvas coordinates.
pub type CanvasPath = Vec<(f64, f64)>;

#[derive(Clone, Debug, PartialEq)]
pub struct Label {
    pub text: String,
    pub x: f64,
    pub y: f64,
}

/// Fixed-size reference square with its caption to the left.
#[derive(Clone, Debug, PartialEq)]
pub struct ScaleBox {
    pub x: f64,
    pub y: f64,
    pub size: f64,
    pub caption: Label,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Strap {
    pub outline: CanvasPath,
    pub caption: Label,
}

/// Everything that ends up in the SVG, in canvas units.
#[derive(Clone, Debug, PartialEq)]
pub struct PatternDocument {
    pub canvas: Canvas,
    pub unit: String,
    /// Main outline rings, solid stroke.
    pub outline: Vec<CanvasPath>,
    /// Seam allowance rings, dashed stroke.
    pub seam: Vec<CanvasPath>,
    pub scale_box: Option<ScaleBox>,
    pub strap: Option<Strap>,
    pub labels: Vec<Label>,
}

// Format numbers:
// - Near-integers (1e-6) as integers
// - Else up to 3 decimals, trim trailing zeros
pub(crate) fn fmt_num(v: f64) -> String {
    if (v - v.round()).abs() < 1e-6 {
        format!("{:.0}", v)
    } else {
        format!("{:.3}", v)
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    }
}

fn svg_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn path_d(pts: &[(f64, f64)]) -> Option<String> {
    let ((x0, y0), rest) = pts.split_first()?;
    let mut d = format!("M {:.2} {:.2}", x0, y0);
    for (x, y) in rest {
        d.push_str(&format!(" L {:.2} {:.2}", x, y));
    }
    d.push_str(" Z");
    Some(d)
}

fn push_path(s: &mut String, pts: &[(f64, f64)], class: &str) {
    if let Some(d) = path_d(pts) {
        s.push_str(&format!("<path class=\"{class}\" d=\"{d}\"/>\n"));
    }
}

fn push_text(s: &mut String, label: &Label) {
    s.push_str(&format!(
        "<text x=\"{:.2}\" y=\"{:.2}\">{}</text>\n",
        label.x,
        label.y,
        svg_escape(&label.text)
    ));
}

impl PatternDocument {
    pub fn to_svg(&self) -> String {
        let (w, h) = (fmt_num(self.canvas.width), fmt_num(self.canvas.height));
        let unit = svg_escape(&self.unit);
        let mut s = String::new();
        s.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        s.push_str(&format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}{unit}\" height=\"{h}{unit}\" viewBox=\"0 0 {w} {h}\" fill=\"none\" stroke-linejoin=\"round\" font-family=\"sans-serif\" font-size=\"5\">\n"
        ));
        s.push_str("<style>.outline{stroke:#000;stroke-width:0.6}.seam{stroke:#555;stroke-width:0.4;stroke-dasharray:3 2}.strap{stroke:#1f4fd8;stroke-width:0.5}.scale{stroke:#000;stroke-width:0.3}text{fill:#333;stroke:none}</style>\n");
        s.push_str("<rect x=\"0\" y=\"0\" width=\"100%\" height=\"100%\" fill=\"#ffffff\"/>\n");

        for ring in &self.outline {
            push_path(&mut s, ring, "outline");
        }
        for ring in &self.seam {
            push_path(&mut s, ring, "seam");
        }
        if let Some(b) = &self.scale_box {
            push_text(&mut s, &b.caption);
            s.push_str(&format!(
                "<rect class=\"scale\" x=\"{:.2}\" y=\"{:.2}\" width=\"{}\" height=\"{}\"/>\n",
                b.x,
                b.y,
                fmt_num(b.size),
                fmt_num(b.size)
            ));
        }
        if let Some(strap) = &self.strap {
            push_path(&mut s, &strap.outline, "strap");
            push_text(&mut s, &strap.caption);
        }
        for label in &self.labels {
            push_text(&mut s, label);
        }
        s.push_str("</svg>\n");
        s
    }

    /// Write the SVG; only I/O can fail.
    pub fn write_to<W: Write>(&self, mut out: W) -> Result<()> {
        out.write_all(self.to_svg().as_bytes())?;
        out.flush()?;
        Ok(())
    }
}
