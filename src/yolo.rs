use std::fmt;

use crate::bbox::BBox;

/// One object in a YOLO label file: class id and a center-form box in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelLine {
    pub class_id: usize,
    pub center_x: f64,
    pub center_y: f64,
    pub width: f64,
    pub height: f64,
}

impl LabelLine {
    /// Convert a corner box to center form. Each component is clipped to the
    /// frame independently; boxes spilling slightly outside are shrunk, not dropped.
    pub fn encode(bbox: &BBox, class_id: usize) -> Self {
        Self {
            class_id,
            center_x: clip((bbox.xmin + bbox.xmax) / 2.0),
            center_y: clip((bbox.ymin + bbox.ymax) / 2.0),
            width: clip(bbox.xmax - bbox.xmin),
            height: clip(bbox.ymax - bbox.ymin),
        }
    }
}

impl fmt::Display for LabelLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:.6} {:.6} {:.6} {:.6}",
            self.class_id, self.center_x, self.center_y, self.width, self.height
        )
    }
}

// Adding 0.0 turns -0.0 into 0.0 so it never renders with a sign.
fn clip(v: f64) -> f64 {
    v.clamp(0.0, 1.0) + 0.0
}

/// Render lines as the contents of a label file, newline terminated.
pub fn render_label_file(lines: &[LabelLine]) -> String {
    let mut out = String::with_capacity(lines.len() * 40);
    for line in lines {
        out.push_str(&line.to_string());
        out.push('\n');
    }
    out
}
