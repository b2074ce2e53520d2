use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Axis-aligned box as `(xmin, ymin, xmax, ymax)`, normalized to the image size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BBox {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Smallest box containing both `self` and `other`.
    pub fn union(self, other: BBox) -> BBox {
        BBox {
            xmin: self.xmin.min(other.xmin),
            ymin: self.ymin.min(other.ymin),
            xmax: self.xmax.max(other.xmax),
            ymax: self.ymax.max(other.ymax),
        }
    }
}

/// Union of the boxes of every glyph in a logical symbol.
///
/// The result is axis-wise: its corners need not belong to any single glyph.
/// An empty range means the caller emitted a symbol without glyphs, which the
/// tokenizer never does, so it is reported as [`Error::InvariantViolation`].
pub fn aggregate<I>(boxes: I) -> Result<BBox>
where
    I: IntoIterator<Item = BBox>,
{
    let mut iter = boxes.into_iter();
    let first = iter.next().ok_or(Error::InvariantViolation(
        "cannot aggregate an empty glyph range",
    ))?;
    Ok(iter.fold(first, BBox::union))
}
