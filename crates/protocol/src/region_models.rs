//! Garment region and size-chart models.
//!
//! These are the shapes returned by the inference backend and carried through
//! the ingestion pipeline when a photograph contains more than one garment.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;

/// Axis-aligned box around a garment, in coordinates normalized to `[0, 1]`.
///
/// The field order follows the `(yMin, xMin, yMax, xMax)` convention used by
/// the region-identification backend.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, TS)]
pub struct BoundingBox {
    pub y_min: f64,
    pub x_min: f64,
    pub y_max: f64,
    pub x_max: f64,
}

impl BoundingBox {
    /// Build a box, returning `None` unless every coordinate lies in `[0, 1]`
    /// and the box has a non-negative extent on both axes.
    pub fn normalized(y_min: f64, x_min: f64, y_max: f64, x_max: f64) -> Option<Self> {
        let bbox = Self {
            y_min,
            x_min,
            y_max,
            x_max,
        };
        bbox.is_normalized().then_some(bbox)
    }

    /// Whether the box lies inside the unit square.
    pub fn is_normalized(&self) -> bool {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        in_unit(self.y_min)
            && in_unit(self.x_min)
            && in_unit(self.y_max)
            && in_unit(self.x_max)
            && self.y_min <= self.y_max
            && self.x_min <= self.x_max
    }

    /// The whole frame.
    pub fn full_frame() -> Self {
        Self {
            y_min: 0.0,
            x_min: 0.0,
            y_max: 1.0,
            x_max: 1.0,
        }
    }
}

/// One distinct garment-like object detected in a photograph.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct CandidateRegion {
    /// Short human-readable description, e.g. "navy denim jacket".
    pub label: String,

    pub bounding_box: BoundingBox,
}

/// One row of a garment size chart.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
pub struct SizeRow {
    /// Size designation as printed on the chart ("S", "M", "38", ...).
    pub size: String,

    /// Measurement name to printed value, e.g. `"chest" -> "96 cm"`.
    #[serde(default)]
    pub measurements: BTreeMap<String, String>,
}

/// Size chart read from a photographed label or table.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, TS)]
pub struct SizeChart {
    #[serde(default)]
    pub rows: Vec<SizeRow>,
}

impl SizeChart {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
