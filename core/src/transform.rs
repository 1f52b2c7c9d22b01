//! World ↔ pixel coordinate transforms
//!
//! World coordinates are either global geographic pairs (longitude as `x`,
//! latitude as `y`) or building-local meters measured from a floor plan's
//! origin pixel. Only the latter can be mapped onto an image.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::GraphError;

/// A point in world units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldPoint {
    pub x: f64,
    pub y: f64,
}

impl WorldPoint {
    /// Point from `x` (longitude or meters east) and `y`.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance. Treats geographic degrees as planar, which holds
    /// well enough over the span of a campus.
    pub fn distance(self, other: WorldPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Shown the way operators type coordinates: `y, x`.
impl fmt::Display for WorldPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match f.precision() {
            Some(p) => write!(f, "{:.*}, {:.*}", p, self.y, p, self.x),
            None => write!(f, "{}, {}", self.y, self.x),
        }
    }
}

/// A pixel position in a floor-plan image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelPoint {
    pub x: i64,
    pub y: i64,
}

impl PixelPoint {
    /// Pixel at column `x`, row `y`.
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// Per-floor image calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorCalibration {
    pub meters_per_pixel: f64,
    pub origin_pixel_x: i64,
    pub origin_pixel_y: i64,
}

impl FloorCalibration {
    /// `metersPerPixel` must be finite and positive for the transform to be invertible.
    pub fn validate(&self) -> Result<(), String> {
        if !self.meters_per_pixel.is_finite() || self.meters_per_pixel <= 0.0 {
            return Err(format!(
                "metersPerPixel must be positive, got {}",
                self.meters_per_pixel
            ));
        }
        Ok(())
    }

    /// Nearest pixel to a building-local position.
    pub fn world_to_pixel(&self, world: WorldPoint) -> PixelPoint {
        PixelPoint {
            x: (world.x / self.meters_per_pixel).round() as i64 + self.origin_pixel_x,
            y: (world.y / self.meters_per_pixel).round() as i64 + self.origin_pixel_y,
        }
    }

    /// Building-local position of a pixel.
    pub fn pixel_to_world(&self, pixel: PixelPoint) -> WorldPoint {
        WorldPoint {
            x: (pixel.x - self.origin_pixel_x) as f64 * self.meters_per_pixel,
            y: (pixel.y - self.origin_pixel_y) as f64 * self.meters_per_pixel,
        }
    }
}

/// Which coordinate convention a session is authoring in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateMode {
    /// Geographic latitude/longitude, no image transform.
    Global,
    /// Meters local to a building floor plan.
    Local,
}

impl CoordinateMode {
    /// Multiplier applied before squaring distances so both conventions land
    /// in a comfortable floating-point range.
    pub fn scale(self) -> f64 {
        match self {
            CoordinateMode::Global => 100_000.0,
            CoordinateMode::Local => 1.0,
        }
    }

    /// Merge radius in native units (~10 m in either convention).
    pub fn default_epsilon(self) -> f64 {
        match self {
            CoordinateMode::Global => 0.000_09,
            CoordinateMode::Local => 3.0,
        }
    }
}

/// Parse operator text of the form `y, x` (latitude first).
pub fn parse_coordinates(text: &str) -> Result<WorldPoint, GraphError> {
    let malformed = || GraphError::MalformedCoordinates(text.trim().to_string());

    let mut parts = text.split(',');
    let (Some(first), Some(second), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(malformed());
    };

    let y: f64 = first.trim().parse().map_err(|_| malformed())?;
    let x: f64 = second.trim().parse().map_err(|_| malformed())?;
    if !x.is_finite() || !y.is_finite() {
        return Err(malformed());
    }

    Ok(WorldPoint { x, y })
}

/// Parse a click position reported by the rendering surface: `px py` or `px, py`.
pub fn parse_pixel(text: &str) -> Option<PixelPoint> {
    let mut parts = text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty());
    let x = parts.next()?.parse().ok()?;
    let y = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(PixelPoint { x, y })
}
