//! Pixel-space geometry for the zone editor and overlays.
//!
//! All zone coordinates live in the reference image's natural pixel space.
//! Clicks arrive in display space (the surface may be scaled on screen), so
//! [`SurfaceTransform`] maps between the two.

use serde::{Deserialize, Serialize};

/// A 2D point in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(&self, dx: f64, dy: f64) -> Point {
        Point::new(self.x + dx, self.y + dy)
    }
}

/// A position reported by the host in display coordinates
/// (e.g. a mouse event's client position).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// The on-screen rectangle the drawing surface occupies at click time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl DisplayRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.width.is_finite() && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
    }
}

/// Natural pixel size of a loaded reference image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Clamp a point into `[0, width] x [0, height]`.
    pub fn clamp(&self, point: Point) -> Point {
        Point::new(
            point.x.clamp(0.0, f64::from(self.width)),
            point.y.clamp(0.0, f64::from(self.height)),
        )
    }
}

/// Maps display-space clicks onto image pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceTransform {
    pub image: ImageSize,
    pub display: DisplayRect,
}

impl SurfaceTransform {
    /// Returns `None` when the display rectangle has no area.
    pub fn new(image: ImageSize, display: DisplayRect) -> Option<Self> {
        if display.is_degenerate() {
            return None;
        }
        Some(Self { image, display })
    }

    pub fn scale_x(&self) -> f64 {
        f64::from(self.image.width) / self.display.width
    }

    pub fn scale_y(&self) -> f64 {
        f64::from(self.image.height) / self.display.height
    }

    /// Image pixel under `screen`, clamped to the image bounds.
    pub fn to_image(&self, screen: ScreenPoint) -> Point {
        let x = (screen.x - self.display.left) * self.scale_x();
        let y = (screen.y - self.display.top) * self.scale_y();
        self.image.clamp(Point::new(x, y))
    }

    pub fn to_screen(&self, point: Point) -> ScreenPoint {
        ScreenPoint::new(
            point.x / self.scale_x() + self.display.left,
            point.y / self.scale_y() + self.display.top,
        )
    }
}

/// An axis-aligned bounding box in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn of(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        })
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Point-in-polygon test (ray casting). Polygons with fewer than three
/// vertices contain nothing.
pub fn polygon_contains(vertices: &[Point], point: &Point) -> bool {
    if vertices.len() < 3 {
        return false;
    }

    let mut inside = false;
    let n = vertices.len();
    let mut j = n - 1;
    for i in 0..n {
        let vi = &vertices[i];
        let vj = &vertices[j];
        if ((vi.y > point.y) != (vj.y > point.y))
            && (point.x < (vj.x - vi.x) * (point.y - vi.y) / (vj.y - vi.y) + vi.x)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Unsigned shoelace area.
pub fn polygon_area(vertices: &[Point]) -> f64 {
    if vertices.len() < 3 {
        return 0.0;
    }
    let n = vertices.len();
    let twice: f64 = (0..n)
        .map(|i| {
            let a = vertices[i];
            let b = vertices[(i + 1) % n];
            a.x * b.y - b.x * a.y
        })
        .sum();
    twice.abs() / 2.0
}

/// Area-weighted centroid; falls back to the vertex mean for degenerate
/// (zero-area) polygons.
pub fn polygon_centroid(vertices: &[Point]) -> Option<Point> {
    if vertices.is_empty() {
        return None;
    }

    let n = vertices.len();
    let mut signed = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for i in 0..n {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        let cross = a.x * b.y - b.x * a.y;
        signed += cross;
        cx += (a.x + b.x) * cross;
        cy += (a.y + b.y) * cross;
    }

    if signed.abs() < f64::EPSILON {
        let count = n as f64;
        let (sx, sy) = vertices
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        return Some(Point::new(sx / count, sy / count));
    }

    let area6 = 3.0 * signed;
    Some(Point::new(cx / area6, cy / area6))
}
