//! Integer and float rectangles for logical monitor layouts and CRTC frames.

/// Logical monitor rectangle in layout coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the two rectangles share any interior point.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }

    /// Whether the two rectangles touch along an edge segment of non-zero
    /// length. Corner contact does not count.
    pub fn is_adjacent_to(&self, other: &Rect) -> bool {
        let (x1, y1) = (self.x, self.y);
        let (x2, y2) = (self.x + self.width, self.y + self.height);
        let (ox1, oy1) = (other.x, other.y);
        let (ox2, oy2) = (other.x + other.width, other.y + other.height);

        if (x1 == ox2 || x2 == ox1) && (y1 < oy2 && y2 > oy1) {
            true
        } else {
            (y1 == oy2 || y2 == oy1) && (x1 < ox2 && x2 > ox1)
        }
    }

    pub fn overlaps_region(&self, region: &[Rect]) -> bool {
        region.iter().any(|other| self.overlaps(other))
    }

    pub fn has_adjacent_in_region(&self, region: &[Rect]) -> bool {
        region
            .iter()
            .any(|other| other != self && self.is_adjacent_to(other))
    }
}

/// CRTC frame in fractional layout coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RectF {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RectF {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}
