//! 2D primitives shared by bodies, patches and tile grids.

/// A point or extent in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl std::fmt::Display for Vec2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

/// Axis-aligned rectangle, `min` inclusive and `max` exclusive for overlap.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self {
            min: Vec2::new(min.x.min(max.x), min.y.min(max.y)),
            max: Vec2::new(min.x.max(max.x), min.y.max(max.y)),
        }
    }

    pub fn from_center_size(center: Vec2, size: Vec2) -> Self {
        let half = Vec2::new(size.x.abs() / 2.0, size.y.abs() / 2.0);
        Self::new(
            Vec2::new(center.x - half.x, center.y - half.y),
            Vec2::new(center.x + half.x, center.y + half.y),
        )
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.max.x - self.min.x, self.max.y - self.min.y)
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x < self.max.x && p.y >= self.min.y && p.y < self.max.y
    }

    /// Interiors intersect; touching edges do not count.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
    }

    pub fn translated(&self, by: Vec2) -> Rect {
        Rect {
            min: self.min + by,
            max: self.max + by,
        }
    }
}

/// Integer cell position on a tile grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CellCoord {
    pub x: i32,
    pub y: i32,
}

impl CellCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Cell containing `p` for the given cell size.
    pub fn containing(p: Vec2, cell_size: Vec2) -> Self {
        Self {
            x: (p.x / cell_size.x.max(1e-4)).floor() as i32,
            y: (p.y / cell_size.y.max(1e-4)).floor() as i32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_size_roundtrip() {
        let r = Rect::from_center_size(Vec2::new(4.0, -2.0), Vec2::new(8.0, 4.0));
        assert_eq!(r.min, Vec2::new(0.0, -4.0));
        assert_eq!(r.max, Vec2::new(8.0, 0.0));
        assert_eq!(r.center(), Vec2::new(4.0, -2.0));
        assert_eq!(r.size(), Vec2::new(8.0, 4.0));
    }

    #[test]
    fn test_touching_edges_do_not_overlap() {
        let a = Rect::new(Vec2::new(0.0, 0.0), Vec2::new(2.0, 2.0));
        let b = Rect::new(Vec2::new(2.0, 0.0), Vec2::new(4.0, 2.0));
        let c = Rect::new(Vec2::new(1.5, 1.5), Vec2::new(3.0, 3.0));
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
    }

    #[test]
    fn test_cell_containing_negative_coords() {
        let cs = Vec2::new(1.0, 1.0);
        assert_eq!(CellCoord::containing(Vec2::new(0.5, 0.5), cs), CellCoord::new(0, 0));
        assert_eq!(CellCoord::containing(Vec2::new(-0.5, 2.2), cs), CellCoord::new(-1, 2));
        let half = Vec2::new(0.5, 0.5);
        assert_eq!(CellCoord::containing(Vec2::new(1.2, 0.7), half), CellCoord::new(2, 1));
    }
}
