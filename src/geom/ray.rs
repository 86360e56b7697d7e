use crate::core::types::{Number, Point3, Vector3};

/// A finite line segment from `p1` to `p2`, the input to
/// [`IntersectWithLine`](crate::dataset::IntersectWithLine)-flavoured queries.
///
/// Unlike an infinite ray, `dir` here is *not* normalised: it is exactly
/// `p2 - p1`, so that a parameter `t` in `[0, 1]` walks from `p1` to `p2`.
/// This is what lets the slab test in [`crate::geom::aabb`] clip directly to
/// the segment's own parametrisation instead of a separate distance unit.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Segment {
    p1: Point3,
    dir: Vector3,
    inv_dir: Vector3,
}

impl Segment {
    pub fn new(p1: impl Into<Point3>, p2: impl Into<Point3>) -> Self {
        let (p1, p2) = (p1.into(), p2.into());
        let dir = p2 - p1;
        Self {
            p1,
            dir,
            inv_dir: Vector3::new(1.0 / dir.x, 1.0 / dir.y, 1.0 / dir.z),
        }
    }

    pub const fn p1(&self) -> Point3 { self.p1 }
    pub fn p2(&self) -> Point3 { self.p1 + self.dir }
    pub const fn dir(&self) -> Vector3 { self.dir }
    pub const fn inv_dir(&self) -> Vector3 { self.inv_dir }

    /// Position at parameter `t`, where `t = 0` is `p1` and `t = 1` is `p2`.
    pub fn at(&self, t: Number) -> Point3 { self.p1 + (self.dir * t) }

    /// Index of the axis with the largest absolute direction component: the
    /// *dominant axis*, used by [`crate::locator::bsp`] to choose which of
    /// the six pre-sorted per-leaf cell lists to march.
    pub fn dominant_axis(&self) -> Axis {
        let d = [self.dir.x.abs(), self.dir.y.abs(), self.dir.z.abs()];
        if d[0] >= d[1] && d[0] >= d[2] {
            Axis::X
        } else if d[1] >= d[2] {
            Axis::Y
        } else {
            Axis::Z
        }
    }
}

/// One of the three coordinate axes, used to select an AABB split dimension
/// or a component of a point/vector.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, strum_macros::EnumIter)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
}

impl Axis {
    pub const fn index(self) -> usize { self as usize }

    pub fn of_point(self, p: Point3) -> Number {
        match self {
            Axis::X => p.x,
            Axis::Y => p.y,
            Axis::Z => p.z,
        }
    }

    pub fn of_vector(self, v: Vector3) -> Number {
        match self {
            Axis::X => v.x,
            Axis::Y => v.y,
            Axis::Z => v.z,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_interpolates_from_p1_to_p2() {
        let seg = Segment::new([0.0, 0.0, 0.0], [4.0, 0.0, 0.0]);
        assert_eq!(seg.at(0.0), [0.0, 0.0, 0.0].into());
        assert_eq!(seg.at(0.5), [2.0, 0.0, 0.0].into());
        assert_eq!(seg.at(1.0), [4.0, 0.0, 0.0].into());
    }

    #[test]
    fn dominant_axis_picks_largest_component() {
        let seg = Segment::new([0.0, 0.0, 0.0], [1.0, 5.0, -2.0]);
        assert_eq!(seg.dominant_axis(), Axis::Y);
    }
}
