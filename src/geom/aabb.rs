use std::borrow::Borrow;

use crate::core::types::{Number, Point3, Size3, Vector3};
use crate::geom::interval::Interval;
use crate::geom::ray::{Axis, Segment};
use getset::CopyGetters;

/// An axis-aligned bounding box.
///
/// Spans between corners `min` and `max`. An empty box is represented by
/// [`Aabb::EMPTY`] (corners at `+inf`/`-inf`) rather than `Option<Aabb>`, so
/// that folding over an iterator of boxes ([`Aabb::encompass_iter`]) needs no
/// special-casing for the identity element.
#[derive(CopyGetters, Copy, Clone, Debug, PartialEq)]
#[getset(get_copy = "pub")]
pub struct Aabb {
    min: Point3,
    max: Point3,
}

// region Constructors

impl Aabb {
    /// An AABB with no volume and no content; the identity element of
    /// [`Aabb::encompass`].
    pub const EMPTY: Self = Self {
        min: Point3::INFINITY,
        max: Point3::NEG_INFINITY,
    };

    /// Creates a new [`Aabb`] from two points, which need not be sorted by min/max.
    pub fn new(a: impl Into<Point3>, b: impl Into<Point3>) -> Self {
        let (a, b) = (a.into(), b.into());
        Self {
            min: Point3::min(a, b),
            max: Point3::max(a, b),
        }
    }

    /// Creates a new [`Aabb`] from a centre point and a full-extent size.
    pub fn new_centred(centre: impl Into<Point3>, size: impl Into<Size3>) -> Self {
        let (centre, size) = (centre.into(), size.into());
        let min = centre - size.to_vector() / 2.0;
        let max = centre + size.to_vector() / 2.0;
        Self::new(min, max)
    }

    pub fn is_empty(&self) -> bool { self.max.x < self.min.x || self.max.y < self.min.y || self.max.z < self.min.z }

    /// Returns an [`Aabb`] enclosing both `a` and `b`.
    pub fn encompass(a: impl Borrow<Self>, b: impl Borrow<Self>) -> Self {
        let (a, b) = (a.borrow(), b.borrow());
        Self {
            min: Point3::min(a.min, b.min),
            max: Point3::max(a.max, b.max),
        }
    }

    /// [`Aabb::encompass`] folded over an arbitrary number of boxes.
    pub fn encompass_iter<B: Borrow<Self>>(iter: impl IntoIterator<Item = B>) -> Self {
        iter.into_iter()
            .fold(Self::EMPTY, |a: Self, b: B| Self::encompass(a, b.borrow()))
    }

    /// The tight bounding box of an arbitrary number of points.
    pub fn encompass_points<B: Borrow<Point3>>(iter: impl IntoIterator<Item = B>) -> Self {
        let mut min = Point3::splat(Number::INFINITY);
        let mut max = Point3::splat(Number::NEG_INFINITY);
        for p in iter.into_iter() {
            let p = *p.borrow();
            min = min.min(p);
            max = max.max(p);
        }
        Self { min, max }
    }

    /// Ensures every side of the box is at least `thresh` thick, expanding
    /// symmetrically about the centre where it is not.
    ///
    /// Used at build time when a dataset is flat along one axis (spec: axis
    /// degenerate if `extent <= length / 1000`, inflated by `length / 100`).
    pub fn with_min_padding(&self, thresh: Number) -> Self {
        let centre = self.center();
        let v = self.size().to_vector();
        let padded = Size3::from_vector(Vector3::new(v.x.max(thresh), v.y.max(thresh), v.z.max(thresh)));
        Self::new_centred(centre, padded)
    }
}

// endregion Constructors

// region Helpers

impl Aabb {
    pub const fn size(&self) -> Size3 { Size3::from_vector(self.max - self.min) }

    pub fn center(&self) -> Point3 { self.min + (self.size().to_vector() / 2.0) }

    pub fn diagonal_length(&self) -> Number { self.size().to_vector().length() }

    /// Per-axis extent, e.g. `self.extent(Axis::X) == self.size().to_vector().x`.
    pub fn extent(&self, axis: Axis) -> Number { axis.of_vector(self.size().to_vector()) }

    pub fn min_of(&self, axis: Axis) -> Number { axis.of_point(self.min) }
    pub fn max_of(&self, axis: Axis) -> Number { axis.of_point(self.max) }

    /// Surface area, used by the BIH builder's SAH bucket cost.
    pub fn area(&self) -> Number {
        let s = self.size().to_vector();
        2.0 * (s.x * s.y + s.y * s.z + s.z * s.x)
    }

    pub const fn corners(&self) -> [Point3; 8] {
        let (l, h) = (self.min, self.max);
        [
            [l.x, l.y, l.z].into(),
            [l.x, l.y, h.z].into(),
            [l.x, h.y, l.z].into(),
            [l.x, h.y, h.z].into(),
            [h.x, l.y, l.z].into(),
            [h.x, l.y, h.z].into(),
            [h.x, h.y, l.z].into(),
            [h.x, h.y, h.z].into(),
        ]
    }
}

// endregion Helpers

// region Queries

impl Aabb {
    /// Squared distance from `p` to the box: zero if `p` is inside, else the
    /// sum of squared per-axis clamping deltas.
    pub fn point_distance_squared(&self, p: Point3) -> Number {
        let dx = (self.min.x - p.x).max(0.0).max(p.x - self.max.x);
        let dy = (self.min.y - p.y).max(0.0).max(p.y - self.max.y);
        let dz = (self.min.z - p.z).max(0.0).max(p.z - self.max.z);
        dx * dx + dy * dy + dz * dz
    }

    pub fn contains_point(&self, p: Point3, tol: Number) -> bool {
        p.x >= self.min.x - tol
            && p.x <= self.max.x + tol
            && p.y >= self.min.y - tol
            && p.y <= self.max.y + tol
            && p.z >= self.min.z - tol
            && p.z <= self.max.z + tol
    }

    /// Slab-method ray/segment-vs-AABB test (Tavianator's formulation: see
    /// <https://tavianator.com/2011/ray_box.html>). Returns the `(t_enter,
    /// t_exit)` sub-range of `interval` during which `seg` is inside the box,
    /// or `None` if the segment misses it.
    ///
    /// Works unmodified for rays parallel to an axis (`inv_dir` component is
    /// `±inf`): the resulting `inf`/`-inf` values still compare correctly
    /// against the other two axes' slabs.
    pub fn intersect(&self, seg: &Segment, interval: &Interval<Number>) -> Option<(Number, Number)> {
        if self.is_empty() {
            return None;
        }

        let (p, inv) = (seg.p1(), seg.inv_dir());

        let tx1 = (self.min.x - p.x) * inv.x;
        let tx2 = (self.max.x - p.x) * inv.x;
        let mut t_min = Number::min(tx1, tx2);
        let mut t_max = Number::max(tx1, tx2);

        let ty1 = (self.min.y - p.y) * inv.y;
        let ty2 = (self.max.y - p.y) * inv.y;
        t_min = Number::max(t_min, Number::min(ty1, ty2));
        t_max = Number::min(t_max, Number::max(ty1, ty2));

        let tz1 = (self.min.z - p.z) * inv.z;
        let tz2 = (self.max.z - p.z) * inv.z;
        t_min = Number::max(t_min, Number::min(tz1, tz2));
        t_max = Number::min(t_max, Number::max(tz1, tz2));

        let start = interval.start.unwrap_or(Number::NEG_INFINITY).max(t_min);
        let end = interval.end.unwrap_or(Number::INFINITY).min(t_max);
        if start <= end {
            Some((start, end))
        } else {
            None
        }
    }

    /// Cheap boolean form of [`Aabb::intersect`], used for early-reject
    /// before descending into a node's children.
    pub fn hit(&self, seg: &Segment, interval: &Interval<Number>) -> bool { self.intersect(seg, interval).is_some() }
}

// endregion Queries

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_box_hit_by_centred_ray() {
        let b = Aabb::new([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        let seg = Segment::new([-1.0, 0.5, 0.5], [2.0, 0.5, 0.5]);
        let (t_enter, t_exit) = b.intersect(&seg, &Interval::new(0.0, 1.0)).unwrap();
        assert!((t_enter - 1.0 / 3.0).abs() < 1e-9);
        assert!((t_exit - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn parallel_miss_returns_none() {
        let b = Aabb::new([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        let seg = Segment::new([-1.0, 5.0, 0.5], [2.0, 5.0, 0.5]);
        assert!(b.intersect(&seg, &Interval::new(0.0, 1.0)).is_none());
    }

    #[test]
    fn point_distance_squared_zero_when_inside() {
        let b = Aabb::new([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        assert_eq!(b.point_distance_squared([0.5, 0.5, 0.5].into()), 0.0);
    }

    #[test]
    fn point_distance_squared_matches_axis_clamp() {
        let b = Aabb::new([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        // 1 unit past the max-x face, on the box otherwise
        assert_eq!(b.point_distance_squared([2.0, 0.5, 0.5].into()), 1.0);
    }

    #[test]
    fn encompass_iter_of_empty_is_empty() {
        assert!(Aabb::encompass_iter(std::iter::empty::<Aabb>()).is_empty());
    }
}
