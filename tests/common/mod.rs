//! Shared `Dataset`/`Cell` test fixtures, used by the per-locator integration
//! suites (spec §8 scenarios). Not part of the crate itself: a small
//! hand-rolled mesh good enough to exercise `find_cell`, ray intersection
//! and closest-point queries against known geometry.

#![allow(dead_code)]

use cell_locator::core::types::{CellId, Number, Point3, Vector3};
use cell_locator::geom::aabb::Aabb;
use cell_locator::geom::interval::Interval;
use cell_locator::geom::ray::Segment;
use cell_locator::{Cell, Dataset, EvaluatePosition, IntersectWithLine};
use smallvec::{smallvec, SmallVec};

fn cross(a: Vector3, b: Vector3) -> Vector3 { Vector3::new(a.y * b.z - a.z * b.y, a.z * b.x - a.x * b.z, a.x * b.y - a.y * b.x) }

/// Möller-Trumbore ray/triangle test against the finite segment `seg`
/// within `[0, 1]`. Returns the hit parameter and barycentric `(u, v)`
/// weights of vertices `b`/`c` (vertex `a`'s weight is `1 - u - v`).
fn ray_triangle_hit(seg: &Segment, tol: Number, a: Point3, b: Point3, c: Point3) -> Option<(Number, Number, Number)> {
    let e1 = b - a;
    let e2 = c - a;
    let dir = seg.dir();
    let pvec = cross(dir, e2);
    let det = e1.dot(pvec);
    if det.abs() < 1e-12 {
        return None;
    }
    let inv_det = 1.0 / det;
    let tvec = seg.p1() - a;
    let u = tvec.dot(pvec) * inv_det;
    if u < -tol || u > 1.0 + tol {
        return None;
    }
    let qvec = cross(tvec, e1);
    let v = dir.dot(qvec) * inv_det;
    if v < -tol || u + v > 1.0 + tol {
        return None;
    }
    let t = e2.dot(qvec) * inv_det;
    if t < -tol || t > 1.0 + tol {
        return None;
    }
    Some((t, u, v))
}

fn trilinear_weights(pcoords: [Number; 3]) -> SmallVec<[Number; 8]> {
    let [px, py, pz] = pcoords;
    let mut w = SmallVec::new();
    for &xi in &[0.0, 1.0] {
        for &yi in &[0.0, 1.0] {
            for &zi in &[0.0, 1.0] {
                let wx = if xi > 0.5 { px } else { 1.0 - px };
                let wy = if yi > 0.5 { py } else { 1.0 - py };
                let wz = if zi > 0.5 { pz } else { 1.0 - pz };
                w.push(wx * wy * wz);
            }
        }
    }
    w
}

/// A tetrahedron (4 vertices), evaluated by exact barycentric solve and
/// intersected face-by-face.
#[derive(Clone, Debug)]
pub struct Tetra {
    pub point_ids: [usize; 4],
    pub verts: [Point3; 4],
}

impl Tetra {
    fn barycentric(&self, x: Point3) -> [Number; 4] {
        let [v0, v1, v2, v3] = self.verts;
        let e1 = v1 - v0;
        let e2 = v2 - v0;
        let e3 = v3 - v0;
        // Cramer's rule for `x - v0 = b1*e1 + b2*e2 + b3*e3`.
        let m = cross(e2, e3);
        let det = e1.dot(m);
        let rhs = x - v0;
        let b1 = rhs.dot(m) / det;
        let b2 = cross(e3, e1).dot(rhs) / det;
        let b3 = cross(e1, e2).dot(rhs) / det;
        [1.0 - b1 - b2 - b3, b1, b2, b3]
    }

    const FACES: [[usize; 3]; 4] = [[1, 2, 3], [0, 3, 2], [0, 1, 3], [0, 2, 1]];
}

impl Cell for Tetra {
    fn point_ids(&self) -> &[usize] { &self.point_ids }

    fn evaluate_position(&self, x: Point3, tol2: Number) -> EvaluatePosition {
        let tol = tol2.sqrt();
        let b = self.barycentric(x);
        if b.iter().all(|&bi| bi >= -tol) {
            EvaluatePosition::Inside {
                sub_id: 0,
                pcoords: [b[1], b[2], b[3]],
                dist2: 0.0,
                weights: smallvec![b[0], b[1], b[2], b[3]],
            }
        } else {
            EvaluatePosition::Outside
        }
    }

    fn intersect_with_line(&self, p1: Point3, p2: Point3, tol: Number) -> Option<IntersectWithLine> {
        let seg = Segment::new(p1, p2);
        let mut best: Option<(Number, Point3, [Number; 3])> = None;
        for face in Self::FACES {
            let [a, b, c] = face.map(|i| self.verts[i]);
            let Some((t, u, v)) = ray_triangle_hit(&seg, tol, a, b, c) else { continue };
            let t = t.clamp(0.0, 1.0);
            if best.as_ref().map_or(true, |(bt, _, _)| t < *bt) {
                let x = seg.at(t);
                let bc = self.barycentric(x);
                best = Some((t, x, [bc[1], bc[2], bc[3]]));
                let _ = (u, v);
            }
        }
        best.map(|(t, x, pcoords)| IntersectWithLine { t, x, pcoords, sub_id: 0 })
    }
}

/// An axis-aligned hexahedron: thin wrapper over [`Aabb`], reusing the
/// crate's own slab/ray machinery instead of reimplementing box geometry.
#[derive(Clone, Debug)]
pub struct Hex {
    pub point_ids: [usize; 8],
    pub aabb: Aabb,
}

impl Cell for Hex {
    fn point_ids(&self) -> &[usize] { &self.point_ids }

    fn evaluate_position(&self, x: Point3, tol2: Number) -> EvaluatePosition {
        let tol = tol2.sqrt();
        let (min, max) = (self.aabb.min(), self.aabb.max());
        let outside = [
            x.x < min.x - tol || x.x > max.x + tol,
            x.y < min.y - tol || x.y > max.y + tol,
            x.z < min.z - tol || x.z > max.z + tol,
        ];
        // More than one axis out of range: the closest feature is an edge or
        // vertex, not a face, and this fixture only evaluates face-facing
        // points (good enough for the find_cell/closest-point scenarios it
        // is used in).
        if outside.iter().filter(|&&o| o).count() >= 2 {
            return EvaluatePosition::Outside;
        }
        let dist2 = self.aabb.point_distance_squared(x);
        let size = self.aabb.size().to_vector();
        let clamp_norm = |v: Number, lo: Number, hi: Number, extent: Number| {
            if extent <= 0.0 {
                0.0
            } else {
                (v.clamp(lo, hi) - lo) / extent
            }
        };
        let pcoords = [
            clamp_norm(x.x, min.x, max.x, size.x),
            clamp_norm(x.y, min.y, max.y, size.y),
            clamp_norm(x.z, min.z, max.z, size.z),
        ];
        EvaluatePosition::Inside {
            sub_id: 0,
            pcoords,
            dist2,
            weights: trilinear_weights(pcoords),
        }
    }

    fn intersect_with_line(&self, p1: Point3, p2: Point3, _tol: Number) -> Option<IntersectWithLine> {
        let seg = Segment::new(p1, p2);
        let (t_enter, t_exit) = self.aabb.intersect(&seg, &Interval::new(0.0, 1.0))?;
        let t = t_enter.max(0.0);
        if t > t_exit {
            return None;
        }
        let x = seg.at(t);
        let (min, max) = (self.aabb.min(), self.aabb.max());
        let size = self.aabb.size().to_vector();
        let clamp_norm = |v: Number, lo: Number, extent: Number| if extent <= 0.0 { 0.0 } else { (v - lo) / extent };
        let pcoords = [clamp_norm(x.x, min.x, size.x), clamp_norm(x.y, min.y, size.y), clamp_norm(x.z, min.z, size.z)];
        Some(IntersectWithLine { t, x, pcoords, sub_id: 0 })
    }
}

/// A convex polyhedron given as a triangulated face list, tested by
/// half-space containment (the L1-ball case here: an octahedron) and
/// per-face ray/triangle intersection. Stands in for scenario 4's "cell
/// kind with no dedicated fast path" case.
#[derive(Clone, Debug)]
pub struct Polyhedron {
    pub point_ids: Vec<usize>,
    pub verts: Vec<Point3>,
    pub faces: Vec<[usize; 3]>,
    pub centre: Point3,
    pub radius: Number,
}

impl Polyhedron {
    /// A unit-radius octahedron (8 triangular faces, 6 vertices) centred at
    /// the origin, inscribing the unit sphere at each face's midpoint.
    pub fn unit_octahedron(point_ids: [usize; 6]) -> Self {
        let verts = vec![
            Point3::from([1.0, 0.0, 0.0]),
            Point3::from([-1.0, 0.0, 0.0]),
            Point3::from([0.0, 1.0, 0.0]),
            Point3::from([0.0, -1.0, 0.0]),
            Point3::from([0.0, 0.0, 1.0]),
            Point3::from([0.0, 0.0, -1.0]),
        ];
        let faces = vec![[0, 2, 4], [2, 1, 4], [1, 3, 4], [3, 0, 4], [2, 0, 5], [1, 2, 5], [3, 1, 5], [0, 3, 5]];
        Self {
            point_ids: point_ids.to_vec(),
            verts,
            faces,
            centre: Point3::from([0.0, 0.0, 0.0]),
            radius: 1.0,
        }
    }
}

impl Cell for Polyhedron {
    fn point_ids(&self) -> &[usize] { &self.point_ids }

    fn evaluate_position(&self, x: Point3, tol2: Number) -> EvaluatePosition {
        let tol = tol2.sqrt();
        let d = x - self.centre;
        let l1 = d.x.abs() + d.y.abs() + d.z.abs();
        if l1 <= self.radius + tol {
            EvaluatePosition::Inside {
                sub_id: 0,
                pcoords: [d.x, d.y, d.z],
                dist2: 0.0,
                weights: smallvec![1.0],
            }
        } else {
            EvaluatePosition::Outside
        }
    }

    fn intersect_with_line(&self, p1: Point3, p2: Point3, tol: Number) -> Option<IntersectWithLine> {
        let seg = Segment::new(p1, p2);
        let mut best: Option<(Number, Point3)> = None;
        for face in &self.faces {
            let [a, b, c] = face.map(|i| self.verts[i]);
            let Some((t, _, _)) = ray_triangle_hit(&seg, tol, a, b, c) else { continue };
            let t = t.clamp(0.0, 1.0);
            if best.as_ref().map_or(true, |(bt, _)| t < *bt) {
                best = Some((t, seg.at(t)));
            }
        }
        best.map(|(t, x)| IntersectWithLine { t, x, pcoords: [0.0, 0.0, 0.0], sub_id: 0 })
    }
}

#[derive(Clone, Debug)]
pub enum TestCell {
    Tetra(Tetra),
    Hex(Hex),
    Poly(Polyhedron),
}

impl Cell for TestCell {
    fn point_ids(&self) -> &[usize] {
        match self {
            TestCell::Tetra(c) => c.point_ids(),
            TestCell::Hex(c) => c.point_ids(),
            TestCell::Poly(c) => c.point_ids(),
        }
    }

    fn evaluate_position(&self, x: Point3, tol2: Number) -> EvaluatePosition {
        match self {
            TestCell::Tetra(c) => c.evaluate_position(x, tol2),
            TestCell::Hex(c) => c.evaluate_position(x, tol2),
            TestCell::Poly(c) => c.evaluate_position(x, tol2),
        }
    }

    fn intersect_with_line(&self, p1: Point3, p2: Point3, tol: Number) -> Option<IntersectWithLine> {
        match self {
            TestCell::Tetra(c) => c.intersect_with_line(p1, p2, tol),
            TestCell::Hex(c) => c.intersect_with_line(p1, p2, tol),
            TestCell::Poly(c) => c.intersect_with_line(p1, p2, tol),
        }
    }
}

/// The fixture mesh: an explicit point array plus a cell list, with a
/// bumpable modification timestamp for the rebuild-on-change tests.
pub struct TestDataset {
    points: Vec<Point3>,
    cells: Vec<TestCell>,
    mtime: u64,
}

impl TestDataset {
    pub fn new(points: Vec<Point3>, cells: Vec<TestCell>) -> Self { Self { points, cells, mtime: 0 } }

    pub fn bump_modification_time(&mut self) { self.mtime += 1; }
}

impl Dataset for TestDataset {
    type Cell = TestCell;

    fn num_cells(&self) -> usize { self.cells.len() }
    fn num_points(&self) -> usize { self.points.len() }
    fn bounds(&self) -> Aabb { Aabb::encompass_points(self.points.iter().copied()) }
    fn get_point(&self, point_id: usize) -> Point3 { self.points[point_id] }

    fn get_cell(&self, cell_id: CellId) -> Option<Self::Cell> {
        if cell_id < 0 {
            return None;
        }
        self.cells.get(cell_id as usize).cloned()
    }

    fn modification_time(&self) -> u64 { self.mtime }
}

fn hex_aabb(point_ids: [usize; 8], min: [Number; 3], max: [Number; 3]) -> TestCell {
    TestCell::Hex(Hex {
        point_ids,
        aabb: Aabb::new(min, max),
    })
}

/// Scenario 1: a single unit-cube hexahedron at the origin.
pub fn unit_cube_dataset() -> TestDataset {
    let points = Aabb::new([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]).corners().to_vec();
    let cells = vec![hex_aabb([0, 1, 2, 3, 4, 5, 6, 7], [0.0, 0.0, 0.0], [1.0, 1.0, 1.0])];
    TestDataset::new(points, cells)
}

/// Scenario 2: two tetrahedra sharing the face `(1,0,0)-(0,1,0)-(0,0,1)`.
pub fn two_adjacent_tets_dataset() -> TestDataset {
    let points = vec![
        Point3::from([0.0, 0.0, 0.0]),
        Point3::from([1.0, 0.0, 0.0]),
        Point3::from([0.0, 1.0, 0.0]),
        Point3::from([0.0, 0.0, 1.0]),
        Point3::from([1.0, 1.0, 1.0]),
    ];
    let tet_a = Tetra {
        point_ids: [0, 1, 2, 3],
        verts: [points[0], points[1], points[2], points[3]],
    };
    let tet_b = Tetra {
        point_ids: [1, 2, 3, 4],
        verts: [points[1], points[2], points[3], points[4]],
    };
    TestDataset::new(points, vec![TestCell::Tetra(tet_a), TestCell::Tetra(tet_b)])
}

/// Scenario 3: a 10x10x10 grid of unit hexahedra with a 3x3x3 cubic hole at
/// `(3..6, 3..6, 3..6)`.
pub fn grid_with_hole_dataset() -> (TestDataset, usize) {
    let mut points = Vec::new();
    let mut cells = Vec::new();
    let mut skipped = 0usize;
    for x in 0..10 {
        for y in 0..10 {
            for z in 0..10 {
                if (3..6).contains(&x) && (3..6).contains(&y) && (3..6).contains(&z) {
                    skipped += 1;
                    continue;
                }
                let base = points.len();
                let min = [x as Number, y as Number, z as Number];
                let max = [x as Number + 1.0, y as Number + 1.0, z as Number + 1.0];
                points.extend(Aabb::new(min, max).corners());
                cells.push(hex_aabb(
                    [base, base + 1, base + 2, base + 3, base + 4, base + 5, base + 6, base + 7],
                    min,
                    max,
                ));
            }
        }
    }
    (TestDataset::new(points, cells), skipped)
}

/// Scenario 4: a single octahedron inscribing the unit sphere at the origin.
pub fn octahedron_dataset() -> TestDataset {
    let poly = Polyhedron::unit_octahedron([0, 1, 2, 3, 4, 5]);
    let points = poly.verts.clone();
    TestDataset::new(points, vec![TestCell::Poly(poly)])
}

/// Scenario 5: a single hex whose nearest face is exactly 1.5 units from
/// `x = (5, 0, 0)`.
pub fn closest_point_dataset() -> TestDataset {
    let min = [0.0, -0.5, -0.5];
    let max = [3.5, 0.5, 0.5];
    let points = Aabb::new(min, max).corners().to_vec();
    let cells = vec![hex_aabb([0, 1, 2, 3, 4, 5, 6, 7], min, max)];
    TestDataset::new(points, cells)
}

/// Scenario 6: five thin slabs stacked along X, each one wider than a single
/// octree voxel at `level = 3` so a ray along X must cross each slab's
/// bounding box from two adjacent voxels. A locator without per-cell visited
/// tracking during a single traversal would report it twice.
pub fn stacked_slabs_dataset() -> TestDataset {
    let mut points = Vec::new();
    let mut cells = Vec::new();
    for i in 0..5 {
        let x0 = 3.0 * i as Number;
        let min = [x0, -0.5, -0.5];
        let max = [x0 + 2.0, 0.5, 0.5];
        let base = points.len();
        points.extend(Aabb::new(min, max).corners());
        cells.push(hex_aabb(
            [base, base + 1, base + 2, base + 3, base + 4, base + 5, base + 6, base + 7],
            min,
            max,
        ));
    }
    TestDataset::new(points, cells)
}
