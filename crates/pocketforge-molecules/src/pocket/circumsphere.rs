//! Circumscribed sphere of a triangle.

use crate::geometry::{cross, det3, distance, dot, norm, sub, Vec3};
use pocketforge_common::{DegenerateKind, PocketForgeError, Result};

/// Below this, the triangle normal or the system determinant counts as zero.
pub const DEGENERACY_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circumsphere {
    pub center: Vec3,
    pub radius: f64,
}

/// Sphere through `a`, `b`, `c` whose centre lies in their plane.
pub fn circumsphere(a: &Vec3, b: &Vec3, c: &Vec3) -> Result<Circumsphere> {
    solve(a, b, c).map_err(PocketForgeError::GeometryDegenerate)
}

/// Solves the two perpendicular-bisector planes plus the triangle plane by
/// Cramer's rule.
pub(crate) fn solve(a: &Vec3, b: &Vec3, c: &Vec3) -> std::result::Result<Circumsphere, DegenerateKind> {
    let ab = sub(b, a);
    let ac = sub(c, a);
    let normal = cross(&ab, &ac);
    if norm(&normal) < DEGENERACY_TOLERANCE {
        return Err(DegenerateKind::Collinear);
    }

    let r0 = [2.0 * ab[0], 2.0 * ab[1], 2.0 * ab[2]];
    let r1 = [2.0 * ac[0], 2.0 * ac[1], 2.0 * ac[2]];
    let r2 = normal;
    let rhs = [
        dot(b, b) - dot(a, a),
        dot(c, c) - dot(a, a),
        dot(&normal, a),
    ];

    let det = det3(&r0, &r1, &r2);
    if det.abs() < DEGENERACY_TOLERANCE {
        return Err(DegenerateKind::Singular);
    }

    let det_x = det3(&[rhs[0], r0[1], r0[2]], &[rhs[1], r1[1], r1[2]], &[rhs[2], r2[1], r2[2]]);
    let det_y = det3(&[r0[0], rhs[0], r0[2]], &[r1[0], rhs[1], r1[2]], &[r2[0], rhs[2], r2[2]]);
    let det_z = det3(&[r0[0], r0[1], rhs[0]], &[r1[0], r1[1], rhs[1]], &[r2[0], r2[1], rhs[2]]);

    let center = [det_x / det, det_y / det, det_z / det];
    Ok(Circumsphere {
        center,
        radius: distance(&center, a),
    })
}
