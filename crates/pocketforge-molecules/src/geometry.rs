//! Small vector helpers over `[f64; 3]`.

pub type Vec3 = [f64; 3];

#[inline]
pub fn sub(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn dot(a: &Vec3, b: &Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn cross(a: &Vec3, b: &Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
pub fn norm(a: &Vec3) -> f64 {
    dot(a, a).sqrt()
}

#[inline]
pub fn distance_sq(a: &Vec3, b: &Vec3) -> f64 {
    let d = sub(a, b);
    dot(&d, &d)
}

#[inline]
pub fn distance(a: &Vec3, b: &Vec3) -> f64 {
    distance_sq(a, b).sqrt()
}

/// Determinant of the 3x3 matrix with rows `r0`, `r1`, `r2`.
#[inline]
pub fn det3(r0: &Vec3, r1: &Vec3, r2: &Vec3) -> f64 {
    dot(r0, &cross(r1, r2))
}
