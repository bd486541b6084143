//! Primitive intersection and closest-point math used by the leaf tests.
//!
//! All functions treat degenerate input (zero-area triangles, zero-length
//! directions, near-parallel configurations) as "no result" instead of
//! producing NaN or infinite values.

use vcad_kernel_math::{Dir3, Point3, Tolerance, Vec3};

/// Slack on barycentric coordinates so hits on shared edges are not lost.
const BARY_EPSILON: f64 = 1e-9;

/// Relative area below which a triangle counts as degenerate.
const DEGENERATE_EPSILON: f64 = 1e-12;

/// Unit normal of triangle `(a, b, c)`, `None` if it is degenerate.
pub fn tri_normal(a: &Point3, b: &Point3, c: &Point3) -> Option<Dir3> {
    let e1 = b - a;
    let e2 = c - a;
    let n = e1.cross(&e2);
    let len = n.norm();
    if len == 0.0 || len <= DEGENERATE_EPSILON * e1.norm() * e2.norm() {
        return None;
    }
    Some(Dir3::new_unchecked(n / len))
}

/// Ray-triangle intersection (Möller-Trumbore).
///
/// Returns the ray parameter `t`, in units of `direction`, when the ray hits
/// the triangle with `0 < t <= m_dist`. Passing the current best distance as
/// `m_dist` lets callers refine the nearest hit over many triangles.
pub fn ray_tri_intersection(
    origin: &Point3,
    direction: &Vec3,
    m_dist: f64,
    v0: &Point3,
    v1: &Point3,
    v2: &Point3,
) -> Option<f64> {
    let normal = tri_normal(v0, v1, v2)?;
    let e1 = v1 - v0;
    let e2 = v2 - v0;

    let p = direction.cross(&e2);
    let det = e1.dot(&p);

    // Parallel to the triangle plane (relative to |d| * area).
    let scale = direction.norm() * e1.cross(&e2).norm();
    if det.abs() <= Tolerance::DEFAULT.parallel * scale || normal.dot(direction) == 0.0 {
        return None;
    }

    let inv_det = 1.0 / det;
    let s = origin - v0;
    let u = s.dot(&p) * inv_det;
    if !(-BARY_EPSILON..=1.0 + BARY_EPSILON).contains(&u) {
        return None;
    }

    let q = s.cross(&e1);
    let v = direction.dot(&q) * inv_det;
    if v < -BARY_EPSILON || u + v > 1.0 + BARY_EPSILON {
        return None;
    }

    let t = e2.dot(&q) * inv_det;
    (t > 0.0 && t <= m_dist).then_some(t)
}

/// Intersection of a sphere of `radius` swept along a ray with a triangle.
///
/// The sphere center starts at `origin` and moves along `direction`; the
/// result is the ray parameter `t` of first contact with `0 < t <= m_dist`.
/// First contact is found against the triangle interior, then the three
/// vertices, then the three edges. A sphere already touching the triangle
/// at `t = 0` reports no hit. With `radius == 0` this classifies and
/// measures hits like [`ray_tri_intersection`].
pub fn sphereray_tri_intersection(
    origin: &Point3,
    direction: &Vec3,
    radius: f64,
    m_dist: f64,
    v0: &Point3,
    v1: &Point3,
    v2: &Point3,
) -> Option<f64> {
    let normal = tri_normal(v0, v1, v2)?;
    let dir_len = direction.norm();
    if dir_len == 0.0 || !dir_len.is_finite() {
        return None;
    }

    // Orient the plane so the sphere starts on its positive side.
    let face_normal = normal.into_inner();
    let mut n = face_normal;
    let mut d0 = n.dot(&(origin - v0));
    if d0 < 0.0 {
        n = -n;
        d0 = -d0;
    }
    let nd = n.dot(direction);

    if nd.abs() <= Tolerance::DEFAULT.parallel * dir_len {
        if d0 >= radius {
            return None;
        }
    } else {
        let ta = (radius - d0) / nd;
        let tb = (-radius - d0) / nd;
        let (t0, t1) = if ta <= tb { (ta, tb) } else { (tb, ta) };
        if t0 > m_dist || t1 < 0.0 {
            return None;
        }

        let t = t0.max(0.0);
        let center = origin + direction * t;
        let contact = center - n * (d0 + t * nd);
        if point_in_tri(&contact, v0, v1, v2, &face_normal) {
            return (t > 0.0).then_some(t);
        }
    }

    let mut best: Option<f64> = None;
    let mut limit = m_dist;

    for v in [v0, v1, v2] {
        if let Some(t) = sweep_sphere_vertex(origin, direction, radius, v, limit) {
            best = Some(t);
            limit = t;
        }
    }

    for (a, b) in [(v0, v1), (v1, v2), (v2, v0)] {
        if let Some(t) = sweep_sphere_edge(origin, direction, radius, a, b, limit) {
            best = Some(t);
            limit = t;
        }
    }

    best
}

/// Point-on-plane inside test using edge half-spaces around the winding
/// normal `n` of `(v0, v1, v2)`.
fn point_in_tri(p: &Point3, v0: &Point3, v1: &Point3, v2: &Point3, n: &Vec3) -> bool {
    let scale = (v1 - v0).norm_squared().max((v2 - v0).norm_squared());
    [(v0, v1), (v1, v2), (v2, v0)]
        .iter()
        .all(|(a, b)| (*b - *a).cross(&(p - *a)).dot(n) >= -BARY_EPSILON * scale)
}

/// Entry root of `a t^2 + b t + c = 0` if it lies in `(0, limit]`.
fn entry_root(a: f64, b: f64, c: f64, limit: f64) -> Option<f64> {
    if a.abs() < f64::EPSILON * (b.abs() + c.abs()).max(f64::MIN_POSITIVE) {
        return None;
    }
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }
    let sq = disc.sqrt();
    let r1 = (-b - sq) / (2.0 * a);
    let r2 = (-b + sq) / (2.0 * a);
    let entry = r1.min(r2);
    (entry > 0.0 && entry <= limit).then_some(entry)
}

/// First time the swept sphere touches vertex `v`.
fn sweep_sphere_vertex(origin: &Point3, direction: &Vec3, radius: f64, v: &Point3, limit: f64) -> Option<f64> {
    let w = origin - v;
    let a = direction.norm_squared();
    let b = 2.0 * direction.dot(&w);
    let c = w.norm_squared() - radius * radius;
    if c < 0.0 {
        return None;
    }
    entry_root(a, b, c, limit)
}

/// First time the swept sphere touches the interior of edge `(p, q)`.
fn sweep_sphere_edge(
    origin: &Point3,
    direction: &Vec3,
    radius: f64,
    p: &Point3,
    q: &Point3,
    limit: f64,
) -> Option<f64> {
    let edge = q - p;
    let base = p - origin;
    let edge2 = edge.norm_squared();
    if edge2 == 0.0 {
        return None;
    }
    let e_dot_vel = edge.dot(direction);
    let e_dot_base = edge.dot(&base);
    let vel2 = direction.norm_squared();

    // Distance from the sphere center to the edge line, squared, minus r^2.
    let a = edge2 * -vel2 + e_dot_vel * e_dot_vel;
    let b = edge2 * (2.0 * direction.dot(&base)) - 2.0 * e_dot_vel * e_dot_base;
    let c = edge2 * (radius * radius - base.norm_squared()) + e_dot_base * e_dot_base;
    if c > 0.0 {
        // Already within radius of the edge line at t = 0.
        return None;
    }

    let t = entry_root(a, b, c, limit)?;
    let f = (e_dot_vel * t - e_dot_base) / edge2;
    (0.0..=1.0).contains(&f).then_some(t)
}

/// Closest point to `p` on segment `(a, b)`.
pub fn closest_point_on_segment(p: &Point3, a: &Point3, b: &Point3) -> Point3 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 == 0.0 {
        return *a;
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    a + ab * t
}

/// Closest point to `p` on triangle `(a, b, c)`, clamped to its boundary
/// when the projection falls outside.
pub fn closest_point_on_tri(p: &Point3, a: &Point3, b: &Point3, c: &Point3) -> Point3 {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;

    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return *a;
    }

    let bp = p - b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return *b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return a + ab * v;
    }

    let cp = p - c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return *c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denom = va + vb + vc;
    if denom == 0.0 {
        // Degenerate triangle: fall back to the nearest edge point.
        return [closest_point_on_segment(p, a, b), closest_point_on_segment(p, b, c)]
            .into_iter()
            .min_by(|x, y| (x - p).norm_squared().total_cmp(&(y - p).norm_squared()))
            .unwrap_or(*a);
    }
    let v = vb / denom;
    let w = vc / denom;
    a + ab * v + ac * w
}

/// Closest approach of a unit-direction ray to point `v`.
///
/// Returns `(t, point on ray)` when the point is in front of the origin and
/// within `radius` of the ray.
pub fn ray_point_closest(origin: &Point3, direction: &Vec3, radius: f64, v: &Point3) -> Option<(f64, Point3)> {
    let t = (v - origin).dot(direction);
    if t < 0.0 {
        return None;
    }
    let on_ray = origin + direction * t;
    ((on_ray - v).norm_squared() <= radius * radius).then_some((t, on_ray))
}

/// Closest approach of a unit-direction ray to segment `(a, b)`.
///
/// Returns `(t, point on ray)` when the closest points are within `radius`
/// and in front of the origin. Zero-length segments use the point test.
pub fn ray_segment_closest(
    origin: &Point3,
    direction: &Vec3,
    radius: f64,
    a: &Point3,
    b: &Point3,
) -> Option<(f64, Point3)> {
    let ab = b - a;
    if Tolerance::DEFAULT.coincident(a, b) {
        return ray_point_closest(origin, direction, radius, a);
    }

    // Closest points between the ray line and the edge line.
    let w = origin - a;
    let dd = direction.dot(direction);
    let de = direction.dot(&ab);
    let ee = ab.dot(&ab);
    let denom = dd * ee - de * de;
    if denom <= Tolerance::DEFAULT.parallel * dd * ee {
        return None;
    }
    let s = ((dd * ab.dot(&w) - de * direction.dot(&w)) / denom).clamp(0.0, 1.0);

    // Re-project the clamped edge point onto the ray.
    let on_edge = a + ab * s;
    let t = (on_edge - origin).dot(direction) / dd;
    if t < 0.0 {
        return None;
    }
    let on_ray = origin + direction * t;
    ((on_ray - on_edge).norm_squared() <= radius * radius).then_some((t, on_ray))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_tri() -> [Point3; 3] {
        [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ]
    }

    fn down() -> Vec3 {
        Vec3::new(0.0, 0.0, -1.0)
    }

    #[test]
    fn test_ray_tri_hit() {
        let [a, b, c] = unit_tri();
        let t = ray_tri_intersection(&Point3::new(0.2, 0.2, 1.0), &down(), 10.0, &a, &b, &c);
        assert_relative_eq!(t.unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_ray_tri_miss_outside() {
        let [a, b, c] = unit_tri();
        assert!(ray_tri_intersection(&Point3::new(2.0, 2.0, 1.0), &down(), 10.0, &a, &b, &c).is_none());
    }

    #[test]
    fn test_ray_tri_behind_and_beyond() {
        let [a, b, c] = unit_tri();
        let up = Vec3::new(0.0, 0.0, 1.0);
        assert!(ray_tri_intersection(&Point3::new(0.2, 0.2, 1.0), &up, 10.0, &a, &b, &c).is_none());
        assert!(ray_tri_intersection(&Point3::new(0.2, 0.2, 1.0), &down(), 0.5, &a, &b, &c).is_none());
        // The bound itself is inclusive.
        assert!(ray_tri_intersection(&Point3::new(0.2, 0.2, 1.0), &down(), 1.0, &a, &b, &c).is_some());
    }

    #[test]
    fn test_ray_tri_parallel() {
        let [a, b, c] = unit_tri();
        let along = Vec3::new(1.0, 0.0, 0.0);
        assert!(ray_tri_intersection(&Point3::new(-1.0, 0.2, 0.0), &along, 10.0, &a, &b, &c).is_none());
    }

    #[test]
    fn test_ray_tri_unnormalized_direction() {
        let [a, b, c] = unit_tri();
        let t = ray_tri_intersection(&Point3::new(0.2, 0.2, 1.0), &(down() * 4.0), 10.0, &a, &b, &c);
        assert_relative_eq!(t.unwrap(), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_ray_tri_oblique_matches_plane_solution() {
        let a = Point3::new(0.0, 0.0, 1.0);
        let b = Point3::new(4.0, 0.0, 3.0);
        let c = Point3::new(0.0, 4.0, 2.0);
        let origin = Point3::new(1.0, 1.0, 10.0);
        let dir = Vec3::new(0.02, 0.05, -1.0);

        let n = (b - a).cross(&(c - a));
        let expected = n.dot(&(a - origin)) / n.dot(&dir);
        let t = ray_tri_intersection(&origin, &dir, 100.0, &a, &b, &c).unwrap();
        assert_relative_eq!(t, expected, max_relative = 1e-5);
    }

    #[test]
    fn test_degenerate_tris_never_hit() {
        let collinear = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
        ];
        let coincident = [Point3::new(0.5, 0.5, 0.0); 3];
        let rays = [
            (Point3::new(1.0, 1.0, 1.0), down()),
            (Point3::new(0.5, 0.5, 1.0), down()),
            (Point3::new(-1.0, -1.0, 0.0), Vec3::new(1.0, 1.0, 0.0)),
        ];
        for [a, b, c] in [collinear, coincident] {
            assert!(tri_normal(&a, &b, &c).is_none());
            for (o, d) in &rays {
                assert!(ray_tri_intersection(o, d, 100.0, &a, &b, &c).is_none());
                assert!(sphereray_tri_intersection(o, d, 0.0, 100.0, &a, &b, &c).is_none());
                assert!(sphereray_tri_intersection(o, d, 0.5, 100.0, &a, &b, &c).is_none());
            }
        }
    }

    #[test]
    fn test_sphereray_zero_radius_matches_ray() {
        let tris = [
            unit_tri(),
            [
                Point3::new(0.0, 0.0, 1.0),
                Point3::new(4.0, 0.0, 3.0),
                Point3::new(0.0, 4.0, 2.0),
            ],
        ];
        let rays = [
            (Point3::new(0.2, 0.2, 1.0), down()),
            (Point3::new(2.0, 2.0, 1.0), down()),
            (Point3::new(1.0, 1.0, 10.0), Vec3::new(0.1, 0.2, -1.0)),
            (Point3::new(0.3, 0.1, -2.0), Vec3::new(0.0, 0.1, 2.0)),
            (Point3::new(0.1, 0.1, 5.0), Vec3::new(0.0, 0.0, 1.0)),
            (Point3::new(-1.0, 0.2, 0.0), Vec3::new(1.0, 0.0, 0.0)),
        ];
        for [a, b, c] in &tris {
            for (o, d) in &rays {
                let plain = ray_tri_intersection(o, d, 50.0, a, b, c);
                let swept = sphereray_tri_intersection(o, d, 0.0, 50.0, a, b, c);
                assert_eq!(plain.is_some(), swept.is_some(), "ray {o:?} {d:?}");
                if let (Some(p), Some(s)) = (plain, swept) {
                    assert_relative_eq!(p, s, max_relative = 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_sphereray_back_face() {
        let [a, b, c] = unit_tri();
        let origin = Point3::new(0.3, 0.1, -2.0);
        let up = Vec3::new(0.0, 0.0, 1.0);
        assert_relative_eq!(ray_tri_intersection(&origin, &up, 10.0, &a, &b, &c).unwrap(), 2.0);
        let thin = sphereray_tri_intersection(&origin, &up, 0.0, 10.0, &a, &b, &c);
        assert_relative_eq!(thin.unwrap(), 2.0, epsilon = 1e-12);
        let tiny = sphereray_tri_intersection(&origin, &up, 1e-6, 10.0, &a, &b, &c);
        assert_relative_eq!(tiny.unwrap(), 2.0 - 1e-6, epsilon = 1e-12);
        let fat = sphereray_tri_intersection(&origin, &up, 0.05, 10.0, &a, &b, &c);
        assert_relative_eq!(fat.unwrap(), 1.95, epsilon = 1e-12);

        // Same ray against a tilted face seen from below.
        let tilted = [
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(4.0, 0.0, 3.0),
            Point3::new(0.0, 4.0, 2.0),
        ];
        let [a, b, c] = &tilted;
        let plain = ray_tri_intersection(&origin, &up, 10.0, a, b, c).unwrap();
        let thin = sphereray_tri_intersection(&origin, &up, 0.0, 10.0, a, b, c).unwrap();
        assert_relative_eq!(plain, thin, max_relative = 1e-9);
    }

    #[test]
    fn test_sphereray_face_contact_earlier_by_radius() {
        let [a, b, c] = unit_tri();
        let t = sphereray_tri_intersection(&Point3::new(0.2, 0.2, 1.0), &down(), 0.25, 10.0, &a, &b, &c);
        assert_relative_eq!(t.unwrap(), 0.75, epsilon = 1e-12);
    }

    #[test]
    fn test_sphereray_grazes_edge() {
        // Passes beside the hypotenuse, outside the face, within radius of the edge.
        let [a, b, c] = unit_tri();
        let origin = Point3::new(0.6, 0.6, 1.0);
        assert!(ray_tri_intersection(&origin, &down(), 10.0, &a, &b, &c).is_none());

        let t = sphereray_tri_intersection(&origin, &down(), 0.2, 10.0, &a, &b, &c).unwrap();
        // Distance from (0.6, 0.6) to the line x + y = 1 is 0.2 / sqrt(2).
        let lateral = 0.2 / 2.0_f64.sqrt();
        let expected = 1.0 - (0.2_f64 * 0.2 - lateral * lateral).sqrt();
        assert_relative_eq!(t, expected, epsilon = 1e-9);
    }

    #[test]
    fn test_sphereray_grazes_vertex() {
        let [a, b, c] = unit_tri();
        let origin = Point3::new(-0.1, -0.1, 1.0);
        let t = sphereray_tri_intersection(&origin, &down(), 0.2, 10.0, &a, &b, &c).unwrap();
        let lateral2 = 0.02;
        let expected = 1.0 - (0.04_f64 - lateral2).sqrt();
        assert_relative_eq!(t, expected, epsilon = 1e-9);
    }

    #[test]
    fn test_sphereray_parallel_sweep_hits_edge() {
        // Sweeps in the plane z = 0.1 towards the triangle from -x.
        let [a, b, c] = unit_tri();
        let origin = Point3::new(-2.0, 0.5, 0.1);
        let t = sphereray_tri_intersection(&origin, &Vec3::new(1.0, 0.0, 0.0), 0.2, 10.0, &a, &b, &c)
            .unwrap();
        // Hits edge x = 0 when the horizontal gap equals sqrt(r^2 - 0.1^2).
        let expected = 2.0 - (0.04_f64 - 0.01).sqrt();
        assert_relative_eq!(t, expected, epsilon = 1e-9);
    }

    #[test]
    fn test_sphereray_miss_far() {
        let [a, b, c] = unit_tri();
        assert!(sphereray_tri_intersection(&Point3::new(3.0, 3.0, 1.0), &down(), 0.2, 10.0, &a, &b, &c)
            .is_none());
    }

    #[test]
    fn test_closest_point_on_segment() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let p = closest_point_on_segment(&Point3::new(0.5, 1.0, 0.0), &a, &b);
        assert_relative_eq!(p, Point3::new(0.5, 0.0, 0.0));
        let p = closest_point_on_segment(&Point3::new(3.0, 1.0, 0.0), &a, &b);
        assert_relative_eq!(p, b);
        assert_relative_eq!(closest_point_on_segment(&b, &a, &a), a);
    }

    #[test]
    fn test_closest_point_on_tri_regions() {
        let [a, b, c] = unit_tri();
        let inside = closest_point_on_tri(&Point3::new(0.2, 0.3, 5.0), &a, &b, &c);
        assert_relative_eq!(inside, Point3::new(0.2, 0.3, 0.0), epsilon = 1e-12);

        let vertex = closest_point_on_tri(&Point3::new(-1.0, -1.0, 0.0), &a, &b, &c);
        assert_relative_eq!(vertex, a);

        let edge = closest_point_on_tri(&Point3::new(1.0, 1.0, 0.0), &a, &b, &c);
        assert_relative_eq!(edge, Point3::new(0.5, 0.5, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_closest_point_on_degenerate_tri() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(2.0, 0.0, 0.0);
        let p = closest_point_on_tri(&Point3::new(1.5, 1.0, 0.0), &a, &b, &c);
        assert!(p.x.is_finite() && p.y.abs() < 1e-12);
    }

    #[test]
    fn test_ray_segment_closest() {
        let a = Point3::new(0.0, -1.0, 0.0);
        let b = Point3::new(0.0, 1.0, 0.0);
        let origin = Point3::new(-5.0, 0.0, 0.05);
        let dir = Vec3::new(1.0, 0.0, 0.0);
        let (t, p) = ray_segment_closest(&origin, &dir, 0.1, &a, &b).unwrap();
        assert_relative_eq!(t, 5.0, epsilon = 1e-12);
        assert_relative_eq!(p, Point3::new(0.0, 0.0, 0.05), epsilon = 1e-12);
        assert!(ray_segment_closest(&origin, &dir, 0.01, &a, &b).is_none());
        assert!(ray_segment_closest(&origin, &(-dir), 0.1, &a, &b).is_none());
    }

    #[test]
    fn test_ray_point_closest() {
        let v = Point3::new(3.0, 0.1, 0.0);
        let (t, _) = ray_point_closest(&Point3::origin(), &Vec3::x(), 0.2, &v).unwrap();
        assert_relative_eq!(t, 3.0);
        assert!(ray_point_closest(&Point3::origin(), &Vec3::x(), 0.05, &v).is_none());
    }
}
